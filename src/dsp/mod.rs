pub mod fft;
pub mod power;
pub mod reference;
pub mod tables;
