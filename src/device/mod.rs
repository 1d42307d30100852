pub mod backup;
pub mod controller;
pub mod handoff;
pub mod hal;
pub mod schedule;
