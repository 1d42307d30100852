use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::device::hal::SwitchPosition;

#[derive(Parser, Debug)]
#[command(name = "spectro-logger", about = "Acoustic spectrum logger firmware, simulated on the host")]
pub struct Cli {
    /// Config file (default: spectro-logger.toml or the user config dir)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Deploy the logger on a simulated board
    Run(RunArgs),

    /// Print the records in a .BIN file
    Inspect {
        file: PathBuf,

        /// Emit records as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check the FFT engine against a reference transform
    Selftest {
        /// Largest acceptable error relative to the peak magnitude
        #[arg(long, default_value_t = 1e-4)]
        tolerance: f32,
    },
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// silence, sine, sine:<hz>, or an audio file (WAV, MP3, FLAC, OGG)
    #[arg(short, long, default_value = "sine")]
    pub source: String,

    /// Mode switch position
    #[arg(long, value_enum, default_value_t = SwitchArg::Default)]
    pub switch: SwitchArg,

    /// Stop after this many wakes
    #[arg(long, conflicts_with = "records")]
    pub wakes: Option<u64>,

    /// Stop after this many completed cycles
    #[arg(long, default_value_t = 3)]
    pub records: u64,

    /// Clock at power-up, in Unix seconds (default: now)
    #[arg(long)]
    pub start: Option<u32>,

    /// Where the backup domain is kept between runs
    #[arg(long, default_value = ".spectro-logger")]
    pub state_dir: PathBuf,

    /// Output directory for .BIN files (overrides [output].directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Simulate a failing SD card
    #[arg(long)]
    pub fail_writes: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchArg {
    Default,
    Custom,
    Usb,
}

impl From<SwitchArg> for SwitchPosition {
    fn from(arg: SwitchArg) -> Self {
        match arg {
            SwitchArg::Default => SwitchPosition::Default,
            SwitchArg::Custom => SwitchPosition::Custom,
            SwitchArg::Usb => SwitchPosition::Usb,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_defaults() {
        let cli = Cli::parse_from(["spectro-logger", "run"]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.source, "sine");
        assert_eq!(args.switch, SwitchArg::Default);
        assert_eq!(args.records, 3);
        assert!(args.wakes.is_none());
        assert!(!args.fail_writes);
    }

    #[test]
    fn global_config_after_subcommand() {
        let cli = Cli::parse_from(["spectro-logger", "inspect", "A.BIN", "--json", "--config", "x.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
        assert!(matches!(cli.command, Command::Inspect { json: true, .. }));
    }

    #[test]
    fn wakes_and_records_conflict() {
        let result = Cli::try_parse_from(["spectro-logger", "run", "--wakes", "5", "--records", "2"]);
        assert!(result.is_err());
    }

    #[test]
    fn switch_maps_to_position() {
        assert_eq!(SwitchPosition::from(SwitchArg::Usb), SwitchPosition::Usb);
        assert_eq!(SwitchPosition::from(SwitchArg::Custom), SwitchPosition::Custom);
    }
}
