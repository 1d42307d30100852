mod cli;
mod config;
mod device;
mod dsp;
mod record;
mod sim;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

use cli::{Cli, Command, RunArgs};
use config::Config;
use device::controller::{Controller, WakeKind};
use dsp::fft::{bin, complete_spectrum, RealFft, FFT_LENGTH};
use dsp::power::peak_bin;
use dsp::reference::reference_spectrum;
use sim::source::SampleSource;
use sim::SimBoard;

/// Wakes allowed per expected cycle before `run` gives up.
const WAKES_PER_CYCLE_LIMIT: u64 = 20;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    // Load config: explicit --config path, or auto-detect
    let config_path = cli.config.clone().or_else(config::find_config);
    let config = match config_path {
        Some(ref path) => match config::load_config(path) {
            Ok(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            Err(err) if cli.config.is_some() => return Err(err),
            Err(err) => {
                log::warn!("Ignoring config: {:#}", err);
                Config::default()
            }
        },
        None => Config::default(),
    };

    match cli.command {
        Command::Run(args) => run(&config, args),
        Command::Inspect { file, json } => inspect(&config, &file, json),
        Command::Selftest { tolerance } => selftest(&config, tolerance),
    }
}

fn run(config: &Config, args: RunArgs) -> Result<()> {
    let settings = config.acquisition_settings().context("Invalid [acquisition] config")?;
    let sample_rate = settings.capture.sample_rate;
    let interval = settings.sample_interval;

    let source = SampleSource::parse(&args.source, sample_rate)?;
    let start = match args.start {
        Some(seconds) => seconds,
        None => u32::try_from(Utc::now().timestamp()).context("System clock outside the RTC range")?,
    };
    let output_dir = args.output.as_deref().unwrap_or(config.output.directory.as_path());

    let mut board = SimBoard::new(&args.state_dir, output_dir, start, args.switch.into(), source)?;
    board.set_fail_writes(args.fail_writes);
    let mut controller = Controller::new(settings).context("Failed to build FFT tables")?;

    log::info!("spectro-logger - simulated deployment");
    log::info!("Source: {}", args.source);
    log::info!("Switch: {:?}", args.switch);
    log::info!("Start: {}", format_time(start));
    log::info!("Records: {}", board.output_dir().display());

    let (wake_limit, pb) = match args.wakes {
        Some(wakes) => (wakes, ProgressBar::new(wakes)),
        None => (
            WAKES_PER_CYCLE_LIMIT * (interval as u64 + 1) * (args.records + 1),
            ProgressBar::new(args.records),
        ),
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .context("Invalid progress template")?
            .progress_chars("=>-"),
    );
    pb.set_message(if args.wakes.is_some() { "wakes" } else { "records" });

    let mut completed = 0u64;
    let mut failed = 0u64;
    for _ in 0..wake_limit {
        let outcome = controller.wake(&mut board);

        match &outcome.kind {
            WakeKind::Completed { filename } => {
                completed += 1;
                let (peak, peak_power) = peak_bin(controller.power()).unwrap_or((0, 0.0));
                log::info!(
                    "Cycle {} done -> {} (peak {:.1} Hz, {:.3e})",
                    format_time(outcome.state.time_of_next_sample.saturating_sub(interval)),
                    filename.as_deref().unwrap_or("(not written)"),
                    peak as f32 * sample_rate as f32 / FFT_LENGTH as f32,
                    peak_power
                );
                if args.wakes.is_none() {
                    pb.inc(1);
                }
            }
            WakeKind::WriteFailed { .. } => failed += 1,
            WakeKind::Realigned { time_of_next_sample } => {
                log::info!("Next cycle at {}", format_time(*time_of_next_sample));
            }
            WakeKind::Waiting { .. } | WakeKind::Usb | WakeKind::Inactive => {}
        }
        if args.wakes.is_some() {
            pb.inc(1);
        }

        board.power_down(outcome.sleep_ms)?;

        if args.wakes.is_none() && completed >= args.records {
            break;
        }
    }

    pb.finish_with_message("done");

    if args.wakes.is_none() && completed < args.records {
        log::warn!(
            "Stopped after {} wakes with {}/{} cycles recorded",
            wake_limit,
            completed,
            args.records
        );
    }
    log::info!("Done! {} cycles recorded, {} write failures", completed, failed);
    Ok(())
}

fn inspect(config: &Config, file: &Path, json: bool) -> Result<()> {
    let bins = FFT_LENGTH / 2 + 1;
    let records = record::read_records(file, bins)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    let hz_per_bin = config.acquisition.sample_rate as f32 / FFT_LENGTH as f32;
    println!("{}: {} records", file.display(), records.len());
    for record in &records {
        let (peak, peak_power) = record.peak_bin().unwrap_or((0, 0.0));
        println!(
            "  {}  peak bin {:3} ({:7.1} Hz) {:.3e}  total {:.3e}",
            format_time(record.time_of_next_sample),
            peak,
            peak as f32 * hz_per_bin,
            peak_power,
            record.total_power()
        );
    }
    Ok(())
}

fn selftest(config: &Config, tolerance: f32) -> Result<()> {
    let window = config.fft.window;
    let fft = RealFft::new(FFT_LENGTH, window)?;
    let n = fft.points();

    let mut state = 0x2545_f491u32;
    let cases: Vec<(&str, Vec<i16>)> = vec![
        ("dc", vec![1000; n]),
        (
            "sine",
            (0..n)
                .map(|i| {
                    let phase = 2.0 * std::f32::consts::PI * (64 * i) as f32 / n as f32;
                    (16383.0 * phase.sin()).round() as i16
                })
                .collect(),
        ),
        (
            "noise",
            (0..n)
                .map(|_| {
                    state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                    (state >> 16) as i16
                })
                .collect(),
        ),
    ];

    let mut spectrum = vec![0.0f32; fft.spectrum_len()];
    let mut worst = 0.0f32;
    for (name, samples) in &cases {
        fft.transform(samples, &mut spectrum);
        complete_spectrum(&mut spectrum);
        let expected = reference_spectrum(samples, window);

        let scale = expected.iter().map(|z| z.norm()).fold(0.0f32, f32::max).max(1.0);
        let error = expected
            .iter()
            .enumerate()
            .map(|(i, z)| (bin(&spectrum, i) - z).norm())
            .fold(0.0f32, f32::max)
            / scale;

        println!("  {:<6} max relative error {:.2e}", name, error);
        worst = worst.max(error);
    }

    if worst > tolerance {
        bail!("FFT error {:.2e} exceeds tolerance {:.2e}", worst, tolerance);
    }
    println!("{}-point {:?} FFT OK", n, window);
    Ok(())
}

fn format_time(seconds: u32) -> String {
    DateTime::<Utc>::from_timestamp(seconds as i64, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| seconds.to_string())
}
