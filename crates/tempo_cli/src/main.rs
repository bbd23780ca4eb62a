//! Tempo CLI
//!
//! Load animation scenarios, sample them at fixed times or play them
//! through the frame loop.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod player;

use config::Scenario;
use player::{PlayOptions, Report};

const MAX_SAMPLES: f64 = 100_000.0;

#[derive(Parser)]
#[command(name = "tempo")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Tempo animation scheduler CLI", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a scenario at fixed times
    Sample {
        /// Scenario file
        scenario: PathBuf,

        /// Times to sample, in seconds
        #[arg(short, long, value_delimiter = ',')]
        times: Vec<f64>,

        /// Sample every STEP seconds until the scenario ends
        #[arg(short, long, conflicts_with = "times")]
        step: Option<f64>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Play a scenario through the ticker
    Play {
        /// Scenario file
        scenario: PathBuf,

        /// Pace frames on the wall clock
        #[arg(long)]
        realtime: bool,

        /// Keep one sample every N frames
        #[arg(short, long, default_value = "1")]
        every: u64,

        /// Stop after this many seconds
        #[arg(long, default_value = "10")]
        max_seconds: f64,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Validate a scenario file
    Check {
        /// Scenario file
        scenario: PathBuf,

        /// Print the scenario back with every default filled in
        #[arg(long)]
        normalize: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Sample {
            scenario,
            times,
            step,
            json,
        } => cmd_sample(&scenario, times, step, json),

        Commands::Play {
            scenario,
            realtime,
            every,
            max_seconds,
            json,
        } => {
            let options = PlayOptions {
                realtime,
                every,
                max_seconds,
            };
            cmd_play(&scenario, &options, json)
        }

        Commands::Check {
            scenario,
            normalize,
        } => cmd_check(&scenario, normalize),
    }
}

fn cmd_sample(path: &Path, times: Vec<f64>, step: Option<f64>, json: bool) -> Result<()> {
    let scenario = Scenario::load(path)?;
    let times = match step {
        Some(step) => {
            if !(step.is_finite() && step > 0.0) {
                anyhow::bail!("Invalid step '{}': expected a positive number of seconds", step);
            }
            // the end is only known once the scenario is built
            let end = player::sample(&scenario, &[])?.duration;
            let count = (end / step).ceil();
            if count > MAX_SAMPLES {
                anyhow::bail!("Sampling every {}s over {}s gives too many samples", step, end);
            }
            let count = count as usize;
            (0..=count).map(|i| (i as f64 * step).min(end)).collect()
        }
        None if times.is_empty() => vec![0.0],
        None => times,
    };

    info!("Sampling {} at {} times", path.display(), times.len());
    let report = player::sample(&scenario, &times)?;
    print_report(&report, json)
}

fn cmd_play(path: &Path, options: &PlayOptions, json: bool) -> Result<()> {
    let scenario = Scenario::load(path)?;
    info!(
        "Playing {} ({})",
        path.display(),
        if options.realtime { "realtime" } else { "simulated" }
    );
    let report = player::play(&scenario, options)?;
    print_report(&report, json)
}

fn cmd_check(path: &Path, normalize: bool) -> Result<()> {
    let scenario = Scenario::load(path)?;
    info!(
        "{} is valid: {} targets, {} tweens, {} timelines",
        path.display(),
        scenario.targets.len(),
        scenario.tweens.len(),
        scenario.timelines.len()
    );
    if normalize {
        print!("{}", scenario.to_toml()?);
    }
    Ok(())
}

fn print_report(report: &Report, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", player::format_text(report));
    }
    Ok(())
}
