//! ubba-night: headless UBBA host.
//!
//! Runs one session on a fixed-rate loop and reads commands from stdin, one
//! per line: `1`-`5`, `next`, `prev`, `hold <dir>`, `release <dir>`,
//! `report <text>`, `restart`, `night`, `quit`.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use ubba_replay::{
    VerifyOptions, acquire_build_fingerprint, read_replay, verify_replay, write_replay,
};
use ubba_server::Controller;
use ubba_server::collaborators::{FrameStreamRenderer, LogAudio, LogRenderer, Renderer};
use ubba_server::config::load_config;
use ubba_server::input::{ConsoleCommand, parse_console_line};

#[derive(Parser, Debug)]
#[command(name = "ubba-night", version, about = "Watch the cameras. Report UBBA.")]
struct Args {
    /// Config file (TOML); defaults are used when it does not exist
    #[arg(short, long, default_value = "ubba.toml")]
    config: PathBuf,

    /// Session seed (overrides the config file)
    #[arg(long)]
    seed: Option<u64>,

    /// Host loop rate in Hz (overrides the config file)
    #[arg(long)]
    tick_rate: Option<u32>,

    /// Record the session and write the replay here on exit
    #[arg(long)]
    record: Option<PathBuf>,

    /// Stream length-delimited frames to this file
    #[arg(long)]
    frames: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Verify a recorded replay reproduces its final state
    Verify {
        path: PathBuf,

        /// Fail when the replay was recorded by a different build
        #[arg(long)]
        strict: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = Args::parse();
    match args.command.take() {
        Some(Cmd::Verify { path, strict }) => verify(&path, strict),
        None => run(args).await,
    }
}

fn verify(path: &Path, strict: bool) -> Result<()> {
    let artifact =
        read_replay(path).with_context(|| format!("Failed to read replay {}", path.display()))?;
    let current_build = match acquire_build_fingerprint() {
        Ok(fingerprint) => Some(fingerprint),
        Err(e) => {
            warn!("Could not fingerprint this build: {}", e);
            None
        }
    };
    let options = VerifyOptions {
        strict_build_check: strict,
        current_build,
    };

    verify_replay(&artifact, &options)
        .with_context(|| format!("Replay {} did not verify", path.display()))?;
    info!(
        ticks = artifact.ticks.len(),
        end_reason = %artifact.end_reason,
        "Replay verified"
    );
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let mut config = load_config(&args.config)
        .with_context(|| format!("Failed to load config {}", args.config.display()))?;
    if let Some(rate) = args.tick_rate {
        config.tick_rate_hz = rate;
    }
    config.validate().context("Invalid configuration")?;

    let seed = args.seed.or(config.seed).unwrap_or_else(time_seed);
    let period = Duration::from_secs_f64(1.0 / f64::from(config.tick_rate_hz));

    let frames = match &args.frames {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create frame stream {}", path.display()))?;
            Some(FrameStreamRenderer::new(BufWriter::new(file)))
        }
        None => None,
    };

    let mut controller = Controller::new(config, seed, (LogRenderer::new(), frames), LogAudio)
        .context("Failed to start session")?;

    if args.record.is_some() {
        match acquire_build_fingerprint() {
            Ok(fingerprint) => controller.set_build_fingerprint(fingerprint),
            Err(e) => warn!("Could not fingerprint this build: {}", e),
        }
        controller
            .start_recording()
            .context("Failed to start recording")?;
    }

    info!("Type 1-5 to switch cameras, 'report camN' when UBBA is alerting, 'quit' to leave");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let start = Instant::now();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }

            _ = interval.tick() => {
                controller.tick(start.elapsed());
            }

            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    info!("stdin closed");
                    break;
                };
                if !handle_line(&mut controller, &line) {
                    break;
                }
            }
        }
    }

    if let Some(path) = &args.record
        && let Some(artifact) = controller.finish_recording()
    {
        write_replay(&artifact, path)
            .with_context(|| format!("Failed to write replay {}", path.display()))?;
        info!("Replay written to {}", path.display());
    }

    Ok(())
}

/// Apply one console line. Returns false on quit.
fn handle_line<R: Renderer>(controller: &mut Controller<R, LogAudio>, line: &str) -> bool {
    match parse_console_line(line) {
        Ok(ConsoleCommand::Events(events)) => {
            for event in events {
                let result = controller.handle_event(event);
                if !result.is_accepted() {
                    warn!("Ignored: {:?}", result);
                }
            }
        }
        Ok(ConsoleCommand::Restart) => controller.restart(),
        Ok(ConsoleCommand::Night) => {
            controller.advance_night();
        }
        Ok(ConsoleCommand::Quit) => return false,
        Err(e) => warn!("{}", e),
    }
    true
}

/// Seed from the wall clock when none is configured.
fn time_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}
