//! # Bolt Core
//!
//! Runs the simulated practice robot: a conveyor and a shooter driven by the
//! autonomous routine, ticked by the periodic host loop.
//!
//! The robot configuration is read from `--config` (default
//! `config/bolt.toml`); a missing file falls back to the built-in defaults.
//! Every conveyor program is built and validated before the first tick, so a
//! malformed program stops the process at boot.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bolt_common::config::ConfigError;
use bolt_common::consts::DEFAULT_CONFIG_PATH;
use bolt_core::config::BoltConfig;
use bolt_core::conveyor::Conveyor;
use bolt_core::cycle::{CycleRunner, rt_setup};
use bolt_core::demo::Demo;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Bolt: cooperative action scheduler for a competition robot
#[derive(Parser, Debug)]
#[command(name = "bolt_core")]
#[command(version)]
#[command(about = "Tick a simulated conveyor robot through its autonomous routine")]
struct Args {
    /// Path to the robot configuration TOML.
    #[arg(long, value_name = "FILE", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Stop after this many ticks (default: run until Ctrl-C, or 1000 with --fast).
    #[arg(long)]
    ticks: Option<u64>,

    /// Run on simulated time without sleeping.
    #[arg(long)]
    fast: bool,

    /// CPU core to pin the loop to (overrides the config).
    #[arg(long)]
    cpu_core: Option<usize>,

    /// SCHED_FIFO priority (overrides the config).
    #[arg(long)]
    rt_priority: Option<i32>,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

const FAST_DEFAULT_TICKS: u64 = 1000;

fn main() {
    let args = Args::parse();

    let loaded = match BoltConfig::from_file(&args.config) {
        Err(ConfigError::FileNotFound) => None,
        other => Some(other),
    };
    let level = match &loaded {
        Some(Ok(config)) => config.shared.log_level.as_directive(),
        _ => "info",
    };
    setup_tracing(&args, level);

    info!("Bolt Core v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = match loaded {
        Some(Ok(config)) => config,
        Some(Err(e)) => {
            error!("FATAL: {}: {e}", args.config.display());
            process::exit(1);
        }
        None => {
            warn!(
                "No config at '{}', using built-in defaults",
                args.config.display()
            );
            BoltConfig::default()
        }
    };

    if let Err(e) = run(&args, config) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("Bolt Core shutdown complete");
}

fn run(args: &Args, config: BoltConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        service = %config.shared.service_name,
        period_ms = config.cycle.period_ms,
        capacity = config.conveyor.capacity,
        "config OK"
    );

    let demo = Demo::build(&config)?;
    let conveyor = demo.conveyor;
    let field = demo.field.clone();

    let mut runner = CycleRunner::new(demo.robot, Box::new(demo.controller), config.cycle.period())?;

    if args.fast {
        let ticks = args.ticks.unwrap_or(FAST_DEFAULT_TICKS);
        info!(ticks, "running on simulated time");
        runner.run_fast(ticks);
    } else {
        let cpu_core = args.cpu_core.unwrap_or(config.cycle.cpu_core);
        let rt_priority = args.rt_priority.unwrap_or(config.cycle.rt_priority);
        rt_setup(cpu_core, rt_priority)?;
        info!(cpu_core, rt_priority, "RT setup complete");

        let running = Arc::new(AtomicBool::new(true));
        let r = running.clone();
        ctrlc::set_handler(move || {
            info!("Received shutdown signal");
            r.store(false, Ordering::SeqCst);
        })?;

        runner.run(args.ticks, &running)?;
    }

    let stats = runner.stats().clone();
    let mut robot = runner.into_robot();
    if let Ok(state) = robot.tree().mechanism::<Conveyor>(conveyor) {
        info!(
            ticks = robot.ticks(),
            balls = state.ball_count(),
            flags = ?state.flags(),
            fired = field.fired(),
            "conveyor final state"
        );
    }
    info!(
        avg_us = stats.avg_cycle_ns() / 1000,
        max_us = stats.max_cycle_ns / 1000,
        overruns = stats.overruns,
        "cycle statistics"
    );

    robot.shutdown();
    Ok(())
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args, config_level: &str) {
    let level = if args.verbose { "debug" } else { config_level };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
