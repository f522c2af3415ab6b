//! Tileworld runner
//!
//! Runs a team of agents in the reference grid world and writes their events
//! as JSONL.

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use tile_core::config::Config;
use tile_core::{EventLogger, Simulation};

/// Command line arguments for the runner
#[derive(Parser, Debug)]
#[command(name = "tileworld")]
#[command(about = "Run Tileworld agents in a reference grid world")]
struct Args {
    /// Tuning file [default: tuning.toml, falling back to built-in defaults]
    #[arg(long)]
    config: Option<PathBuf>,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Number of ticks to simulate
    #[arg(long)]
    ticks: Option<u64>,

    /// Number of agents
    #[arg(long)]
    agents: Option<usize>,

    /// JSONL event log path
    #[arg(long)]
    events: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tileworld=info,tile_core=info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(),
    };
    if let Some(seed) = args.seed {
        config.simulation.seed = seed;
    }
    if let Some(ticks) = args.ticks {
        config.simulation.ticks = ticks;
    }
    if let Some(agents) = args.agents {
        config.simulation.agent_count = agents;
    }
    config.validate()?;

    let logger = match &args.events {
        Some(path) => EventLogger::new(path)?,
        None => EventLogger::null(),
    };

    tracing::info!(
        seed = config.simulation.seed,
        ticks = config.simulation.ticks,
        agents = config.simulation.agent_count,
        width = config.world.width,
        height = config.world.height,
        "starting run"
    );

    let mut sim = Simulation::new(&config, logger);
    let report_interval = config.simulation.report_interval.max(1);

    for _ in 0..config.simulation.ticks {
        sim.step();
        let tick = sim.tick();
        if tick % report_interval == 0 {
            let report = sim.report();
            tracing::info!(
                tick,
                score = report.score,
                tiles_picked = report.world.tiles_picked,
                refuels = report.world.refuels,
                messages = report.messages_on_bus,
                "progress"
            );
        }
    }

    sim.flush_log()?;
    let report = sim.report();
    for agent in &report.agents {
        tracing::info!(
            agent = %agent.id,
            position = %agent.position,
            fuel = agent.fuel,
            carried = agent.carried,
            task = ?agent.task,
            "final state"
        );
    }
    tracing::info!(
        ticks = report.tick,
        score = report.score,
        events = report.events_logged,
        blocked = report.world.blocked_moves,
        failed = report.world.failed_actions,
        "run complete"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
