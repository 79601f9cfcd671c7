use clap::Parser;
use log::{error, info};
use server::config::SimConfig;
use server::game::Simulation;
use server::runner::{run_match, MatchOptions};
use shared::TUNING_VERSION;
use std::time::Duration;

/// Main-method of the application.
/// Parses command-line arguments, fills the roster with bots and runs one round.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Number of bot-controlled actors
        #[clap(short, long, default_value = "6")]
        bots: u32,
        /// Seed for spawns and bot skill
        #[clap(short, long, default_value = "31249")]
        seed: u64,
        /// Cut the round off after this many simulated seconds
        #[clap(short, long)]
        duration_secs: Option<u64>,
        /// How far back hits may be rewound, in milliseconds
        #[clap(long, default_value = "200")]
        history_ms: u64,
        /// Global thrust multiplier
        #[clap(long, default_value = "1.0")]
        speed: f32,
        /// Run ticks back to back instead of in real time
        #[clap(long)]
        fast: bool,
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    info!("Tuning table version {}", TUNING_VERSION);

    let config = SimConfig {
        seed: args.seed,
        history_retention_ms: args.history_ms,
        speed_multiplier: args.speed,
        ..SimConfig::default()
    };
    let mut sim = Simulation::new(config)?;
    for id in 0..args.bots {
        let spawn = sim.random_spawn();
        sim.add_bot(id, spawn)?;
    }

    let options = MatchOptions {
        duration: args.duration_secs.map(Duration::from_secs),
        realtime: !args.fast,
        ..MatchOptions::default()
    };

    // Handle shutdown gracefully
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down gracefully...");
    };

    let summary = run_match(&mut sim, &options, shutdown).await?;
    info!(
        "{} eliminations, outcome {:?}",
        summary.eliminations.len(),
        summary.outcome
    );
    sim.stop_round();

    Ok(())
}
