//! Hibernatable socket event replay.
//!
//! Runs a script of socket events through the dispatcher with a logging
//! engine, then waits for every scheduled drain. Events are dispatched one at
//! a time.
//!
//! # Usage
//!
//! ```bash
//! # Replay with the default entrypoint
//! hibernation-replay events.txt
//!
//! # Named entrypoint, verbose dispatcher logs
//! hibernation-replay events.txt --entrypoint chat --log-level debug
//! ```

use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use hibernation_runtime::{
    ActorContext, RunnerConfig, SocketDispatcher,
    replay::{ReplayEngine, ReplaySummary, replay_file},
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Hibernatable socket event replay
#[derive(Parser, Debug)]
#[command(name = "hibernation-replay")]
#[command(about = "Replay hibernatable WebSocket events through the dispatcher")]
#[command(version)]
struct Args {
    /// Event script to replay
    script: PathBuf,

    /// Entrypoint to resolve handlers from
    #[arg(short, long)]
    entrypoint: Option<String>,

    /// Actor id used in logs
    #[arg(long, default_value = "1")]
    actor_id: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let config = RunnerConfig { default_entrypoint: args.entrypoint, ..RunnerConfig::default() };
    let dispatcher = SocketDispatcher::new(
        Arc::new(ReplayEngine::new()),
        ActorContext::new(args.actor_id),
        config,
    );

    let steps = replay_file(&args.script, &dispatcher, None).await?;
    let drained = dispatcher.wait_until().join_all().await;
    dispatcher.registry().close();

    let summary = ReplaySummary::from_steps(&steps);
    tracing::info!(
        opened = summary.opened,
        ok = summary.ok,
        exceptions = summary.exceptions,
        wakes = dispatcher.engine().wakes(),
        drained,
        "replay finished"
    );

    Ok(())
}
