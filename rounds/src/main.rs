//! Round lifecycle daemon
//!
//! Runs the collaborative-story engine in a single process: bootstraps an
//! active story when none exists, keeps a round open on it, and settles
//! expired rounds on a fixed tick. The deadline itself is passive; the
//! ticker is just one trigger among any number of possible ones, so its
//! cadence only affects settlement latency, never correctness.
//!
//! ```bash
//! # Defaults: hour-long rounds, settle check every 30s
//! rounds
//!
//! # Short rounds for local experimentation
//! RUST_LOG=rounds=debug rounds --round-secs 60 --tick-secs 5
//! ```

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use rounds::config::EngineConfig;
use rounds::events::{EventBus, SharedEventBus, StoryEvent};
use rounds::generate::{HttpGenerator, SharedGenerator};
use rounds::identity::{HttpIdentityProvider, SharedIdentity, StaticIdentity};
use rounds::rounds::RoundManager;
use rounds::settle::SettlementEngine;
use rounds::store::{MemoryStore, SharedStore, Story};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Duration of each voting round, in seconds
    #[arg(long, default_value_t = 3600)]
    round_secs: i64,

    /// Story length at which the story is retired and a new one starts
    #[arg(long, default_value_t = 1000)]
    threshold: usize,

    /// Seconds between settlement checks
    #[arg(long, default_value_t = 30)]
    tick_secs: u64,

    /// Generation endpoint (overrides ROUNDS_GENERATOR_URL)
    #[arg(long)]
    generator_url: Option<String>,

    /// Identity API base URL; display names fall back to "Anonymous"
    /// when unset (token read from ROUNDS_IDENTITY_TOKEN)
    #[arg(long)]
    identity_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rounds=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = EngineConfig::default();
    config.round_duration_secs = args.round_secs;
    config.content_threshold = args.threshold;
    if let Some(url) = args.generator_url {
        config.generator_url = url;
    }

    info!(
        round_secs = config.round_duration_secs,
        threshold = config.content_threshold,
        tick_secs = args.tick_secs,
        "starting round lifecycle daemon"
    );

    let store: SharedStore = MemoryStore::new().shared();
    let event_bus = EventBus::new().shared();

    let identity: SharedIdentity = match args.identity_url {
        Some(url) => {
            let token = std::env::var("ROUNDS_IDENTITY_TOKEN").unwrap_or_default();
            Arc::new(HttpIdentityProvider::new(url, token))
        }
        None => StaticIdentity::new().shared(),
    };

    let generator: SharedGenerator = HttpGenerator::from_config(&config)?.shared();

    let manager = RoundManager::new(
        store.clone(),
        event_bus.clone(),
        identity,
        config.clone(),
    );
    let engine = Arc::new(SettlementEngine::new(
        store.clone(),
        event_bus.clone(),
        manager.clone(),
        generator.clone(),
        config,
    ));

    spawn_event_logger(event_bus);

    // Repair any settlement a previous process abandoned mid-apply.
    if let Ok(Some(story)) = store.active_story() {
        match engine.recover(&story.id).await {
            Ok(0) => {}
            Ok(n) => info!(story_id = %story.id, repaired = n, "startup recovery complete"),
            Err(e) => error!("startup recovery failed: {}", e),
        }
    }

    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(args.tick_secs));
    loop {
        ticker.tick().await;

        match store.active_story() {
            Ok(Some(story)) => {
                if story.round_ids.is_empty() {
                    if let Err(e) = manager.open_first_round(&story.id) {
                        error!(story_id = %story.id, "opening first round failed: {}", e);
                    }
                    continue;
                }
                match engine.settle(&story.id).await {
                    Ok(outcome) if outcome.is_settled() => {
                        info!(story_id = %story.id, "round settled");
                    }
                    Ok(_) => debug!(story_id = %story.id, "nothing to settle"),
                    Err(e) => error!(story_id = %story.id, "settlement failed: {}", e),
                }
            }
            Ok(None) => {
                if let Err(e) = bootstrap_story(&store, &manager, &generator).await {
                    warn!("story bootstrap failed, will retry: {}", e);
                }
            }
            Err(e) => error!("active story lookup failed: {}", e),
        }
    }
}

/// Create a fresh active story from a generated opening and open its
/// first round
async fn bootstrap_story(
    store: &SharedStore,
    manager: &RoundManager,
    generator: &SharedGenerator,
) -> Result<()> {
    let opening = generator.opening().await?;
    let story = Story::new(opening);
    store.put_story(&story)?;
    info!(story_id = %story.id, "bootstrapped new story");
    manager.open_first_round(&story.id)?;
    Ok(())
}

/// Mirror every bus event into the structured log
fn spawn_event_logger(event_bus: SharedEventBus) {
    let mut receiver = event_bus.subscribe();
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event logger lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

fn log_event(event: &StoryEvent) {
    match event {
        StoryEvent::RoundSettled {
            round_id,
            winner,
            vote_count,
            ..
        } => match winner {
            Some(text) => {
                info!(%round_id, votes = *vote_count, winner = %text, "event: round_settled")
            }
            None => info!(%round_id, "event: round_settled (no submissions)"),
        },
        StoryEvent::StoryRotated {
            retired_story_id,
            final_len,
            ..
        } => info!(%retired_story_id, final_len = *final_len, "event: story_rotated"),
        other => debug!(event_type = other.event_type(), "event"),
    }
}
