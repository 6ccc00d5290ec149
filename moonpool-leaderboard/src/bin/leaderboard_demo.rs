//! Leaderboard demo.
//!
//! Starts an in-process node after a delay, bootstraps a client session with
//! retries, opens a competition window, then lets a handful of players join
//! and submit random score deltas for a few rounds.
//!
//! ```text
//! RUST_LOG=info cargo run --bin leaderboard_demo -- --players 6 --policy clamp
//! ```

use std::rc::Rc;
use std::time::Duration;

use clap::Parser;
use moonpool_leaderboard::actors::{ActorNode, InMemoryStateStore, NodeConfig};
use moonpool_leaderboard::game::{self, GameConfig, GameError, GameHostRef, ScoreUnderflowPolicy};
use moonpool_leaderboard::gateway::{PlayerGateway, TracingNotifier};
use moonpool_leaderboard::session::{with_session, LocalConnector, RetryConfig, SessionError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type DemoResult<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// CLI arguments
#[derive(Parser, Debug)]
#[command(name = "leaderboard_demo")]
#[command(about = "Players compete in a time-boxed leaderboard window", long_about = None)]
struct Args {
    /// Number of players joining the window
    #[arg(long, default_value = "5")]
    players: usize,

    /// Score rounds; every player submits one delta per round
    #[arg(long, default_value = "4")]
    rounds: usize,

    /// What to do when a delta would take a score below zero (reject, clamp, wrap)
    #[arg(long, default_value = "reject")]
    policy: ScoreUnderflowPolicy,

    /// Window length in minutes
    #[arg(long, default_value = "60")]
    window_minutes: i64,

    /// Delay before the node starts serving, in milliseconds
    #[arg(long, default_value = "300")]
    start_delay_ms: u64,

    /// Connection attempts before giving up
    #[arg(long, default_value = "5")]
    max_attempts: u32,

    /// Wait between connection attempts, in milliseconds
    #[arg(long, default_value = "200")]
    retry_delay_ms: u64,

    /// Number of entries printed at the end
    #[arg(long, default_value = "3")]
    top: usize,

    /// Random seed for score deltas (random if not provided)
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> DemoResult<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let result = run(args);
    if let Err(e) = &result {
        tracing::error!(error = %e, "demo failed");
    }
    result
}

fn run(args: Args) -> DemoResult<()> {
    if args.players == 0 {
        return Err("at least one player is required".into());
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let local = tokio::task::LocalSet::new();
    local.block_on(&runtime, run_demo(args))
}

async fn run_demo(args: Args) -> DemoResult<()> {
    let game_config = GameConfig::builder()
        .underflow_policy(args.policy)
        .build();
    let node_config = NodeConfig::builder()
        .name("demo")
        .state_store(Rc::new(InMemoryStateStore::new()))
        .build();
    let node = Rc::new(
        game::register_actors(ActorNode::builder(node_config), game_config.clone()).build()?,
    );

    let starter = node.clone();
    let start_delay = Duration::from_millis(args.start_delay_ms);
    tokio::task::spawn_local(async move {
        tokio::time::sleep(start_delay).await;
        if let Err(e) = starter.start() {
            tracing::error!(error = %e, "node failed to start");
        }
    });

    let retry = RetryConfig::new(args.max_attempts, Duration::from_millis(args.retry_delay_ms));
    let connector = LocalConnector::new(node.clone());

    let host_identity = game_config.host_identity().to_string();
    let window_length = chrono::Duration::try_minutes(args.window_minutes)
        .ok_or("window length out of range")?;
    let leaderboard_id = with_session(&connector, &retry, |client| async move {
        let host: GameHostRef = client.actor_ref(host_identity);
        let id = host
            .open_leaderboard(chrono::Utc::now(), window_length)
            .await?;
        Ok::<_, DemoError>(id)
    })
    .await?;
    tracing::info!(leaderboard_id = %leaderboard_id, policy = %args.policy, "window open");

    let mut gateway = PlayerGateway::new(
        connector,
        retry,
        game_config,
        Rc::new(TracingNotifier),
    );
    let names: Vec<String> = (1..=args.players).map(|i| format!("player-{i}")).collect();
    for name in &names {
        gateway.join_game(name).await?;
    }

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    for round in 1..=args.rounds {
        for name in &names {
            let delta: i64 = rng.gen_range(-20..=50);
            match gateway.add_score(name, delta).await {
                Ok(score) => tracing::debug!(round, player_name = %name, delta, score, "score applied"),
                Err(e) => tracing::warn!(round, player_name = %name, delta, error = %e, "score rejected"),
            }
        }
    }

    println!("Top {} of window {}:", args.top, leaderboard_id);
    for (rank, entry) in gateway.top(args.top).await?.iter().enumerate() {
        println!("  {:>2}. {:<12} {}", rank + 1, entry.player_name, entry.score);
    }

    if let Some(first) = names.first() {
        let rank = gateway.current_rank(first).await?;
        let neighbours = gateway.neighbours(first).await?;
        println!(
            "{first} is in position {}, {} above and {} below",
            rank + 1,
            neighbours.above.len(),
            neighbours.below.len()
        );
    }

    gateway.close();
    node.shutdown().await?;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Game(#[from] GameError),
}
