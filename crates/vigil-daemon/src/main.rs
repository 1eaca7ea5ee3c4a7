// crates/vigil-daemon/src/main.rs
//
// Binary entrypoint for the Vigil daemon.
//
// Initializes tracing, parses CLI arguments, loads configuration, opens the
// report store, builds the engine, and drives it from a JSON-lines command
// stream: a replay file against a manual clock, or live stdin against the
// system clock.

use std::path::Path;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::BufReader;

use vigil_core::{Clock, ManualClock, ReportLog, StateStore, SystemClock};
use vigil_daemon::{require_empty_log, DaemonConfig, Replayer, StoreBackend, VigilEngine};
use vigil_store::{InMemoryReportLog, RocksReportLog};

/// Vigil daemon: uptime consensus and reputation-weighted rewards.
#[derive(Parser, Debug)]
#[command(name = "vigil-daemon", version = "0.1.0", about = "Vigil uptime consensus daemon")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "~/.vigil/config.toml")]
    config: String,

    /// Skip malformed command lines instead of aborting.
    #[arg(long)]
    lenient: bool,

    #[command(subcommand)]
    command: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Replay a JSON-lines command file against a manual clock.
    Replay {
        /// Command file, one JSON command per line.
        path: String,

        /// Initial clock value in Unix seconds.
        #[arg(long, default_value_t = 0)]
        start: u64,
    },
    /// Read commands from stdin against the system clock until EOF or Ctrl-C.
    Run,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration from TOML file, falling back to defaults if the file
    // does not exist.
    let config_path = expand_tilde(&args.config);
    let (daemon_config, loaded) = if Path::new(&config_path).exists() {
        (DaemonConfig::load(&config_path)?, true)
    } else {
        (DaemonConfig::default(), false)
    };

    // RUST_LOG wins over the configured level. Logs go to stderr so stdout
    // carries only events.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&daemon_config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if loaded {
        tracing::info!("Loaded configuration from {}", config_path);
    } else {
        tracing::warn!("No config at {}. Using defaults.", config_path);
    }
    tracing::info!(
        "Engine: min_reports={} threshold={}% window={}s base_reward={} multiplier={}% min_reputation={}",
        daemon_config.engine.min_reports_for_consensus,
        daemon_config.engine.consensus_threshold,
        daemon_config.engine.consensus_time_window,
        daemon_config.engine.base_reward,
        daemon_config.engine.reputation_multiplier,
        daemon_config.engine.min_reputation_for_rewards
    );

    let (log, state) = open_store(&daemon_config)?;
    if matches!(args.command, Mode::Replay { .. }) {
        // Replay is only deterministic from an empty log.
        require_empty_log(log.as_ref())?;
    }

    let manual = match &args.command {
        Mode::Replay { start, .. } => Some(Arc::new(ManualClock::new(*start))),
        Mode::Run => None,
    };
    let clock: Arc<dyn Clock> = match &manual {
        Some(manual) => manual.clone() as Arc<dyn Clock>,
        None => Arc::new(SystemClock),
    };

    let mut engine = VigilEngine::new(log, daemon_config.engine.clone(), clock)?
        .with_event_buffer(daemon_config.event_buffer)
        .with_payout_resolver(Arc::new(daemon_config.payout_resolver()))
        .with_settle_on_consensus(daemon_config.settle_on_consensus);
    if let Some(state) = state {
        engine = engine.with_state_store(state)?;
    }
    let engine = Arc::new(engine);
    let mut replayer = Replayer::new(engine.clone(), manual);
    let strict = !args.lenient;
    let mut stdout = tokio::io::stdout();

    match args.command {
        Mode::Replay { path, .. } => {
            tracing::info!("Replaying {}", path);
            let file = tokio::fs::File::open(&path).await?;
            replayer.run(BufReader::new(file), &mut stdout, strict).await?;
        }
        Mode::Run => {
            tracing::info!("Reading commands from stdin");
            let stdin = BufReader::new(tokio::io::stdin());
            tokio::select! {
                result = replayer.run(stdin, &mut stdout, strict) => result?,
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received Ctrl+C, shutting down");
                }
            }
        }
    }

    tracing::info!(
        "Done: {} commands applied, {} rejected",
        replayer.applied(),
        replayer.rejected()
    );
    println!("{}", serde_json::to_string_pretty(&engine.summary()?)?);
    Ok(())
}

type Stores = (Arc<dyn ReportLog>, Option<Arc<dyn StateStore>>);

/// Open the configured report store, and the state store sharing it.
fn open_store(config: &DaemonConfig) -> Result<Stores, Box<dyn std::error::Error>> {
    match config.store {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory report log");
            let log: Arc<dyn ReportLog> = Arc::new(InMemoryReportLog::new());
            Ok((log, None))
        }
        StoreBackend::Rocksdb => {
            let data_dir = expand_tilde(&config.data_dir);
            std::fs::create_dir_all(&data_dir)?;
            let path = format!("{}/reports", data_dir);
            let store = Arc::new(RocksReportLog::open(&path)?);
            tracing::info!("Opened RocksDB store at {} ({} reports)", path, store.len()?);
            let log: Arc<dyn ReportLog> = store.clone();
            let state: Arc<dyn StateStore> = store;
            Ok((log, Some(state)))
        }
    }
}

/// Expand a leading `~/` to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return format!("{}/{}", home.display(), rest);
        }
    }
    path.to_string()
}
