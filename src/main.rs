use anyhow::Result;
use boardd::{auth, config::DaemonConfig, storage::Storage, AppContext};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "boardd",
    about = "boardd — collaborative kanban board daemon",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// JSON-RPC WebSocket server port (REST listens on port + 1)
    #[arg(long, env = "BOARDD_PORT")]
    port: Option<u16>,

    /// Data directory for config, auth token, and SQLite database
    #[arg(long, env = "BOARDD_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "BOARDD_LOG")]
    log: Option<String>,

    /// Bind address for both servers (default: 127.0.0.1; use 0.0.0.0 for LAN access)
    #[arg(long, env = "BOARDD_BIND")]
    bind_address: Option<String>,

    /// Write logs to this file path (rotated daily). Optional.
    #[arg(long, env = "BOARDD_LOG_FILE")]
    log_file: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the daemon server (default when no subcommand given).
    ///
    /// Examples:
    ///   boardd serve
    ///   boardd
    Serve,
    /// Print the local WebSocket auth token.
    ///
    /// Clients must send this token in a `board.auth` call before any other
    /// RPC method. The token lives at {data_dir}/auth_token (mode 0600).
    Token,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            run_server(
                args.port,
                args.data_dir,
                args.log,
                args.bind_address,
                args.log_file,
            )
            .await
        }
        Command::Token => {
            let config = DaemonConfig::new(None, args.data_dir, None, None);
            let token = auth::get_or_create_token(&config.data_dir)?;
            println!("{token}");
            Ok(())
        }
    }
}

async fn run_server(
    port: Option<u16>,
    data_dir: Option<std::path::PathBuf>,
    log: Option<String>,
    bind_address: Option<String>,
    log_file: Option<std::path::PathBuf>,
) -> Result<()> {
    let config = Arc::new(DaemonConfig::new(port, data_dir, log, bind_address));

    let _log_guard = setup_logging(&config.log, log_file.as_deref(), &config.log_format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %config.data_dir.display(),
        "starting boardd"
    );

    let storage = Arc::new(Storage::new(&config.data_dir).await?);

    let auth_token = match auth::get_or_create_token(&config.data_dir) {
        Ok(t) => t,
        Err(e) => {
            warn!(err = %e, "could not create auth token — WebSocket auth disabled");
            String::new()
        }
    };

    let ctx = Arc::new(AppContext::new(config, storage, auth_token));

    // REST bridge runs beside the WebSocket server; its failure should not
    // take the board down.
    let rest_ctx = ctx.clone();
    tokio::spawn(async move {
        if let Err(e) = boardd::rest::start_rest_server(rest_ctx).await {
            warn!(err = %e, "REST server stopped");
        }
    });

    boardd::ipc::run(ctx).await
}

/// Initialise tracing with optional daily-rolling file output.
///
/// Returns a `WorkerGuard` that must stay alive for the process lifetime.
///
/// `log_format` may be `"pretty"` (default, human-readable compact format) or
/// `"json"` (structured JSON for log aggregators).
///
/// If the log directory cannot be created, falls back to stdout-only logging
/// with a warning — never panics.
fn setup_logging(
    log_level: &str,
    log_file: Option<&std::path::Path>,
    log_format: &str,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let use_json = log_format == "json";

    if let Some(path) = log_file {
        let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let filename = path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("boardd.log"));

        // Ensure the directory exists before tracing-appender tries to open it.
        if let Err(e) = std::fs::create_dir_all(dir) {
            // Fall back to stdout-only — don't panic on a bad log path.
            eprintln!(
                "warn: could not create log directory '{}': {e} — falling back to stdout",
                dir.display()
            );
            if use_json {
                tracing_subscriber::fmt().json().with_env_filter(log_level).init();
            } else {
                tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
            }
            return None;
        }

        let appender = tracing_appender::rolling::daily(dir, filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        if use_json {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().json())
                .with(fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().compact())
                .with(fmt::layer().with_writer(non_blocking))
                .init();
        }

        Some(guard)
    } else if use_json {
        tracing_subscriber::fmt().json().with_env_filter(log_level).init();
        None
    } else {
        tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
        None
    }
}
