use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::error;

const DEFAULT_PORT: u16 = 4400;
const DEFAULT_ACTIVITY_RETENTION: i64 = 20;

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

// ─── TOML config file ─────────────────────────────────────────────────────────

/// `{data_dir}/config.toml` — all fields are optional overrides.
/// Priority: CLI / env var  >  TOML  >  built-in default.
#[derive(Deserialize, Default)]
struct TomlConfig {
    /// WebSocket server port; REST listens on port + 1 (default: 4400).
    port: Option<u16>,
    /// Log level filter string, e.g. "debug", "info,boardd=trace" (default: "info").
    log: Option<String>,
    /// Log output format: "pretty" (default, human-readable) | "json" (structured for log aggregators).
    log_format: Option<String>,
    /// Bind address for both servers (default: "127.0.0.1"; use "0.0.0.0" for LAN access).
    bind_address: Option<String>,
    /// Bearer token for the REST API. None = REST auth disabled.
    api_token: Option<String>,
    /// Maximum retained activity ledger entries (default: 20).
    activity_retention: Option<i64>,
}

fn load_toml(data_dir: &Path) -> Option<TomlConfig> {
    let path = data_dir.join("config.toml");
    let contents = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse config.toml — using defaults");
            None
        }
    }
}

// ─── DaemonConfig ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    pub log: String,
    /// Log output format: "pretty" (default) | "json".
    pub log_format: String,
    /// Bind address for the WebSocket and REST servers (BOARDD_BIND env var).
    pub bind_address: String,
    /// Bearer token required to call the REST API (BOARDD_API_TOKEN env var).
    /// None = REST authentication disabled (local-only, trusted loopback use).
    pub api_token: Option<String>,
    /// How many activity ledger entries to retain (oldest trimmed first).
    pub activity_retention: i64,
}

impl DaemonConfig {
    /// Build config from CLI/env args + optional TOML file.
    ///
    /// Priority (highest to lowest):
    ///   1. CLI / env — passed as `Some(value)` from clap
    ///   2. TOML file at `{data_dir}/config.toml`
    ///   3. Built-in defaults
    pub fn new(
        port: Option<u16>,
        data_dir: Option<PathBuf>,
        log: Option<String>,
        bind_address: Option<String>,
    ) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);

        // Load TOML as the lowest-priority override layer
        let toml = load_toml(&data_dir).unwrap_or_default();

        let port = port.or(toml.port).unwrap_or(DEFAULT_PORT);
        let log = log.or(toml.log).unwrap_or_else(|| "info".to_string());

        let log_format = std::env::var("BOARDD_LOG_FORMAT")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.log_format)
            .unwrap_or_else(|| "pretty".to_string());

        let bind_address = bind_address
            .or(std::env::var("BOARDD_BIND").ok().filter(|s| !s.is_empty()))
            .or(toml.bind_address)
            .unwrap_or_else(default_bind_address);

        let api_token = std::env::var("BOARDD_API_TOKEN")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.api_token);

        let activity_retention = toml
            .activity_retention
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_ACTIVITY_RETENTION);

        Self {
            port,
            data_dir,
            log,
            log_format,
            bind_address,
            api_token,
            activity_retention,
        }
    }

    /// Port the REST server listens on (always WebSocket port + 1).
    pub fn rest_port(&self) -> u16 {
        self.port + 1
    }
}

fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        // ~/Library/Application Support/boardd
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("boardd");
        }
    }
    #[cfg(target_os = "linux")]
    {
        // $XDG_DATA_HOME/boardd or ~/.local/share/boardd
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("boardd");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("boardd");
        }
    }
    #[cfg(target_os = "windows")]
    {
        // %APPDATA%\boardd
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("boardd");
        }
    }
    // Fallback
    PathBuf::from(".boardd")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_toml() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = DaemonConfig::new(None, Some(dir.path().to_path_buf()), None, None);
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.rest_port(), DEFAULT_PORT + 1);
        assert_eq!(cfg.log, "info");
        assert_eq!(cfg.bind_address, "127.0.0.1");
        assert_eq!(cfg.activity_retention, 20);
    }

    #[test]
    fn cli_overrides_toml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "port = 5000\nlog = \"debug\"\nactivity_retention = 50\n",
        )
        .unwrap();
        let cfg = DaemonConfig::new(
            Some(6000),
            Some(dir.path().to_path_buf()),
            None,
            Some("0.0.0.0".to_string()),
        );
        assert_eq!(cfg.port, 6000); // CLI wins
        assert_eq!(cfg.log, "debug"); // TOML fills the gap
        assert_eq!(cfg.bind_address, "0.0.0.0");
        assert_eq!(cfg.activity_retention, 50);
    }

    #[test]
    fn malformed_toml_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.toml"), "port = \"not a number").unwrap();
        let cfg = DaemonConfig::new(None, Some(dir.path().to_path_buf()), None, None);
        assert_eq!(cfg.port, DEFAULT_PORT);
    }
}
