// src/config.rs
use clap::{Parser, ValueEnum};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8888;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_ROOT: &str = "docs";
pub const DEFAULT_INTERVAL_MS: u64 = 500;
pub const DEFAULT_EXTENSIONS: &[&str] = &["html", "css", "js", "json", "md"];
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &["node_modules", "__pycache__"];

/// How the injected client learns that it should reload.
#[derive(ValueEnum, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReloadMode {
    /// Poll a boolean flag that is cleared once it has been reported.
    #[default]
    Flag,
    /// Poll the latest modification watermark and compare on the client.
    Watermark,
    /// Subscribe to a server-sent event stream.
    Events,
}

/// Command-line arguments for the application.
#[derive(Parser, Debug, Default)]
#[clap(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Port to listen on
    #[clap(help = "Port to listen on (default 8888)")]
    pub port: Option<u16>,

    /// Documentation directory to serve and watch
    #[clap(short, long, value_parser, help = "Documentation directory to serve and watch")]
    pub root: Option<PathBuf>,

    /// Interface to bind (e.g., "127.0.0.1")
    #[clap(long, value_parser, help = "Interface to bind (e.g., \"127.0.0.1\")")]
    pub host: Option<String>,

    /// Reload signalling mode
    #[clap(short, long, value_enum, help = "Reload signalling mode")]
    pub mode: Option<ReloadMode>,

    /// Milliseconds between directory scans
    #[clap(long, value_parser, help = "Milliseconds between directory scans")]
    pub interval_ms: Option<u64>,

    /// Open the served page in the default browser
    #[clap(short, long, help = "Open the served page in the default browser")]
    pub open: bool,

    /// Do not terminate whatever process already holds the port
    #[clap(long, help = "Do not terminate whatever process already holds the port")]
    pub no_reclaim: bool,

    /// Path to a configuration file (e.g., livedocs.toml)
    #[clap(
        short,
        long,
        value_parser,
        help = "Path to a configuration file (e.g., livedocs.toml)"
    )]
    pub config: Option<PathBuf>,

    /// Log level (e.g., trace, debug, info, warn, error)
    #[clap(
        long,
        value_parser,
        help = "Log level (e.g., trace, debug, info, warn, error)"
    )]
    pub log_level: Option<String>,
}

/// Configuration loaded from file, environment, or defaults.
#[derive(Deserialize, Serialize, Debug, Default, Clone)]
pub struct FileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<ReloadMode>,
    /// Milliseconds between directory scans.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u64>,
    /// Milliseconds between client polls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,
    /// File extensions that count as changes; `*` matches everything.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Vec<String>>,
    /// Directory names skipped during scans, in addition to hidden entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reclaim_port: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_browser: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl FileConfig {
    /// Lowest-precedence values.
    pub fn defaults(log_level: String) -> Self {
        FileConfig {
            root: Some(PathBuf::from(DEFAULT_ROOT)),
            host: Some(DEFAULT_HOST.to_string()),
            port: Some(DEFAULT_PORT),
            mode: Some(ReloadMode::default()),
            interval_ms: Some(DEFAULT_INTERVAL_MS),
            poll_interval_ms: Some(DEFAULT_INTERVAL_MS),
            extensions: Some(DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect()),
            exclude: Some(DEFAULT_EXCLUDED_DIRS.iter().map(|s| s.to_string()).collect()),
            reclaim_port: Some(true),
            open_browser: Some(false),
            log_level: Some(log_level),
        }
    }
}

/// Final application configuration after merging all sources.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory served over HTTP and watched for changes
    pub root: PathBuf,
    /// Interface to bind
    pub host: String,
    /// Port to bind
    pub port: u16,
    /// Reload signalling mode used by the injected client
    pub mode: ReloadMode,
    /// Delay between directory scans
    pub scan_interval: Duration,
    /// Delay between client polls
    pub poll_interval: Duration,
    /// Watched file extensions, lowercase and without a leading dot
    pub extensions: Vec<String>,
    /// Excluded directory names
    pub exclude: Vec<String>,
    /// Whether to terminate a previous holder of the port before binding
    pub reclaim_port: bool,
    /// Whether to open a browser once the server is up
    pub open_browser: bool,
    /// Log level
    pub log_level: String,
}

impl AppConfig {
    /// Loads the application configuration by merging CLI, file, environment, and defaults.
    pub fn load() -> Result<Self, figment::Error> {
        Self::from_args(CliArgs::parse())
    }

    /// Merges already-parsed CLI arguments over file, environment, and defaults.
    pub fn from_args(cli_args: CliArgs) -> Result<Self, figment::Error> {
        let config_file_path = cli_args
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from("livedocs.toml"));

        let default_log_level =
            std::env::var("LIVEDOCS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let fig = Figment::new()
            .merge(Serialized::defaults(FileConfig::defaults(
                default_log_level.clone(),
            )))
            .merge(Toml::file(config_file_path).nested())
            .merge(Env::prefixed("LIVEDOCS_").map(|key| key.as_str().replace("__", ".").into()));

        let mut merged: FileConfig = fig.select("livedocs").extract()?;

        // CLI always wins for values that were given explicitly.
        if let Some(port) = cli_args.port {
            merged.port = Some(port);
        }
        if let Some(root) = cli_args.root {
            merged.root = Some(root);
        }
        if let Some(host) = cli_args.host {
            merged.host = Some(host);
        }
        if let Some(mode) = cli_args.mode {
            merged.mode = Some(mode);
        }
        if let Some(interval_ms) = cli_args.interval_ms {
            merged.interval_ms = Some(interval_ms);
        }
        if let Some(log_level) = cli_args.log_level {
            merged.log_level = Some(log_level);
        }
        // Flags only ever switch behavior away from the merged value.
        let reclaim_port = !cli_args.no_reclaim && merged.reclaim_port.unwrap_or(true);
        let open_browser = cli_args.open || merged.open_browser.unwrap_or(false);

        Ok(AppConfig {
            root: merged.root.unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT)),
            host: merged.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: merged.port.unwrap_or(DEFAULT_PORT),
            mode: merged.mode.unwrap_or_default(),
            scan_interval: Duration::from_millis(
                merged.interval_ms.unwrap_or(DEFAULT_INTERVAL_MS).max(1),
            ),
            poll_interval: Duration::from_millis(
                merged.poll_interval_ms.unwrap_or(DEFAULT_INTERVAL_MS).max(1),
            ),
            extensions: normalize_extensions(merged.extensions.unwrap_or_default()),
            exclude: merged.exclude.unwrap_or_default(),
            reclaim_port,
            open_browser,
            log_level: merged.log_level.unwrap_or(default_log_level),
        })
    }

    /// Address string handed to the listener, e.g. `0.0.0.0:8888`.
    pub fn listen_addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Lowercases extensions and strips any leading dot, so `.HTML` and `html` agree.
fn normalize_extensions(extensions: Vec<String>) -> Vec<String> {
    extensions
        .into_iter()
        .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}
