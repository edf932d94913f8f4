use config::{Config as ConfigBuilder, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use crate::errors::{QueryError, QueryResult};
use crate::filters::{DEFAULT_RATING_MAX, DEFAULT_RATING_MIN};

/// How to handle shard bytes that are not valid UTF-8
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingMode {
    /// Fail the query with an encoding error
    FailFast,
    /// Replace invalid sequences and keep scanning
    #[default]
    Lossy,
}

/// Configuration for the shard index and query engine.
///
/// # Configuration Locations
///
/// Loaded from these locations, later ones taking precedence:
/// 1. Global `$CONFIG_DIR/puzzlescout/config.yaml`
/// 2. Local `.puzzlescout.yaml` in the current directory
/// 3. Custom config file passed via `--config`
///
/// # Configuration Format
///
/// ```yaml
/// # Directory holding the rating-sorted shard files
/// shard_dir: "lib/lichess_puzzle_db/rating_sort"
///
/// # Which files in shard_dir are shards (glob syntax)
/// shard_pattern: "*.csv"
///
/// # Worker threads for index construction and counting
/// thread_count: 4
///
/// # failfast | lossy
/// encoding_mode: lossy
///
/// # Set to false to scan every shard on every query
/// use_index: true
///
/// # Log level (trace, debug, info, warn, error)
/// log_level: "info"
/// ```
///
/// Command-line arguments take precedence over file values, see
/// [`EngineConfig::merge_with_cli`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory containing the shard files. May come from the command line
    /// instead, so a file without it still loads.
    #[serde(default)]
    pub shard_dir: PathBuf,

    /// Glob matched against shard file names
    #[serde(default = "default_shard_pattern")]
    pub shard_pattern: String,

    /// Number of threads used for index construction and parallel counting
    #[serde(default = "default_thread_count")]
    pub thread_count: NonZeroUsize,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub encoding_mode: EncodingMode,

    /// When false, every query scans every shard
    #[serde(default = "default_use_index")]
    pub use_index: bool,

    /// Lower rating bound applied when the caller gives none
    #[serde(default = "default_rating_min")]
    pub default_rating_min: i32,

    /// Upper rating bound applied when the caller gives none
    #[serde(default = "default_rating_max")]
    pub default_rating_max: i32,
}

fn default_shard_pattern() -> String {
    "*.csv".to_string()
}

fn default_thread_count() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN)
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_use_index() -> bool {
    true
}

fn default_rating_min() -> i32 {
    DEFAULT_RATING_MIN
}

fn default_rating_max() -> i32 {
    DEFAULT_RATING_MAX
}

impl EngineConfig {
    /// Config with defaults for everything but the shard directory
    pub fn new(shard_dir: impl Into<PathBuf>) -> Self {
        Self {
            shard_dir: shard_dir.into(),
            shard_pattern: default_shard_pattern(),
            thread_count: default_thread_count(),
            log_level: default_log_level(),
            encoding_mode: EncodingMode::default(),
            use_index: default_use_index(),
            default_rating_min: default_rating_min(),
            default_rating_max: default_rating_max(),
        }
    }

    /// Loads configuration from the default locations plus a specific file
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        let config_files = [
            dirs::config_dir().map(|p| p.join("puzzlescout/config.yaml")),
            Some(PathBuf::from(".puzzlescout.yaml")),
        ];

        for path in config_files.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        // An explicit path must exist
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder.build()?.try_deserialize()
    }

    /// Merges CLI arguments with configuration file values
    pub fn merge_with_cli(mut self, cli: CliOverrides) -> Self {
        if let Some(dir) = cli.shard_dir {
            self.shard_dir = dir;
        }
        if let Some(pattern) = cli.shard_pattern {
            self.shard_pattern = pattern;
        }
        if let Some(threads) = cli.thread_count {
            self.thread_count = threads;
        }
        if let Some(level) = cli.log_level {
            self.log_level = level;
        }
        if let Some(mode) = cli.encoding_mode {
            self.encoding_mode = mode;
        }
        if cli.no_index {
            self.use_index = false;
        }
        self
    }

    /// Checks the merged configuration before an engine is built from it
    pub fn validate(&self) -> QueryResult<()> {
        if self.shard_dir.as_os_str().is_empty() {
            return Err(QueryError::config_error(
                "no shard directory configured (set shard_dir or pass --dir)",
            ));
        }
        Ok(())
    }

    /// Installs a global tracing subscriber. `RUST_LOG` wins over `log_level`.
    pub fn init_tracing(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.log_level.as_str()));
        // A subscriber may already be installed by an embedding process
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }
}

/// Values supplied on the command line; `None` leaves the file value alone
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub shard_dir: Option<PathBuf>,
    pub shard_pattern: Option<String>,
    pub thread_count: Option<NonZeroUsize>,
    pub log_level: Option<String>,
    pub encoding_mode: Option<EncodingMode>,
    pub no_index: bool,
}
