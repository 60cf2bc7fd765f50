use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_BATCH_SIZE: usize = 200;
pub const DEFAULT_EXIFTOOL_TIMEOUT_SECS: u64 = 120;

/// What to do when a planned destination already holds different content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Leave the existing file alone and do not copy the incoming one.
    #[default]
    Skip,
    /// Copy next to the existing file with a `_(n)` suffix.
    Rename,
    /// Copy into `<dest>/conflicts/`, disambiguated the same way.
    Conflicts,
}

impl fmt::Display for CollisionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CollisionPolicy::Skip => "skip",
            CollisionPolicy::Rename => "rename",
            CollisionPolicy::Conflicts => "conflicts",
        };
        f.write_str(name)
    }
}

impl FromStr for CollisionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(CollisionPolicy::Skip),
            "rename" => Ok(CollisionPolicy::Rename),
            "conflicts" => Ok(CollisionPolicy::Conflicts),
            other => Err(format!(
                "unknown collision policy '{}' (expected skip, rename or conflicts)",
                other
            )),
        }
    }
}

/// How a failed classifier batch affects the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierErrorPolicy {
    #[default]
    Abort,
    SkipBatch,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub collision_policy: CollisionPolicy,
    #[serde(default)]
    pub top_folder: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
    #[serde(default)]
    pub exiftool_path: Option<PathBuf>,
    #[serde(default = "default_exiftool_timeout_secs")]
    pub exiftool_timeout_secs: u64,
    #[serde(default)]
    pub classifier_error_policy: ClassifierErrorPolicy,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_exiftool_timeout_secs() -> u64 {
    DEFAULT_EXIFTOOL_TIMEOUT_SECS
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            collision_policy: CollisionPolicy::default(),
            top_folder: None,
            batch_size: DEFAULT_BATCH_SIZE,
            ignore_patterns: Vec::new(),
            exiftool_path: None,
            exiftool_timeout_secs: DEFAULT_EXIFTOOL_TIMEOUT_SECS,
            classifier_error_policy: ClassifierErrorPolicy::default(),
        }
    }
}

/// Reads `Config.toml` (optional) and `TROLLSORT_*` environment variables.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(
            Environment::with_prefix("TROLLSORT")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("ignore_patterns"),
        )
        .build()?;
    let mut config = builder.try_deserialize::<AppConfig>()?;
    if config.batch_size == 0 {
        config.batch_size = DEFAULT_BATCH_SIZE;
    }
    Ok(config)
}
