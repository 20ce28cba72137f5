//! Configuration: a TOML file, then environment overrides.
//!
//! ```toml
//! [services]
//! analyzer_url = "http://localhost:8001"
//! tester = "local"
//!
//! [job]
//! max_iterations = 5
//! accuracy_threshold = 0.95
//!
//! [sandbox]
//! pair_timeout_ms = 5000
//!
//! [logging]
//! json = false
//! level = "info"
//! ```
//!
//! Every section and field is optional.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{warn, Level};

use crate::collaborator::{
    Collaborators, HttpAnalyzer, HttpGenerator, HttpTester, LocalTester, ServiceClient, Tester,
};
use crate::domain::JobOptions;
use crate::sandbox::{SandboxEngine, SandboxPolicy};
use crate::telemetry::parse_level;

/// Errors raised while loading or checking configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Where candidates are scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TesterMode {
    /// In-process sandbox engine.
    #[default]
    Local,
    /// A tester service at `tester_url`.
    Remote,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    pub analyzer_url: String,
    pub generator_url: String,
    pub tester_url: String,
    pub timeout_secs: u64,
    pub tester: TesterMode,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            analyzer_url: "http://localhost:8001".to_string(),
            generator_url: "http://localhost:8002".to_string(),
            tester_url: "http://localhost:8003".to_string(),
            timeout_secs: 300,
            tester: TesterMode::Local,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    pub max_operations: u64,
    pub max_call_depth: usize,
    pub max_value_len: usize,
    pub pair_timeout_ms: u64,
    pub max_parallel_pairs: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        let policy = SandboxPolicy::default();
        Self {
            max_operations: policy.limits.max_operations,
            max_call_depth: policy.limits.max_call_depth,
            max_value_len: policy.limits.max_value_len,
            pair_timeout_ms: policy.pair_timeout_ms,
            max_parallel_pairs: policy.max_parallel_pairs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub json: bool,
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json: false,
            level: "info".to_string(),
        }
    }
}

/// Complete xmlforge configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    pub services: ServicesConfig,
    pub job: JobOptions,
    pub sandbox: SandboxConfig,
    pub logging: LoggingConfig,
}

impl ForgeConfig {
    /// Read a TOML file. Missing keys take their defaults.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Defaults, or the file at `path` when given, with the process
    /// environment applied on top and the result validated.
    pub fn resolve(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Override fields from the process environment.
    pub fn apply_env(&mut self) -> ConfigResult<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Override fields from `lookup`, which maps variable names to values.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<()> {
        if let Some(url) = lookup("ANALYZER_URL") {
            self.services.analyzer_url = url;
        }
        if let Some(url) = lookup("GENERATOR_URL") {
            self.services.generator_url = url;
        }
        if let Some(url) = lookup("TESTER_URL") {
            self.services.tester_url = url;
        }
        if let Some(mode) = lookup("XMLFORGE_TESTER") {
            self.services.tester = match mode.trim().to_ascii_lowercase().as_str() {
                "local" => TesterMode::Local,
                "remote" => TesterMode::Remote,
                _ => return Err(invalid("XMLFORGE_TESTER", &mode)),
            };
        }
        if let Some(value) = lookup("XMLFORGE_MAX_ITERATIONS") {
            self.job.max_iterations = value
                .trim()
                .parse()
                .map_err(|_| invalid("XMLFORGE_MAX_ITERATIONS", &value))?;
        }
        if let Some(value) = lookup("XMLFORGE_ACCURACY_THRESHOLD") {
            self.job.accuracy_threshold = value
                .trim()
                .parse()
                .map_err(|_| invalid("XMLFORGE_ACCURACY_THRESHOLD", &value))?;
        }
        if let Some(format) = lookup("XMLFORGE_LOG_FORMAT") {
            self.logging.json = format.trim().eq_ignore_ascii_case("json");
        }
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.job
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.sandbox_policy()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.services.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "services.timeout_secs must be greater than 0".to_string(),
            ));
        }
        for (key, url) in [
            ("services.analyzer_url", &self.services.analyzer_url),
            ("services.generator_url", &self.services.generator_url),
            ("services.tester_url", &self.services.tester_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(invalid(key, url));
            }
        }
        Ok(())
    }

    pub fn job_options(&self) -> JobOptions {
        self.job
    }

    pub fn sandbox_policy(&self) -> SandboxPolicy {
        let mut policy = SandboxPolicy {
            pair_timeout_ms: self.sandbox.pair_timeout_ms,
            max_parallel_pairs: self.sandbox.max_parallel_pairs,
            ..SandboxPolicy::default()
        };
        policy.limits.max_operations = self.sandbox.max_operations;
        policy.limits.max_call_depth = self.sandbox.max_call_depth;
        policy.limits.max_value_len = self.sandbox.max_value_len;
        policy
    }

    /// Configured log level; an unknown name means INFO.
    pub fn log_level(&self) -> Level {
        parse_level(&self.logging.level).unwrap_or(Level::INFO)
    }

    /// Warn about a `logging.level` that is not a level name. Call once the
    /// subscriber is installed so the warning is not lost.
    pub fn warn_unknown_log_level(&self) {
        if parse_level(&self.logging.level).is_none() {
            warn!(configured = %self.logging.level, "unknown log level, using info");
        }
    }

    /// HTTP analyzer and generator, plus the configured tester.
    pub fn collaborators(&self) -> ConfigResult<Collaborators> {
        let client = ServiceClient::new(Duration::from_secs(self.services.timeout_secs))?;
        let tester: Arc<dyn Tester> = match self.services.tester {
            TesterMode::Local => Arc::new(LocalTester::new(SandboxEngine::new(self.sandbox_policy()))),
            TesterMode::Remote => Arc::new(HttpTester::new(client.clone(), &self.services.tester_url)),
        };
        Ok(Collaborators::new(
            Arc::new(HttpAnalyzer::new(client.clone(), &self.services.analyzer_url)),
            Arc::new(HttpGenerator::new(client, &self.services.generator_url)),
            tester,
        ))
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}
