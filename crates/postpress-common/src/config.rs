use crate::error::PostpressError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

/// Bounded retry policy for the highlight driver.
///
/// The delay grows linearly with the attempt count. The defaults were carried
/// over from the original frontend's tuning and are policy, not contract:
/// adjust them per deployment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retry cycles after the first pass.
    pub max_attempts: u32,
    /// Base delay in milliseconds; attempt `n` waits `base + n * base`.
    pub base_delay_ms: u64,
}

impl RetryPolicy {
    /// Policy applied when content changes on an already-active view.
    pub const fn content() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
        }
    }

    /// Shorter policy for the first render after mount.
    pub const fn mount() -> Self {
        Self {
            max_attempts: 2,
            base_delay_ms: 200,
        }
    }

    /// Delay before retry cycle `attempt` (zero-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_delay_ms + u64::from(attempt) * self.base_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL the language definitions are fetched from.
    pub definition_base: String,
    /// Path template appended to the base; `{language}` is substituted with
    /// the canonical language identifier.
    pub definition_template: String,
    /// Retry policy for content-change highlight passes.
    pub content_retry: RetryPolicy,
    /// Retry policy for the mount-time highlight pass.
    pub mount_retry: RetryPolicy,
    /// Active color theme, `"light"` or `"dark"`. Kept as a string here; the
    /// renderer parses it into its own theme type.
    #[serde(default = "default_theme")]
    pub theme: String,
}

fn default_theme() -> String {
    "light".to_owned()
}

impl Config {
    /// Loads the configuration from the provided loader.
    pub async fn load(loader: &impl Loader) -> Result<Self, PostpressError> {
        loader.load().await
    }

    /// Saves the configuration using the provided saver.
    pub async fn save(&self, saver: &impl Saver) -> Result<(), PostpressError> {
        saver.save(self).await
    }

    /// URL of the syntax definition for a canonical language identifier.
    pub fn definition_url(&self, language: &str) -> String {
        let path = self.definition_template.replace("{language}", language);
        format!("{}/{}", self.definition_base.trim_end_matches('/'), path)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            definition_base: "https://cdn.postpress.dev".to_owned(),
            definition_template: "components/{language}.sublime-syntax".to_owned(),
            content_retry: RetryPolicy::content(),
            mount_retry: RetryPolicy::mount(),
            theme: default_theme(),
        }
    }
}

/// The trait for loading configuration data.
pub trait Loader {
    /// Loads the configuration data.
    fn load(&self) -> impl Future<Output = Result<Config, PostpressError>> + Send;
}

/// The trait for saving configuration data.
pub trait Saver {
    /// Saves the configuration data.
    fn save(&self, config: &Config) -> impl Future<Output = Result<(), PostpressError>> + Send;
}

/// An implementation of [`Loader`] and [`Saver`] that reads and writes a
/// configuration file. The format is picked from the file extension; `.json`
/// and `.toml` are supported.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Create a new [`FileStore`] with the given path.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl Loader for FileStore {
    async fn load(&self) -> Result<Config, PostpressError> {
        match self.path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(serde_json::from_str(&std::fs::read_to_string(&self.path)?)?),
            Some("toml") => Ok(toml::from_str(&std::fs::read_to_string(&self.path)?)?),
            other => Err(PostpressError::UnsupportedFormat(
                other.unwrap_or("none").to_owned(),
            )),
        }
    }
}

impl Saver for FileStore {
    async fn save(&self, config: &Config) -> Result<(), PostpressError> {
        match self.path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(std::fs::write(
                &self.path,
                serde_json::to_string_pretty(config)?,
            )?),
            Some("toml") => Ok(std::fs::write(&self.path, toml::to_string_pretty(config)?)?),
            other => Err(PostpressError::UnsupportedFormat(
                other.unwrap_or("none").to_owned(),
            )),
        }
    }
}
