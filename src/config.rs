use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Name of the optional config file looked up in the working directory.
pub const CONFIG_FILE: &str = "filetrigger.toml";

/// Configuration loaded from `filetrigger.toml`. Command-line flags take precedence.
#[derive(Debug, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TriggerConfig {
    /// Quiet period after a change before the command runs, in milliseconds.
    pub debounce_ms: Option<u64>,
    /// Capacity of the raw event queue.
    pub queue_depth: Option<usize>,
    /// Watch subdirectories of a directory target.
    pub recursive: Option<bool>,
}

impl TriggerConfig {
    /// Load `filetrigger.toml` from the given directory.
    ///
    /// Returns a default (empty) configuration if the file does not exist or cannot be parsed.
    pub fn load(dir: &Path) -> Self {
        let config_path = dir.join(CONFIG_FILE);
        if !config_path.exists() {
            return Self::default();
        }
        Self::load_file(&config_path)
    }

    /// Load an explicit config file, falling back to defaults with a warning.
    pub fn load_file(config_path: &Path) -> Self {
        match std::fs::read_to_string(config_path) {
            Ok(contents) => match toml::from_str::<Self>(&contents) {
                Ok(config) => config,
                Err(err) => {
                    tracing::warn!(
                        path = %config_path.display(),
                        "failed to parse config: {err}. Using defaults."
                    );
                    Self::default()
                }
            },
            Err(err) => {
                tracing::warn!(
                    path = %config_path.display(),
                    "failed to read config: {err}. Using defaults."
                );
                Self::default()
            }
        }
    }

    pub fn debounce(&self) -> Option<Duration> {
        self.debounce_ms.map(Duration::from_millis)
    }
}
