use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Name of the optional configuration file at the workspace root.
pub const CONFIG_FILE: &str = "kustomap.toml";

/// Configuration loaded from `kustomap.toml` at the workspace root.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct KustomapConfig {
    /// Additional path patterns to exclude from discovery and watching (beyond .gitignore).
    pub exclude: Option<Vec<String>>,
    /// Filesystem cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Change-event coordination settings.
    #[serde(default)]
    pub watch: WatchConfig,
}

/// `[cache]` section.
#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// When false every existence/stat check goes straight to the filesystem.
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
        }
    }
}

fn default_cache_enabled() -> bool {
    true
}

/// `[watch]` section. The numbers are tuning knobs, not correctness invariants.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WatchConfig {
    /// Quiet period after the last event before a pending batch is processed.
    pub debounce_ms: u64,
    /// More events than this inside one window triggers a full rebuild.
    pub mass_change_threshold: usize,
    /// Width of the rolling mass-change window.
    pub mass_change_window_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            mass_change_threshold: 50,
            mass_change_window_ms: 1000,
        }
    }
}

impl WatchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn mass_change_window(&self) -> Duration {
        Duration::from_millis(self.mass_change_window_ms)
    }
}

impl KustomapConfig {
    /// Load configuration from `kustomap.toml` in the given root directory.
    ///
    /// Returns a default configuration if the file does not exist or cannot be parsed.
    pub fn load(root: &Path) -> Self {
        let config_path = root.join(CONFIG_FILE);

        if !config_path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str::<Self>(&contents) {
                Ok(config) => config,
                Err(err) => {
                    tracing::warn!("failed to parse {CONFIG_FILE}: {err}. Using defaults.");
                    Self::default()
                }
            },
            Err(err) => {
                tracing::warn!("failed to read {CONFIG_FILE}: {err}. Using defaults.");
                Self::default()
            }
        }
    }
}
