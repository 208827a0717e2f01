use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub store: StoreSection,
}

/// The paginated catalog endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    pub url: String,
    pub app_key: Option<String>,
    /// `distinguish` (default) or `any-failure-ends`.
    pub status_policy: String,
    pub request_timeout_secs: Option<u64>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            app_key: None,
            status_policy: "distinguish".into(),
            request_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineSection {
    pub fetch_workers: usize,
    pub detect_workers: usize,
    pub queue_capacity: usize,
    /// `discover` (default) or `probe`.
    pub pagination: String,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            fetch_workers: 5,
            detect_workers: 200,
            queue_capacity: 100,
            pagination: "discover".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreSection {
    pub path: Option<PathBuf>,
    pub catalog: String,
    /// `opaque` (default) or `object-id`.
    pub key_format: String,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: None,
            catalog: "fashion".into(),
            key_format: "opaque".into(),
        }
    }
}

fn default_url() -> String {
    "https://webapi.intelligencenode.com/breuninger".into()
}

/// Config file path: `~/.config/catalog-diff/config.toml`
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("catalog-diff").join("config.toml"))
}

/// Load config from `explicit` or the default location, falling back to
/// defaults if missing or unparseable. `CATALOG_APP_KEY` overrides
/// `api.app_key`.
pub fn load_config(explicit: Option<&Path>) -> AppConfig {
    let path = explicit.map(Path::to_path_buf).or_else(config_path);
    let mut config = path.as_deref().map(read_config).unwrap_or_default();

    if let Ok(key) = std::env::var("CATALOG_APP_KEY")
        && !key.is_empty()
    {
        config.api.app_key = Some(key);
    }
    config
}

fn read_config(path: &Path) -> AppConfig {
    let Ok(contents) = std::fs::read_to_string(path) else {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return AppConfig::default();
    };

    match toml::from_str::<AppConfig>(&contents) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to parse config, using defaults"
            );
            AppConfig::default()
        }
    }
}
