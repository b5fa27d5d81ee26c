use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;
pub const DEFAULT_MAX_STEPS: u32 = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Server root, without trailing slash
    pub base_url: String,

    /// Path segment inserted after `/seguimientos` when fetching stored images
    pub image_endpoint: String,

    /// Largest image accepted into the staging list
    pub max_image_bytes: u64,

    /// Number of follow-up steps per family
    pub max_steps: u32,

    pub request_timeout_secs: u64,

    /// How long a removed image card keeps fading before it leaves the grid
    pub remove_animation_ms: u64,

    /// Where exported PDFs are written. Falls back to the download dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_dir: Option<PathBuf>,

    pub open_exported_pdf: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            image_endpoint: "/image".to_string(),
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            max_steps: DEFAULT_MAX_STEPS,
            request_timeout_secs: 30,
            remove_animation_ms: 300,
            export_dir: None,
            open_exported_pdf: true,
        }
    }
}

impl AppConfig {
    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?
            .join("seguimiento");

        if let Err(e) = std::fs::create_dir_all(&config_dir) {
            tracing::warn!("Could not create config directory: {}", e);
        }

        Ok(config_dir.join("config.toml"))
    }

    /// Load config from the given file (or the default location), creating
    /// it with defaults when missing
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Ok(p) => p,
                Err(_) => return Ok(AppConfig::default()),
            },
        };

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config: AppConfig = toml::from_str(&content)?;
            tracing::info!("Loaded config from {}", path.display());
            return Ok(config.normalized());
        }

        let config = AppConfig::default();
        if let Err(e) = config.save(&path) {
            tracing::warn!("Failed to write default config: {}", e);
        }
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn normalized(mut self) -> Self {
        self.base_url = self.base_url.trim_end_matches('/').to_string();
        if !self.image_endpoint.is_empty() && !self.image_endpoint.starts_with('/') {
            self.image_endpoint.insert(0, '/');
        }
        if self.max_steps == 0 {
            self.max_steps = DEFAULT_MAX_STEPS;
        }
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self.normalized()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn remove_animation(&self) -> Duration {
        Duration::from_millis(self.remove_animation_ms)
    }

    pub fn resolved_export_dir(&self) -> PathBuf {
        self.export_dir
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
