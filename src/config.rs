//! Configuration management.
//!
//! Settings come from (in increasing precedence) built-in defaults, an
//! optional TOML config file, the `DATABASE_URL` environment variable, and
//! the `--target` CLI override.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::repository::{DbPool, Repositories};

/// Default database filename inside the data directory.
pub const DEFAULT_DATABASE_FILENAME: &str = "sumika.db";

/// Runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Database filename inside `data_dir`.
    pub database_filename: String,
    /// Database URL (overrides data_dir/database_filename if set).
    /// Supports sqlite: URLs. Set via DATABASE_URL env var or config.
    pub database_url: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        // Falls back gracefully: Documents dir -> Home dir -> Current dir
        let data_dir = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sumika");

        Self {
            data_dir,
            database_filename: DEFAULT_DATABASE_FILENAME.to_string(),
            database_url: None,
        }
    }
}

impl Settings {
    /// Load settings, applying config file, environment, and CLI overrides.
    pub fn load(config_path: Option<&Path>, target: Option<&Path>) -> Self {
        let mut settings = match config_path {
            Some(path) => Self::from_file(path).unwrap_or_default(),
            None => Self::default(),
        };

        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.is_empty() {
                settings.database_url = Some(url);
            }
        }

        if let Some(target) = target {
            if target.extension().is_some_and(|ext| ext == "db") {
                settings.database_url = Some(format!("sqlite:{}", target.display()));
                if let Some(parent) = target.parent() {
                    settings.data_dir = parent.to_path_buf();
                }
            } else {
                settings.data_dir = target.to_path_buf();
                settings.database_url = None;
            }
        }

        debug!(database_url = %settings.database_url(), "settings loaded");
        settings
    }

    /// Parse settings from a TOML file.
    pub fn from_file(path: &Path) -> Option<Self> {
        let content = fs::read_to_string(path).ok()?;
        toml::from_str(&content).ok()
    }

    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            ..Default::default()
        }
    }

    /// Get the database URL, constructing from path if not explicitly set.
    pub fn database_url(&self) -> String {
        if let Some(ref url) = self.database_url {
            url.clone()
        } else {
            let path = self.data_dir.join(&self.database_filename);
            format!("sqlite:{}", path.display())
        }
    }

    /// Ensure the data directory exists.
    pub fn ensure_data_dir(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.data_dir)
    }

    /// Create a connection pool for the configured database.
    pub fn pool(&self) -> DbPool {
        DbPool::from_url(&self.database_url())
    }

    /// Create bundled repositories for all database operations.
    pub fn repositories(&self) -> Repositories {
        Repositories::new(self.pool())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_url_from_parts() {
        let settings = Settings::with_data_dir(PathBuf::from("/data"));
        assert_eq!(settings.database_url(), "sqlite:/data/sumika.db");
    }

    #[test]
    fn test_explicit_url_wins() {
        let mut settings = Settings::with_data_dir(PathBuf::from("/data"));
        settings.database_url = Some("sqlite:/elsewhere/other.db".to_string());
        assert_eq!(settings.database_url(), "sqlite:/elsewhere/other.db");
    }

    #[test]
    fn test_target_db_file_override() {
        let settings = Settings::load(None, Some(Path::new("/tmp/custom.db")));
        assert_eq!(settings.database_url(), "sqlite:/tmp/custom.db");
    }
}
