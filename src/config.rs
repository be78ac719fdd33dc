use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use tracing::debug;

use crate::domain::entities::record::ResourceKind;

pub const CONFIG_ENV: &str = "STAFFDESK_CONFIG";

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("com", "hellhbbd", "staffdesk")
        .ok_or_else(|| anyhow!("unable to resolve application directories"))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub db_path: Option<PathBuf>,
    pub search_debounce_ms: u64,
    /// Rows requested per list call; large enough to hold a whole listing.
    pub fetch_batch_size: i64,
    pub employee_page_size: usize,
    pub task_page_size: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            db_path: None,
            search_debounce_ms: 500,
            fetch_batch_size: 1000,
            employee_page_size: 5,
            task_page_size: 10,
        }
    }
}

impl AppConfig {
    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn page_size_for(&self, kind: ResourceKind) -> usize {
        match kind {
            ResourceKind::Employees => self.employee_page_size,
            _ => self.task_page_size,
        }
    }

    pub fn resolve_db_path(&self) -> Result<PathBuf> {
        match &self.db_path {
            Some(path) => Ok(path.clone()),
            None => default_db_path(),
        }
    }
}

pub fn default_db_path() -> Result<PathBuf> {
    Ok(project_dirs()?.data_local_dir().join("staffdesk.sqlite"))
}

/// `$STAFFDESK_CONFIG`, else `config.yaml` in the platform config directory.
pub fn config_path() -> Result<PathBuf> {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) => Ok(PathBuf::from(path)),
        None => Ok(project_dirs()?.config_dir().join("config.yaml")),
    }
}

/// A missing file yields the defaults; a malformed one is an error.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        debug!("no config at {}, using defaults", path.display());
        return Ok(AppConfig::default());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    if contents.trim().is_empty() {
        return Ok(AppConfig::default());
    }
    let config: AppConfig = serde_yaml::from_str(&contents)
        .with_context(|| format!("failed to parse config: {}", path.display()))?;
    if config.fetch_batch_size <= 0 {
        anyhow::bail!("fetch_batch_size must be greater than zero")
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::unique_test_dir;
    use std::fs;

    #[test]
    fn missing_config_uses_defaults() {
        let temp_dir = unique_test_dir("config-missing");

        let config = load_config(&temp_dir.join("config.yaml")).expect("defaults should load");

        assert_eq!(config, AppConfig::default());
        assert_eq!(config.search_debounce(), Duration::from_millis(500));
    }

    #[test]
    fn partial_config_overrides_selected_keys() {
        let temp_dir = unique_test_dir("config-partial");
        fs::create_dir_all(&temp_dir).expect("should create temp dir");
        let path = temp_dir.join("config.yaml");
        fs::write(&path, "employee_page_size: 25\ndb_path: /tmp/staff.sqlite\n")
            .expect("should write config");

        let config = load_config(&path).expect("config should parse");

        assert_eq!(config.page_size_for(ResourceKind::Employees), 25);
        assert_eq!(config.page_size_for(ResourceKind::Tasks), 10);
        assert_eq!(
            config.resolve_db_path().expect("db path should resolve"),
            PathBuf::from("/tmp/staff.sqlite")
        );

        fs::remove_dir_all(&temp_dir).expect("should cleanup temp dir");
    }

    #[test]
    fn unknown_keys_and_bad_batch_size_are_rejected() {
        let temp_dir = unique_test_dir("config-invalid");
        fs::create_dir_all(&temp_dir).expect("should create temp dir");
        let path = temp_dir.join("config.yaml");

        fs::write(&path, "page_sise: 3\n").expect("should write config");
        let err = load_config(&path).expect_err("typo should be rejected");
        assert!(format!("{err:#}").contains("failed to parse config"));

        fs::write(&path, "fetch_batch_size: 0\n").expect("should write config");
        let err = load_config(&path).expect_err("zero batch should be rejected");
        assert!(err.to_string().contains("fetch_batch_size"));

        fs::remove_dir_all(&temp_dir).expect("should cleanup temp dir");
    }

    #[test]
    fn default_db_path_uses_staffdesk_file() {
        let db_path = default_db_path().expect("default db path should resolve");

        assert_eq!(
            db_path.file_name().and_then(|name| name.to_str()),
            Some("staffdesk.sqlite")
        );
    }
}
