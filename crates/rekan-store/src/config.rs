//! Store configuration and factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use rekan_core::model::{SessionKind, ASSESSMENT_BUDGET_SECS, SURVEY_BUDGET_SECS};
use rekan_core::traits::Stores;

use crate::file::FileStore;
use crate::memory::InMemoryStore;
use crate::rest::{RestStore, DEFAULT_TIMEOUT_SECS};

/// Which backend holds questions, results and licenses.
///
/// Note: Custom Debug impl masks the API key to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    Memory,
    File {
        #[serde(default = "default_data_dir")]
        data_dir: PathBuf,
    },
    Rest {
        base_url: String,
        #[serde(default)]
        api_key: String,
        #[serde(default = "default_timeout")]
        timeout_secs: u64,
    },
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreConfig::Memory => f.write_str("Memory"),
            StoreConfig::File { data_dir } => {
                f.debug_struct("File").field("data_dir", data_dir).finish()
            }
            StoreConfig::Rest {
                base_url,
                api_key: _,
                timeout_secs,
            } => f
                .debug_struct("Rest")
                .field("base_url", base_url)
                .field("api_key", &"***")
                .field("timeout_secs", timeout_secs)
                .finish(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::File {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./rekan-data")
}
fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Session time budgets in minutes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamConfig {
    #[serde(default = "default_assessment_minutes")]
    pub assessment_minutes: u32,
    #[serde(default = "default_survey_minutes")]
    pub survey_minutes: u32,
}

fn default_assessment_minutes() -> u32 {
    ASSESSMENT_BUDGET_SECS / 60
}
fn default_survey_minutes() -> u32 {
    SURVEY_BUDGET_SECS / 60
}

impl Default for ExamConfig {
    fn default() -> Self {
        Self {
            assessment_minutes: default_assessment_minutes(),
            survey_minutes: default_survey_minutes(),
        }
    }
}

impl ExamConfig {
    pub fn budget_secs(&self, kind: SessionKind) -> u32 {
        let minutes = match kind {
            SessionKind::Assessment => self.assessment_minutes,
            SessionKind::Survey => self.survey_minutes,
        };
        minutes.saturating_mul(60)
    }
}

/// Top-level rekan configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RekanConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub exam: ExamConfig,
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

fn resolve_store_config(config: &StoreConfig) -> StoreConfig {
    match config {
        StoreConfig::Memory => StoreConfig::Memory,
        StoreConfig::File { data_dir } => StoreConfig::File {
            data_dir: PathBuf::from(resolve_env_vars(&data_dir.to_string_lossy())),
        },
        StoreConfig::Rest {
            base_url,
            api_key,
            timeout_secs,
        } => StoreConfig::Rest {
            base_url: resolve_env_vars(base_url),
            api_key: resolve_env_vars(api_key),
            timeout_secs: *timeout_secs,
        },
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `rekan.toml` in the current directory
/// 2. `~/.config/rekan/config.toml`
///
/// Environment variable override: `REKAN_API_KEY` (REST store only).
pub fn load_config() -> Result<RekanConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<RekanConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("rekan.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<RekanConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => RekanConfig::default(),
    };

    config.store = resolve_store_config(&config.store);

    if let Ok(key) = std::env::var("REKAN_API_KEY") {
        if let StoreConfig::Rest { api_key, .. } = &mut config.store {
            *api_key = key;
        }
    }

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("rekan"))
}

/// Create the store collaborators from configuration.
pub fn create_store(config: &StoreConfig) -> Result<Stores> {
    match config {
        StoreConfig::Memory => Ok(Stores::from_backend(Arc::new(InMemoryStore::new()))),
        StoreConfig::File { data_dir } => {
            let store = FileStore::open(data_dir)
                .with_context(|| format!("failed to open data dir: {}", data_dir.display()))?;
            Ok(Stores::from_backend(Arc::new(store)))
        }
        StoreConfig::Rest {
            base_url,
            api_key,
            timeout_secs,
        } => {
            if api_key.is_empty() {
                anyhow::bail!("rest store needs an api_key (or set REKAN_API_KEY)");
            }
            let store = RestStore::new(base_url, api_key, *timeout_secs)?;
            Ok(Stores::from_backend(Arc::new(store)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_REKAN_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_REKAN_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_REKAN_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        std::env::remove_var("_REKAN_TEST_VAR");
    }

    #[test]
    fn default_config() {
        let config = RekanConfig::default();
        assert!(matches!(config.store, StoreConfig::File { .. }));
        assert_eq!(config.exam.assessment_minutes, 60);
        assert_eq!(config.exam.survey_minutes, 30);
        assert_eq!(config.exam.budget_secs(SessionKind::Survey), 1800);
    }

    #[test]
    fn parse_rest_config() {
        let toml_str = r#"
[store]
type = "rest"
base_url = "https://db.example.test"
api_key = "anon"

[exam]
assessment_minutes = 90
"#;
        let config: RekanConfig = toml::from_str(toml_str).unwrap();
        match &config.store {
            StoreConfig::Rest { timeout_secs, .. } => assert_eq!(*timeout_secs, 30),
            other => panic!("unexpected store: {other:?}"),
        }
        assert_eq!(config.exam.assessment_minutes, 90);
        assert_eq!(config.exam.survey_minutes, 30);
    }

    #[test]
    fn debug_masks_api_key() {
        let config = StoreConfig::Rest {
            base_url: "https://db.example.test".into(),
            api_key: "very-secret".into(),
            timeout_secs: 5,
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("very-secret"));
    }

    #[test]
    fn load_from_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rekan.toml");
        std::fs::write(&path, "[store]\ntype = \"memory\"\n").unwrap();

        let config = load_config_from(Some(&path)).unwrap();
        assert!(matches!(config.store, StoreConfig::Memory));
        assert!(load_config_from(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn rest_store_requires_key() {
        let config = StoreConfig::Rest {
            base_url: "https://db.example.test".into(),
            api_key: String::new(),
            timeout_secs: 5,
        };
        assert!(create_store(&config).is_err());
    }

    #[test]
    fn file_store_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let stores = create_store(&StoreConfig::File {
            data_dir: dir.path().join("data"),
        })
        .unwrap();
        assert_eq!(stores.name(), "file");
        assert!(dir.path().join("data").join("banks").is_dir());
    }
}
