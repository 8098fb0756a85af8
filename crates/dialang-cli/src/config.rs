//! dialang configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use dialang_core::EngineConfig;

/// Top-level dialang configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialangConfig {
    /// Directory holding the reference catalog tables.
    #[serde(default = "default_catalog_dir")]
    pub catalog_dir: PathBuf,
    /// JSON-lines file for capture events. Capture is off when unset.
    #[serde(default)]
    pub capture_file: Option<PathBuf>,
    /// Post-test redirect for sessions whose script has none.
    #[serde(default)]
    pub test_complete_url: Option<String>,
    /// Recorded on each session as its expiry time.
    #[serde(default = "default_session_lifetime")]
    pub session_lifetime_hours: u32,
}

fn default_catalog_dir() -> PathBuf {
    PathBuf::from("./catalog")
}
fn default_session_lifetime() -> u32 {
    24
}

impl Default for DialangConfig {
    fn default() -> Self {
        Self {
            catalog_dir: default_catalog_dir(),
            capture_file: None,
            test_complete_url: None,
            session_lifetime_hours: default_session_lifetime(),
        }
    }
}

impl DialangConfig {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            test_complete_url: self.test_complete_url.clone(),
            session_lifetime_hours: Some(self.session_lifetime_hours),
        }
    }
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

fn resolve_path(path: &Path) -> PathBuf {
    PathBuf::from(resolve_env_vars(&path.to_string_lossy()))
}

/// Load config from an explicit path, or search the default locations.
///
/// Search order:
/// 1. `dialang.toml` in the current directory
/// 2. `~/.config/dialang/config.toml`
///
/// Environment variable overrides: `DIALANG_CATALOG_DIR`, `DIALANG_CAPTURE_FILE`.
pub fn load_config_from(path: Option<&Path>) -> Result<DialangConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("dialang.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match &config_path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            let config = toml::from_str::<DialangConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?;
            tracing::debug!("loaded config from {}", path.display());
            config
        }
        None => DialangConfig::default(),
    };

    if let Ok(dir) = std::env::var("DIALANG_CATALOG_DIR") {
        config.catalog_dir = PathBuf::from(dir);
    }
    if let Ok(file) = std::env::var("DIALANG_CAPTURE_FILE") {
        config.capture_file = Some(PathBuf::from(file));
    }

    config.catalog_dir = resolve_path(&config.catalog_dir);
    config.capture_file = config.capture_file.as_deref().map(resolve_path);
    config.test_complete_url = config.test_complete_url.as_deref().map(resolve_env_vars);

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("dialang"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_DIALANG_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_DIALANG_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_DIALANG_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        assert_eq!(resolve_env_vars("no vars"), "no vars");
        std::env::remove_var("_DIALANG_TEST_VAR");
    }

    #[test]
    fn default_config() {
        let config = DialangConfig::default();
        assert_eq!(config.catalog_dir, PathBuf::from("./catalog"));
        assert_eq!(config.session_lifetime_hours, 24);
        assert!(config.capture_file.is_none());
    }

    #[test]
    fn parse_config() {
        let toml_str = r#"
catalog_dir = "/srv/dialang/catalog"
capture_file = "/var/log/dialang/capture.jsonl"
test_complete_url = "https://example.org/done"
"#;
        let config: DialangConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.catalog_dir, PathBuf::from("/srv/dialang/catalog"));
        assert_eq!(config.session_lifetime_hours, 24);

        let engine = config.engine_config();
        assert_eq!(
            engine.test_complete_url.as_deref(),
            Some("https://example.org/done")
        );
        assert_eq!(engine.session_lifetime_hours, Some(24));
    }

    #[test]
    fn explicit_path_must_exist() {
        let err = load_config_from(Some(Path::new("/nonexistent/dialang.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn loads_explicit_file_and_resolves_vars() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dialang.toml");
        std::env::set_var("_DIALANG_TEST_HOST", "tests.example.org");
        std::fs::write(
            &path,
            "session_lifetime_hours = 2\ntest_complete_url = \"https://${_DIALANG_TEST_HOST}/done\"\n",
        )
        .unwrap();

        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.session_lifetime_hours, 2);
        assert_eq!(
            config.test_complete_url.as_deref(),
            Some("https://tests.example.org/done")
        );
        std::env::remove_var("_DIALANG_TEST_HOST");
    }
}
