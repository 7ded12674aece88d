//! Configuration loader.

use std::fs;
use std::path::Path;

use regex::Regex;

use crate::error::ConfigError;
use crate::schema::Config;

/// Configuration loader with environment variable substitution.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = fs::read_to_string(path)?;
        Self::load_str(&content)
    }

    /// Load configuration from a string.
    pub fn load_str(content: &str) -> Result<Config, ConfigError> {
        let expanded = Self::expand_env_vars(content)?;
        let mut config: Config = toml::from_str(&expanded)?;
        if let Some(path) = config.store.path.take() {
            let path = path.to_string_lossy();
            config.store.path = Some(Self::expand_path(&path).into());
        }
        Ok(config)
    }

    /// Expand environment variables in the format `${VAR}`.
    fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ConfigError::InvalidValue {
            field: "env".to_string(),
            message: e.to_string(),
        })?;

        let mut result = content.to_string();
        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let var_value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotSet(var_name.to_string()))?;
            result = result.replace(&cap[0], &var_value);
        }

        Ok(result)
    }

    /// Expand shell-style paths (e.g., `~/.dscheduler`).
    pub fn expand_path(path: &str) -> String {
        shellexpand::tilde(path).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{PagingMode, StoreBackend};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_empty_config() {
        let config = ConfigLoader::load_str("").unwrap();
        assert_eq!(config.cache.max_entries, 2000);
        assert_eq!(config.store.backend, StoreBackend::File);
    }

    #[test]
    fn test_load_full_config() {
        let content = r#"
            [cache]
            max_entries = 50
            ttl_secs = 120

            [query]
            default_page_size = 25
            paging = "load_all"

            [store]
            backend = "memory"

            [runner]
            enabled = false
        "#;
        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(config.cache.max_entries, 50);
        assert_eq!(config.cache.ttl_secs, 120);
        assert_eq!(config.query.default_page_size, 25);
        assert_eq!(config.query.paging, PagingMode::LoadAll);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert!(!config.runner.enabled);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[cache]").unwrap();
        writeln!(file, "ttl_secs = 5").unwrap();

        let config = ConfigLoader::load(file.path()).unwrap();
        assert_eq!(config.cache.ttl_secs, 5);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = ConfigLoader::load(Path::new("/nonexistent/path/dscheduler.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_invalid_toml() {
        let result = ConfigLoader::load_str("invalid = [unclosed");
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_expand_env_vars() {
        // SAFETY: unique test-only variable
        unsafe {
            std::env::set_var("DSCHEDULER_TEST_STORE_DIR", "/tmp/dscheduler-store");
        }
        let content = "[store]\npath = \"${DSCHEDULER_TEST_STORE_DIR}\"";
        let config = ConfigLoader::load_str(content).unwrap();
        assert_eq!(
            config.store.path.unwrap().to_string_lossy(),
            "/tmp/dscheduler-store"
        );
        unsafe {
            std::env::remove_var("DSCHEDULER_TEST_STORE_DIR");
        }
    }

    #[test]
    fn test_expand_env_vars_not_set() {
        let content = "value = \"${DSCHEDULER_NONEXISTENT_VAR_12345}\"";
        let result = ConfigLoader::expand_env_vars(content);
        assert!(matches!(result, Err(ConfigError::EnvVarNotSet(_))));
    }

    #[test]
    fn test_expand_env_vars_no_vars() {
        let content = "value = \"no variables here\"";
        let expanded = ConfigLoader::expand_env_vars(content).unwrap();
        assert_eq!(expanded, content);
    }

    #[test]
    fn test_store_path_tilde_expanded() {
        let config = ConfigLoader::load_str("[store]\npath = \"~/jobs\"").unwrap();
        let path = config.store.path.unwrap();
        assert!(!path.to_string_lossy().starts_with('~'));
        assert!(path.ends_with("jobs"));
    }

    #[test]
    fn test_expand_path_no_tilde() {
        let path = "/usr/local/var";
        assert_eq!(ConfigLoader::expand_path(path), path);
    }
}
