//! Configuration validation.

use crate::schema::{Config, StoreBackend};

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_cache(config, &mut result);
        Self::validate_query(config, &mut result);
        Self::validate_store(config, &mut result);
        Self::validate_runner(config, &mut result);

        result
    }

    fn validate_cache(config: &Config, result: &mut ValidationResult) {
        if config.cache.max_entries == 0 {
            result.add_error(ValidationError::new(
                "cache.max_entries",
                "max_entries must be greater than 0",
            ));
        }

        if config.cache.ttl_secs == 0 {
            result.add_error(ValidationError::new(
                "cache.ttl_secs",
                "ttl_secs must be greater than 0",
            ));
        }

        if config.cache.ttl_secs > 24 * 60 * 60 {
            result.add_warning(ValidationWarning::new(
                "cache.ttl_secs",
                "ttl_secs is longer than a day, side-channel store changes will stay invisible that long",
            ));
        }
    }

    fn validate_query(config: &Config, result: &mut ValidationResult) {
        let query = &config.query;
        if query.default_page_size == 0 {
            result.add_error(ValidationError::new(
                "query.default_page_size",
                "default_page_size must be greater than 0",
            ));
        }

        if query.max_page_size == 0 {
            result.add_error(ValidationError::new(
                "query.max_page_size",
                "max_page_size must be greater than 0",
            ));
        }

        if query.default_page_size > query.max_page_size {
            result.add_error(ValidationError::new(
                "query.default_page_size",
                format!(
                    "default_page_size ({}) exceeds max_page_size ({})",
                    query.default_page_size, query.max_page_size
                ),
            ));
        }

        if query.load_concurrency == 0 {
            result.add_error(ValidationError::new(
                "query.load_concurrency",
                "load_concurrency must be greater than 0",
            ));
        }
    }

    fn validate_store(config: &Config, result: &mut ValidationResult) {
        if config.store.backend == StoreBackend::File && config.store.path.is_none() {
            result.add_warning(ValidationWarning::new(
                "store.path",
                "File store path not set, will use default location",
            ));
        }
    }

    fn validate_runner(config: &Config, result: &mut ValidationResult) {
        if config.runner.enabled && config.runner.check_interval_ms == 0 {
            result.add_error(ValidationError::new(
                "runner.check_interval_ms",
                "check_interval_ms must be greater than 0",
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
