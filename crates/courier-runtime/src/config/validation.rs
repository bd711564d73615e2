//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{CourierConfig, DispatcherConfig, LogOutput, LoggingConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &CourierConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_dispatcher_config(&config.dispatcher)?;
    validate_store_seed(config)?;
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    if let Some(module) = logging.filters.keys().find(|m| m.trim().is_empty()) {
        return Err(ConfigError::validation(format!(
            "Log filter target cannot be blank: {module:?}"
        )));
    }

    Ok(())
}

fn validate_dispatcher_config(dispatcher: &DispatcherConfig) -> ConfigResult<()> {
    let prefix = &dispatcher.fallback_prefix;
    if prefix.is_empty() {
        return Err(ConfigError::missing_field("dispatcher.fallback_prefix"));
    }
    if prefix.chars().any(char::is_whitespace) {
        return Err(ConfigError::validation(
            "Fallback prefix cannot contain whitespace",
        ));
    }

    if dispatcher.ingress_capacity == 0 {
        return Err(ConfigError::validation(
            "Ingress capacity must be greater than 0",
        ));
    }

    Ok(())
}

/// Every seeded namespace must be a table of keys.
fn validate_store_seed(config: &CourierConfig) -> ConfigResult<()> {
    match config.store.iter().find(|(_, keys)| !keys.is_object()) {
        Some((namespace, _)) => Err(ConfigError::validation(format!(
            "Store namespace {namespace:?} must be a table"
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&CourierConfig::default()).is_ok());
    }

    #[test]
    fn test_file_output_requires_path() {
        let mut config = CourierConfig::default();
        config.logging.output = LogOutput::File;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { .. })
        ));

        config.logging.file_path = Some("courier.log".into());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_invalid_fallback_prefix() {
        let mut config = CourierConfig::default();
        config.dispatcher.fallback_prefix = String::new();
        assert!(validate_config(&config).is_err());

        config.dispatcher.fallback_prefix = "! ".to_string();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_zero_ingress_capacity() {
        let mut config = CourierConfig::default();
        config.dispatcher.ingress_capacity = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_store_namespaces_must_be_tables() {
        let mut config = CourierConfig::default();
        config.store.insert("courier.main".into(), json!({ "grep": true }));
        assert!(validate_config(&config).is_ok());

        config.store.insert("broken".into(), json!(5));
        assert!(validate_config(&config).is_err());
    }
}
