use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Upload size limit is not 0
/// - Upload field name is not empty
/// - Upload and output directories differ
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    // Upload validation
    if config.upload.max_bytes == 0 {
        return Err(ConfigError::ValidationError(
            "upload.max_bytes cannot be 0".to_string(),
        ));
    }

    if config.upload.field_name.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "upload.field_name cannot be empty".to_string(),
        ));
    }

    // Storage validation
    if config.storage.upload_dir == config.storage.output_dir {
        return Err(ConfigError::ValidationError(format!(
            "storage.upload_dir and storage.output_dir must differ (both {})",
            config.storage.upload_dir.display()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = Config::default();
        config.server.port = 0;
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_zero_max_bytes_fails() {
        let mut config = Config::default();
        config.upload.max_bytes = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_empty_field_name_fails() {
        let mut config = Config::default();
        config.upload.field_name = "  ".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_same_directories_fails() {
        let mut config = Config::default();
        config.storage.upload_dir = PathBuf::from("/srv/media");
        config.storage.output_dir = PathBuf::from("/srv/media");
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("/srv/media"));
    }
}
