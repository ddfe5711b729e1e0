use std::env;
use std::fs;
use tempfile::tempdir;

#[cfg(test)]
mod config_tests {
    use super::*;
    use ri_coverage::config::Config;

    #[test]
    fn test_default_config_values() {
        let config = Config::default();

        assert_eq!(config.logging.level, "WARN");
        assert_eq!(config.logging.format, "pretty");
        assert_eq!(config.logging.output, "console");

        assert!(config.output.json_pretty);
        assert_eq!(config.output.value_precision, 2);

        assert_eq!(config.billing.product_name, "Amazon Elastic Compute Cloud");
        assert_eq!(config.billing.usage_type_markers.len(), 2);
    }

    #[test]
    fn test_env_variable_override() {
        env::set_var("RI_COVERAGE_PRODUCT_NAME", "Amazon EC2");
        env::set_var("RI_COVERAGE_VALUE_PRECISION", "4");

        let mut config = Config::default();
        config
            .apply_env_overrides()
            .expect("Failed to apply env overrides");

        assert_eq!(config.billing.product_name, "Amazon EC2");
        assert_eq!(config.output.value_precision, 4);

        env::set_var("RI_COVERAGE_VALUE_PRECISION", "four");
        assert!(Config::default().apply_env_overrides().is_err());

        env::remove_var("RI_COVERAGE_PRODUCT_NAME");
        env::remove_var("RI_COVERAGE_VALUE_PRECISION");
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.output.value_precision = 12;
        assert!(config.validate().is_err());

        config = Config::default();
        config.logging.output = "syslog".to_string();
        assert!(config.validate().is_err());

        config = Config::default();
        config.billing.product_name = " ".to_string();
        assert!(config.validate().is_err());

        config = Config::default();
        config
            .tables
            .normalization_factors
            .insert("metal".to_string(), f64::NAN);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_file_loading() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("ri-coverage.toml");

        let test_config = r#"
[logging]
level = "DEBUG"
format = "json"

[billing]
usage_type_markers = ["BoxUsage", "HeavyUsage", "DedicatedUsage"]

[tables.operation_platforms]
"RunInstances:0800" = "Windows BYOL"

[tables.normalization_factors]
"metal" = 192.0
"#;
        fs::write(&config_path, test_config).expect("Failed to write config");

        let config = Config::load_from_file(&config_path).expect("Failed to load config");

        assert_eq!(config.source.as_deref(), Some(config_path.as_path()));
        assert_eq!(config.logging.level, "DEBUG");
        assert_eq!(config.logging.format, "json");
        // Sections and keys left out keep their defaults
        assert_eq!(config.logging.output, "console");
        assert_eq!(config.billing.product_name, "Amazon Elastic Compute Cloud");
        assert_eq!(config.billing.usage_type_markers.len(), 3);

        let tables = config.lookup_tables();
        assert_eq!(tables.platform_for_operation("RunInstances:0800"), Some("Windows BYOL"));
        assert_eq!(tables.normalization_factor("metal"), Some(192.0));
        assert_eq!(tables.platform_for_operation("RunInstances"), Some("Linux/UNIX"));
    }

    #[test]
    fn test_config_roundtrip_through_file() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("saved.toml");

        let mut config = Config::default();
        config
            .tables
            .normalization_factors
            .insert("56xlarge".to_string(), 448.0);
        config.save_to_file(&config_path).expect("Failed to save config");

        let loaded = Config::load_from_file(&config_path).expect("Failed to load config");
        assert_eq!(loaded.tables.normalization_factors.get("56xlarge"), Some(&448.0));
        assert_eq!(loaded.output.value_precision, config.output.value_precision);
    }

    #[test]
    fn test_invalid_config_file() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("invalid.toml");

        fs::write(&config_path, "[logging\nlevel = ").expect("Failed to write config");

        let result = Config::load_from_file(&config_path);
        assert!(result.is_err());
    }
}
