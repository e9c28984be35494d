use crate::config::types::Config;
use crate::ConfigError;

/// Validates a parsed configuration
///
/// Checks that every value the pipeline depends on is usable before any
/// network or database work starts:
/// - the page URL template contains the `{id}` placeholder
/// - the ID ceiling is positive
/// - concurrency and request timeout are at least 1
/// - storage paths are non-empty
/// - an `[index]` section, if present, has a non-empty endpoint and name
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if !config.catalog.page_url_template.contains("{id}") {
        return Err(ConfigError::Validation(
            "catalog.page-url-template must contain the {id} placeholder".to_string(),
        ));
    }

    if config.catalog.id_ceiling == 0 {
        return Err(ConfigError::Validation(
            "catalog.id-ceiling must be at least 1".to_string(),
        ));
    }

    if config.harvest.concurrency == 0 {
        return Err(ConfigError::Validation(
            "harvest.concurrency must be at least 1".to_string(),
        ));
    }

    if config.harvest.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "harvest.request-timeout-secs must be at least 1".to_string(),
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "storage.database-path must not be empty".to_string(),
        ));
    }

    if config.storage.image_root.trim().is_empty() {
        return Err(ConfigError::Validation(
            "storage.image-root must not be empty".to_string(),
        ));
    }

    if let Some(index) = &config.index {
        if index.endpoint.trim().is_empty() {
            return Err(ConfigError::Validation(
                "index.endpoint must not be empty".to_string(),
            ));
        }
        if index.index_name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "index.index-name must not be empty".to_string(),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{CatalogConfig, HarvestConfig, IndexConfig, StorageConfig};

    fn valid_config() -> Config {
        Config {
            catalog: CatalogConfig {
                page_url_template: "https://example.org/post?id={id}".to_string(),
                id_ceiling: 10_000_000,
            },
            harvest: HarvestConfig {
                concurrency: 4,
                request_timeout_secs: 10,
            },
            storage: StorageConfig {
                database_path: "./harvest.db".to_string(),
                image_root: "./images".to_string(),
            },
            index: None,
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_template_without_placeholder_rejected() {
        let mut config = valid_config();
        config.catalog.page_url_template = "https://example.org/post?id=7".to_string();
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = valid_config();
        config.harvest.concurrency = 0;
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_zero_ceiling_rejected() {
        let mut config = valid_config();
        config.catalog.id_ceiling = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_empty_image_root_rejected() {
        let mut config = valid_config();
        config.storage.image_root = "  ".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_empty_index_endpoint_rejected() {
        let mut config = valid_config();
        config.index = Some(IndexConfig {
            endpoint: String::new(),
            index_name: "pictures".to_string(),
        });
        assert!(validate(&config).is_err());
    }
}
