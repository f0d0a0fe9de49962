use crate::config::types::{Config, Settings, SourceDescriptor};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

const MAX_NAME_LENGTH: usize = 100;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_settings(&config.settings)?;

    let mut seen = HashSet::new();
    for source in &config.sources {
        validate_source(source)?;
        if !seen.insert(source.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate source name '{}'",
                source.name
            )));
        }
    }

    Ok(())
}

fn check_range<T>(field: &str, value: T, min: T, max: T) -> Result<(), ConfigError>
where
    T: PartialOrd + std::fmt::Display,
{
    if value < min || value > max {
        return Err(ConfigError::Validation(format!(
            "{} must be between {} and {}, got {}",
            field, min, max, value
        )));
    }
    Ok(())
}

/// Validates cycle-wide settings
fn validate_settings(settings: &Settings) -> Result<(), ConfigError> {
    check_range("max-concurrency", settings.max_concurrency, 1, 50)?;
    check_range("default-timeout-secs", settings.default_timeout_secs, 1, 3600)?;
    check_range("retry-max", settings.retry_max, 0, 10)?;
    check_range("retry-base-delay-ms", settings.retry_base_delay_ms, 0, 60_000)?;

    if settings.storage_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "storage-path cannot be empty".to_string(),
        ));
    }

    if settings.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates a single source entry
fn validate_source(source: &SourceDescriptor) -> Result<(), ConfigError> {
    validate_name(&source.name)?;
    validate_url(&source.url).map_err(|e| match e {
        ConfigError::InvalidUrl(msg) => {
            ConfigError::InvalidUrl(format!("source '{}': {}", source.name, msg))
        }
        other => other,
    })?;

    if let Some(timeout) = source.timeout_secs {
        check_range("timeout-secs", timeout, 1, 3600)?;
    }
    if let Some(max_items) = source.max_items {
        check_range("max-items", max_items, 1, 100_000)?;
    }

    Ok(())
}

fn validate_name(name: &str) -> Result<(), ConfigError> {
    if name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "source name cannot be empty".to_string(),
        ));
    }

    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(ConfigError::Validation(format!(
            "source name '{}' exceeds {} characters",
            name, MAX_NAME_LENGTH
        )));
    }

    if name.chars().any(char::is_control) {
        return Err(ConfigError::Validation(format!(
            "source name {:?} contains control characters",
            name
        )));
    }

    Ok(())
}

fn validate_url(raw: &str) -> Result<(), ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidUrl(format!("'{}': {}", raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "'{}' must use http or https",
            raw
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(ConfigError::InvalidUrl(format!("'{}' has no host", raw)));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(sources: Vec<SourceDescriptor>) -> Config {
        Config {
            settings: Settings::default(),
            sources,
        }
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("hackernews").is_ok());
        assert!(validate_name("GitHub Trending").is_ok());

        assert!(validate_name("").is_err());
        assert!(validate_name("   ").is_err());
        assert!(validate_name("bad\nname").is_err());
        assert!(validate_name(&"x".repeat(101)).is_err());
        assert!(validate_name(&"x".repeat(100)).is_ok());
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://example.com/feed.json").is_ok());
        assert!(validate_url("http://127.0.0.1:8080/x").is_ok());

        assert!(matches!(
            validate_url("ftp://example.com"),
            Err(ConfigError::InvalidUrl(_))
        ));
        assert!(validate_url("not a url").is_err());
        assert!(validate_url("file:///etc/passwd").is_err());
    }

    #[test]
    fn test_settings_ranges() {
        assert!(validate_settings(&Settings::default()).is_ok());

        let mut settings = Settings::default();
        settings.max_concurrency = 0;
        assert!(validate_settings(&settings).is_err());

        let mut settings = Settings::default();
        settings.max_concurrency = 51;
        assert!(validate_settings(&settings).is_err());

        let mut settings = Settings::default();
        settings.retry_max = 11;
        assert!(validate_settings(&settings).is_err());

        let mut settings = Settings::default();
        settings.retry_max = 0;
        settings.retry_base_delay_ms = 0;
        assert!(validate_settings(&settings).is_ok());

        let mut settings = Settings::default();
        settings.default_timeout_secs = 3601;
        assert!(validate_settings(&settings).is_err());

        let mut settings = Settings::default();
        settings.storage_path = String::new();
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_source_timeout_range() {
        let mut source = SourceDescriptor::new("s", "https://example.com", None);
        source.timeout_secs = Some(0);
        assert!(validate_source(&source).is_err());
    }

    #[test]
    fn test_source_max_items_range() {
        let mut source = SourceDescriptor::new("s", "https://example.com", None);
        source.max_items = Some(0);
        assert!(validate_source(&source).is_err());

        source.max_items = Some(30);
        assert!(validate_source(&source).is_ok());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let config = config_with(vec![
            SourceDescriptor::new("dup", "https://a.example.com", None),
            SourceDescriptor::new("dup", "https://b.example.com", None),
        ]);
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_empty_source_list_is_valid() {
        assert!(validate(&config_with(Vec::new())).is_ok());
    }
}
