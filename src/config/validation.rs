use crate::config::types::{
    ArchiveConfig, Config, LinksConfig, NetworkConfig, OutputConfig, PaginationConfig,
    UserAgentConfig,
};
use crate::ConfigError;
use regex::Regex;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
///
/// Runs before any network activity; a failure here is one of the two
/// conditions that abort a harvest.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_archive_config(&config.archive)?;
    validate_links_config(&config.links)?;
    validate_pagination_config(&config.pagination)?;
    validate_network_config(&config.network)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the archive entry point and page template
fn validate_archive_config(config: &ArchiveConfig) -> Result<(), ConfigError> {
    if config.url.trim().is_empty() {
        return Err(ConfigError::Validation(
            "archive url cannot be empty".to_string(),
        ));
    }

    let url = Url::parse(&config.url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid archive url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "archive url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if !config.page_url_template.contains("{page}") {
        return Err(ConfigError::Validation(format!(
            "page-url-template must contain '{{page}}', got '{}'",
            config.page_url_template
        )));
    }

    Ok(())
}

/// Validates that both link selectors are parseable CSS
fn validate_links_config(config: &LinksConfig) -> Result<(), ConfigError> {
    validate_selector("container-selector", &config.container_selector)?;
    validate_selector("leaf-selector", &config.leaf_selector)?;
    Ok(())
}

fn validate_selector(name: &str, selector: &str) -> Result<(), ConfigError> {
    if selector.trim().is_empty() {
        return Err(ConfigError::InvalidSelector(format!(
            "{} cannot be empty",
            name
        )));
    }

    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidSelector(format!("{} '{}': {:?}", name, selector, e)))
}

/// Validates the pagination patterns and fallback policy
fn validate_pagination_config(config: &PaginationConfig) -> Result<(), ConfigError> {
    let summary = Regex::new(&config.summary_pattern).map_err(|e| {
        ConfigError::InvalidPattern(format!("summary-pattern: {}", e))
    })?;

    // captures_len() counts the implicit whole-match group
    if summary.captures_len() < 4 {
        return Err(ConfigError::InvalidPattern(format!(
            "summary-pattern needs capture groups for start, end and total, got '{}'",
            config.summary_pattern
        )));
    }

    Regex::new(&config.next_control_pattern).map_err(|e| {
        ConfigError::InvalidPattern(format!("next-control-pattern: {}", e))
    })?;

    if config.fallback_page_count < 1 {
        return Err(ConfigError::Validation(
            "fallback-page-count must be >= 1".to_string(),
        ));
    }

    if config.max_page_count < config.fallback_page_count {
        return Err(ConfigError::Validation(format!(
            "max-page-count ({}) must be >= fallback-page-count ({})",
            config.max_page_count, config.fallback_page_count
        )));
    }

    Ok(())
}

/// Validates concurrency, timeout and retry limits
fn validate_network_config(config: &NetworkConfig) -> Result<(), ConfigError> {
    if config.max_workers_per_phase < 1 || config.max_workers_per_phase > 64 {
        return Err(ConfigError::Validation(format!(
            "max-workers-per-phase must be between 1 and 64, got {}",
            config.max_workers_per_phase
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "request-timeout-secs must be >= 1, got {}",
            config.request_timeout_secs
        )));
    }

    if config.max_attempts < 1 || config.max_attempts > 10 {
        return Err(ConfigError::Validation(format!(
            "max-attempts must be between 1 and 10, got {}",
            config.max_attempts
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler-name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.records_path.is_empty() {
        return Err(ConfigError::Validation(
            "records-path cannot be empty".to_string(),
        ));
    }

    if config.diagnostics_path.is_empty() {
        return Err(ConfigError::Validation(
            "diagnostics-path cannot be empty".to_string(),
        ));
    }

    if !config.spreadsheet_path.is_empty() && !config.spreadsheet_path.ends_with(".xlsx") {
        return Err(ConfigError::Validation(format!(
            "spreadsheet-path must end in .xlsx, got '{}'",
            config.spreadsheet_path
        )));
    }

    if config.delimiter.len() != 1 || !config.delimiter.is_ascii() {
        return Err(ConfigError::Validation(format!(
            "delimiter must be a single ASCII character, got '{}'",
            config.delimiter
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact-email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
