use serde::Deserialize;

/// Main configuration structure for Archive-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub archive: ArchiveConfig,
    pub links: LinksConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Entry point of the listing hierarchy
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveConfig {
    /// URL of the first listing (archive) page
    pub url: String,

    /// Template for listing pages after the first one.
    ///
    /// `{archive}` is replaced by the archive URL (without trailing slash)
    /// and `{page}` by the 1-based page number.
    #[serde(rename = "page-url-template", default = "default_page_url_template")]
    pub page_url_template: String,
}

/// CSS selectors describing where child links live
#[derive(Debug, Clone, Deserialize)]
pub struct LinksConfig {
    /// Selects container links on a listing page
    #[serde(rename = "container-selector")]
    pub container_selector: String,

    /// Selects leaf links on a container page
    #[serde(rename = "leaf-selector")]
    pub leaf_selector: String,
}

/// Listing page count discovery policy
#[derive(Debug, Clone, Deserialize)]
pub struct PaginationConfig {
    /// Regex with three capture groups: start, end, total
    #[serde(rename = "summary-pattern", default = "default_summary_pattern")]
    pub summary_pattern: String,

    /// Regex matched against link text to detect a "next page" control
    #[serde(rename = "next-control-pattern", default = "default_next_pattern")]
    pub next_control_pattern: String,

    /// Page count assumed when only a next-page control is found
    #[serde(rename = "fallback-page-count", default = "default_fallback_pages")]
    pub fallback_page_count: u32,

    /// Upper bound on listing pages, whatever the summary claims
    #[serde(rename = "max-page-count", default = "default_max_pages")]
    pub max_page_count: u32,
}

/// Network and concurrency policy
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// Concurrent fetches allowed within one phase
    #[serde(rename = "max-workers-per-phase", default = "default_workers")]
    pub max_workers_per_phase: u32,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Pause before every attempt, and the backoff unit between retries (milliseconds)
    #[serde(rename = "unit-delay-ms", default = "default_unit_delay_ms")]
    pub unit_delay_ms: u64,

    /// Total attempts per URL, including the first
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Delimiter-separated records file
    #[serde(rename = "records-path", default = "default_records_path")]
    pub records_path: String,

    /// Delimiter-separated diagnostics file
    #[serde(rename = "diagnostics-path", default = "default_diagnostics_path")]
    pub diagnostics_path: String,

    /// Spreadsheet copy of records and diagnostics; empty disables it
    #[serde(rename = "spreadsheet-path", default = "default_spreadsheet_path")]
    pub spreadsheet_path: String,

    /// Single ASCII field delimiter
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// Text written for fields the extractor could not find
    #[serde(rename = "missing-value", default)]
    pub missing_value: String,
}

fn default_page_url_template() -> String {
    "{archive}/{page}".to_string()
}

fn default_summary_pattern() -> String {
    r"(\d+)\s*-\s*(\d+)\s+of\s+(\d+)".to_string()
}

fn default_next_pattern() -> String {
    r"(?i)\b(next|próximo|seguinte)\b".to_string()
}

fn default_fallback_pages() -> u32 {
    4
}

fn default_max_pages() -> u32 {
    500
}

fn default_workers() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_unit_delay_ms() -> u64 {
    1000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_records_path() -> String {
    "output/records.csv".to_string()
}

fn default_diagnostics_path() -> String {
    "output/diagnostics.csv".to_string()
}

fn default_spreadsheet_path() -> String {
    "output/records.xlsx".to_string()
}

fn default_delimiter() -> String {
    "|".to_string()
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            summary_pattern: default_summary_pattern(),
            next_control_pattern: default_next_pattern(),
            fallback_page_count: default_fallback_pages(),
            max_page_count: default_max_pages(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            max_workers_per_phase: default_workers(),
            request_timeout_secs: default_timeout_secs(),
            unit_delay_ms: default_unit_delay_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            records_path: default_records_path(),
            diagnostics_path: default_diagnostics_path(),
            spreadsheet_path: default_spreadsheet_path(),
            delimiter: default_delimiter(),
            missing_value: String::new(),
        }
    }
}
