//! HTTP fetcher implementation
//!
//! This module is the only place the harvester touches the network:
//! - Building the shared HTTP client with a descriptive user agent
//! - Pacing every attempt with a fixed unit delay
//! - Classifying responses into success, not-found and transient failures
//! - Retrying transient failures with linear backoff

use crate::config::{NetworkConfig, UserAgentConfig};
use crate::state::{PageKind, TaskState};
use reqwest::{redirect::Policy, Client, StatusCode};
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// One logical fetch of one URL
///
/// Retries are further attempts of the same task: `attempt` counts them and
/// `state` follows the [`TaskState`] machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTask {
    pub url: String,
    pub kind: PageKind,
    pub attempt: u32,
    pub state: TaskState,
}

impl FetchTask {
    pub fn new(url: impl Into<String>, kind: PageKind) -> Self {
        Self {
            url: url.into(),
            kind,
            attempt: 0,
            state: TaskState::Pending,
        }
    }

    fn transition(&mut self, next: TaskState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal task transition {} -> {} for {}",
            self.state,
            next,
            self.url
        );
        tracing::trace!("{} {}: {} -> {}", self.kind, self.url, self.state, next);
        self.state = next;
    }

    fn begin_attempt(&mut self) {
        self.attempt += 1;
        self.transition(TaskState::InFlight);
    }
}

/// Why an attempt did not succeed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchCause {
    /// The server answered with a status other than 2xx or 404
    Status(u16),

    /// No response within the request timeout
    Timeout,

    /// Could not connect
    Connect(String),

    /// Response headers arrived but the body could not be read
    Body(String),

    /// Any other client-side failure
    Request(String),

    /// The run was cancelled before the next attempt
    Cancelled,
}

impl fmt::Display for FetchCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(code) => write!(f, "HTTP {}", code),
            Self::Timeout => write!(f, "request timeout"),
            Self::Connect(e) => write!(f, "connection failed: {}", e),
            Self::Body(e) => write!(f, "failed to read body: {}", e),
            Self::Request(e) => write!(f, "request failed: {}", e),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Outcome of one attempt, or of a whole task once terminal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    /// The page body and its HTTP status
    Success { body: String, http_status: u16 },

    /// HTTP 404; never retried
    NotFound,

    /// May succeed on another attempt
    TransientError(FetchCause),

    /// Retries exhausted (wrapping the last cause) or cancelled
    FatalError(FetchCause),
}

impl FetchStatus {
    /// Returns true if this status ends the task
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::TransientError(_))
    }
}

/// Result of a fetch task, immutable once produced
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub task: FetchTask,
    pub status: FetchStatus,
}

/// Timeout, pacing and retry settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Fixed per-request timeout
    pub timeout: Duration,

    /// Pause before every attempt; also the backoff step
    pub unit_delay: Duration,

    /// Total attempts, including the first
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// Backoff after a failed attempt
    ///
    /// `(max_attempts - remaining_attempts) * unit_delay`, i.e. one unit after
    /// the first failure, two after the second, and so on.
    pub fn backoff(&self, remaining_attempts: u32) -> Duration {
        let completed = self.max_attempts.saturating_sub(remaining_attempts);
        self.unit_delay * completed
    }
}

impl From<&NetworkConfig> for RetryPolicy {
    fn from(config: &NetworkConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.request_timeout_secs),
            unit_delay: Duration::from_millis(config.unit_delay_ms),
            max_attempts: config.max_attempts.max(1),
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// The client is shared read-only by every worker; the per-request timeout
/// is applied by [`RequestExecutor`].
///
/// # Example
///
/// ```no_run
/// use archive_harvest::config::UserAgentConfig;
/// use archive_harvest::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "ArchiveHarvest".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    // Format: CrawlerName/Version (+ContactURL; ContactEmail)
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Issues GET requests with timeout, pacing, retry and backoff
///
/// Safe to share between workers: it holds only the client, an immutable
/// policy and the run's cancellation token.
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    client: Client,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl RequestExecutor {
    pub fn new(client: Client, policy: RetryPolicy, cancel: CancellationToken) -> Self {
        Self {
            client,
            policy,
            cancel,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches a URL until a terminal outcome
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 2xx | Success |
    /// | HTTP 404 | Immediate → NotFound |
    /// | Other HTTP status | Retry |
    /// | Timeout / connection error | Retry |
    /// | Body read error | Retry |
    /// | Attempts exhausted | FatalError(last cause) |
    /// | Cancelled while pacing or backing off | FatalError(Cancelled) |
    ///
    /// Every attempt, the first included, is preceded by `unit_delay`. A
    /// failed attempt adds `(max_attempts - remaining) * unit_delay` of
    /// backoff on top of that.
    ///
    /// The returned status is never `TransientError`.
    pub async fn fetch(&self, url: &str, kind: PageKind) -> FetchResult {
        let mut task = FetchTask::new(url, kind);
        let mut remaining = self.policy.max_attempts.max(1);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    task.transition(TaskState::Failed);
                    return FetchResult {
                        task,
                        status: FetchStatus::FatalError(FetchCause::Cancelled),
                    };
                }
                _ = tokio::time::sleep(self.policy.unit_delay) => {}
            }

            task.begin_attempt();
            remaining -= 1;
            tracing::debug!(
                "Fetching {} {} (attempt {}/{})",
                kind,
                url,
                task.attempt,
                self.policy.max_attempts
            );

            let cause = match self.attempt(url).await {
                FetchStatus::TransientError(cause) => cause,
                terminal => {
                    task.transition(match terminal {
                        FetchStatus::Success { .. } => TaskState::Succeeded,
                        FetchStatus::NotFound => TaskState::NotFound,
                        _ => TaskState::Failed,
                    });
                    return FetchResult {
                        task,
                        status: terminal,
                    };
                }
            };

            task.transition(TaskState::TransientError);

            if remaining == 0 {
                tracing::warn!(
                    "Giving up on {} after {} attempt(s): {}",
                    url,
                    task.attempt,
                    cause
                );
                task.transition(TaskState::Failed);
                return FetchResult {
                    task,
                    status: FetchStatus::FatalError(cause),
                };
            }

            let backoff = self.policy.backoff(remaining);
            tracing::warn!(
                "Attempt {} for {} failed ({}), retrying in {:?}",
                task.attempt,
                url,
                cause,
                backoff
            );

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    task.transition(TaskState::Failed);
                    return FetchResult {
                        task,
                        status: FetchStatus::FatalError(FetchCause::Cancelled),
                    };
                }
                _ = tokio::time::sleep(backoff) => {}
            }
        }
    }

    /// Performs one GET and classifies the outcome
    async fn attempt(&self, url: &str) -> FetchStatus {
        let response = match self
            .client
            .get(url)
            .timeout(self.policy.timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return FetchStatus::TransientError(classify_error(&e)),
        };

        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return FetchStatus::NotFound;
        }

        if !status.is_success() {
            return FetchStatus::TransientError(FetchCause::Status(status.as_u16()));
        }

        match response.text().await {
            Ok(body) => FetchStatus::Success {
                body,
                http_status: status.as_u16(),
            },
            Err(e) if e.is_timeout() => FetchStatus::TransientError(FetchCause::Timeout),
            Err(e) => FetchStatus::TransientError(FetchCause::Body(e.to_string())),
        }
    }
}

fn classify_error(e: &reqwest::Error) -> FetchCause {
    if e.is_timeout() {
        FetchCause::Timeout
    } else if e.is_connect() {
        FetchCause::Connect(e.to_string())
    } else {
        FetchCause::Request(e.to_string())
    }
}
