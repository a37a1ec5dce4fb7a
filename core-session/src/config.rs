//! Backend endpoint configuration.

use std::time::Duration;

/// Default timeout for gated requests (30 seconds)
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for the refresh exchange (15 seconds)
///
/// Shorter than the request timeout: while a refresh is in flight every 401
/// response is queued behind it.
const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(15);

pub(crate) const REFRESH_PATH: &str = "/auth/refresh";
pub(crate) const LOGOUT_PATH: &str = "/auth/logout";

/// Backend service configuration.
///
/// # Examples
///
/// ```
/// use core_session::BackendConfig;
/// use std::time::Duration;
///
/// let config = BackendConfig::new("https://api.example.com/")
///     .with_refresh_timeout(Duration::from_secs(10));
/// assert_eq!(config.endpoint("/auth/refresh"), "https://api.example.com/auth/refresh");
/// ```
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL of the backend service, without a trailing slash
    pub base_url: String,
    /// Timeout applied to gated requests that don't carry their own
    pub request_timeout: Duration,
    /// Timeout for the refresh exchange
    pub refresh_timeout: Duration,
}

impl BackendConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    /// Absolute URL for a backend path.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}
