//! Client configuration: resolved base URL, timeouts, and poll policy.
//!
//! The controller never reads the environment itself; it takes a
//! [`ClientConfig`] so tests can inject a mock backend URL and
//! millisecond-scale poll delays.

use std::time::Duration;

use crate::endpoint::{self, LOCAL_BACKEND_ORIGIN};
use crate::poll::PollConfig;

/// Configuration for one [`AnalysisController`].
///
/// All timeouts default to the production values; construct via
/// [`ClientConfig::new`] and override fields for tests.
///
/// [`AnalysisController`]: crate::controller::AnalysisController
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Absolute backend origin, e.g. `http://localhost:8000`.
    pub base_url: String,
    /// Timeout for the pre-flight health probe (default: 10 s).
    pub health_timeout: Duration,
    /// Hard timeout for the video upload (default: 10 min).
    pub upload_timeout: Duration,
    /// How long an upload may sit without byte progress before a
    /// non-fatal stall warning is emitted (default: 30 s).
    pub stall_warning_after: Duration,
    /// Pause between a successful upload and the start of polling,
    /// covering backend write-propagation latency (default: 500 ms).
    pub post_upload_grace: Duration,
    /// Status polling policy.
    pub poll: PollConfig,
}

impl ClientConfig {
    /// Config with production timeouts against the given backend origin.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            health_timeout: Duration::from_secs(10),
            upload_timeout: Duration::from_secs(600),
            stall_warning_after: Duration::from_secs(30),
            post_upload_grace: Duration::from_millis(500),
            poll: PollConfig::default(),
        }
    }

    /// Resolve a config from a deployment host name.
    ///
    /// Runs [`endpoint::resolve_base_url`] and materializes its
    /// empty-string ("same origin") result into an absolute origin: a
    /// native client has no current page to be relative to, so
    /// co-located hosts become `https://{host}` and local hosts become
    /// the local development origin.
    pub fn resolve(host: &str, dev_override: Option<&str>) -> Self {
        let resolved = endpoint::resolve_base_url(host, dev_override);
        let base_url = if resolved.is_empty() {
            if host == "localhost" || host == "127.0.0.1" {
                LOCAL_BACKEND_ORIGIN.to_string()
            } else {
                format!("https://{host}")
            }
        } else {
            resolved
        };
        Self::new(base_url)
    }

    /// Load configuration from environment variables.
    ///
    /// | Env Var            | Default     | Meaning                          |
    /// |--------------------|-------------|----------------------------------|
    /// | `GAITVIEW_API_URL` | (unset)     | explicit backend origin, wins    |
    /// | `GAITVIEW_HOST`    | `localhost` | host fed to the endpoint resolver|
    pub fn from_env() -> Self {
        if let Ok(url) = std::env::var("GAITVIEW_API_URL") {
            if !url.is_empty() {
                return Self::new(url);
            }
        }

        let host = std::env::var("GAITVIEW_HOST").unwrap_or_else(|_| "localhost".into());
        Self::resolve(&host, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::HOSTED_BACKEND_ORIGIN;

    #[test]
    fn localhost_materializes_to_local_origin() {
        let config = ClientConfig::resolve("localhost", None);
        assert_eq!(config.base_url, LOCAL_BACKEND_ORIGIN);
    }

    #[test]
    fn co_located_host_materializes_to_its_own_origin() {
        let config = ClientConfig::resolve("gaitview.azurewebsites.net", None);
        assert_eq!(config.base_url, "https://gaitview.azurewebsites.net");
    }

    #[test]
    fn static_frontend_uses_hosted_backend() {
        let config = ClientConfig::resolve("clinic.github.io", None);
        assert_eq!(config.base_url, HOSTED_BACKEND_ORIGIN);
    }

    #[test]
    fn production_timeouts() {
        let config = ClientConfig::new("http://localhost:8000");
        assert_eq!(config.health_timeout, Duration::from_secs(10));
        assert_eq!(config.upload_timeout, Duration::from_secs(600));
        assert_eq!(config.stall_warning_after, Duration::from_secs(30));
        assert_eq!(config.post_upload_grace, Duration::from_millis(500));
    }
}
