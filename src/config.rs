//! Configuration for [`ContractApiHttp`](crate::client::ContractApiHttp).

use std::time::Duration;

/// Default base address of the provisioning service.
pub const DEFAULT_BASE_URL: &str = "https://global.azure-devices-provisioning.net/";

/// Transport settings.
///
/// ```
/// use provisioning_service_client::config::ContractApiConfig;
/// use std::time::Duration;
///
/// let config = ContractApiConfig::new()
///     .with_base_url("https://myinstance.azure-devices-provisioning.net/")
///     .with_default_timeout(Duration::from_secs(30));
/// ```
#[derive(Debug, Clone)]
pub struct ContractApiConfig {
    pub(crate) base_url: String,
    /// Sent as `User-Agent` on every request.
    pub(crate) user_agent: String,
    /// Applies to calls that do not set a per-call timeout.
    pub(crate) default_timeout: Duration,
    /// TCP + TLS handshake budget for both underlying clients.
    pub(crate) connect_timeout: Duration,
}

impl Default for ContractApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: concat!("provisioning-service-client/", env!("CARGO_PKG_VERSION"))
                .to_string(),
            default_timeout: Duration::from_secs(100),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl ContractApiConfig {
    /// Global endpoint, 100 s request timeout, 10 s connect timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Base address every request path is resolved against. A trailing
    /// slash is optional.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Overrides the `User-Agent` header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Defaults to 100 seconds.
    #[must_use]
    pub const fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Defaults to 10 seconds.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Address request paths are resolved against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Value sent as `User-Agent`.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Timeout of calls without their own.
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ContractApiConfig::new();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert!(config.user_agent.starts_with("provisioning-service-client/"));
        assert_eq!(config.default_timeout, Duration::from_secs(100));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn builder_pattern() {
        let config = ContractApiConfig::new()
            .with_base_url("http://127.0.0.1:9000")
            .with_user_agent("test-agent/1.0")
            .with_default_timeout(Duration::from_secs(5))
            .with_connect_timeout(Duration::from_secs(1));

        assert_eq!(config.base_url(), "http://127.0.0.1:9000");
        assert_eq!(config.user_agent(), "test-agent/1.0");
        assert_eq!(config.default_timeout(), Duration::from_secs(5));
        assert_eq!(config.connect_timeout, Duration::from_secs(1));
    }
}
