// Shared transport configuration for building reqwest::Client instances.
//
// The feed client and the panel client share user agent and connect
// timeout settings through this module. Only the panel client gets a total
// request timeout: the feed body is an open-ended stream.

use std::time::Duration;

use crate::error::Error;

const USER_AGENT: &str = concat!("panelsync/", env!("CARGO_PKG_VERSION"));

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Upper bound on TCP/TLS connection establishment.
    pub connect_timeout: Duration,
    /// Upper bound on a whole request/response round trip. `None` for
    /// long-lived streaming responses.
    pub request_timeout: Option<Duration>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Some(Duration::from_secs(10)),
        }
    }
}

impl TransportConfig {
    /// Config suitable for a streaming body: connect timeout only.
    pub fn streaming(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            request_timeout: None,
        }
    }

    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .user_agent(USER_AGENT);

        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }

        builder.build().map_err(Error::Transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streaming_config_has_no_request_timeout() {
        let config = TransportConfig::streaming(Duration::from_secs(5));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert!(config.request_timeout.is_none());
        assert!(config.build_client().is_ok());
    }
}
