//! Heartbeat rate limiting
//!
//! Per-address GCRA limiting of the ingestion endpoint via tower_governor.
//! Behind a reverse proxy every request shares the proxy's address, so the
//! key is the forwarded client address (`X-Forwarded-For`, `X-Real-IP`,
//! `Forwarded`), falling back to the peer. The fallback needs the service
//! served with `into_make_service_with_connect_info::<SocketAddr>()`.

use governor::middleware::StateInformationMiddleware;
use std::sync::Arc;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::SmartIpKeyExtractor;

/// Governor config with X-RateLimit-* headers enabled
pub type PingGovernorConfig =
    tower_governor::governor::GovernorConfig<SmartIpKeyExtractor, StateInformationMiddleware>;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Seconds to replenish one request
    pub per_second: u64,
    /// Requests allowed back to back
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        // A device pings about once a minute; leave room for retries
        Self {
            per_second: 1,
            burst_size: 10,
        }
    }
}

/// Build the governor config, or `None` if the quota is degenerate.
pub fn create_governor_config(config: &RateLimitConfig) -> Option<Arc<PingGovernorConfig>> {
    GovernorConfigBuilder::default()
        .key_extractor(SmartIpKeyExtractor)
        .per_second(config.per_second)
        .burst_size(config.burst_size)
        .use_headers()
        .finish()
        .map(Arc::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RateLimitConfig::default();
        assert_eq!(config.per_second, 1);
        assert_eq!(config.burst_size, 10);
    }

    #[test]
    fn test_create_governor_config() {
        assert!(create_governor_config(&RateLimitConfig::default()).is_some());
    }

    #[test]
    fn test_zero_quota_is_rejected() {
        let config = RateLimitConfig {
            per_second: 0,
            burst_size: 0,
        };
        assert!(create_governor_config(&config).is_none());
    }
}
