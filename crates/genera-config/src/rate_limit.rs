//! Rate limiting configuration for the login endpoint.
//!
//! Limits use a token bucket per client address:
//!
//! - tokens are added at `RATE_LIMIT_AUTH_PER_SECOND`
//! - each login attempt consumes one token
//! - at most `RATE_LIMIT_AUTH_BURST_SIZE` tokens accumulate
//!
//! # Environment Variables
//!
//! - `RATE_LIMIT_AUTH_PER_SECOND` (default 1)
//! - `RATE_LIMIT_AUTH_BURST_SIZE` (default 5)
//!
//! A rate of `0` disables the limiter. A burst of `0` falls back to the rate.
//!
//! Clients are keyed with [`SmartIpKeyExtractor`]: `X-Forwarded-For`,
//! `X-Real-IP`, `Forwarded`, then the peer address.

use std::time::Duration;

use tower_governor::governor::{GovernorConfig, GovernorConfigBuilder};
use tower_governor::key_extractor::SmartIpKeyExtractor;

use crate::env_or;

/// Governor configuration applied to `POST /api/auth/login`.
pub type LoginGovernorConfig = GovernorConfig<SmartIpKeyExtractor, ::governor::middleware::NoOpMiddleware>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Login attempts replenished per second, kept low against brute force.
    pub auth_per_second: u32,
    pub auth_burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            auth_per_second: 1,
            auth_burst_size: 5,
        }
    }
}

impl RateLimitConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            auth_per_second: env_or("RATE_LIMIT_AUTH_PER_SECOND", defaults.auth_per_second),
            auth_burst_size: env_or("RATE_LIMIT_AUTH_BURST_SIZE", defaults.auth_burst_size),
        }
    }

    /// No limits at all; used by tests that fire many requests.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            auth_per_second: 0,
            auth_burst_size: 0,
        }
    }

    /// Effective burst: the configured size, or the rate when it is zero.
    #[must_use]
    pub fn auth_burst(&self) -> u32 {
        if self.auth_burst_size == 0 {
            self.auth_per_second
        } else {
            self.auth_burst_size
        }
    }

    /// Governor config for the login endpoint, or `None` when disabled.
    ///
    /// `GovernorConfigBuilder::per_second` takes the replenish interval in
    /// seconds, so the period is derived from the rate instead.
    #[must_use]
    pub fn auth_governor_config(&self) -> Option<LoginGovernorConfig> {
        if self.auth_per_second == 0 {
            return None;
        }
        GovernorConfigBuilder::default()
            .period(Duration::from_secs(1) / self.auth_per_second)
            .burst_size(self.auth_burst())
            .key_extractor(SmartIpKeyExtractor)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RateLimitConfig::default();
        assert_eq!(config.auth_per_second, 1);
        assert_eq!(config.auth_burst_size, 5);
        assert!(config.auth_governor_config().is_some());
    }

    #[test]
    fn test_disabled_has_no_governor() {
        assert!(RateLimitConfig::disabled().auth_governor_config().is_none());
    }

    #[test]
    fn test_zero_burst_falls_back_to_rate() {
        let config = RateLimitConfig {
            auth_per_second: 3,
            auth_burst_size: 0,
        };
        assert_eq!(config.auth_burst(), 3);
        assert!(config.auth_governor_config().is_some());
    }
}
