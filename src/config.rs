//! Serializable retry configuration
//!
//! The wire shape uses camelCase keys so it can be shared with non-Rust callers:
//!
//! ```json
//! {
//!   "maxAttempts": 3,
//!   "baseDelayMs": 1000,
//!   "maxDelayMs": 30000,
//!   "useExponentialBackoff": true,
//!   "jitterFactor": 0.2,
//!   "enableRetry": true
//! }
//! ```
//!
//! Missing keys take the defaults shown above; unknown keys are rejected.

use crate::interceptor::RetryInterceptor;
use crate::policy::{
    PolicyError, DEFAULT_BASE_DELAY, DEFAULT_JITTER_FACTOR, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_MAX_DELAY,
};
use crate::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Errors raised while loading a [`RetryConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("malformed retry configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid retry configuration: {0}")]
    Invalid(#[from] PolicyError),
}

/// Flat, serializable form of a [`RetryPolicy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub use_exponential_backoff: bool,
    pub jitter_factor: f64,
    /// When false the policy makes a single attempt regardless of `max_attempts`.
    pub enable_retry: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY.as_millis() as u64,
            max_delay_ms: DEFAULT_MAX_DELAY.as_millis() as u64,
            use_exponential_backoff: true,
            jitter_factor: DEFAULT_JITTER_FACTOR,
            enable_retry: true,
        }
    }
}

impl RetryConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Validate and convert into a [`RetryPolicy`].
    pub fn to_policy(&self) -> Result<RetryPolicy, ConfigError> {
        let attempts = if self.enable_retry { self.max_attempts } else { 1 };
        let policy = RetryPolicy::builder()
            .max_attempts(attempts)
            .base_delay(Duration::from_millis(self.base_delay_ms))
            .max_delay(Duration::from_millis(self.max_delay_ms))
            .exponential(self.use_exponential_backoff)
            .jitter_factor(self.jitter_factor)
            .build()?;
        Ok(policy)
    }

    /// Interceptor that applies `enableRetry` to the HTTP facade's retry vote.
    pub fn retry_interceptor(&self) -> RetryInterceptor {
        RetryInterceptor::new(self.enable_retry)
    }
}

impl From<&RetryPolicy> for RetryConfig {
    fn from(policy: &RetryPolicy) -> Self {
        Self {
            max_attempts: policy.max_attempts(),
            base_delay_ms: policy.base_delay().as_millis() as u64,
            max_delay_ms: policy.max_delay().as_millis() as u64,
            use_exponential_backoff: policy.use_exponential_backoff(),
            jitter_factor: policy.jitter_factor(),
            enable_retry: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let cfg = RetryConfig::from_json_str("{}").unwrap();
        assert_eq!(cfg, RetryConfig::default());
        let policy = cfg.to_policy().unwrap();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.base_delay(), Duration::from_millis(1000));
        assert_eq!(policy.max_delay(), Duration::from_millis(30_000));
        assert!(policy.use_exponential_backoff());
        assert!((policy.jitter_factor() - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn camel_case_keys_parse() {
        let json = concat!(
            r#"{"maxAttempts":5,"baseDelayMs":50,"maxDelayMs":400,"#,
            r#""useExponentialBackoff":false,"jitterFactor":0}"#,
        );
        let cfg = RetryConfig::from_json_str(json).unwrap();
        let policy = cfg.to_policy().unwrap();
        assert_eq!(policy.max_attempts(), 5);
        assert_eq!(policy.base_delay(), Duration::from_millis(50));
        assert!(!policy.use_exponential_backoff());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = RetryConfig::from_json_str(r#"{"maxRetries":5}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn disabled_retry_means_single_attempt() {
        let cfg = RetryConfig { enable_retry: false, max_attempts: 7, ..RetryConfig::default() };
        assert_eq!(cfg.to_policy().unwrap().max_attempts(), 1);
        assert!(!cfg.retry_interceptor().is_enabled());
    }

    #[test]
    fn invalid_values_surface_policy_errors() {
        let cfg = RetryConfig { max_attempts: 0, ..RetryConfig::default() };
        assert!(matches!(
            cfg.to_policy().unwrap_err(),
            ConfigError::Invalid(PolicyError::InvalidMaxAttempts(0))
        ));

        let cfg = RetryConfig { base_delay_ms: 500, max_delay_ms: 100, ..RetryConfig::default() };
        assert!(matches!(cfg.to_policy().unwrap_err(), ConfigError::Invalid(_)));
    }

    #[test]
    fn policy_round_trips_through_config() {
        let policy = RetryPolicy::builder()
            .max_attempts(4)
            .base_delay(Duration::from_millis(20))
            .max_delay(Duration::from_millis(80))
            .no_jitter()
            .build()
            .unwrap();
        let json = RetryConfig::from(&policy).to_json_string().unwrap();
        assert!(json.contains("\"maxAttempts\":4"));
        let back = RetryConfig::from_json_str(&json).unwrap().to_policy().unwrap();
        assert_eq!(back, policy);
    }
}
