//! Provider health tracking with a circuit breaker
//!
//! Tracks per-provider failures and keeps the fallback engine from
//! proposing candidates on providers that are consistently failing,
//! giving them time to recover.

use std::time::{Duration, Instant};

use conduit_config::CircuitBreakerConfig;
use dashmap::DashMap;

/// Circuit breaker state for a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation, requests flow through
    Closed,
    /// Provider is failing, requests are blocked
    Open,
    /// Probing — allow one request to test recovery
    HalfOpen,
}

/// Per-provider health state
#[derive(Debug)]
struct ProviderHealth {
    /// Errors seen in the current window
    error_count: u32,
    /// Start of the current error window
    window_start: Instant,
    /// When the circuit opened, if it is open
    opened_at: Option<Instant>,
}

impl ProviderHealth {
    fn new() -> Self {
        Self {
            error_count: 0,
            window_start: Instant::now(),
            opened_at: None,
        }
    }
}

/// Track provider health and implement circuit breaker logic
pub struct ProviderHealthTracker {
    providers: DashMap<String, ProviderHealth>,
    config: CircuitBreakerConfig,
}

impl ProviderHealthTracker {
    /// Create a new health tracker with the given configuration
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            providers: DashMap::new(),
            config,
        }
    }

    /// Check the circuit state for a provider
    pub fn state(&self, provider: &str) -> CircuitState {
        let Some(health) = self.providers.get(provider) else {
            return CircuitState::Closed;
        };

        let Some(opened_at) = health.opened_at else {
            return CircuitState::Closed;
        };

        if opened_at.elapsed() >= Duration::from_secs(self.config.recovery_seconds) {
            CircuitState::HalfOpen
        } else {
            CircuitState::Open
        }
    }

    /// Whether a provider is available for requests
    pub fn is_available(&self, provider: &str) -> bool {
        self.state(provider) != CircuitState::Open
    }

    /// Record a successful request to a provider
    pub fn record_success(&self, provider: &str) {
        let mut health = self
            .providers
            .entry(provider.to_owned())
            .or_insert_with(ProviderHealth::new);

        // Success closes the circuit (including half-open probes)
        health.opened_at = None;
        health.error_count = 0;
        health.window_start = Instant::now();
    }

    /// Record a failed request to a provider
    pub fn record_failure(&self, provider: &str) {
        let mut health = self
            .providers
            .entry(provider.to_owned())
            .or_insert_with(ProviderHealth::new);

        if health.window_start.elapsed() >= Duration::from_secs(self.config.window_seconds) {
            health.error_count = 1;
            health.window_start = Instant::now();
            return;
        }

        health.error_count += 1;
        if health.error_count >= self.config.error_threshold && health.opened_at.is_none() {
            health.opened_at = Some(Instant::now());
            let error_count = health.error_count;
            drop(health);
            tracing::warn!(provider, error_count, "circuit breaker opened for provider");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            error_threshold: 3,
            window_seconds: 60,
            recovery_seconds: 5,
        }
    }

    #[test]
    fn healthy_provider_is_closed() {
        let tracker = ProviderHealthTracker::new(test_config());
        assert_eq!(tracker.state("test"), CircuitState::Closed);
        assert!(tracker.is_available("test"));
    }

    #[test]
    fn failures_below_threshold_stay_closed() {
        let tracker = ProviderHealthTracker::new(test_config());
        tracker.record_failure("test");
        tracker.record_failure("test");
        assert_eq!(tracker.state("test"), CircuitState::Closed);
    }

    #[test]
    fn failures_at_threshold_open_circuit() {
        let tracker = ProviderHealthTracker::new(test_config());
        for _ in 0..3 {
            tracker.record_failure("test");
        }
        assert_eq!(tracker.state("test"), CircuitState::Open);
        assert!(!tracker.is_available("test"));
    }

    #[test]
    fn success_resets_circuit() {
        let tracker = ProviderHealthTracker::new(test_config());
        for _ in 0..3 {
            tracker.record_failure("test");
        }
        assert_eq!(tracker.state("test"), CircuitState::Open);

        tracker.record_success("test");
        assert_eq!(tracker.state("test"), CircuitState::Closed);
    }

    #[test]
    fn independent_provider_tracking() {
        let tracker = ProviderHealthTracker::new(test_config());
        for _ in 0..3 {
            tracker.record_failure("bad");
        }
        assert!(!tracker.is_available("bad"));
        assert!(tracker.is_available("good"));
    }
}
