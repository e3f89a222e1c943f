//! One circuit breaker per protected dependency (email provider, push
//! provider, user directory, ...), keyed by name.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::circuit::CircuitBreaker;

pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl CircuitBreakerRegistry {
    pub fn new() -> Self {
        Self {
            breakers: DashMap::new(),
        }
    }

    /// Register or replace the breaker for `name`.
    pub fn configure(&self, name: &str, failure_threshold: u32, success_threshold: u32, recovery_timeout: Duration) {
        self.breakers.insert(
            name.to_string(),
            Arc::new(CircuitBreaker::new(failure_threshold, success_threshold, recovery_timeout)),
        );
    }

    /// Get the breaker for `name`, creating one with default settings if
    /// it has not been configured yet.
    pub fn get_or_default(&self, name: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::default()))
            .clone()
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_names_get_distinct_breakers() {
        let registry = CircuitBreakerRegistry::new();
        let email = registry.get_or_default("email");
        let push = registry.get_or_default("push");
        email.record_failure();
        assert_eq!(email.state(), crate::circuit::CircuitState::Closed);
        assert_ne!(Arc::as_ptr(&email), Arc::as_ptr(&push));
    }

    #[test]
    fn same_name_returns_same_breaker() {
        let registry = CircuitBreakerRegistry::new();
        let a = registry.get_or_default("email");
        let b = registry.get_or_default("email");
        assert!(Arc::ptr_eq(&a, &b));
    }
}
