//! Circuit breaker (§4.4) and retry engine (§4.5) for protected
//! dependencies: email/push providers and the user directory.

pub mod circuit;
pub mod registry;
pub mod retry;

pub use circuit::{CircuitBreaker, CircuitState};
pub use registry::CircuitBreakerRegistry;
pub use retry::{backoff_delay_ms, exhausted};
