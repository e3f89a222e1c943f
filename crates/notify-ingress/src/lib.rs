//! Ingress & Dispatch (§4.1): admission pipeline, HTTP API, and the
//! interface-level auth/rate-limit checks in front of it.

pub mod api;
pub mod auth;
pub mod error;
pub mod middleware;
pub mod rate_limit;
pub mod service;

pub use api::{create_router, ApiDoc, AppState};
pub use auth::AuthConfig;
pub use error::{IngressError, Result};
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use service::IngressService;
