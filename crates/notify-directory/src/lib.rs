//! Cached, circuit-breaker-protected user directory client.

pub mod client;
pub mod error;

pub use client::UserDirectoryClient;
pub use error::{DirectoryError, Result};
