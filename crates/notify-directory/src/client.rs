//! User directory client (§4.1 step 2, §6 "User directory HTTP API").
//!
//! Reads go through a 5 minute cache first; misses call out to the
//! directory service behind a circuit breaker so a struggling directory
//! degrades ingress latency instead of cascading into timeouts.

use std::sync::Arc;
use std::time::Duration;

use notify_breaker::CircuitBreaker;
use notify_common::UserProfile;
use notify_store::Store;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{DirectoryError, Result};

const USER_CACHE_TTL_SECS: u64 = 300;

#[derive(Debug, Deserialize)]
struct UserEnvelope {
    data: UserProfile,
}

pub struct UserDirectoryClient {
    http: reqwest::Client,
    base_url: String,
    cache: Store,
    breaker: Arc<CircuitBreaker>,
}

impl UserDirectoryClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration, cache: Store, breaker: Arc<CircuitBreaker>) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            cache,
            breaker,
        })
    }

    pub async fn get_user(&self, user_id: &str) -> Result<UserProfile> {
        if let Some(cached) = self.cache.get_cached_user(user_id).await? {
            debug!(user_id, "user directory cache hit");
            return Ok(cached);
        }

        if !self.breaker.allow_request() {
            warn!(user_id, "user directory circuit breaker open");
            return Err(DirectoryError::CircuitOpen);
        }

        match self.fetch(user_id).await {
            Ok(profile) => {
                self.breaker.record_success();
                self.cache.cache_user(user_id, &profile, USER_CACHE_TTL_SECS).await?;
                Ok(profile)
            }
            Err(e) => {
                self.breaker.record_failure();
                Err(e)
            }
        }
    }

    async fn fetch(&self, user_id: &str) -> Result<UserProfile> {
        let url = format!("{}/api/v1/users/{user_id}", self.base_url);
        let response = self.http.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(DirectoryError::NotFound(user_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(DirectoryError::BadStatus(response.status().as_u16()));
        }

        let envelope: UserEnvelope = response.json().await?;
        Ok(envelope.data)
    }
}
