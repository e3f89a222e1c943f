use thiserror::Error;

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("circuit breaker open for user directory")]
    CircuitOpen,

    #[error("user directory request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("user directory returned status {0}")]
    BadStatus(u16),

    #[error("user not found: {0}")]
    NotFound(String),

    #[error("cache error: {0}")]
    Cache(#[from] notify_store::StoreError),
}

pub type Result<T> = std::result::Result<T, DirectoryError>;
