use notify_common::PlatformError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngressError {
    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("store error: {0}")]
    Store(#[from] notify_store::StoreError),

    #[error("broker error: {0}")]
    Broker(#[from] notify_broker::BrokerError),

    #[error("user directory error: {0}")]
    Directory(#[from] notify_directory::DirectoryError),
}

impl IngressError {
    /// HTTP status this error should surface as, folding the collaborator
    /// error kinds into the platform taxonomy (§7).
    pub fn status_code(&self) -> u16 {
        match self {
            IngressError::Platform(e) => e.status_code(),
            IngressError::Store(_) => 503,
            IngressError::Broker(_) => 503,
            IngressError::Directory(notify_directory::DirectoryError::NotFound(_)) => 404,
            IngressError::Directory(_) => 503,
        }
    }

    /// Short machine-readable error kind, matching `ErrorKind`'s variants
    /// by name for the response envelope's `error` field.
    pub fn kind(&self) -> &'static str {
        match self {
            IngressError::Platform(e) => match e.kind() {
                notify_common::ErrorKind::Validation => "validation",
                notify_common::ErrorKind::Authentication => "authentication",
                notify_common::ErrorKind::Preference => "preference",
                notify_common::ErrorKind::RateLimit => "rate_limit",
                notify_common::ErrorKind::Dependency => "dependency",
                notify_common::ErrorKind::NotFound => "not_found",
                notify_common::ErrorKind::TerminalDelivery => "terminal_delivery",
                notify_common::ErrorKind::TransientDelivery => "transient_delivery",
            },
            IngressError::Store(_) => "dependency",
            IngressError::Broker(_) => "dependency",
            IngressError::Directory(notify_directory::DirectoryError::NotFound(_)) => "not_found",
            IngressError::Directory(_) => "dependency",
        }
    }
}

pub type Result<T> = std::result::Result<T, IngressError>;
