use thiserror::Error;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("cache error: {0}")]
    Cache(#[from] notify_store::StoreError),

    #[error("template not found: {0}/{1}")]
    NotFound(String, String),

    #[error("template {0}/{1} already has an active version")]
    AlreadyActive(String, String),

    #[error("invalid template syntax: {0}")]
    InvalidSyntax(String),

    #[error("missing required variable: {0}")]
    MissingVariable(String),
}

impl TemplateError {
    /// HTTP status this error should surface as on the template HTTP API (§6).
    pub fn status_code(&self) -> u16 {
        match self {
            TemplateError::NotFound(..) => 404,
            TemplateError::AlreadyActive(..) => 409,
            TemplateError::InvalidSyntax(_) | TemplateError::MissingVariable(_) => 400,
            TemplateError::Database(_) | TemplateError::Cache(_) => 503,
        }
    }
}

pub type Result<T> = std::result::Result<T, TemplateError>;
