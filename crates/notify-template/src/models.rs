use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One stored version of a template. Only one version per (code,
/// language) pair is ever `active` at a time (§4.6 versioning).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TemplateRecord {
    pub id: String,
    pub code: String,
    pub language: String,
    pub version: u32,
    pub name: String,
    pub subject: String,
    pub body: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewTemplate {
    pub code: String,
    pub language: String,
    pub name: String,
    pub subject: String,
    pub body: String,
    pub created_by: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TemplateUpdate {
    pub name: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RenderedTemplate {
    pub subject: String,
    pub body: String,
    pub version: u32,
    pub rendered_at: DateTime<Utc>,
}
