//! Versioned template storage and the `{{variable}}` substitution engine
//! (§4.6). `render` is the operation the worker pipeline calls; the
//! rest back the template management HTTP surface.

pub mod api;
pub mod engine;
pub mod error;
pub mod models;
pub mod render;
pub mod store;

pub use api::{create_router, AppState};
pub use engine::TemplateEngine;
pub use error::{Result, TemplateError};
pub use models::{NewTemplate, RenderedTemplate, TemplateRecord, TemplateUpdate};
pub use store::TemplateRepository;
