//! Ties versioned storage, the rendered-template cache, and the
//! substitution engine together into the four public operations (§4.6).

use notify_common::VariableMap;
use notify_store::Store;
use tracing::debug;

use crate::error::{Result, TemplateError};
use crate::models::{NewTemplate, RenderedTemplate, TemplateRecord, TemplateUpdate};
use crate::render;
use crate::store::TemplateRepository;

const TEMPLATE_CACHE_TTL_SECS: u64 = 3_600;

pub struct TemplateEngine {
    repo: TemplateRepository,
    cache: Store,
    default_language: String,
}

impl TemplateEngine {
    pub fn new(repo: TemplateRepository, cache: Store, default_language: impl Into<String>) -> Self {
        Self {
            repo,
            cache,
            default_language: default_language.into(),
        }
    }

    pub async fn migrate(&self) -> Result<()> {
        self.repo.migrate().await
    }

    pub fn validate(&self, subject: &str, body: &str) -> Result<()> {
        for text in [subject, body] {
            let validation = render::validate_syntax(text);
            if !validation.is_valid {
                return Err(TemplateError::InvalidSyntax(validation.errors.join("; ")));
            }
        }
        Ok(())
    }

    pub async fn create(&self, new_template: NewTemplate) -> Result<TemplateRecord> {
        self.validate(&new_template.subject, &new_template.body)?;
        let record = self.repo.create(new_template).await?;
        self.invalidate_cache(&record.code, &record.language).await;
        Ok(record)
    }

    pub async fn update(&self, code: &str, language: &str, update: TemplateUpdate) -> Result<TemplateRecord> {
        self.validate(&update.subject, &update.body)?;
        let record = self.repo.update(code, language, update).await?;
        self.invalidate_cache(code, language).await;
        Ok(record)
    }

    pub async fn delete(&self, code: &str, language: &str) -> Result<()> {
        self.repo.delete(code, language).await?;
        self.invalidate_cache(code, language).await;
        Ok(())
    }

    /// Serves the active version from cache when present; on miss queries
    /// the database and re-caches with a 1 hour TTL.
    pub async fn get(&self, code: &str, language: &str, version: Option<u32>) -> Result<TemplateRecord> {
        if let Some(cached) = self.cache.get_cached_rendered_template(code, language, version).await? {
            if let Ok(record) = serde_json::from_value::<TemplateRecord>(cached) {
                debug!(code, language, "template cache hit");
                return Ok(record);
            }
        }

        let record = self.repo.get(code, language, version).await?;
        let serialized = serde_json::to_value(&record).map_err(notify_store::StoreError::from)?;
        self.cache
            .cache_rendered_template(code, language, version, &serialized, TEMPLATE_CACHE_TTL_SECS)
            .await?;
        Ok(record)
    }

    /// Required variables the active (or a specific) version references
    /// without a `default:` fallback.
    pub async fn required_variables(&self, code: &str, language: &str, version: Option<u32>) -> Result<Vec<String>> {
        let record = self.get(code, language, version).await?;
        let mut required = render::required_variables(&record.subject);
        for var in render::required_variables(&record.body) {
            if !required.contains(&var) {
                required.push(var);
            }
        }
        Ok(required)
    }

    pub async fn render(
        &self,
        code: &str,
        variables: &VariableMap,
        language: Option<&str>,
    ) -> Result<RenderedTemplate> {
        let language = language.unwrap_or(&self.default_language);
        let record = self.get(code, language, None).await?;

        let vars_map: serde_json::Map<String, serde_json::Value> =
            variables.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        let (subject, body) = render::render(&record.subject, &record.body, &vars_map);

        Ok(RenderedTemplate {
            subject,
            body,
            version: record.version,
            rendered_at: chrono::Utc::now(),
        })
    }

    async fn invalidate_cache(&self, code: &str, language: &str) {
        if let Err(e) = self.cache.invalidate_template_cache(code, language, None).await {
            debug!(code, language, error = %e, "template cache invalidation failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use testcontainers::runners::AsyncRunner;
    use testcontainers_modules::redis::Redis;

    async fn build_engine() -> (testcontainers::ContainerAsync<Redis>, TemplateEngine) {
        let container = Redis::default().start().await.expect("start redis container");
        let port = container.get_host_port_ipv4(6379).await.unwrap();
        let store = Store::connect(&format!("redis://127.0.0.1:{port}")).await.unwrap();

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let repo = TemplateRepository::new(pool);
        let engine = TemplateEngine::new(repo, store, "en");
        engine.migrate().await.unwrap();
        (container, engine)
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn render_leaves_missing_variable_without_default_as_literal_placeholder() {
        let (_redis, engine) = build_engine().await;
        engine
            .create(NewTemplate {
                code: "welcome".to_string(),
                language: "en".to_string(),
                name: "Welcome email".to_string(),
                subject: "Hi {{name}}".to_string(),
                body: "Welcome, {{name}}! Your plan is {{plan}}.".to_string(),
                created_by: "test-suite".to_string(),
            })
            .await
            .unwrap();

        let rendered = engine.render("welcome", &VariableMap::new(), None).await.unwrap();

        assert_eq!(rendered.subject, "Hi {{name}}");
        assert_eq!(rendered.body, "Welcome, {{name}}! Your plan is {{plan}}.");
    }
}
