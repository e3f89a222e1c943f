//! Versioned template storage (§4.6). One active row per `(code,
//! language)`; `update` deactivates the current active row and inserts
//! `version + 1` in the same transaction.

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::error::{Result, TemplateError};
use crate::models::{NewTemplate, TemplateRecord, TemplateUpdate};

pub struct TemplateRepository {
    pool: SqlitePool,
}

impl TemplateRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS templates (
                id TEXT PRIMARY KEY,
                code TEXT NOT NULL,
                language TEXT NOT NULL,
                version INTEGER NOT NULL,
                name TEXT NOT NULL,
                subject TEXT NOT NULL,
                body TEXT NOT NULL,
                active INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                created_by TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_templates_code_language ON templates (code, language)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn row_to_record(row: sqlx::sqlite::SqliteRow) -> TemplateRecord {
        TemplateRecord {
            id: row.get("id"),
            code: row.get("code"),
            language: row.get("language"),
            version: row.get::<i64, _>("version") as u32,
            name: row.get("name"),
            subject: row.get("subject"),
            body: row.get("body"),
            active: row.get::<i64, _>("active") != 0,
            created_at: row.get::<chrono::DateTime<Utc>, _>("created_at"),
            updated_at: row.get::<chrono::DateTime<Utc>, _>("updated_at"),
            created_by: row.get("created_by"),
        }
    }

    async fn find_active(&self, code: &str, language: &str) -> Result<Option<TemplateRecord>> {
        let row = sqlx::query(
            "SELECT * FROM templates WHERE code = ? AND language = ? AND active = 1",
        )
        .bind(code)
        .bind(language)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Self::row_to_record))
    }

    pub async fn create(&self, new_template: NewTemplate) -> Result<TemplateRecord> {
        if self
            .find_active(&new_template.code, &new_template.language)
            .await?
            .is_some()
        {
            return Err(TemplateError::AlreadyActive(new_template.code, new_template.language));
        }

        let now = Utc::now();
        let record = TemplateRecord {
            id: Uuid::new_v4().to_string(),
            code: new_template.code,
            language: new_template.language,
            version: 1,
            name: new_template.name,
            subject: new_template.subject,
            body: new_template.body,
            active: true,
            created_at: now,
            updated_at: now,
            created_by: new_template.created_by,
        };

        sqlx::query(
            "INSERT INTO templates (id, code, language, version, name, subject, body, active, created_at, updated_at, created_by)
             VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.code)
        .bind(&record.language)
        .bind(record.version as i64)
        .bind(&record.name)
        .bind(&record.subject)
        .bind(&record.body)
        .bind(record.created_at)
        .bind(record.updated_at)
        .bind(&record.created_by)
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    pub async fn update(&self, code: &str, language: &str, update: TemplateUpdate) -> Result<TemplateRecord> {
        let current = self
            .find_active(code, language)
            .await?
            .ok_or_else(|| TemplateError::NotFound(code.to_string(), language.to_string()))?;

        let now = Utc::now();
        let next = TemplateRecord {
            id: Uuid::new_v4().to_string(),
            code: code.to_string(),
            language: language.to_string(),
            version: current.version + 1,
            name: update.name,
            subject: update.subject,
            body: update.body,
            active: true,
            created_at: now,
            updated_at: now,
            created_by: current.created_by,
        };

        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE templates SET active = 0, updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(&current.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO templates (id, code, language, version, name, subject, body, active, created_at, updated_at, created_by)
             VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?, ?)",
        )
        .bind(&next.id)
        .bind(&next.code)
        .bind(&next.language)
        .bind(next.version as i64)
        .bind(&next.name)
        .bind(&next.subject)
        .bind(&next.body)
        .bind(next.created_at)
        .bind(next.updated_at)
        .bind(&next.created_by)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(next)
    }

    pub async fn delete(&self, code: &str, language: &str) -> Result<()> {
        let current = self
            .find_active(code, language)
            .await?
            .ok_or_else(|| TemplateError::NotFound(code.to_string(), language.to_string()))?;

        sqlx::query("UPDATE templates SET active = 0, updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(&current.id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn get(&self, code: &str, language: &str, version: Option<u32>) -> Result<TemplateRecord> {
        let row = match version {
            Some(v) => {
                sqlx::query("SELECT * FROM templates WHERE code = ? AND language = ? AND version = ?")
                    .bind(code)
                    .bind(language)
                    .bind(v as i64)
                    .fetch_optional(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("SELECT * FROM templates WHERE code = ? AND language = ? AND active = 1")
                    .bind(code)
                    .bind(language)
                    .fetch_optional(&self.pool)
                    .await?
            }
        };

        row.map(Self::row_to_record)
            .ok_or_else(|| TemplateError::NotFound(code.to_string(), language.to_string()))
    }
}
