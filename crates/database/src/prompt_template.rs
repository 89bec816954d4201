//! Keyed prompt-template storage.
//!
//! Templates are fetched by key; a miss is not an error. Callers fall back
//! to an embedded default so prompt assembly always has text to work with.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::Result;

/// Fetch a template's text by key, `None` when absent.
pub async fn fetch_prompt_template(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let content: Option<String> = sqlx::query_scalar(
        r#"
        SELECT content FROM prompt_templates
        WHERE key = ?
        "#,
    )
    .bind(key)
    .fetch_optional(pool)
    .await?;

    Ok(content)
}

/// Insert or replace a template's text.
pub async fn upsert_prompt_template(pool: &SqlitePool, key: &str, content: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO prompt_templates (key, content, updated_at)
        VALUES (?, ?, ?)
        ON CONFLICT(key) DO UPDATE SET content = excluded.content, updated_at = excluded.updated_at
        "#,
    )
    .bind(key)
    .bind(content)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    async fn test_db() -> Database {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_fetch_miss_is_none() {
        let db = test_db().await;
        let result = fetch_prompt_template(db.pool(), "clary_soul").await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_upsert_overwrites() {
        let db = test_db().await;

        upsert_prompt_template(db.pool(), "clary_soul", "first version")
            .await
            .unwrap();
        upsert_prompt_template(db.pool(), "clary_soul", "second version")
            .await
            .unwrap();

        let content = fetch_prompt_template(db.pool(), "clary_soul").await.unwrap();
        assert_eq!(content.as_deref(), Some("second version"));
    }
}
