//! Knowledge corpus operations.

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::KnowledgeItem;

/// Create a knowledge item.
pub async fn create_knowledge_item(
    pool: &SqlitePool,
    title: &str,
    content: &str,
    active: bool,
) -> Result<KnowledgeItem> {
    let item = KnowledgeItem {
        id: Uuid::new_v4().to_string(),
        title: title.to_string(),
        content: content.to_string(),
        active,
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO knowledge_items (id, title, content, active, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&item.id)
    .bind(&item.title)
    .bind(&item.content)
    .bind(item.active)
    .bind(item.created_at)
    .execute(pool)
    .await?;

    Ok(item)
}

/// Active knowledge items, newest first.
pub async fn active_knowledge(pool: &SqlitePool) -> Result<Vec<KnowledgeItem>> {
    let items = sqlx::query_as::<_, KnowledgeItem>(
        r#"
        SELECT id, title, content, active, created_at
        FROM knowledge_items
        WHERE active = 1
        ORDER BY created_at DESC, rowid DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(items)
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
    async fn test_only_active_items_newest_first() {
        let db = test_db().await;

        create_knowledge_item(db.pool(), "Old", "older guidance", true)
            .await
            .unwrap();
        create_knowledge_item(db.pool(), "Retired", "ignore me", false)
            .await
            .unwrap();
        create_knowledge_item(db.pool(), "New", "newer guidance", true)
            .await
            .unwrap();

        let items = active_knowledge(db.pool()).await.unwrap();
        let titles: Vec<&str> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["New", "Old"]);
    }
}
