//! Tag repository
//!
//! Database operations for tags.
//!
//! This module provides:
//! - `TagRepository` trait defining the interface for tag data access
//! - `SqlxTagRepository` implementing the trait for SQLite
//!
//! Tag names are the primary key, so creation is an idempotent upsert.
//! Usage is always derived from Published versions and never stored.

use crate::db::DynDatabasePool;
use crate::models::{ArticleStatus, ArticleVersionTag, Tag, TagUsage};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection};
use std::collections::HashMap;
use std::sync::Arc;

/// Tag repository trait
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Create any of `names` that do not exist yet
    async fn upsert_tags(&self, names: &[String]) -> Result<()>;

    /// Get tag by name
    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>>;

    /// List all tag names in ascending order
    async fn list_tag_names(&self) -> Result<Vec<String>>;

    /// Usage count and newest usage time per tag, over Published versions.
    ///
    /// Tags that no Published version carries are absent from the map.
    async fn get_tag_usage(&self) -> Result<HashMap<String, TagUsage>>;

    /// Every tag association of versions in `status`, grouped by version
    async fn get_article_tags(&self, status: ArticleStatus) -> Result<Vec<ArticleVersionTag>>;
}

/// SQLx-based tag repository implementation
pub struct SqlxTagRepository {
    pool: DynDatabasePool,
}

impl SqlxTagRepository {
    /// Create a new SQLx tag repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TagRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl TagRepository for SqlxTagRepository {
    async fn upsert_tags(&self, names: &[String]) -> Result<()> {
        let mut tx = self
            .pool
            .sqlite()
            .begin()
            .await
            .context("Failed to begin transaction")?;

        let now = Utc::now();
        for name in names {
            upsert_tag(&mut tx, name, now).await?;
        }

        tx.commit().await.context("Failed to commit tags")?;
        Ok(())
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>> {
        let row = sqlx::query("SELECT name, created_at FROM tags WHERE name = ?")
            .bind(name)
            .fetch_optional(self.pool.sqlite())
            .await
            .context("Failed to get tag by name")?;

        Ok(row.map(|row| Tag {
            name: row.get("name"),
            created_at: row.get("created_at"),
        }))
    }

    async fn list_tag_names(&self) -> Result<Vec<String>> {
        sqlx::query_scalar("SELECT name FROM tags ORDER BY name")
            .fetch_all(self.pool.sqlite())
            .await
            .context("Failed to list tags")
    }

    async fn get_tag_usage(&self) -> Result<HashMap<String, TagUsage>> {
        let rows = sqlx::query(
            r#"
            SELECT avt.tag_name, av.created_at
            FROM article_version_tags avt
            INNER JOIN article_versions av ON av.id = avt.article_version_id
            WHERE av.status = ?
            "#,
        )
        .bind(ArticleStatus::Published.as_i64())
        .fetch_all(self.pool.sqlite())
        .await
        .context("Failed to get tag usage")?;

        let mut usage: HashMap<String, TagUsage> = HashMap::new();
        for row in rows {
            let name: String = row.get("tag_name");
            let created_at: DateTime<Utc> = row.get("created_at");

            let entry = usage.entry(name).or_default();
            entry.count += 1;
            if entry.last_used.map_or(true, |last| created_at > last) {
                entry.last_used = Some(created_at);
            }
        }

        Ok(usage)
    }

    async fn get_article_tags(&self, status: ArticleStatus) -> Result<Vec<ArticleVersionTag>> {
        let rows = sqlx::query(
            r#"
            SELECT avt.article_version_id, avt.tag_name
            FROM article_version_tags avt
            INNER JOIN article_versions av ON av.id = avt.article_version_id
            WHERE av.status = ?
            ORDER BY avt.article_version_id, avt.tag_name
            "#,
        )
        .bind(status.as_i64())
        .fetch_all(self.pool.sqlite())
        .await
        .context("Failed to get article tags")?;

        Ok(rows
            .into_iter()
            .map(|row| ArticleVersionTag {
                tag_name: row.get("tag_name"),
                article_version_id: row.get("article_version_id"),
            })
            .collect())
    }
}

async fn upsert_tag(conn: &mut SqliteConnection, name: &str, now: DateTime<Utc>) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO tags (name, created_at) VALUES (?, ?)")
        .bind(name)
        .bind(now)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("Failed to upsert tag: {}", name))?;
    Ok(())
}

/// Upsert `tags` and attach them to a version, inside the caller's transaction
pub(crate) async fn insert_version_tags(
    conn: &mut SqliteConnection,
    version_id: i64,
    tags: &[String],
) -> Result<()> {
    let now = Utc::now();
    for tag in tags {
        upsert_tag(conn, tag, now).await?;

        sqlx::query(
            "INSERT OR IGNORE INTO article_version_tags (article_version_id, tag_name) VALUES (?, ?)",
        )
        .bind(version_id)
        .bind(tag)
        .execute(&mut *conn)
        .await
        .context("Failed to associate tag with article version")?;
    }
    Ok(())
}
