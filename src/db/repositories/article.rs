//! Article repository
//!
//! Database operations for articles and their versions.
//!
//! This module provides:
//! - `ArticleRepository` trait defining the interface for article data access
//! - `SqlxArticleRepository` implementing the trait for SQLite
//!
//! Every write that touches more than one row runs in a single transaction,
//! so the article's version pointers never disagree with version statuses
//! outside of an open transaction.

use crate::db::repositories::tag::insert_version_tags;
use crate::db::DynDatabasePool;
use crate::models::{
    Article, ArticleListParams, ArticleStatus, ArticleVersion, CreatedArticle, SortDirection,
};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use std::sync::Arc;
use uuid::Uuid;

/// Article repository trait
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    /// Create an article together with its first version.
    ///
    /// The article starts with `version_sequence = version.version` and its
    /// drafted pointer on the new version.
    async fn create_article(&self, version: &ArticleVersion) -> Result<CreatedArticle>;

    /// Insert a new version and advance the article's sequence to its number.
    ///
    /// Returns `None` without writing anything when the article's sequence is
    /// no longer `expected_sequence` (another version was created first) or
    /// the article is gone.
    async fn create_article_version(
        &self,
        version: &ArticleVersion,
        expected_sequence: i64,
    ) -> Result<Option<i64>>;

    /// Get article by ID
    async fn get_article_with_id(&self, article_id: i64) -> Result<Option<Article>>;

    /// Get a version of an article, including its tags
    async fn get_article_version(
        &self,
        article_id: i64,
        version_id: i64,
    ) -> Result<Option<ArticleVersion>>;

    /// List an article's versions whose status is one of `statuses`,
    /// highest version first. An empty slice means Published only.
    async fn get_article_versions_with_statuses(
        &self,
        article_id: i64,
        statuses: &[ArticleStatus],
    ) -> Result<Vec<ArticleVersion>>;

    /// List the versions article pointers reference for `params.statuses`,
    /// filtered, sorted and paged. `params` are expected to be normalized.
    async fn get_articles(&self, params: &ArticleListParams) -> Result<Vec<ArticleVersion>>;

    /// Move a version forward to `status` and maintain the article pointers.
    ///
    /// Returns the previous status, or `None` without writing anything when
    /// the version does not exist or already holds `status` or a later one.
    async fn update_article_status(
        &self,
        article_id: i64,
        version_id: i64,
        status: ArticleStatus,
        updated_by: Uuid,
    ) -> Result<Option<ArticleStatus>>;

    /// Delete an article with all of its versions. Returns false if it did not exist.
    async fn delete_article(&self, article_id: i64) -> Result<bool>;

    /// Store the relationship score of a version. Returns false if the version is gone.
    async fn update_article_version_relationship_score(
        &self,
        version_id: i64,
        score: f64,
    ) -> Result<bool>;
}

/// SQLx-based article repository implementation
pub struct SqlxArticleRepository {
    pool: DynDatabasePool,
}

impl SqlxArticleRepository {
    /// Create a new SQLx article repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ArticleRepository> {
        Arc::new(Self::new(pool))
    }
}

const VERSION_COLUMNS: &str = "id, article_id, title, body, version, status, relationship_score, \
     created_by, created_at, updated_by, updated_at";

#[async_trait]
impl ArticleRepository for SqlxArticleRepository {
    async fn create_article(&self, version: &ArticleVersion) -> Result<CreatedArticle> {
        let now = Utc::now();
        let mut tx = self
            .pool
            .sqlite()
            .begin()
            .await
            .context("Failed to begin transaction")?;

        let article_id = sqlx::query(
            r#"
            INSERT INTO articles (version_sequence, created_by, created_at, updated_by, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(version.version)
        .bind(version.created_by)
        .bind(now)
        .bind(version.created_by)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to create article")?
        .last_insert_rowid();

        let version_id = insert_version(&mut tx, article_id, version).await?;
        refresh_drafted_pointer(&mut tx, article_id).await?;

        tx.commit().await.context("Failed to commit article creation")?;

        Ok(CreatedArticle {
            article_id,
            version_id,
        })
    }

    async fn create_article_version(
        &self,
        version: &ArticleVersion,
        expected_sequence: i64,
    ) -> Result<Option<i64>> {
        let mut tx = self
            .pool
            .sqlite()
            .begin()
            .await
            .context("Failed to begin transaction")?;

        let advanced = sqlx::query(
            r#"
            UPDATE articles
            SET version_sequence = ?, updated_by = ?, updated_at = ?
            WHERE id = ? AND version_sequence = ?
            "#,
        )
        .bind(version.version)
        .bind(version.created_by)
        .bind(Utc::now())
        .bind(version.article_id)
        .bind(expected_sequence)
        .execute(&mut *tx)
        .await
        .context("Failed to advance version sequence")?
        .rows_affected();

        if advanced == 0 {
            return Ok(None);
        }

        let version_id = insert_version(&mut tx, version.article_id, version).await?;
        refresh_drafted_pointer(&mut tx, version.article_id).await?;

        tx.commit().await.context("Failed to commit article version")?;

        Ok(Some(version_id))
    }

    async fn get_article_with_id(&self, article_id: i64) -> Result<Option<Article>> {
        let row = sqlx::query(
            r#"
            SELECT id, published_version_id, drafted_version_id, archived_version_id,
                   version_sequence, created_by, created_at, updated_by, updated_at
            FROM articles
            WHERE id = ?
            "#,
        )
        .bind(article_id)
        .fetch_optional(self.pool.sqlite())
        .await
        .context("Failed to get article by ID")?;

        match row {
            Some(row) => Ok(Some(row_to_article(&row)?)),
            None => Ok(None),
        }
    }

    async fn get_article_version(
        &self,
        article_id: i64,
        version_id: i64,
    ) -> Result<Option<ArticleVersion>> {
        let mut conn = self
            .pool
            .sqlite()
            .acquire()
            .await
            .context("Failed to acquire connection")?;

        let row = sqlx::query(&format!(
            "SELECT {} FROM article_versions WHERE article_id = ? AND id = ?",
            VERSION_COLUMNS
        ))
        .bind(article_id)
        .bind(version_id)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to get article version")?;

        match row {
            Some(row) => {
                let tags = fetch_version_tags(&mut conn, version_id).await?;
                Ok(Some(row_to_version(&row, tags)?))
            }
            None => Ok(None),
        }
    }

    async fn get_article_versions_with_statuses(
        &self,
        article_id: i64,
        statuses: &[ArticleStatus],
    ) -> Result<Vec<ArticleVersion>> {
        let statuses: &[ArticleStatus] = if statuses.is_empty() {
            &[ArticleStatus::Published]
        } else {
            statuses
        };
        let placeholders = vec!["?"; statuses.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM article_versions WHERE article_id = ? AND status IN ({}) ORDER BY version DESC",
            VERSION_COLUMNS, placeholders
        );

        let mut conn = self
            .pool
            .sqlite()
            .acquire()
            .await
            .context("Failed to acquire connection")?;

        let mut query = sqlx::query(&sql).bind(article_id);
        for status in statuses {
            query = query.bind(status.as_i64());
        }
        let rows = query
            .fetch_all(&mut *conn)
            .await
            .context("Failed to list article versions")?;

        let mut versions = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.get("id");
            let tags = fetch_version_tags(&mut conn, id).await?;
            versions.push(row_to_version(&row, tags)?);
        }

        Ok(versions)
    }

    async fn get_articles(&self, params: &ArticleListParams) -> Result<Vec<ArticleVersion>> {
        let statuses: &[ArticleStatus] = if params.statuses.is_empty() {
            &[ArticleStatus::Published]
        } else {
            &params.statuses
        };

        let pointers: Vec<String> = statuses
            .iter()
            .map(|status| {
                let pointer = pointer_column(*status);
                format!(
                    "(status = ? AND id IN (SELECT {pointer} FROM articles WHERE {pointer} IS NOT NULL))"
                )
            })
            .collect();
        let mut sql = format!(
            "SELECT {} FROM article_versions WHERE ({})",
            VERSION_COLUMNS,
            pointers.join(" OR ")
        );

        if !params.created_by.is_empty() {
            let placeholders = vec!["?"; params.created_by.len()].join(", ");
            sql.push_str(&format!(" AND created_by IN ({})", placeholders));
        }
        if !params.updated_by.is_empty() {
            let placeholders = vec!["?"; params.updated_by.len()].join(", ");
            sql.push_str(&format!(" AND updated_by IN ({})", placeholders));
        }
        let search = params.search.as_deref().filter(|s| !s.is_empty());
        if search.is_some() {
            sql.push_str(" AND title LIKE '%' || ? || '%' ESCAPE '\\'");
        }

        let mut order: Vec<String> = params
            .sort
            .iter()
            .map(|(key, direction)| {
                let direction = match direction {
                    SortDirection::Asc => "ASC",
                    SortDirection::Desc => "DESC",
                };
                format!("{} {}", key.column(), direction)
            })
            .collect();
        if order.is_empty() {
            order.push("created_at DESC".to_string());
        }
        // stable pages for equal sort keys
        order.push("id ASC".to_string());
        sql.push_str(&format!(" ORDER BY {} LIMIT ? OFFSET ?", order.join(", ")));

        let mut conn = self
            .pool
            .sqlite()
            .acquire()
            .await
            .context("Failed to acquire connection")?;

        let mut query = sqlx::query(&sql);
        for status in statuses {
            query = query.bind(status.as_i64());
        }
        for id in &params.created_by {
            query = query.bind(*id);
        }
        for id in &params.updated_by {
            query = query.bind(*id);
        }
        if let Some(search) = search {
            query = query.bind(escape_like(search));
        }
        let offset = i64::try_from(params.offset()).unwrap_or(i64::MAX);
        let rows = query
            .bind(i64::from(params.limit))
            .bind(offset)
            .fetch_all(&mut *conn)
            .await
            .context("Failed to list articles")?;

        let mut versions = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.get("id");
            let tags = fetch_version_tags(&mut conn, id).await?;
            versions.push(row_to_version(&row, tags)?);
        }

        Ok(versions)
    }

    async fn update_article_status(
        &self,
        article_id: i64,
        version_id: i64,
        status: ArticleStatus,
        updated_by: Uuid,
    ) -> Result<Option<ArticleStatus>> {
        let now = Utc::now();
        let mut tx = self
            .pool
            .sqlite()
            .begin()
            .await
            .context("Failed to begin transaction")?;

        let current: Option<i64> = sqlx::query_scalar(
            "SELECT status FROM article_versions WHERE article_id = ? AND id = ?",
        )
        .bind(article_id)
        .bind(version_id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to read article version status")?;

        let previous = match current {
            Some(value) => parse_status(value)?,
            None => return Ok(None),
        };
        if previous >= status {
            return Ok(None);
        }

        if status == ArticleStatus::Published {
            // Demote whatever is currently published
            let existing: Option<i64> = sqlx::query_scalar(
                r#"
                SELECT id FROM article_versions
                WHERE article_id = ? AND status = ?
                ORDER BY version DESC
                LIMIT 1
                "#,
            )
            .bind(article_id)
            .bind(ArticleStatus::Published.as_i64())
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to find published version")?;

            if let Some(existing_id) = existing {
                sqlx::query(
                    r#"
                    UPDATE article_versions
                    SET status = ?, updated_by = ?, updated_at = ?
                    WHERE article_id = ? AND status = ?
                    "#,
                )
                .bind(ArticleStatus::Archived.as_i64())
                .bind(updated_by)
                .bind(now)
                .bind(article_id)
                .bind(ArticleStatus::Published.as_i64())
                .execute(&mut *tx)
                .await
                .context("Failed to archive published version")?;

                sqlx::query("UPDATE articles SET archived_version_id = ? WHERE id = ?")
                    .bind(existing_id)
                    .bind(article_id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to update archived pointer")?;
            }
        }

        let moved = sqlx::query(
            r#"
            UPDATE article_versions
            SET status = ?, updated_by = ?, updated_at = ?
            WHERE article_id = ? AND id = ? AND status < ?
            "#,
        )
        .bind(status.as_i64())
        .bind(updated_by)
        .bind(now)
        .bind(article_id)
        .bind(version_id)
        .bind(status.as_i64())
        .execute(&mut *tx)
        .await
        .context("Failed to update article version status")?
        .rows_affected();

        if moved == 0 {
            return Ok(None);
        }

        match status {
            ArticleStatus::Published => {
                sqlx::query("UPDATE articles SET published_version_id = ? WHERE id = ?")
                    .bind(version_id)
                    .bind(article_id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to update published pointer")?;
            }
            ArticleStatus::Archived => {
                sqlx::query("UPDATE articles SET archived_version_id = ? WHERE id = ?")
                    .bind(version_id)
                    .bind(article_id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to update archived pointer")?;

                sqlx::query(
                    r#"
                    UPDATE articles SET published_version_id = NULL
                    WHERE id = ? AND published_version_id = ?
                    "#,
                )
                .bind(article_id)
                .bind(version_id)
                .execute(&mut *tx)
                .await
                .context("Failed to clear published pointer")?;
            }
            // Rejected above, nothing precedes Draft
            ArticleStatus::Draft => {}
        }

        refresh_drafted_pointer(&mut tx, article_id).await?;

        sqlx::query("UPDATE articles SET updated_by = ?, updated_at = ? WHERE id = ?")
            .bind(updated_by)
            .bind(now)
            .bind(article_id)
            .execute(&mut *tx)
            .await
            .context("Failed to touch article")?;

        tx.commit().await.context("Failed to commit status change")?;

        Ok(Some(previous))
    }

    async fn delete_article(&self, article_id: i64) -> Result<bool> {
        let mut tx = self
            .pool
            .sqlite()
            .begin()
            .await
            .context("Failed to begin transaction")?;

        sqlx::query(
            r#"
            UPDATE articles
            SET published_version_id = NULL, drafted_version_id = NULL, archived_version_id = NULL
            WHERE id = ?
            "#,
        )
        .bind(article_id)
        .execute(&mut *tx)
        .await
        .context("Failed to clear article pointers")?;

        sqlx::query(
            r#"
            DELETE FROM article_version_tags
            WHERE article_version_id IN (SELECT id FROM article_versions WHERE article_id = ?)
            "#,
        )
        .bind(article_id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete article version tags")?;

        sqlx::query("DELETE FROM article_versions WHERE article_id = ?")
            .bind(article_id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete article versions")?;

        let deleted = sqlx::query("DELETE FROM articles WHERE id = ?")
            .bind(article_id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete article")?
            .rows_affected();

        tx.commit().await.context("Failed to commit article deletion")?;

        Ok(deleted > 0)
    }

    async fn update_article_version_relationship_score(
        &self,
        version_id: i64,
        score: f64,
    ) -> Result<bool> {
        let updated = sqlx::query("UPDATE article_versions SET relationship_score = ? WHERE id = ?")
            .bind(score)
            .bind(version_id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to update relationship score")?
            .rows_affected();

        Ok(updated > 0)
    }
}

// ============================================================================
// Transaction helpers
// ============================================================================

async fn insert_version(
    conn: &mut SqliteConnection,
    article_id: i64,
    version: &ArticleVersion,
) -> Result<i64> {
    let version_id = sqlx::query(
        r#"
        INSERT INTO article_versions
            (article_id, title, body, version, status, relationship_score,
             created_by, created_at, updated_by, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(article_id)
    .bind(&version.title)
    .bind(&version.body)
    .bind(version.version)
    .bind(version.status.as_i64())
    .bind(version.relationship_score)
    .bind(version.created_by)
    .bind(version.created_at)
    .bind(version.updated_by)
    .bind(version.updated_at)
    .execute(&mut *conn)
    .await
    .context("Failed to create article version")?
    .last_insert_rowid();

    insert_version_tags(conn, version_id, &version.tags).await?;

    Ok(version_id)
}

/// Point `drafted_version_id` at the highest-numbered Draft, or clear it
async fn refresh_drafted_pointer(conn: &mut SqliteConnection, article_id: i64) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE articles
        SET drafted_version_id = (
            SELECT id FROM article_versions
            WHERE article_id = ? AND status = ?
            ORDER BY version DESC
            LIMIT 1
        )
        WHERE id = ?
        "#,
    )
    .bind(article_id)
    .bind(ArticleStatus::Draft.as_i64())
    .bind(article_id)
    .execute(&mut *conn)
    .await
    .context("Failed to refresh drafted pointer")?;

    Ok(())
}

/// Article column pointing at the version holding `status`
fn pointer_column(status: ArticleStatus) -> &'static str {
    match status {
        ArticleStatus::Draft => "drafted_version_id",
        ArticleStatus::Published => "published_version_id",
        ArticleStatus::Archived => "archived_version_id",
    }
}

/// Escape LIKE wildcards so `search` matches literally
fn escape_like(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len());
    for c in search.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

async fn fetch_version_tags(conn: &mut SqliteConnection, version_id: i64) -> Result<Vec<String>> {
    sqlx::query_scalar(
        "SELECT tag_name FROM article_version_tags WHERE article_version_id = ? ORDER BY tag_name",
    )
    .bind(version_id)
    .fetch_all(&mut *conn)
    .await
    .context("Failed to get article version tags")
}

fn parse_status(value: i64) -> Result<ArticleStatus> {
    ArticleStatus::from_i64(value).ok_or_else(|| anyhow!("Invalid article status: {}", value))
}

fn row_to_article(row: &SqliteRow) -> Result<Article> {
    Ok(Article {
        id: row.get("id"),
        published_version_id: row.get("published_version_id"),
        drafted_version_id: row.get("drafted_version_id"),
        archived_version_id: row.get("archived_version_id"),
        version_sequence: row.get("version_sequence"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        updated_by: row.get("updated_by"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_version(row: &SqliteRow, tags: Vec<String>) -> Result<ArticleVersion> {
    Ok(ArticleVersion {
        id: row.get("id"),
        article_id: row.get("article_id"),
        title: row.get("title"),
        body: row.get("body"),
        version: row.get("version"),
        status: parse_status(row.get("status"))?,
        tags,
        relationship_score: row.get("relationship_score"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        updated_by: row.get("updated_by"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use crate::models::ArticleSortKey;

    async fn setup() -> (DynDatabasePool, SqlxArticleRepository) {
        let pool = create_test_pool()
            .await
            .expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxArticleRepository::new(pool.clone());
        (pool, repo)
    }

    fn draft(article_id: i64, version: i64, title: &str, tags: &[&str]) -> ArticleVersion {
        let tags: Vec<String> = tags.iter().map(|s| s.to_string()).collect();
        ArticleVersion::new_draft(
            article_id,
            version,
            title.to_string(),
            format!("{} body", title),
            &tags,
            Uuid::nil(),
        )
    }

    async fn article(repo: &SqlxArticleRepository, id: i64) -> Article {
        repo.get_article_with_id(id).await.unwrap().unwrap()
    }

    async fn status_of(repo: &SqlxArticleRepository, article_id: i64, version_id: i64) -> ArticleStatus {
        repo.get_article_version(article_id, version_id)
            .await
            .unwrap()
            .unwrap()
            .status
    }

    #[tokio::test]
    async fn test_create_article_sets_sequence_and_draft_pointer() {
        let (_pool, repo) = setup().await;

        let created = repo
            .create_article(&draft(0, 1, "First", &["go", "cms"]))
            .await
            .unwrap();

        let a = article(&repo, created.article_id).await;
        assert_eq!(a.version_sequence, 1);
        assert_eq!(a.drafted_version_id, Some(created.version_id));
        assert_eq!(a.published_version_id, None);
        assert_eq!(a.archived_version_id, None);

        let v = repo
            .get_article_version(created.article_id, created.version_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(v.version, 1);
        assert_eq!(v.status, ArticleStatus::Draft);
        assert_eq!(v.tags, vec!["cms".to_string(), "go".to_string()]);
        assert_eq!(v.title, "First");
    }

    #[tokio::test]
    async fn test_get_missing_rows_return_none() {
        let (_pool, repo) = setup().await;
        assert!(repo.get_article_with_id(42).await.unwrap().is_none());
        assert!(repo.get_article_version(42, 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_version_lookup_is_scoped_to_article() {
        let (_pool, repo) = setup().await;
        let a = repo.create_article(&draft(0, 1, "A", &[])).await.unwrap();
        let b = repo.create_article(&draft(0, 1, "B", &[])).await.unwrap();

        assert!(repo
            .get_article_version(a.article_id, b.version_id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_create_version_advances_sequence_and_moves_draft_pointer() {
        let (_pool, repo) = setup().await;
        let created = repo.create_article(&draft(0, 1, "v1", &["a"])).await.unwrap();

        let v2 = repo
            .create_article_version(&draft(created.article_id, 2, "v2", &["a", "b"]), 1)
            .await
            .unwrap()
            .expect("sequence should match");

        let a = article(&repo, created.article_id).await;
        assert_eq!(a.version_sequence, 2);
        assert_eq!(a.drafted_version_id, Some(v2));
    }

    #[tokio::test]
    async fn test_create_version_with_stale_sequence_writes_nothing() {
        let (_pool, repo) = setup().await;
        let created = repo.create_article(&draft(0, 1, "v1", &[])).await.unwrap();

        repo.create_article_version(&draft(created.article_id, 2, "v2", &[]), 1)
            .await
            .unwrap()
            .unwrap();
        let stale = repo
            .create_article_version(&draft(created.article_id, 2, "v2 again", &["x"]), 1)
            .await
            .unwrap();
        assert!(stale.is_none());

        let versions = repo
            .get_article_versions_with_statuses(created.article_id, &ArticleStatus::ALL)
            .await
            .unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(article(&repo, created.article_id).await.version_sequence, 2);
    }

    #[tokio::test]
    async fn test_publish_sets_pointer_and_recomputes_draft() {
        let (_pool, repo) = setup().await;
        let created = repo.create_article(&draft(0, 1, "v1", &[])).await.unwrap();
        let v2 = repo
            .create_article_version(&draft(created.article_id, 2, "v2", &[]), 1)
            .await
            .unwrap()
            .unwrap();

        // Publishing v2 leaves v1 as the only draft
        let previous = repo
            .update_article_status(created.article_id, v2, ArticleStatus::Published, Uuid::nil())
            .await
            .unwrap();
        assert_eq!(previous, Some(ArticleStatus::Draft));

        let a = article(&repo, created.article_id).await;
        assert_eq!(a.published_version_id, Some(v2));
        assert_eq!(a.drafted_version_id, Some(created.version_id));

        // Publishing v1 archives v2 and clears drafts
        repo.update_article_status(
            created.article_id,
            created.version_id,
            ArticleStatus::Published,
            Uuid::nil(),
        )
        .await
        .unwrap()
        .unwrap();

        let a = article(&repo, created.article_id).await;
        assert_eq!(a.published_version_id, Some(created.version_id));
        assert_eq!(a.archived_version_id, Some(v2));
        assert_eq!(a.drafted_version_id, None);
        assert_eq!(status_of(&repo, created.article_id, v2).await, ArticleStatus::Archived);
    }

    #[tokio::test]
    async fn test_archive_published_clears_published_pointer() {
        let (_pool, repo) = setup().await;
        let created = repo.create_article(&draft(0, 1, "v1", &[])).await.unwrap();
        let id = created.article_id;
        let v1 = created.version_id;

        repo.update_article_status(id, v1, ArticleStatus::Published, Uuid::nil())
            .await
            .unwrap()
            .unwrap();
        let previous = repo
            .update_article_status(id, v1, ArticleStatus::Archived, Uuid::nil())
            .await
            .unwrap();
        assert_eq!(previous, Some(ArticleStatus::Published));

        let a = article(&repo, id).await;
        assert_eq!(a.published_version_id, None);
        assert_eq!(a.archived_version_id, Some(v1));
    }

    #[tokio::test]
    async fn test_archive_draft_falls_back_to_highest_remaining_draft() {
        let (_pool, repo) = setup().await;
        let created = repo.create_article(&draft(0, 1, "v1", &[])).await.unwrap();
        let id = created.article_id;
        let v2 = repo
            .create_article_version(&draft(id, 2, "v2", &[]), 1)
            .await
            .unwrap()
            .unwrap();
        let v3 = repo
            .create_article_version(&draft(id, 3, "v3", &[]), 2)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(article(&repo, id).await.drafted_version_id, Some(v3));

        repo.update_article_status(id, v3, ArticleStatus::Archived, Uuid::nil())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(article(&repo, id).await.drafted_version_id, Some(v2));

        repo.update_article_status(id, v2, ArticleStatus::Archived, Uuid::nil())
            .await
            .unwrap()
            .unwrap();
        repo.update_article_status(id, created.version_id, ArticleStatus::Archived, Uuid::nil())
            .await
            .unwrap()
            .unwrap();

        let a = article(&repo, id).await;
        assert_eq!(a.drafted_version_id, None);
        assert_eq!(a.archived_version_id, Some(created.version_id));
    }

    #[tokio::test]
    async fn test_non_forward_transition_is_rejected_without_writes() {
        let (_pool, repo) = setup().await;
        let created = repo.create_article(&draft(0, 1, "v1", &[])).await.unwrap();
        let id = created.article_id;
        let v1 = created.version_id;

        assert!(repo
            .update_article_status(id, v1, ArticleStatus::Draft, Uuid::nil())
            .await
            .unwrap()
            .is_none());

        repo.update_article_status(id, v1, ArticleStatus::Archived, Uuid::nil())
            .await
            .unwrap()
            .unwrap();
        let before = article(&repo, id).await;

        assert!(repo
            .update_article_status(id, v1, ArticleStatus::Published, Uuid::nil())
            .await
            .unwrap()
            .is_none());
        assert_eq!(article(&repo, id).await, before);
        assert_eq!(status_of(&repo, id, v1).await, ArticleStatus::Archived);

        assert!(repo
            .update_article_status(id, 999, ArticleStatus::Published, Uuid::nil())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_versions_with_statuses_filters_and_orders() {
        let (_pool, repo) = setup().await;
        let created = repo.create_article(&draft(0, 1, "v1", &[])).await.unwrap();
        let id = created.article_id;
        let v2 = repo
            .create_article_version(&draft(id, 2, "v2", &["t"]), 1)
            .await
            .unwrap()
            .unwrap();
        repo.update_article_status(id, created.version_id, ArticleStatus::Published, Uuid::nil())
            .await
            .unwrap()
            .unwrap();

        let published = repo.get_article_versions_with_statuses(id, &[]).await.unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].id, created.version_id);

        let all = repo
            .get_article_versions_with_statuses(id, &ArticleStatus::ALL)
            .await
            .unwrap();
        assert_eq!(all.iter().map(|v| v.version).collect::<Vec<_>>(), vec![2, 1]);
        assert_eq!(all[0].id, v2);
        assert_eq!(all[0].tags, vec!["t".to_string()]);
    }

    #[tokio::test]
    async fn test_get_articles_returns_pointed_versions() {
        let (_pool, repo) = setup().await;

        // Article 1: v1 published, v2 drafted
        let first = repo.create_article(&draft(0, 1, "Rust in production", &["rust"])).await.unwrap();
        repo.update_article_status(first.article_id, first.version_id, ArticleStatus::Published, Uuid::nil())
            .await
            .unwrap()
            .unwrap();
        let first_v2 = repo
            .create_article_version(&draft(first.article_id, 2, "Rust in production, revised", &[]), 1)
            .await
            .unwrap()
            .unwrap();

        // Article 2: draft only
        let second = repo.create_article(&draft(0, 1, "Go notes", &[])).await.unwrap();

        let published = repo
            .get_articles(&ArticleListParams::default().normalized())
            .await
            .unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].id, first.version_id);
        assert_eq!(published[0].tags, vec!["rust".to_string()]);

        let drafts = repo
            .get_articles(
                &ArticleListParams::default()
                    .with_statuses([ArticleStatus::Draft])
                    .sorted_by(ArticleSortKey::ArticleId, SortDirection::Asc)
                    .normalized(),
            )
            .await
            .unwrap();
        let ids: Vec<i64> = drafts.iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![first_v2, second.version_id]);

        let both = repo
            .get_articles(
                &ArticleListParams::default()
                    .with_statuses([ArticleStatus::Draft, ArticleStatus::Published])
                    .normalized(),
            )
            .await
            .unwrap();
        assert_eq!(both.len(), 3);
    }

    #[tokio::test]
    async fn test_get_articles_filters_sorts_and_pages() {
        let (_pool, repo) = setup().await;
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        for (title, author) in [("Alpha 100%", alice), ("beta", bob), ("Gamma", alice), ("delta_x", bob)] {
            let mut version = draft(0, 1, title, &[]);
            version.created_by = author;
            version.updated_by = author;
            let created = repo.create_article(&version).await.unwrap();
            repo.update_article_status(created.article_id, created.version_id, ArticleStatus::Published, author)
                .await
                .unwrap()
                .unwrap();
        }

        let titles = |versions: &[ArticleVersion]| -> Vec<String> {
            versions.iter().map(|v| v.title.clone()).collect()
        };
        let by_title = ArticleListParams::default().sorted_by(ArticleSortKey::Title, SortDirection::Asc);

        let found = repo
            .get_articles(&by_title.clone().with_search("ALPHA").normalized())
            .await
            .unwrap();
        assert_eq!(titles(&found), vec!["Alpha 100%"]);

        // Wildcards in the search match literally
        let found = repo
            .get_articles(&by_title.clone().with_search("%").normalized())
            .await
            .unwrap();
        assert_eq!(titles(&found), vec!["Alpha 100%"]);
        let found = repo
            .get_articles(&by_title.clone().with_search("a_x").normalized())
            .await
            .unwrap();
        assert_eq!(titles(&found), vec!["delta_x"]);

        let mut params = by_title.clone();
        params.created_by = vec![alice];
        let found = repo.get_articles(&params.normalized()).await.unwrap();
        assert_eq!(titles(&found), vec!["Alpha 100%", "Gamma"]);

        let mut params = by_title.clone();
        params.updated_by = vec![bob];
        let found = repo.get_articles(&params.normalized()).await.unwrap();
        assert_eq!(titles(&found), vec!["beta", "delta_x"]);

        let desc = repo
            .get_articles(
                &ArticleListParams::default()
                    .sorted_by(ArticleSortKey::ArticleId, SortDirection::Desc)
                    .normalized(),
            )
            .await
            .unwrap();
        assert_eq!(titles(&desc), vec!["delta_x", "Gamma", "beta", "Alpha 100%"]);

        let page_two = repo
            .get_articles(&by_title.clone().paged(3, 2).normalized())
            .await
            .unwrap();
        assert_eq!(titles(&page_two), vec!["delta_x"]);

        let past_end = repo
            .get_articles(&by_title.paged(3, 5).normalized())
            .await
            .unwrap();
        assert!(past_end.is_empty());
    }

    #[tokio::test]
    async fn test_delete_article_removes_everything() {
        let (pool, repo) = setup().await;
        let created = repo.create_article(&draft(0, 1, "v1", &["go"])).await.unwrap();
        let id = created.article_id;
        repo.create_article_version(&draft(id, 2, "v2", &["go", "api"]), 1)
            .await
            .unwrap()
            .unwrap();

        assert!(repo.delete_article(id).await.unwrap());
        assert!(repo.get_article_with_id(id).await.unwrap().is_none());

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM article_version_tags")
            .fetch_one(pool.sqlite())
            .await
            .unwrap();
        assert_eq!(remaining, 0);

        assert!(!repo.delete_article(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_relationship_score() {
        let (_pool, repo) = setup().await;
        let created = repo.create_article(&draft(0, 1, "v1", &[])).await.unwrap();

        assert!(repo
            .update_article_version_relationship_score(created.version_id, 0.5)
            .await
            .unwrap());
        let v = repo
            .get_article_version(created.article_id, created.version_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(v.relationship_score, 0.5);

        assert!(!repo
            .update_article_version_relationship_score(999, 0.5)
            .await
            .unwrap());
    }
}
