//! Database migrations module
//!
//! Code-based migrations embedded as SQL strings. Each migration runs inside
//! its own transaction together with its `_migrations` bookkeeping row, so a
//! failed migration leaves no partial schema behind.
//!
//! # Usage
//!
//! ```ignore
//! use manuscript::db::{create_pool, migrations};
//!
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::Row;

use super::DynDatabasePool;

/// A database migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (must be unique and sequential)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements
    pub up: &'static str,
}

/// Migration record stored in the database
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// All migrations, in application order.
///
/// Version pointers on `articles` carry no foreign key: `article_versions`
/// already references `articles`, and the pointers are maintained by the
/// repository inside the same transactions that move statuses.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_articles",
        up: r#"
            CREATE TABLE IF NOT EXISTS articles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                published_version_id INTEGER,
                drafted_version_id INTEGER,
                archived_version_id INTEGER,
                version_sequence INTEGER NOT NULL DEFAULT 0,
                created_by BLOB NOT NULL,
                created_at TIMESTAMP NOT NULL,
                updated_by BLOB NOT NULL,
                updated_at TIMESTAMP NOT NULL
            );
        "#,
    },
    Migration {
        version: 2,
        name: "create_article_versions",
        up: r#"
            CREATE TABLE IF NOT EXISTS article_versions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                article_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                body TEXT NOT NULL,
                version INTEGER NOT NULL,
                status INTEGER NOT NULL DEFAULT 0,
                relationship_score REAL NOT NULL DEFAULT 0,
                created_by BLOB NOT NULL,
                created_at TIMESTAMP NOT NULL,
                updated_by BLOB NOT NULL,
                updated_at TIMESTAMP,
                UNIQUE (article_id, version),
                FOREIGN KEY (article_id) REFERENCES articles(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_article_versions_article_status
                ON article_versions(article_id, status);
            CREATE INDEX IF NOT EXISTS idx_article_versions_status
                ON article_versions(status);
        "#,
    },
    Migration {
        version: 3,
        name: "create_tags",
        up: r#"
            CREATE TABLE IF NOT EXISTS tags (
                name TEXT PRIMARY KEY,
                created_at TIMESTAMP NOT NULL
            );
            CREATE TABLE IF NOT EXISTS article_version_tags (
                article_version_id INTEGER NOT NULL,
                tag_name TEXT NOT NULL,
                PRIMARY KEY (article_version_id, tag_name),
                FOREIGN KEY (article_version_id) REFERENCES article_versions(id) ON DELETE CASCADE,
                FOREIGN KEY (tag_name) REFERENCES tags(name)
            );
            CREATE INDEX IF NOT EXISTS idx_article_version_tags_tag
                ON article_version_tags(tag_name);
        "#,
    },
];

/// Run all pending migrations, returning how many were applied
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = get_applied_migrations(pool).await?;
    let applied_versions: Vec<i32> = applied.iter().map(|m| m.version as i32).collect();

    let mut count = 0;

    for migration in MIGRATIONS {
        if !applied_versions.contains(&migration.version) {
            tracing::info!(
                "Applying migration {}: {}",
                migration.version,
                migration.name
            );
            apply_migration(pool, migration)
                .await
                .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

/// Create the migrations tracking table if it doesn't exist
async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    pool.execute(
        r#"
        CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name VARCHAR(255) NOT NULL UNIQUE,
            applied_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .await?;
    Ok(())
}

/// Get list of already applied migrations
async fn get_applied_migrations(pool: &DynDatabasePool) -> Result<Vec<MigrationRecord>> {
    let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
        .fetch_all(pool.sqlite())
        .await
        .context("Failed to read applied migrations")?;

    let mut records = Vec::new();
    for row in rows {
        records.push(MigrationRecord {
            version: row.get("version"),
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        });
    }

    Ok(records)
}

/// Apply a single migration
async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    let mut tx = pool.sqlite().begin().await?;

    for statement in split_sql_statements(migration.up) {
        sqlx::query(statement)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }

    sqlx::query("INSERT INTO _migrations (version, name, applied_at) VALUES (?, ?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

/// Truncate SQL for error messages
fn truncate_sql(sql: &str) -> String {
    if sql.len() > 100 {
        let mut end = 100;
        while !sql.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &sql[..end])
    } else {
        sql.to_string()
    }
}

/// Split SQL into individual statements, handling comments properly
fn split_sql_statements(sql: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut current_start = 0;
    let mut in_statement = false;

    for (i, c) in sql.char_indices() {
        match c {
            ';' => {
                if in_statement {
                    let stmt = sql[current_start..i].trim();
                    if !stmt.is_empty() && !is_comment_only(stmt) {
                        statements.push(stmt);
                    }
                    in_statement = false;
                }
                current_start = i + 1;
            }
            _ if !c.is_whitespace() && !in_statement => {
                current_start = i;
                in_statement = true;
            }
            _ => {}
        }
    }

    // Last statement without trailing semicolon
    if in_statement {
        let stmt = sql[current_start..].trim();
        if !stmt.is_empty() && !is_comment_only(stmt) {
            statements.push(stmt);
        }
    }

    statements
}

/// Check if a string contains only SQL comments
fn is_comment_only(s: &str) -> bool {
    s.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

/// Check if migrations are up to date
pub async fn is_up_to_date(pool: &DynDatabasePool) -> Result<bool> {
    create_migrations_table(pool).await?;
    let applied = get_applied_migrations(pool).await?;
    Ok(applied.len() == MIGRATIONS.len())
}
