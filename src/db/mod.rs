//! Database layer
//!
//! This module provides the SQLite-backed persistence used by Manuscript.
//!
//! # Usage
//!
//! ```ignore
//! use manuscript::config::DatabaseConfig;
//! use manuscript::db::{create_pool, migrations};
//!
//! let config = DatabaseConfig::default();
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{create_pool, create_test_pool, DatabasePool, DynDatabasePool, SqliteDatabase};
