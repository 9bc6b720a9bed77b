//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the persistence of a specific entity.

pub mod article;
pub mod tag;

pub use article::{ArticleRepository, SqlxArticleRepository};
pub use tag::{SqlxTagRepository, TagRepository};
