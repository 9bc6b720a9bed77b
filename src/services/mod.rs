//! Services layer - Business logic
//!
//! This module contains the business logic of Manuscript:
//! - `article`: version lifecycle, permissions and relevance triggers
//! - `tag`: tag creation and usage-sorted listing
//! - `relevance`: the background engine maintaining tag statistics

pub mod article;
pub mod relevance;
pub mod tag;

pub use article::{ArticleService, ArticleServiceError};
pub use relevance::{EngineTask, RelevanceError, TagAction, TagRelevanceEngine};
pub use tag::{TagService, TagServiceError};
