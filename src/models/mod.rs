//! Data models
//!
//! This module contains the data structures used throughout Manuscript:
//! - Persisted entities (Article, ArticleVersion, Tag)
//! - Derived relevance values (TagUsage, TagPair)
//! - The role policy consulted for authorization
//! - Service input/output types

mod article;
mod role;
mod tag;

pub use article::{
    canonical_tags, Article, ArticleDetail, ArticleListParams, ArticleSortKey, ArticleStatus,
    ArticleVersion, CreateArticleInput, CreateVersionInput, CreatedArticle,
    DEFAULT_ARTICLE_PAGE_SIZE,
};
pub use role::{Author, Permission, Role, RolePolicy};
pub use tag::{
    ArticleVersionTag, SortDirection, Tag, TagListParams, TagPair, TagSortKey, TagUsage,
    TagWithUsage,
};
