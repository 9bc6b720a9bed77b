//! Article model
//!
//! This module provides:
//! - `Article` entity that owns a lineage of versions and the pointers into it
//! - `ArticleVersion` immutable snapshot of title/body/tags
//! - `ArticleStatus` ordered lifecycle state (Draft < Published < Archived)
//! - Input types for creating articles and new versions
//! - `ArticleListParams` filters, sorting and paging of article listings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::tag::SortDirection;

/// Article entity
///
/// Holds no content itself; title, body and tags live on its versions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Article {
    /// Unique identifier
    pub id: i64,
    /// Version currently published, if any
    pub published_version_id: Option<i64>,
    /// Latest draft version, if any
    pub drafted_version_id: Option<i64>,
    /// Most recently archived version, if any
    pub archived_version_id: Option<i64>,
    /// Highest version number ever assigned, never reused
    pub version_sequence: i64,
    /// Creator user ID
    pub created_by: Uuid,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last modifier user ID
    pub updated_by: Uuid,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// Article version entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArticleVersion {
    /// Unique identifier
    pub id: i64,
    /// Owning article ID
    pub article_id: i64,
    /// Version title
    pub title: String,
    /// Version body
    pub body: String,
    /// Version number, strictly increasing per article
    pub version: i64,
    /// Lifecycle status
    pub status: ArticleStatus,
    /// Tag names in canonical (sorted, de-duplicated) order
    #[serde(default)]
    pub tags: Vec<String>,
    /// Topical relationship score of the tag set, written by the relevance engine
    #[serde(default)]
    pub relationship_score: f64,
    /// Creator user ID
    pub created_by: Uuid,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last modifier user ID
    pub updated_by: Uuid,
    /// Last status change timestamp
    pub updated_at: Option<DateTime<Utc>>,
}

impl ArticleVersion {
    /// Create a new draft version.
    ///
    /// The ID will be set to 0 and should be assigned by the database.
    pub fn new_draft(
        article_id: i64,
        version: i64,
        title: String,
        body: String,
        tags: &[String],
        created_by: Uuid,
    ) -> Self {
        Self {
            id: 0,
            article_id,
            title,
            body,
            version,
            status: ArticleStatus::Draft,
            tags: canonical_tags(tags),
            relationship_score: 0.0,
            created_by,
            created_at: Utc::now(),
            updated_by: created_by,
            updated_at: None,
        }
    }

    /// Whether this version carries the same title, body and tag set
    pub fn same_content(&self, title: &str, body: &str, tags: &[String]) -> bool {
        self.title == title && self.body == body && canonical_tags(&self.tags) == canonical_tags(tags)
    }
}

/// Article version lifecycle status
///
/// Variants are declared in lifecycle order so the derived `Ord` is the
/// transition order: a version only ever moves to a greater status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    /// Draft - work in progress
    Draft,
    /// Published - visible to public
    Published,
    /// Archived - terminal
    Archived,
}

impl Default for ArticleStatus {
    fn default() -> Self {
        Self::Draft
    }
}

impl ArticleStatus {
    /// All statuses in lifecycle order
    pub const ALL: [ArticleStatus; 3] = [
        ArticleStatus::Draft,
        ArticleStatus::Published,
        ArticleStatus::Archived,
    ];

    /// Convert status to its stored ordinal
    pub fn as_i64(&self) -> i64 {
        match self {
            ArticleStatus::Draft => 0,
            ArticleStatus::Published => 1,
            ArticleStatus::Archived => 2,
        }
    }

    /// Parse status from its stored ordinal
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(ArticleStatus::Draft),
            1 => Some(ArticleStatus::Published),
            2 => Some(ArticleStatus::Archived),
            _ => None,
        }
    }

    /// Convert status to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Draft => "draft",
            ArticleStatus::Published => "published",
            ArticleStatus::Archived => "archived",
        }
    }

    /// Parse status from string representation
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(ArticleStatus::Draft),
            "published" => Some(ArticleStatus::Published),
            "archived" => Some(ArticleStatus::Archived),
            _ => None,
        }
    }
}

impl std::fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Sorted, de-duplicated copy of a tag list.
///
/// Tag names are case-sensitive; only exact duplicates collapse.
pub fn canonical_tags(tags: &[String]) -> Vec<String> {
    let mut tags = tags.to_vec();
    tags.sort();
    tags.dedup();
    tags
}

/// Input for creating a new article together with its first version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateArticleInput {
    /// Title of the first version
    pub title: String,
    /// Body of the first version
    pub body: String,
    /// Tags of the first version
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CreateArticleInput {
    /// Create a new CreateArticleInput
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            tags: Vec::new(),
        }
    }

    /// Set the tags
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Input for creating a new version of an existing article
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateVersionInput {
    /// Version to compare against; defaults to the drafted, then published version
    #[serde(default)]
    pub from_version_id: Option<i64>,
    /// New title
    pub title: String,
    /// New body
    pub body: String,
    /// New tags
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CreateVersionInput {
    /// Create a new CreateVersionInput
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            from_version_id: None,
            title: title.into(),
            body: body.into(),
            tags: Vec::new(),
        }
    }

    /// Compare against a specific version instead of the article's pointers
    pub fn from_version(mut self, version_id: i64) -> Self {
        self.from_version_id = Some(version_id);
        self
    }

    /// Set the tags
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// IDs produced by creating an article
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedArticle {
    pub article_id: i64,
    pub version_id: i64,
}

/// Article with the versions its pointers reference, as visible to a viewer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleDetail {
    #[serde(flatten)]
    pub article: Article,
    pub drafted_version: Option<ArticleVersion>,
    pub published_version: Option<ArticleVersion>,
}

/// Page size of an article listing when none is given
pub const DEFAULT_ARTICLE_PAGE_SIZE: u32 = 10;

/// Version column an article listing is sorted by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleSortKey {
    ArticleId,
    ArticleVersionId,
    CreatedBy,
    UpdatedBy,
    Title,
    Status,
    Version,
    #[default]
    CreatedAt,
    UpdatedAt,
    TagRelationshipScore,
}

impl ArticleSortKey {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "article_id" => Some(ArticleSortKey::ArticleId),
            "article_version_id" => Some(ArticleSortKey::ArticleVersionId),
            "created_by" => Some(ArticleSortKey::CreatedBy),
            "updated_by" => Some(ArticleSortKey::UpdatedBy),
            "title" => Some(ArticleSortKey::Title),
            "status" => Some(ArticleSortKey::Status),
            "version" => Some(ArticleSortKey::Version),
            "created_at" => Some(ArticleSortKey::CreatedAt),
            "updated_at" => Some(ArticleSortKey::UpdatedAt),
            "tag_relationship_score" => Some(ArticleSortKey::TagRelationshipScore),
            _ => None,
        }
    }

    /// Column of `article_versions` this key orders by
    pub fn column(&self) -> &'static str {
        match self {
            ArticleSortKey::ArticleId => "article_id",
            ArticleSortKey::ArticleVersionId => "id",
            ArticleSortKey::CreatedBy => "created_by",
            ArticleSortKey::UpdatedBy => "updated_by",
            ArticleSortKey::Title => "title",
            ArticleSortKey::Status => "status",
            ArticleSortKey::Version => "version",
            ArticleSortKey::CreatedAt => "created_at",
            ArticleSortKey::UpdatedAt => "updated_at",
            ArticleSortKey::TagRelationshipScore => "relationship_score",
        }
    }
}

/// Parameters for listing articles.
///
/// Each matching article contributes the version its pointer for a
/// requested status references. An empty `statuses` means Published, an
/// empty `sort` means newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleListParams {
    /// Case-insensitive title substring
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub statuses: Vec<ArticleStatus>,
    #[serde(default)]
    pub created_by: Vec<Uuid>,
    #[serde(default)]
    pub updated_by: Vec<Uuid>,
    #[serde(default)]
    pub sort: Vec<(ArticleSortKey, SortDirection)>,
    #[serde(default = "default_page_size")]
    pub limit: u32,
    /// One-based page number
    #[serde(default = "default_page")]
    pub page: u32,
}

impl Default for ArticleListParams {
    fn default() -> Self {
        Self {
            search: None,
            statuses: Vec::new(),
            created_by: Vec::new(),
            updated_by: Vec::new(),
            sort: Vec::new(),
            limit: default_page_size(),
            page: default_page(),
        }
    }
}

fn default_page_size() -> u32 {
    DEFAULT_ARTICLE_PAGE_SIZE
}

fn default_page() -> u32 {
    1
}

impl ArticleListParams {
    pub fn with_statuses<I>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = ArticleStatus>,
    {
        self.statuses = statuses.into_iter().collect();
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn sorted_by(mut self, key: ArticleSortKey, direction: SortDirection) -> Self {
        self.sort.push((key, direction));
        self
    }

    pub fn paged(mut self, limit: u32, page: u32) -> Self {
        self.limit = limit;
        self.page = page;
        self
    }

    /// Fill defaults and drop blank or repeated values.
    ///
    /// A zero limit becomes the default page size and a zero page the first.
    pub fn normalized(mut self) -> Self {
        self.search = self
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        self.statuses.sort();
        self.statuses.dedup();
        if self.statuses.is_empty() {
            self.statuses.push(ArticleStatus::Published);
        }

        if self.sort.is_empty() {
            self.sort.push((ArticleSortKey::CreatedAt, SortDirection::Desc));
        }
        if self.limit == 0 {
            self.limit = DEFAULT_ARTICLE_PAGE_SIZE;
        }
        self.page = self.page.max(1);
        self
    }

    /// Rows skipped before this page
    pub fn offset(&self) -> u64 {
        u64::from(self.limit) * u64::from(self.page.saturating_sub(1))
    }
}
