//! Tag model
//!
//! This module defines the Tag entity and the derived relevance types:
//! - `TagUsage` usage statistics cached by the relevance engine
//! - `TagPair` unordered pair of tag names used as co-occurrence key
//! - `TagWithUsage` and the sorting parameters for tag listings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Tag entity. The name is the unique key and is case-sensitive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    /// Tag name
    pub name: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Association between a tag and an article version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleVersionTag {
    pub tag_name: String,
    pub article_version_id: i64,
}

impl ArticleVersionTag {
    pub fn new(tag_name: impl Into<String>, article_version_id: i64) -> Self {
        Self {
            tag_name: tag_name.into(),
            article_version_id,
        }
    }
}

/// Usage statistics of a tag over published versions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagUsage {
    /// Number of tag / published-version associations
    pub count: i64,
    /// Latest creation time among the associated published versions
    pub last_used: Option<DateTime<Utc>>,
    /// Recency-gated popularity, derived and never persisted
    #[serde(default)]
    pub trending_score: f64,
}

/// Unordered pair of tag names.
///
/// The constructor stores the names in ascending order so `("a", "b")` and
/// `("b", "a")` are the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TagPair(String, String);

impl TagPair {
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Self {
        let (a, b) = (a.into(), b.into());
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }

    pub fn first(&self) -> &str {
        &self.0
    }

    pub fn second(&self) -> &str {
        &self.1
    }
}

/// Tag joined with its cached usage, as returned by tag listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagWithUsage {
    pub name: String,
    pub usage_count: i64,
    pub trending_score: f64,
    pub last_used: Option<DateTime<Utc>>,
}

impl TagWithUsage {
    /// Build a listing row; tags without cached usage report zeros
    pub fn new(name: String, usage: Option<&TagUsage>) -> Self {
        match usage {
            Some(usage) => Self {
                name,
                usage_count: usage.count,
                trending_score: usage.trending_score,
                last_used: usage.last_used,
            },
            None => Self {
                name,
                usage_count: 0,
                trending_score: 0.0,
                last_used: None,
            },
        }
    }
}

/// Field a tag listing is sorted by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagSortKey {
    #[default]
    UsageCount,
    TrendingScore,
    Name,
    LastUsed,
}

impl TagSortKey {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "usage_count" => Some(TagSortKey::UsageCount),
            "trending_score" => Some(TagSortKey::TrendingScore),
            "name" => Some(TagSortKey::Name),
            "last_used" => Some(TagSortKey::LastUsed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TagSortKey::UsageCount => "usage_count",
            TagSortKey::TrendingScore => "trending_score",
            TagSortKey::Name => "name",
            TagSortKey::LastUsed => "last_used",
        }
    }

    /// Compare two listing rows by this key in ascending order
    pub fn compare(&self, a: &TagWithUsage, b: &TagWithUsage) -> Ordering {
        match self {
            TagSortKey::UsageCount => a.usage_count.cmp(&b.usage_count),
            TagSortKey::TrendingScore => a.trending_score.total_cmp(&b.trending_score),
            TagSortKey::Name => a.name.cmp(&b.name),
            // never-used tags sort as the oldest
            TagSortKey::LastUsed => a.last_used.cmp(&b.last_used),
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }
}

/// Parameters for listing tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TagListParams {
    #[serde(default)]
    pub sort: TagSortKey,
    #[serde(default)]
    pub direction: SortDirection,
}

impl TagListParams {
    pub fn new(sort: TagSortKey, direction: SortDirection) -> Self {
        Self { sort, direction }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_pair_is_unordered() {
        assert_eq!(TagPair::new("go", "cms"), TagPair::new("cms", "go"));
        let pair = TagPair::new("go", "cms");
        assert_eq!(pair.first(), "cms");
        assert_eq!(pair.second(), "go");
    }

    #[test]
    fn test_tag_pair_is_case_sensitive() {
        assert_ne!(TagPair::new("Go", "cms"), TagPair::new("go", "cms"));
    }

    #[test]
    fn test_tag_with_usage_defaults_for_unused_tag() {
        let row = TagWithUsage::new("rust".to_string(), None);
        assert_eq!(row.usage_count, 0);
        assert_eq!(row.trending_score, 0.0);
        assert!(row.last_used.is_none());
    }

    #[test]
    fn test_sort_key_parsing() {
        for key in [
            TagSortKey::UsageCount,
            TagSortKey::TrendingScore,
            TagSortKey::Name,
            TagSortKey::LastUsed,
        ] {
            assert_eq!(TagSortKey::from_str(key.as_str()), Some(key));
        }
        assert_eq!(TagSortKey::from_str("popularity"), None);
        assert_eq!(SortDirection::from_str("ASC"), Some(SortDirection::Asc));
        assert_eq!(SortDirection::from_str("sideways"), None);
    }

    #[test]
    fn test_last_used_orders_never_used_first() {
        let never = TagWithUsage::new("a".to_string(), None);
        let used = TagWithUsage::new(
            "b".to_string(),
            Some(&TagUsage {
                count: 1,
                last_used: Some(Utc::now()),
                trending_score: 0.0,
            }),
        );
        assert_eq!(TagSortKey::LastUsed.compare(&never, &used), Ordering::Less);
    }
}
