//! Tag service
//!
//! Implements business logic for tag management:
//! - Idempotent tag creation, followed by a relevance recompute
//! - Tag listing joined with the cached usage statistics

use crate::db::repositories::TagRepository;
use crate::models::{canonical_tags, SortDirection, TagListParams, TagWithUsage};
use crate::services::relevance::{TagAction, TagRelevanceEngine};
use anyhow::Context;
use std::sync::Arc;

/// Error types for tag service operations
#[derive(Debug, thiserror::Error)]
pub enum TagServiceError {
    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Internal error, displayed with its whole cause chain
    #[error("{0:#}")]
    InternalError(#[from] anyhow::Error),
}

/// Tag service
pub struct TagService {
    repo: Arc<dyn TagRepository>,
    engine: Arc<TagRelevanceEngine>,
}

impl TagService {
    /// Create a new tag service
    ///
    /// # Arguments
    /// * `repo` - Tag repository for database operations
    /// * `engine` - Relevance engine providing usage statistics
    pub fn new(repo: Arc<dyn TagRepository>, engine: Arc<TagRelevanceEngine>) -> Self {
        Self { repo, engine }
    }

    /// Create every tag in `names` that does not exist yet.
    ///
    /// Names are trimmed and de-duplicated. Existing tags are left untouched.
    ///
    /// # Errors
    /// - `ValidationError` if `names` is empty or any name is blank
    pub async fn create_tags(&self, names: &[String]) -> Result<Vec<String>, TagServiceError> {
        if names.is_empty() {
            return Err(TagServiceError::ValidationError(
                "At least one tag name is required".to_string(),
            ));
        }

        let trimmed: Vec<String> = names.iter().map(|n| n.trim().to_string()).collect();
        if trimmed.iter().any(|n| n.is_empty()) {
            return Err(TagServiceError::ValidationError(
                "Tag name cannot be empty".to_string(),
            ));
        }

        let names = canonical_tags(&trimmed);
        self.repo
            .upsert_tags(&names)
            .await
            .context("Failed to create tags")?;

        tracing::info!(count = names.len(), "Created tags");
        self.engine.trigger(TagAction::RecomputeUsageAndPairs);

        Ok(names)
    }

    /// List all tags with their cached usage, sorted per `params`.
    ///
    /// Tags without cached usage report zeros. Equal sort keys fall back to
    /// ascending name order regardless of direction.
    pub async fn list_tags(
        &self,
        params: TagListParams,
    ) -> Result<Vec<TagWithUsage>, TagServiceError> {
        let names = self
            .repo
            .list_tag_names()
            .await
            .context("Failed to list tags")?;
        let usage = self
            .engine
            .tag_usage_snapshot()
            .await
            .context("Failed to read tag usage")?;

        let mut tags: Vec<TagWithUsage> = names
            .into_iter()
            .map(|name| {
                let found = usage.get(&name);
                TagWithUsage::new(name, found)
            })
            .collect();

        tags.sort_by(|a, b| {
            let ordering = params.sort.compare(a, b);
            let ordering = match params.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            ordering.then_with(|| a.name.cmp(&b.name))
        });

        Ok(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelevanceConfig;
    use crate::db::repositories::{ArticleRepository, SqlxArticleRepository, SqlxTagRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{ArticleStatus, ArticleVersion, TagSortKey};
    use crate::services::relevance::EngineTask;
    use uuid::Uuid;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    async fn setup_test_service() -> (
        Arc<dyn ArticleRepository>,
        Arc<TagRelevanceEngine>,
        EngineTask,
        TagService,
    ) {
        let pool = create_test_pool()
            .await
            .expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let articles = SqlxArticleRepository::boxed(pool.clone());
        let tags = SqlxTagRepository::boxed(pool);
        let config = RelevanceConfig {
            refresh_interval_secs: 3600,
            recompute_timeout_secs: 5,
            ..RelevanceConfig::default()
        };
        let (engine, task) =
            TagRelevanceEngine::start(articles.clone(), tags.clone(), config).await;
        let service = TagService::new(tags, engine.clone());

        (articles, engine, task, service)
    }

    async fn publish(articles: &Arc<dyn ArticleRepository>, tags: &[&str]) {
        let version = ArticleVersion::new_draft(
            0,
            1,
            "Title".to_string(),
            "Body".to_string(),
            &strings(tags),
            Uuid::nil(),
        );
        let created = articles.create_article(&version).await.unwrap();
        articles
            .update_article_status(
                created.article_id,
                created.version_id,
                ArticleStatus::Published,
                Uuid::nil(),
            )
            .await
            .unwrap()
            .unwrap();
    }

    fn names(tags: &[TagWithUsage]) -> Vec<&str> {
        tags.iter().map(|t| t.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_create_tags_rejects_empty_input() {
        let (_, _, task, service) = setup_test_service().await;

        let result = service.create_tags(&[]).await;
        assert!(matches!(result, Err(TagServiceError::ValidationError(_))));

        let result = service.create_tags(&strings(&["rust", "  "])).await;
        assert!(matches!(result, Err(TagServiceError::ValidationError(_))));

        let listed = service.list_tags(TagListParams::default()).await.unwrap();
        assert!(listed.is_empty());

        task.shutdown().await;
    }

    #[tokio::test]
    async fn test_internal_error_message_keeps_database_cause() {
        let pool = create_test_pool()
            .await
            .expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let articles = SqlxArticleRepository::boxed(pool.clone());
        let tags = SqlxTagRepository::boxed(pool.clone());
        let (engine, task) =
            TagRelevanceEngine::start(articles, tags.clone(), RelevanceConfig::default()).await;
        let service = TagService::new(tags, engine);

        pool.execute("DROP TABLE article_version_tags").await.unwrap();
        pool.execute("DROP TABLE tags").await.unwrap();

        let err = service.create_tags(&strings(&["rust"])).await.unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Failed to create tags"), "{message}");
        assert!(message.contains("no such table: tags"), "{message}");

        task.shutdown().await;
    }

    #[tokio::test]
    async fn test_create_tags_is_idempotent() {
        let (_, _, task, service) = setup_test_service().await;

        let created = service
            .create_tags(&strings(&[" rust ", "go", "rust"]))
            .await
            .unwrap();
        assert_eq!(created, strings(&["go", "rust"]));

        service.create_tags(&strings(&["go"])).await.unwrap();

        let listed = service.list_tags(TagListParams::default()).await.unwrap();
        assert_eq!(names(&listed), vec!["go", "rust"]);
        assert!(listed.iter().all(|t| t.usage_count == 0 && t.last_used.is_none()));

        task.shutdown().await;
    }

    #[tokio::test]
    async fn test_list_tags_sorted_by_usage() {
        let (articles, engine, task, service) = setup_test_service().await;
        publish(&articles, &["go", "cms"]).await;
        publish(&articles, &["go", "api"]).await;
        publish(&articles, &["go", "cms"]).await;
        service.create_tags(&strings(&["unused"])).await.unwrap();
        engine.recompute_usage_and_pairs().await.unwrap();

        let desc = service.list_tags(TagListParams::default()).await.unwrap();
        assert_eq!(names(&desc), vec!["go", "cms", "api", "unused"]);
        assert_eq!(desc[0].usage_count, 3);
        assert_eq!(desc[3].trending_score, 0.0);

        let asc = service
            .list_tags(TagListParams::new(TagSortKey::UsageCount, SortDirection::Asc))
            .await
            .unwrap();
        assert_eq!(names(&asc), vec!["unused", "api", "cms", "go"]);

        let by_name = service
            .list_tags(TagListParams::new(TagSortKey::Name, SortDirection::Desc))
            .await
            .unwrap();
        assert_eq!(names(&by_name), vec!["unused", "go", "cms", "api"]);

        task.shutdown().await;
    }

    #[tokio::test]
    async fn test_list_tags_ties_break_by_name() {
        let (articles, engine, task, service) = setup_test_service().await;
        publish(&articles, &["b", "a", "c"]).await;
        engine.recompute_usage_and_pairs().await.unwrap();

        for direction in [SortDirection::Asc, SortDirection::Desc] {
            let listed = service
                .list_tags(TagListParams::new(TagSortKey::TrendingScore, direction))
                .await
                .unwrap();
            assert_eq!(names(&listed), vec!["a", "b", "c"]);
        }

        task.shutdown().await;
    }
}
