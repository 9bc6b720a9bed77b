//! Article service
//!
//! Implements the article version lifecycle:
//! - Create articles and new versions, rejecting unchanged content
//! - Forward-only status transitions (Draft -> Published -> Archived)
//! - Permission checks against the role policy
//! - Corpus-wide listing with search, author filters, sorting and paging
//! - Relevance engine triggers after every change to the tag corpus
//!
//! The repository keeps the article pointers consistent inside its
//! transactions. This layer validates requests up front and turns a
//! transaction that found the data already changed into `Conflict`.

use crate::db::repositories::ArticleRepository;
use crate::models::{
    canonical_tags, ArticleDetail, ArticleListParams, ArticleStatus, ArticleVersion, Author,
    CreateArticleInput, CreateVersionInput, CreatedArticle, Permission, RolePolicy,
};
use crate::services::relevance::{TagAction, TagRelevanceEngine};
use anyhow::Context;
use std::sync::Arc;

/// Error types for article service operations
#[derive(Debug, thiserror::Error)]
pub enum ArticleServiceError {
    /// Article or version not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The acting role lacks the required permission
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The data changed while the request was being applied
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal error, displayed with its whole cause chain
    #[error("{0:#}")]
    InternalError(#[from] anyhow::Error),
}

/// Article service
pub struct ArticleService {
    repo: Arc<dyn ArticleRepository>,
    engine: Arc<TagRelevanceEngine>,
    policy: Arc<RolePolicy>,
}

impl ArticleService {
    /// Create a new article service
    ///
    /// # Arguments
    /// * `repo` - Article repository for database operations
    /// * `engine` - Relevance engine notified when the tag corpus changes
    /// * `policy` - Role table used to authorize every operation
    pub fn new(
        repo: Arc<dyn ArticleRepository>,
        engine: Arc<TagRelevanceEngine>,
        policy: Arc<RolePolicy>,
    ) -> Self {
        Self {
            repo,
            engine,
            policy,
        }
    }

    /// Create an article with its first Draft version
    ///
    /// # Errors
    /// - `Forbidden` if the author may not create articles
    /// - `ValidationError` if the title, body or a tag is blank
    pub async fn create_article(
        &self,
        input: CreateArticleInput,
        author: &Author,
    ) -> Result<CreatedArticle, ArticleServiceError> {
        self.authorize(author, Permission::CreateArticle)?;
        let tags = validate_content(&input.title, &input.body, &input.tags)?;

        let version = ArticleVersion::new_draft(0, 1, input.title, input.body, &tags, author.id);
        let created = self
            .repo
            .create_article(&version)
            .await
            .context("Failed to create article")?;

        tracing::info!(
            article_id = created.article_id,
            version_id = created.version_id,
            "Created article"
        );
        self.engine.trigger(TagAction::RecomputeUsageAndPairs);

        Ok(created)
    }

    /// Create the next Draft version of an article.
    ///
    /// The new content is compared against `from_version_id` when given, else
    /// the drafted version, else the published one, and must differ from it
    /// in title, body or tag set.
    ///
    /// # Errors
    /// - `Forbidden` if the author may not create articles
    /// - `NotFound` if the article or the comparison version does not exist
    /// - `ValidationError` for blank fields or unchanged content
    /// - `Conflict` if another version was created concurrently
    pub async fn create_new_version(
        &self,
        article_id: i64,
        input: CreateVersionInput,
        author: &Author,
    ) -> Result<i64, ArticleServiceError> {
        self.authorize(author, Permission::CreateArticle)?;
        let tags = validate_content(&input.title, &input.body, &input.tags)?;

        let article = self
            .repo
            .get_article_with_id(article_id)
            .await
            .context("Failed to get article")?
            .ok_or_else(|| ArticleServiceError::NotFound(format!("article {}", article_id)))?;

        let compare_id = input
            .from_version_id
            .or(article.drafted_version_id)
            .or(article.published_version_id);

        if let Some(compare_id) = compare_id {
            let base = self
                .repo
                .get_article_version(article_id, compare_id)
                .await
                .context("Failed to get comparison version")?
                .ok_or_else(|| {
                    ArticleServiceError::NotFound(format!(
                        "version {} of article {}",
                        compare_id, article_id
                    ))
                })?;

            if base.same_content(&input.title, &input.body, &tags) {
                return Err(ArticleServiceError::ValidationError(format!(
                    "New version is identical to version {}",
                    base.version
                )));
            }
        }

        let version = ArticleVersion::new_draft(
            article_id,
            article.version_sequence + 1,
            input.title,
            input.body,
            &tags,
            author.id,
        );

        let version_id = self
            .repo
            .create_article_version(&version, article.version_sequence)
            .await
            .context("Failed to create article version")?
            .ok_or_else(|| {
                ArticleServiceError::Conflict(format!(
                    "article {} received another version concurrently",
                    article_id
                ))
            })?;

        tracing::info!(
            article_id,
            version_id,
            version = version.version,
            "Created article version"
        );
        self.engine
            .trigger(TagAction::RecomputeVersionRelationshipScore {
                article_version_id: version_id,
                tags: version.tags,
            });

        Ok(version_id)
    }

    /// Move a version forward in its lifecycle
    ///
    /// # Errors
    /// - `Forbidden` if the author may not change statuses
    /// - `NotFound` if the version does not belong to the article
    /// - `ValidationError` if `status` is the current status or an earlier one
    /// - `Conflict` if the version was transitioned concurrently
    pub async fn update_status(
        &self,
        article_id: i64,
        version_id: i64,
        status: ArticleStatus,
        author: &Author,
    ) -> Result<(), ArticleServiceError> {
        self.authorize(author, Permission::UpdateStatusArticle)?;

        let version = self.find_version(article_id, version_id).await?;
        if status == version.status {
            return Err(ArticleServiceError::ValidationError(format!(
                "Version is already {}",
                status
            )));
        }
        if status < version.status {
            return Err(ArticleServiceError::ValidationError(format!(
                "Cannot move a {} version back to {}",
                version.status, status
            )));
        }

        let previous = self
            .repo
            .update_article_status(article_id, version_id, status, author.id)
            .await
            .context("Failed to update article status")?
            .ok_or_else(|| {
                ArticleServiceError::Conflict(format!(
                    "version {} changed status concurrently",
                    version_id
                ))
            })?;

        tracing::info!(
            article_id,
            version_id,
            from = %previous,
            to = %status,
            "Updated article version status"
        );

        match status {
            ArticleStatus::Published => {
                self.engine.trigger(TagAction::RecomputeUsageAndPairs);
                self.engine
                    .trigger(TagAction::RecomputeVersionRelationshipScore {
                        article_version_id: version_id,
                        tags: version.tags,
                    });
            }
            ArticleStatus::Archived if previous == ArticleStatus::Published => {
                self.engine.trigger(TagAction::RecomputeUsageAndPairs);
            }
            _ => {}
        }

        Ok(())
    }

    /// Delete an article and all its versions
    ///
    /// # Errors
    /// - `Forbidden` if the author may not delete articles
    /// - `NotFound` if the article does not exist
    pub async fn delete_article(
        &self,
        article_id: i64,
        author: &Author,
    ) -> Result<(), ArticleServiceError> {
        self.authorize(author, Permission::DeleteArticle)?;

        let deleted = self
            .repo
            .delete_article(article_id)
            .await
            .context("Failed to delete article")?;
        if !deleted {
            return Err(ArticleServiceError::NotFound(format!("article {}", article_id)));
        }

        tracing::info!(article_id, "Deleted article");
        self.engine.trigger(TagAction::RecomputeUsageAndPairs);

        Ok(())
    }

    /// Get an article with the versions its pointers reference.
    ///
    /// The drafted version is only included for viewers who may read drafts.
    /// An anonymous `viewer` sees published content only.
    ///
    /// # Errors
    /// - `NotFound` if the article does not exist
    /// - `ValidationError` if no referenced version is visible to the viewer
    pub async fn get_article(
        &self,
        article_id: i64,
        viewer: Option<&Author>,
    ) -> Result<ArticleDetail, ArticleServiceError> {
        let article = self
            .repo
            .get_article_with_id(article_id)
            .await
            .context("Failed to get article")?
            .ok_or_else(|| ArticleServiceError::NotFound(format!("article {}", article_id)))?;

        let published_version = match article.published_version_id {
            Some(id) => self.load_version(article_id, id).await?,
            None => None,
        };

        let drafted_version = match article.drafted_version_id {
            Some(id) if self.can(viewer, Permission::ReadDraftedArticle) => {
                self.load_version(article_id, id).await?
            }
            _ => None,
        };

        if published_version.is_none() && drafted_version.is_none() {
            let reason = if article.drafted_version_id.is_some() {
                "Article has no published version"
            } else {
                "Article has no published or drafted version"
            };
            return Err(ArticleServiceError::ValidationError(reason.to_string()));
        }

        Ok(ArticleDetail {
            article,
            drafted_version,
            published_version,
        })
    }

    /// Get one version, subject to the viewer's read permissions
    ///
    /// # Errors
    /// - `NotFound` if the version does not belong to the article
    /// - `Forbidden` for Draft or Archived versions the viewer may not read
    pub async fn get_article_version(
        &self,
        article_id: i64,
        version_id: i64,
        viewer: Option<&Author>,
    ) -> Result<ArticleVersion, ArticleServiceError> {
        let version = self.find_version(article_id, version_id).await?;

        let required = match version.status {
            ArticleStatus::Published => None,
            ArticleStatus::Draft => Some(Permission::ReadDraftedArticle),
            ArticleStatus::Archived => Some(Permission::ReadArchivedArticle),
        };
        if let Some(permission) = required {
            if !self.can(viewer, permission) {
                return Err(ArticleServiceError::Forbidden(format!(
                    "{} versions require {}",
                    version.status, permission
                )));
            }
        }

        Ok(version)
    }

    /// List the versions of an article the viewer may read, newest first
    ///
    /// # Errors
    /// - `NotFound` if the article does not exist
    pub async fn list_versions(
        &self,
        article_id: i64,
        viewer: Option<&Author>,
    ) -> Result<Vec<ArticleVersion>, ArticleServiceError> {
        let exists = self
            .repo
            .get_article_with_id(article_id)
            .await
            .context("Failed to get article")?
            .is_some();
        if !exists {
            return Err(ArticleServiceError::NotFound(format!("article {}", article_id)));
        }

        let mut statuses = vec![ArticleStatus::Published];
        if self.can(viewer, Permission::ReadDraftedArticle) {
            statuses.push(ArticleStatus::Draft);
        }
        if self.can(viewer, Permission::ReadArchivedArticle) {
            statuses.push(ArticleStatus::Archived);
        }

        let versions = self
            .repo
            .get_article_versions_with_statuses(article_id, &statuses)
            .await
            .context("Failed to list article versions")?;
        Ok(versions)
    }

    /// List articles across the corpus, one row per referenced version.
    ///
    /// Requested statuses the viewer may not read are dropped. When none
    /// remain the listing falls back to Published.
    pub async fn list_articles(
        &self,
        mut params: ArticleListParams,
        viewer: Option<&Author>,
    ) -> Result<Vec<ArticleVersion>, ArticleServiceError> {
        params.statuses.retain(|status| match status {
            ArticleStatus::Published => true,
            ArticleStatus::Draft => self.can(viewer, Permission::ReadDraftedArticle),
            ArticleStatus::Archived => self.can(viewer, Permission::ReadArchivedArticle),
        });
        let params = params.normalized();

        let versions = self
            .repo
            .get_articles(&params)
            .await
            .context("Failed to list articles")?;

        tracing::debug!(
            statuses = ?params.statuses,
            page = params.page,
            returned = versions.len(),
            "Listed articles"
        );
        Ok(versions)
    }

    fn authorize(&self, author: &Author, permission: Permission) -> Result<(), ArticleServiceError> {
        if self.policy.allows(&author.role, permission) {
            Ok(())
        } else {
            tracing::debug!(role = %author.role, %permission, "Permission denied");
            Err(ArticleServiceError::Forbidden(format!(
                "role '{}' lacks {}",
                author.role, permission
            )))
        }
    }

    fn can(&self, viewer: Option<&Author>, permission: Permission) -> bool {
        viewer.map_or(false, |v| self.policy.allows(&v.role, permission))
    }

    async fn load_version(
        &self,
        article_id: i64,
        version_id: i64,
    ) -> Result<Option<ArticleVersion>, ArticleServiceError> {
        let version = self
            .repo
            .get_article_version(article_id, version_id)
            .await
            .context("Failed to get article version")?;
        Ok(version)
    }

    async fn find_version(
        &self,
        article_id: i64,
        version_id: i64,
    ) -> Result<ArticleVersion, ArticleServiceError> {
        self.load_version(article_id, version_id)
            .await?
            .ok_or_else(|| {
                ArticleServiceError::NotFound(format!(
                    "version {} of article {}",
                    version_id, article_id
                ))
            })
    }
}

/// Check title, body and tags, returning the canonical tag list
fn validate_content(
    title: &str,
    body: &str,
    tags: &[String],
) -> Result<Vec<String>, ArticleServiceError> {
    if title.trim().is_empty() {
        return Err(ArticleServiceError::ValidationError(
            "Title cannot be empty".to_string(),
        ));
    }
    if body.trim().is_empty() {
        return Err(ArticleServiceError::ValidationError(
            "Body cannot be empty".to_string(),
        ));
    }

    let trimmed: Vec<String> = tags.iter().map(|t| t.trim().to_string()).collect();
    if trimmed.iter().any(|t| t.is_empty()) {
        return Err(ArticleServiceError::ValidationError(
            "Tag name cannot be empty".to_string(),
        ));
    }

    Ok(canonical_tags(&trimmed))
}
