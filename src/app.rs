//! Application wiring
//!
//! Builds the database, repositories, role policy, relevance engine and
//! services from a `Config`, and tears them down again in order.

use anyhow::Result;
use std::sync::Arc;

use crate::config::Config;
use crate::db::repositories::{SqlxArticleRepository, SqlxTagRepository};
use crate::db::{self, DynDatabasePool};
use crate::models::RolePolicy;
use crate::services::relevance::{EngineTask, TagRelevanceEngine};
use crate::services::{ArticleService, TagService};

/// A running Manuscript instance
pub struct App {
    pub articles: ArticleService,
    pub tags: TagService,
    pub engine: Arc<TagRelevanceEngine>,
    pub policy: Arc<RolePolicy>,
    pool: DynDatabasePool,
    engine_task: EngineTask,
}

impl App {
    /// Connect, migrate and start the relevance engine
    pub async fn build(config: &Config) -> Result<Self> {
        let pool = db::create_pool(&config.database).await?;
        tracing::info!(url = %config.database.url, "Database connected");

        db::migrations::run_migrations(&pool).await?;
        tracing::info!("Database migrations completed");

        let article_repo = SqlxArticleRepository::boxed(pool.clone());
        let tag_repo = SqlxTagRepository::boxed(pool.clone());

        let policy = Arc::new(RolePolicy::from_config(&config.roles));
        tracing::info!(roles = policy.len(), "Role policy loaded");

        let (engine, engine_task) = TagRelevanceEngine::start(
            article_repo.clone(),
            tag_repo.clone(),
            config.relevance.clone(),
        )
        .await;

        let articles = ArticleService::new(article_repo, engine.clone(), policy.clone());
        let tags = TagService::new(tag_repo, engine.clone());

        Ok(Self {
            articles,
            tags,
            engine,
            policy,
            pool,
            engine_task,
        })
    }

    /// Stop the relevance engine, then close the database
    pub async fn shutdown(self) {
        self.engine_task.shutdown().await;
        self.pool.close().await;
        tracing::info!("Manuscript stopped");
    }
}
