//! Tag relevance engine
//!
//! Keeps two caches derived from the Published corpus:
//! - tag usage: name -> count, last use and trending score
//! - tag pair frequency: unordered pair -> number of versions carrying both
//!
//! Both caches are rebuilt wholesale, never patched. A rebuild constructs
//! two complete new `ActorMap`s and replaces the current pair in one swap,
//! so readers see either the old snapshot or the new one, never a mix.
//!
//! The background loop recomputes on a fixed tick and on triggers. Triggers
//! already queued when the loop wakes up are collapsed into one recompute.
//! Every repository call runs under a deadline shorter than the tick; a
//! failure is logged and the previous snapshot stays in place.

pub mod scoring;

use crate::cache::{ActorMap, ActorMapError};
use crate::config::RelevanceConfig;
use crate::db::repositories::{ArticleRepository, TagRepository};
use crate::models::{ArticleStatus, TagPair, TagUsage};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

pub use scoring::{pair_frequencies, relationship_score, round_score, tag_pairs, trending_score};

/// Capacity of the trigger channel. Senders wait until the loop takes the
/// previous action.
const ACTION_CHANNEL_CAPACITY: usize = 1;

/// Work the engine can be asked to do
#[derive(Debug, Clone, PartialEq)]
pub enum TagAction {
    /// Rebuild the usage and pair frequency caches
    RecomputeUsageAndPairs,
    /// Refresh the caches, then score and persist one version's tag set
    RecomputeVersionRelationshipScore {
        article_version_id: i64,
        tags: Vec<String>,
    },
}

/// Relevance engine errors. Never surfaced to request paths.
#[derive(Debug, Error)]
pub enum RelevanceError {
    #[error("Timed out while {0}")]
    Timeout(&'static str),

    #[error("Relevance cache unavailable: {0}")]
    Cache(#[from] ActorMapError),

    #[error(transparent)]
    Repository(#[from] anyhow::Error),
}

type UsageCache = ActorMap<String, TagUsage>;
type PairCache = ActorMap<TagPair, i64>;

/// Usage and pair caches built by the same recompute
struct RelevanceCaches {
    usage: UsageCache,
    pairs: PairCache,
}

impl RelevanceCaches {
    fn empty() -> Self {
        Self {
            usage: ActorMap::new(),
            pairs: ActorMap::new(),
        }
    }
}

/// Tag relevance engine
pub struct TagRelevanceEngine {
    article_repo: Arc<dyn ArticleRepository>,
    tag_repo: Arc<dyn TagRepository>,
    config: RelevanceConfig,
    caches: RwLock<Arc<RelevanceCaches>>,
    actions: mpsc::Sender<TagAction>,
}

/// Handle to the engine's background loop
pub struct EngineTask {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl EngineTask {
    /// Stop the loop and wait for it to finish its current recompute
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "Relevance engine loop panicked");
        }
    }
}

impl TagRelevanceEngine {
    /// Populate the caches once, then start the background loop.
    ///
    /// A failed cold start is logged and leaves the caches empty until the
    /// first successful tick.
    pub async fn start(
        article_repo: Arc<dyn ArticleRepository>,
        tag_repo: Arc<dyn TagRepository>,
        config: RelevanceConfig,
    ) -> (Arc<Self>, EngineTask) {
        let (actions, receiver) = mpsc::channel(ACTION_CHANNEL_CAPACITY);

        let engine = Arc::new(Self {
            article_repo,
            tag_repo,
            config,
            caches: RwLock::new(Arc::new(RelevanceCaches::empty())),
            actions,
        });

        if let Err(e) = engine.recompute_usage_and_pairs().await {
            tracing::warn!(error = %e, "Initial tag relevance recompute failed");
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_loop(Arc::clone(&engine), receiver, shutdown_rx));

        (engine, EngineTask { shutdown_tx, handle })
    }

    /// Queue an action without waiting for the engine.
    ///
    /// Delivery is best effort: an action sent after shutdown is dropped and
    /// the periodic tick catches up.
    pub fn trigger(&self, action: TagAction) {
        let sender = self.actions.clone();
        tokio::spawn(async move {
            if sender.send(action).await.is_err() {
                tracing::debug!("Relevance engine stopped, dropping action");
            }
        });
    }

    /// Rebuild both caches from the Published corpus and swap them in
    pub async fn recompute_usage_and_pairs(&self) -> Result<(), RelevanceError> {
        let usage = self
            .with_deadline("loading tag usage", self.tag_repo.get_tag_usage())
            .await?;
        let associations = self
            .with_deadline(
                "loading article tags",
                self.tag_repo.get_article_tags(ArticleStatus::Published),
            )
            .await?;

        let now = Utc::now();
        let window = self.config.trending_window();
        let usage: HashMap<String, TagUsage> = usage
            .into_iter()
            .map(|(name, mut usage)| {
                usage.trending_score = trending_score(&usage, now, window);
                (name, usage)
            })
            .collect();
        let pairs = pair_frequencies(&associations, self.config.max_tags_per_version);

        tracing::debug!(
            tags = usage.len(),
            pairs = pairs.len(),
            "Rebuilt tag relevance caches"
        );

        replace(
            &self.caches,
            RelevanceCaches {
                usage: ActorMap::from_map(usage),
                pairs: ActorMap::from_map(pairs),
            },
        );

        Ok(())
    }

    /// Score `tags` against the current caches and store it on the version
    pub async fn update_relationship_score(
        &self,
        article_version_id: i64,
        tags: &[String],
    ) -> Result<f64, RelevanceError> {
        let score = self.relationship_score_for(tags).await?;

        let updated = self
            .with_deadline(
                "storing relationship score",
                self.article_repo
                    .update_article_version_relationship_score(article_version_id, score),
            )
            .await?;

        if updated {
            tracing::debug!(version_id = article_version_id, score, "Updated relationship score");
        } else {
            tracing::debug!(
                version_id = article_version_id,
                "Article version gone before its relationship score was stored"
            );
        }

        Ok(score)
    }

    /// Relationship score of `tags` against the current caches
    pub async fn relationship_score_for(&self, tags: &[String]) -> Result<f64, RelevanceError> {
        let pairs = tag_pairs(tags);
        if pairs.is_empty() {
            return Ok(0.0);
        }

        // Both lookups must come from one recompute
        let caches = self.caches();

        let mut usage: HashMap<String, TagUsage> = HashMap::new();
        for pair in &pairs {
            for name in [pair.first(), pair.second()] {
                if usage.contains_key(name) {
                    continue;
                }
                if let Some(found) = caches.usage.get(&name.to_string()).await? {
                    usage.insert(name.to_string(), found);
                }
            }
        }

        let mut frequencies = HashMap::new();
        for pair in pairs {
            if let Some(count) = caches.pairs.get(&pair).await? {
                frequencies.insert(pair, count);
            }
        }

        Ok(relationship_score(tags, &usage, &frequencies))
    }

    /// Cached usage of one tag
    pub async fn tag_usage(&self, name: &str) -> Result<Option<TagUsage>, ActorMapError> {
        self.caches().usage.get(&name.to_string()).await
    }

    /// Copy of the whole usage cache
    pub async fn tag_usage_snapshot(&self) -> Result<HashMap<String, TagUsage>, ActorMapError> {
        self.caches().usage.get_all().await
    }

    /// Number of Published versions carrying both tags
    pub async fn pair_frequency(&self, a: &str, b: &str) -> Result<i64, ActorMapError> {
        let count = self.caches().pairs.get(&TagPair::new(a, b)).await?;
        Ok(count.unwrap_or(0))
    }

    /// Copy of the whole pair frequency cache
    pub async fn pair_frequency_snapshot(&self) -> Result<HashMap<TagPair, i64>, ActorMapError> {
        self.caches().pairs.get_all().await
    }

    fn caches(&self) -> Arc<RelevanceCaches> {
        current(&self.caches)
    }

    async fn with_deadline<T, F>(&self, operation: &'static str, fut: F) -> Result<T, RelevanceError>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        match tokio::time::timeout(self.config.recompute_timeout(), fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(RelevanceError::Timeout(operation)),
        }
    }

    async fn refresh(&self, reason: &'static str) {
        if let Err(e) = self.recompute_usage_and_pairs().await {
            tracing::warn!(reason, error = %e, "Tag relevance recompute failed, keeping previous caches");
        }
    }

    /// One recompute, then every pending relationship score job
    async fn run_batch(&self, jobs: BTreeMap<i64, Vec<String>>) {
        self.refresh("trigger").await;

        for (version_id, tags) in jobs {
            if let Err(e) = self.update_relationship_score(version_id, &tags).await {
                tracing::warn!(version_id, error = %e, "Failed to update relationship score");
            }
        }
    }
}

fn current<T>(slot: &RwLock<Arc<T>>) -> Arc<T> {
    let guard = slot.read().unwrap_or_else(|poisoned| poisoned.into_inner());
    Arc::clone(&guard)
}

/// Swap in rebuilt caches. The old workers stop once their last reader lets go.
fn replace<T>(slot: &RwLock<Arc<T>>, next: T) {
    let mut guard = slot.write().unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = Arc::new(next);
}

/// Take `first` and everything already queued behind it.
///
/// Returns the relationship score jobs keyed by version; the last tag set
/// queued for a version wins.
fn drain_actions(
    first: TagAction,
    receiver: &mut mpsc::Receiver<TagAction>,
) -> BTreeMap<i64, Vec<String>> {
    let mut jobs = BTreeMap::new();
    let mut next = Some(first);

    while let Some(action) = next {
        if let TagAction::RecomputeVersionRelationshipScore {
            article_version_id,
            tags,
        } = action
        {
            jobs.insert(article_version_id, tags);
        }
        next = receiver.try_recv().ok();
    }

    jobs
}

async fn run_loop(
    engine: Arc<TagRelevanceEngine>,
    mut receiver: mpsc::Receiver<TagAction>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let period = engine.config.refresh_interval();
    let now = Instant::now();
    let mut ticker = tokio::time::interval_at(now.checked_add(period).unwrap_or(now), period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        interval_secs = period.as_secs(),
        "Tag relevance engine started"
    );

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = ticker.tick() => engine.refresh("tick").await,
            Some(action) = receiver.recv() => {
                let jobs = drain_actions(action, &mut receiver);
                engine.run_batch(jobs).await;
                ticker.reset();
            }
        }
    }

    tracing::info!("Tag relevance engine stopped");
}
