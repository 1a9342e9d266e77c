//! Couples post mutations to summary mutations.
//!
//! Summarization never fails (the service falls back locally), so a post
//! mutation is never rolled back because of the model. Storage errors do
//! propagate to the caller.

use anyhow::Result;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::storage::{self, NewPost, PostChanges, PostDetail, StoredSummary};
use crate::summary::{SummarizationService, SummaryOutcome};

pub struct PostSummaryCoordinator {
    pool: SqlitePool,
    summarizer: Arc<SummarizationService>,
}

impl PostSummaryCoordinator {
    pub fn new(pool: SqlitePool, summarizer: Arc<SummarizationService>) -> Self {
        Self { pool, summarizer }
    }

    pub fn summarizer(&self) -> &SummarizationService {
        &self.summarizer
    }

    /// Persist a new post, then attach a summary when `auto_summarize` is set.
    ///
    /// The post is inserted first so the summary has an id to reference. If
    /// storing the summary fails the post is removed again and the error
    /// returned, so no post is left with a requested-but-absent summary.
    pub async fn create_post(&self, new: NewPost, auto_summarize: bool) -> Result<PostDetail> {
        let post = storage::insert_post(&self.pool, &new).await?;
        info!(post_id = post.id, title = %post.title, "post created");

        if auto_summarize {
            let category = storage::category_name(&self.pool, post.category_id).await?;
            let outcome = self
                .summarizer
                .generate(&post.title, &post.content, &category)
                .await;

            if let Err(e) = self.store(post.id, outcome).await {
                error!(post_id = post.id, error = %e, "failed to store summary, removing post");
                if let Err(cleanup) = storage::delete_post(&self.pool, post.id).await {
                    error!(post_id = post.id, error = %cleanup, "failed to remove post after summary error");
                }
                return Err(e);
            }
        }

        self.detail(post.id).await
    }

    /// Apply a partial update. Regenerates the summary when asked to, or when
    /// the update carries `content`. Returns `None` if the post does not exist.
    pub async fn update_post(
        &self,
        post_id: i64,
        changes: PostChanges,
        regenerate_summary: bool,
    ) -> Result<Option<PostDetail>> {
        let Some(post) = storage::update_post(&self.pool, post_id, &changes).await? else {
            return Ok(None);
        };
        info!(post_id, "post updated");

        let content_changed = changes.content.is_some();
        if regenerate_summary || content_changed {
            info!(post_id, explicit = regenerate_summary, content_changed, "regenerating summary after update");
            let category = storage::category_name(&self.pool, post.category_id).await?;
            let outcome = self
                .summarizer
                .regenerate(post.id, &post.title, &post.content, &category)
                .await;
            self.store(post.id, outcome).await?;
        }

        self.detail(post_id).await.map(Some)
    }

    /// Explicit regeneration for an existing post. `None` if the post is missing.
    pub async fn regenerate_summary(&self, post_id: i64) -> Result<Option<StoredSummary>> {
        let Some(post) = storage::get_post(&self.pool, post_id).await? else {
            return Ok(None);
        };
        let category = storage::category_name(&self.pool, post.category_id).await?;
        let outcome = self
            .summarizer
            .regenerate(post.id, &post.title, &post.content, &category)
            .await;
        self.store(post.id, outcome).await.map(Some)
    }

    /// Summarize text without persisting anything.
    pub async fn preview_summary(&self, title: &str, content: &str, category: &str) -> SummaryOutcome {
        self.summarizer.generate(title, content, category).await
    }

    /// Delete a post. The summary row is removed by the storage cascade.
    pub async fn delete_post(&self, post_id: i64) -> Result<bool> {
        let deleted = storage::delete_post(&self.pool, post_id).await?;
        if deleted {
            info!(post_id, "post deleted");
        }
        Ok(deleted)
    }

    async fn store(&self, post_id: i64, outcome: SummaryOutcome) -> Result<StoredSummary> {
        if let SummaryOutcome::Fallback { reason, .. } = &outcome {
            warn!(post_id, %reason, "attaching fallback summary");
        }
        storage::upsert_summary(&self.pool, post_id, outcome.record()).await
    }

    async fn detail(&self, post_id: i64) -> Result<PostDetail> {
        storage::get_post_detail(&self.pool, post_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("post {} vanished during update", post_id))
    }
}
