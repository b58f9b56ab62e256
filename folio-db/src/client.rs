use crate::store::{ContentStore, Pagination, PostPage, Result, StoreError};
use folio_common::model::{
    post::{Post, PostDraft, PostFilter, PostIdentifier, PostPatch},
    summary::PostSummary,
};
use std::time::Duration;
use tracing::debug;

/// Front door to whichever [`ContentStore`] backs the service.
///
/// Every operation is bounded by `timeout`. Running into it yields [`StoreError::Timeout`]. A
/// mutation that timed out before its backend started writing never applies.
pub struct DbClient {
    store: Box<dyn ContentStore>,
    timeout: Duration,
}

impl DbClient {
    #[must_use]
    pub fn new(store: Box<dyn ContentStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn timed<T>(
        &self,
        operation: &'static str,
        future: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::time::timeout(self.timeout, future)
            .await
            .map_err(|_| StoreError::Timeout {
                operation,
                timeout: self.timeout,
            })?
    }

    pub async fn list_posts(&self, filter: &PostFilter, pagination: Pagination) -> Result<PostPage> {
        debug!(?filter, ?pagination, "Listing posts");
        self.timed("list", self.store.list(filter, pagination)).await
    }

    pub async fn post_summaries(&self, filter: &PostFilter) -> Result<Vec<PostSummary>> {
        debug!(?filter, "Fetching post summaries");
        self.timed("summaries", self.store.summaries(filter)).await
    }

    pub async fn fetch_post(&self, identifier: &PostIdentifier) -> Result<Post> {
        debug!(%identifier, "Fetching post");
        self.timed("get", self.store.get(identifier)).await
    }

    pub async fn create_post(&self, draft: PostDraft) -> Result<Post> {
        self.timed("create", self.store.create(draft)).await
    }

    pub async fn update_post(&self, identifier: &PostIdentifier, patch: PostPatch) -> Result<Post> {
        debug!(%identifier, "Updating post");
        self.timed("update", self.store.update(identifier, patch)).await
    }

    pub async fn delete_post(&self, identifier: &PostIdentifier) -> Result<()> {
        debug!(%identifier, "Deleting post");
        self.timed("delete", self.store.delete(identifier)).await
    }

    /// Releases the backend's resources. Not bounded by the timeout.
    pub async fn close(&self) -> Result<()> {
        self.store.close().await
    }
}
