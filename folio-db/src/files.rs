//! Flat-file backend.
//!
//! Layout under the store root:
//!
//! ```text
//! index.json          summaries of every post, newest first
//! posts/<slug>.json   one full post per file
//! ```
//!
//! Every write replaces a whole file by writing a sibling temp file and renaming it over the
//! target. A store-wide reader/writer lock serializes mutations, readers only ever see what the
//! last completed mutation left behind.
//!
//! A mutation waits for the write lock in the caller's future and only then moves to its own
//! task. A caller that gives up while waiting cancels the mutation; one that gives up after the
//! lock was taken no longer interrupts it between two file writes.

use crate::store::{
    ContentStore, Pagination, PostIdGenerator, PostPage, Result, StoreError, timestamp_now,
};
use async_trait::async_trait;
use folio_common::{
    model::{
        post::{Post, PostDraft, PostFilter, PostIdentifier, PostPatch},
        summary::PostSummary,
    },
    slug::Slug,
    snowflake::WorkerId,
};
use serde::{Serialize, de::DeserializeOwned};
use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{
    fs,
    sync::{OwnedRwLockWriteGuard, RwLock},
};
use tracing::{debug, info, warn};

pub const INDEX_FILE: &str = "index.json";
pub const POSTS_DIR: &str = "posts";

#[derive(Clone, Debug)]
pub struct FileStore {
    inner: Arc<FileStoreInner>,
}

#[derive(Debug)]
struct FileStoreInner {
    root: PathBuf,
    ids: PostIdGenerator,
    lock: Arc<RwLock<()>>,
}

fn io_error(path: &Path, source: io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_owned(),
        source,
    }
}

fn json_error(path: &Path, source: serde_json::Error) -> StoreError {
    StoreError::Json {
        path: path.to_owned(),
        source,
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| json_error(path, source)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(io_error(path, source)),
    }
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|source| json_error(path, source))?;

    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, bytes)
        .await
        .map_err(|source| io_error(&temp_path, source))?;
    fs::rename(&temp_path, path)
        .await
        .map_err(|source| io_error(path, source))
}

/// Removes a post file that is no longer referenced by the index. Failing to do so leaves an
/// unreachable file behind, which is logged but not an error.
async fn discard(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!(error = %err, path = %path.display(), "Could not remove post file"),
    }
}

fn resolve(index: &[PostSummary], identifier: &PostIdentifier) -> Option<usize> {
    identifier
        .as_id()
        .and_then(|id| index.iter().position(|summary| summary.id == id))
        .or_else(|| {
            let slug = identifier.as_slug()?;
            index.iter().position(|summary| summary.slug == slug)
        })
}

impl FileStore {
    /// Opens the store at `root`, creating the directory layout and an empty index if needed.
    pub async fn open(root: impl Into<PathBuf>, worker_id: WorkerId) -> Result<Self> {
        let inner = FileStoreInner {
            root: root.into(),
            ids: PostIdGenerator::new(worker_id),
            lock: Arc::new(RwLock::new(())),
        };

        let posts_dir = inner.posts_dir();
        fs::create_dir_all(&posts_dir)
            .await
            .map_err(|source| io_error(&posts_dir, source))?;

        let index_path = inner.index_path();
        let index_exists = fs::try_exists(&index_path)
            .await
            .map_err(|source| io_error(&index_path, source))?;
        if index_exists {
            // refuse to serve from an index that doesn't parse
            let index = inner.read_index().await?;
            info!(root = %inner.root.display(), posts = index.len(), "Opened file store");
        } else {
            inner.write_index(&[]).await?;
            info!(root = %inner.root.display(), "Created empty file store");
        }

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.inner.root
    }
}

impl FileStoreInner {
    fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    fn posts_dir(&self) -> PathBuf {
        self.root.join(POSTS_DIR)
    }

    fn post_path(&self, slug: &Slug) -> PathBuf {
        self.posts_dir().join(format!("{slug}.json"))
    }

    async fn read_index(&self) -> Result<Vec<PostSummary>> {
        Ok(read_json(&self.index_path()).await?.unwrap_or_default())
    }

    async fn write_index(&self, index: &[PostSummary]) -> Result<()> {
        write_json(&self.index_path(), index).await
    }

    async fn read_post(&self, slug: &Slug) -> Result<Post> {
        read_json(&self.post_path(slug))
            .await?
            .ok_or_else(|| StoreError::MissingRecord(slug.clone()))
    }

    async fn list(&self, filter: &PostFilter, pagination: Pagination) -> Result<PostPage> {
        let _guard = self.lock.read().await;
        let index = self.read_index().await?;

        let matching: Vec<&PostSummary> = index
            .iter()
            .filter(|summary| filter.matches(summary.status, &summary.tags))
            .collect();
        let total = matching.len() as u64;

        let skip = usize::try_from(pagination.skip()).unwrap_or(usize::MAX);
        let take = usize::try_from(pagination.page_size()).unwrap_or(usize::MAX);

        let mut posts = Vec::new();
        for summary in matching.into_iter().skip(skip).take(take) {
            posts.push(self.read_post(&summary.slug).await?);
        }

        Ok(PostPage { posts, total })
    }

    async fn summaries(&self, filter: &PostFilter) -> Result<Vec<PostSummary>> {
        let _guard = self.lock.read().await;
        let mut index = self.read_index().await?;

        index.retain(|summary| filter.matches(summary.status, &summary.tags));
        Ok(index)
    }

    async fn get(&self, identifier: &PostIdentifier) -> Result<Post> {
        let _guard = self.lock.read().await;
        let index = self.read_index().await?;

        let position =
            resolve(&index, identifier).ok_or_else(|| StoreError::NotFound(identifier.clone()))?;
        self.read_post(&index[position].slug).await
    }

    // The mutations below expect the caller to hold the write lock.

    async fn create(&self, draft: PostDraft) -> Result<Post> {
        let id = self.ids.generate()?;
        let post = Post::from_draft(draft, id, timestamp_now())?;

        let mut index = self.read_index().await?;
        if index.iter().any(|summary| summary.slug == post.slug) {
            return Err(StoreError::Conflict(post.slug));
        }

        let post_path = self.post_path(&post.slug);
        write_json(&post_path, &post).await?;

        index.insert(0, PostSummary::project(&post));
        if let Err(err) = self.write_index(&index).await {
            discard(&post_path).await;
            return Err(err);
        }

        debug!(id = %post.id, slug = %post.slug, "Created post");
        Ok(post)
    }

    async fn update(&self, identifier: &PostIdentifier, patch: PostPatch) -> Result<Post> {
        let mut index = self.read_index().await?;

        let position =
            resolve(&index, identifier).ok_or_else(|| StoreError::NotFound(identifier.clone()))?;
        let current = self.read_post(&index[position].slug).await?;
        let updated = current.patched(patch, timestamp_now())?;

        let slug_changed = updated.slug != current.slug;
        if slug_changed
            && index
                .iter()
                .any(|summary| summary.slug == updated.slug && summary.id != updated.id)
        {
            return Err(StoreError::Conflict(updated.slug));
        }

        // The new file goes first, the index swap makes it visible, the old file goes last.
        let new_path = self.post_path(&updated.slug);
        write_json(&new_path, &updated).await?;

        index[position] = PostSummary::project(&updated);
        if let Err(err) = self.write_index(&index).await {
            if slug_changed {
                discard(&new_path).await;
            } else if let Err(restore_err) = write_json(&new_path, &current).await {
                warn!(error = %restore_err, slug = %current.slug, "Could not restore post file");
            }
            return Err(err);
        }

        if slug_changed {
            discard(&self.post_path(&current.slug)).await;
            debug!(id = %updated.id, from = %current.slug, to = %updated.slug, "Moved post");
        }
        debug!(id = %updated.id, slug = %updated.slug, "Updated post");
        Ok(updated)
    }

    async fn delete(&self, identifier: &PostIdentifier) -> Result<()> {
        let mut index = self.read_index().await?;

        let position =
            resolve(&index, identifier).ok_or_else(|| StoreError::NotFound(identifier.clone()))?;
        let removed = index.remove(position);

        self.write_index(&index).await?;
        discard(&self.post_path(&removed.slug)).await;

        debug!(id = %removed.id, slug = %removed.slug, "Deleted post");
        Ok(())
    }
}

impl FileStore {
    /// Takes the write lock, then runs `mutation` to completion on its own task while holding it.
    async fn mutate<T, F, Fut>(&self, mutation: F) -> Result<T>
    where
        F: FnOnce(Arc<FileStoreInner>) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let guard: OwnedRwLockWriteGuard<()> = Arc::clone(&self.inner.lock).write_owned().await;
        let task = mutation(Arc::clone(&self.inner));

        tokio::spawn(async move {
            let result = task.await;
            drop(guard);
            result
        })
        .await?
    }
}

#[async_trait]
impl ContentStore for FileStore {
    async fn list(&self, filter: &PostFilter, pagination: Pagination) -> Result<PostPage> {
        self.inner.list(filter, pagination).await
    }

    async fn summaries(&self, filter: &PostFilter) -> Result<Vec<PostSummary>> {
        self.inner.summaries(filter).await
    }

    async fn get(&self, identifier: &PostIdentifier) -> Result<Post> {
        self.inner.get(identifier).await
    }

    async fn create(&self, draft: PostDraft) -> Result<Post> {
        self.mutate(|inner| async move { inner.create(draft).await })
            .await
    }

    async fn update(&self, identifier: &PostIdentifier, patch: PostPatch) -> Result<Post> {
        let identifier = identifier.clone();
        self.mutate(|inner| async move { inner.update(&identifier, patch).await })
            .await
    }

    async fn delete(&self, identifier: &PostIdentifier) -> Result<()> {
        let identifier = identifier.clone();
        self.mutate(|inner| async move { inner.delete(&identifier).await })
            .await
    }
}
