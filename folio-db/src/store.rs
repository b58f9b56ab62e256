use async_trait::async_trait;
use folio_common::{
    model::{
        FolioSnowflakeGenerator, ModelValidationError,
        post::{Post, PostDraft, PostFilter, PostId, PostIdentifier, PostPatch, PostValidationError},
        summary::PostSummary,
    },
    slug::Slug,
    snowflake::{SnowflakeTimeError, WorkerId},
};
use std::{
    io,
    path::PathBuf,
    sync::{Mutex, PoisonError},
    time::Duration,
};
use thiserror::Error;
use time::OffsetDateTime;

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] PostValidationError),
    #[error("No post matches the identifier {0}")]
    NotFound(PostIdentifier),
    #[error("The slug {0} already belongs to another post")]
    Conflict(Slug),
    #[error("Could not generate a post id: {0}")]
    IdGeneration(#[from] SnowflakeTimeError),
    #[error("An object in the store was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("The index lists {0} but its post file is missing")]
    MissingRecord(Slug),
    #[error("I/O on {path} failed: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("JSON in {path} could not be processed: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("Store task was interrupted: {0}")]
    Interrupted(#[from] tokio::task::JoinError),
    #[error("Store operation {operation} did not finish within {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },
}

/// How a failure should be reported to whoever asked for the operation.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum StoreErrorKind {
    Validation,
    NotFound,
    Conflict,
    Storage,
}

impl StoreError {
    #[must_use]
    pub fn kind(&self) -> StoreErrorKind {
        match self {
            StoreError::Validation(_) => StoreErrorKind::Validation,
            StoreError::NotFound(_) => StoreErrorKind::NotFound,
            StoreError::Conflict(_) => StoreErrorKind::Conflict,
            StoreError::IdGeneration(_)
            | StoreError::Data(_)
            | StoreError::MissingRecord(_)
            | StoreError::Io { .. }
            | StoreError::Json { .. }
            | StoreError::Sqlx(_)
            | StoreError::Migrate(_)
            | StoreError::Interrupted(_)
            | StoreError::Timeout { .. } => StoreErrorKind::Storage,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct Pagination {
    page: u64,
    page_size: u64,
}

impl Pagination {
    /// Both `page` (1-based) and `page_size` have to be at least one.
    #[must_use]
    pub fn new(page: u64, page_size: u64) -> Option<Self> {
        (page >= 1 && page_size >= 1).then_some(Self { page, page_size })
    }

    #[must_use]
    pub fn page(self) -> u64 {
        self.page
    }

    #[must_use]
    pub fn page_size(self) -> u64 {
        self.page_size
    }

    #[must_use]
    pub fn skip(self) -> u64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    #[must_use]
    pub fn total_pages(self, total: u64) -> u64 {
        total.div_ceil(self.page_size)
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct PostPage {
    pub posts: Vec<Post>,
    /// Number of posts matching the filter across all pages.
    pub total: u64,
}

/// Persistence for posts and their list-view index.
///
/// Implementations own identity assignment: ids and slugs are decided inside [`create`] and
/// [`update`], and the index always mirrors the posts after an operation returns successfully.
///
/// [`create`]: ContentStore::create
/// [`update`]: ContentStore::update
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Posts matching `filter`, newest first.
    async fn list(&self, filter: &PostFilter, pagination: Pagination) -> Result<PostPage>;

    /// The whole index matching `filter`, newest first.
    async fn summaries(&self, filter: &PostFilter) -> Result<Vec<PostSummary>>;

    /// Looks `identifier` up as an id first and as a slug second.
    async fn get(&self, identifier: &PostIdentifier) -> Result<Post>;

    async fn create(&self, draft: PostDraft) -> Result<Post>;

    async fn update(&self, identifier: &PostIdentifier, patch: PostPatch) -> Result<Post>;

    async fn delete(&self, identifier: &PostIdentifier) -> Result<()>;

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug)]
pub(crate) struct PostIdGenerator(Mutex<FolioSnowflakeGenerator>);

impl PostIdGenerator {
    pub(crate) fn new(worker_id: WorkerId) -> Self {
        Self(Mutex::new(FolioSnowflakeGenerator::new(worker_id)))
    }

    pub(crate) fn generate(&self) -> Result<PostId, SnowflakeTimeError> {
        // the generator stays consistent even if a holder panicked
        let mut generator = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        generator.generate().map(PostId::from)
    }
}

/// The current time at millisecond precision, which every backend can store without loss.
pub(crate) fn timestamp_now() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now - time::Duration::nanoseconds(i64::from(now.nanosecond() % 1_000_000))
}
