//! Database backend: one row per post in the `posts` table, whose unique index on `slug` keeps
//! slugs unique. There is no separate index to maintain, summaries are projected from rows.

use crate::{
    record::PostRecord,
    store::{
        ContentStore, Pagination, PostIdGenerator, PostPage, Result, StoreError, timestamp_now,
    },
};
use async_trait::async_trait;
use folio_common::{
    model::{
        post::{Post, PostDraft, PostFilter, PostId, PostIdentifier, PostPatch},
        summary::PostSummary,
    },
    slug::Slug,
    snowflake::WorkerId,
};
use sqlx::{PgConnection, PgPool, postgres::PgPoolOptions, query, query_as, query_scalar};
use std::time::Duration;
use tracing::{debug, info};

const POST_COLUMNS: &str = "id, slug, title, tags, excerpt, content, author, status, read_time, \
                            created_at, updated_at";

const FILTER_CLAUSE: &str = "($1::TEXT IS NULL OR status = $1) AND ($2::TEXT IS NULL OR $2 = ANY(tags))";

pub struct PgStore {
    pool: PgPool,
    ids: PostIdGenerator,
}

fn id_param(id: PostId) -> i64 {
    u64::from(id).cast_signed()
}

/// Turns a unique index violation into a slug conflict, the only unique column besides the
/// generated id.
fn conflict_or(err: sqlx::Error, slug: &Slug) -> StoreError {
    if let sqlx::Error::Database(db_error) = &err
        && db_error.is_unique_violation()
    {
        return StoreError::Conflict(slug.clone());
    }
    err.into()
}

async fn find(
    connection: &mut PgConnection,
    identifier: &PostIdentifier,
    for_update: bool,
) -> Result<Option<PostRecord>> {
    let lock = if for_update { " FOR UPDATE" } else { "" };

    if let Some(id) = identifier.as_id() {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1{lock}");
        let record = query_as::<_, PostRecord>(&sql)
            .bind(id_param(id))
            .fetch_optional(&mut *connection)
            .await?;
        if record.is_some() {
            return Ok(record);
        }
    }

    let Some(slug) = identifier.as_slug() else {
        return Ok(None);
    };
    let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE slug = $1{lock}");
    let record = query_as::<_, PostRecord>(&sql)
        .bind(slug.get())
        .fetch_optional(&mut *connection)
        .await?;

    Ok(record)
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool, worker_id: WorkerId) -> Self {
        Self {
            pool,
            ids: PostIdGenerator::new(worker_id),
        }
    }

    pub async fn connect(
        database_url: &str,
        worker_id: WorkerId,
        acquire_timeout: Duration,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await?;

        info!("Connected to database");
        Ok(Self::new(pool, worker_id))
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl ContentStore for PgStore {
    async fn list(&self, filter: &PostFilter, pagination: Pagination) -> Result<PostPage> {
        let status = filter.status.map(|status| status.as_str());
        let tag = filter.tag.as_deref();

        let total: i64 = query_scalar(&format!("SELECT COUNT(*) FROM posts WHERE {FILTER_CLAUSE}"))
            .bind(status)
            .bind(tag)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE {FILTER_CLAUSE} \
             ORDER BY created_at DESC, id DESC LIMIT $3 OFFSET $4"
        );
        let records = query_as::<_, PostRecord>(&sql)
            .bind(status)
            .bind(tag)
            .bind(i64::try_from(pagination.page_size()).unwrap_or(i64::MAX))
            .bind(i64::try_from(pagination.skip()).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        let posts = records
            .into_iter()
            .map(Post::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PostPage {
            posts,
            total: total.cast_unsigned(),
        })
    }

    async fn summaries(&self, filter: &PostFilter) -> Result<Vec<PostSummary>> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE {FILTER_CLAUSE} \
             ORDER BY created_at DESC, id DESC"
        );
        let records = query_as::<_, PostRecord>(&sql)
            .bind(filter.status.map(|status| status.as_str()))
            .bind(filter.tag.as_deref())
            .fetch_all(&self.pool)
            .await?;

        let summaries = records
            .into_iter()
            .map(PostSummary::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(summaries)
    }

    async fn get(&self, identifier: &PostIdentifier) -> Result<Post> {
        let mut connection = self.pool.acquire().await?;

        let record = find(&mut connection, identifier, false)
            .await?
            .ok_or_else(|| StoreError::NotFound(identifier.clone()))?;
        Ok(record.try_into()?)
    }

    async fn create(&self, draft: PostDraft) -> Result<Post> {
        let id = self.ids.generate()?;
        let post = Post::from_draft(draft, id, timestamp_now())?;

        let sql = format!(
            "INSERT INTO posts ({POST_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        );
        query(&sql)
            .bind(id_param(post.id))
            .bind(post.slug.get())
            .bind(&post.title)
            .bind(&post.tags)
            .bind(&post.excerpt)
            .bind(&post.content)
            .bind(&post.author)
            .bind(post.status.as_str())
            .bind(&post.read_time)
            .bind(post.created_at)
            .bind(post.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|err| conflict_or(err, &post.slug))?;

        debug!(id = %post.id, slug = %post.slug, "Created post");
        Ok(post)
    }

    async fn update(&self, identifier: &PostIdentifier, patch: PostPatch) -> Result<Post> {
        let mut transaction = self.pool.begin().await?;

        // The row lock serializes concurrent updates of the same post until commit.
        let current: Post = find(&mut transaction, identifier, true)
            .await?
            .ok_or_else(|| StoreError::NotFound(identifier.clone()))?
            .try_into()?;
        let updated = current.patched(patch, timestamp_now())?;

        query(
            "UPDATE posts SET slug = $2, title = $3, tags = $4, excerpt = $5, content = $6, \
             author = $7, status = $8, read_time = $9, updated_at = $10 WHERE id = $1",
        )
        .bind(id_param(updated.id))
        .bind(updated.slug.get())
        .bind(&updated.title)
        .bind(&updated.tags)
        .bind(&updated.excerpt)
        .bind(&updated.content)
        .bind(&updated.author)
        .bind(updated.status.as_str())
        .bind(&updated.read_time)
        .bind(updated.updated_at)
        .execute(&mut *transaction)
        .await
        .map_err(|err| conflict_or(err, &updated.slug))?;

        transaction.commit().await?;

        debug!(id = %updated.id, slug = %updated.slug, "Updated post");
        Ok(updated)
    }

    async fn delete(&self, identifier: &PostIdentifier) -> Result<()> {
        let mut transaction = self.pool.begin().await?;

        let record = find(&mut transaction, identifier, true)
            .await?
            .ok_or_else(|| StoreError::NotFound(identifier.clone()))?;

        query("DELETE FROM posts WHERE id = $1")
            .bind(record.id)
            .execute(&mut *transaction)
            .await?;
        transaction.commit().await?;

        debug!(id = record.id, slug = %record.slug, "Deleted post");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        info!("Closed database pool");
        Ok(())
    }
}
