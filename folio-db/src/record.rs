use folio_common::{
    model::{
        ModelValidationError,
        post::{Post, PostStatus},
        summary::PostSummary,
    },
    slug::Slug,
};
use time::OffsetDateTime;

#[derive(Clone, Eq, PartialEq, Debug, Hash, sqlx::FromRow)]
pub(crate) struct PostRecord {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub tags: Vec<String>,
    pub excerpt: String,
    pub content: String,
    pub author: String,
    pub status: String,
    pub read_time: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<PostRecord> for Post {
    type Error = ModelValidationError;

    fn try_from(value: PostRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id.cast_unsigned().into(),
            slug: Slug::new(value.slug)?,
            title: value.title,
            tags: value.tags,
            excerpt: value.excerpt,
            content: value.content,
            author: value.author,
            status: value.status.parse::<PostStatus>()?,
            read_time: value.read_time,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

impl TryFrom<PostRecord> for PostSummary {
    type Error = ModelValidationError;

    fn try_from(value: PostRecord) -> Result<Self, Self::Error> {
        Post::try_from(value).map(|post| PostSummary::project(&post))
    }
}
