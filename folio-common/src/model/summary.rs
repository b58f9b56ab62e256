use crate::{
    model::post::{Post, PostId, PostStatus},
    slug::Slug,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// The list-view projection of a [`Post`], as kept in an index.
///
/// Never edited on its own: whenever the post changes, the index entry is replaced by a fresh
/// [`PostSummary::project`] of it.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSummary {
    pub id: PostId,
    pub slug: Slug,
    pub title: String,
    pub tags: Vec<String>,
    pub excerpt: String,
    pub read_time: String,
    pub status: PostStatus,
    #[serde(rename = "date", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl PostSummary {
    #[must_use]
    pub fn project(post: &Post) -> Self {
        Self {
            id: post.id,
            slug: post.slug.clone(),
            title: post.title.clone(),
            tags: post.tags.clone(),
            excerpt: post.excerpt.clone(),
            read_time: post.read_time.clone(),
            status: post.status,
            created_at: post.created_at,
        }
    }
}

impl From<&Post> for PostSummary {
    fn from(value: &Post) -> Self {
        Self::project(value)
    }
}
