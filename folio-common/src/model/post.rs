use crate::{
    model::Id,
    slug::Slug,
    util::{non_blank, reading_minutes, truncate_chars},
};
use serde::{Deserialize, Deserializer, Serialize};
use std::{fmt::Display, str::FromStr};
use thiserror::Error;
use time::OffsetDateTime;

pub const EXCERPT_LENGTH: usize = 150;
pub const EXCERPT_ELLIPSIS: &str = "...";
pub const DEFAULT_AUTHOR: &str = "Admin";
pub const WORDS_PER_MINUTE: usize = 200;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

pub type PostId = Id<PostMarker>;

#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    #[default]
    Published,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The post status is invalid: {0:?}")]
pub struct InvalidPostStatusError(String);

impl PostStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
        }
    }
}

impl Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = InvalidPostStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(PostStatus::Draft),
            "published" => Ok(PostStatus::Published),
            other => Err(InvalidPostStatusError(other.to_owned())),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum PostValidationError {
    #[error("A post needs a non-empty title")]
    MissingTitle,
    #[error("A post needs non-empty content")]
    MissingContent,
    #[error("The requested slug has no usable characters: {0:?}")]
    EmptySlug(String),
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    pub slug: Slug,
    pub title: String,
    pub tags: Vec<String>,
    pub excerpt: String,
    pub content: String,
    pub author: String,
    pub status: PostStatus,
    pub read_time: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Fields of a post to be created. Everything is optional on the wire, [`Post::from_draft`]
/// decides what is required.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDraft {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub author: Option<String>,
    #[serde(default, alias = "category", deserialize_with = "deserialize_labels")]
    pub tags: Option<Vec<String>>,
    pub status: Option<PostStatus>,
    pub read_time: Option<String>,
}

/// A partial update. Absent fields keep their current value.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPatch {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub author: Option<String>,
    #[serde(default, alias = "category", deserialize_with = "deserialize_labels")]
    pub tags: Option<Vec<String>>,
    pub status: Option<PostStatus>,
    pub read_time: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct PostFilter {
    pub status: Option<PostStatus>,
    pub tag: Option<String>,
}

/// A post identifier as it arrives from a client: an id if it parses as one, a slug otherwise.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct PostIdentifier {
    raw: String,
}

impl PostIdentifier {
    #[must_use]
    pub fn new(raw: String) -> Self {
        Self { raw }
    }

    #[must_use]
    pub fn as_id(&self) -> Option<PostId> {
        self.raw.parse().ok()
    }

    /// The identifier as a slug, if it could be one.
    #[must_use]
    pub fn as_slug(&self) -> Option<Slug> {
        Slug::new(self.raw.clone()).ok()
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.raw
    }
}

impl Display for PostIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<PostId> for PostIdentifier {
    fn from(value: PostId) -> Self {
        Self::new(value.to_string())
    }
}

impl From<&Slug> for PostIdentifier {
    fn from(value: &Slug) -> Self {
        Self::new(value.get().to_owned())
    }
}

impl From<&str> for PostIdentifier {
    fn from(value: &str) -> Self {
        Self::new(value.to_owned())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Labels {
    One(String),
    Many(Vec<String>),
}

/// Accepts a single label or a list of labels.
fn deserialize_labels<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let labels = Option::<Labels>::deserialize(deserializer)?;

    Ok(labels.map(|labels| match labels {
        Labels::One(label) if label.trim().is_empty() => Vec::new(),
        Labels::One(label) => vec![label],
        Labels::Many(labels) => labels,
    }))
}

/// Content that fits into the excerpt is used whole, without an ellipsis.
#[must_use]
pub fn derive_excerpt(content: &str) -> String {
    match truncate_chars(content, EXCERPT_LENGTH) {
        Some(prefix) => format!("{prefix}{EXCERPT_ELLIPSIS}"),
        None => content.to_owned(),
    }
}

#[must_use]
pub fn derive_read_time(content: &str) -> String {
    format!("{} min read", reading_minutes(content, WORDS_PER_MINUTE))
}

fn explicit_slug(requested: String) -> Result<Slug, PostValidationError> {
    Slug::from_text(&requested).ok_or(PostValidationError::EmptySlug(requested))
}

fn title_slug(title: &str, id: PostId) -> Slug {
    Slug::from_text(title).unwrap_or_else(|| Slug::fallback(id))
}

impl Post {
    /// Builds a new post from client input.
    ///
    /// The slug comes from the draft if given, otherwise from the title, falling back to one
    /// built from `id` when the title has no usable characters. Excerpt and read time are derived
    /// from the content unless supplied.
    pub fn from_draft(
        draft: PostDraft,
        id: PostId,
        now: OffsetDateTime,
    ) -> Result<Self, PostValidationError> {
        let title = non_blank(draft.title).ok_or(PostValidationError::MissingTitle)?;
        let content = non_blank(draft.content).ok_or(PostValidationError::MissingContent)?;

        let slug = match non_blank(draft.slug) {
            Some(requested) => explicit_slug(requested)?,
            None => title_slug(&title, id),
        };
        let excerpt = non_blank(draft.excerpt).unwrap_or_else(|| derive_excerpt(&content));
        let read_time = non_blank(draft.read_time).unwrap_or_else(|| derive_read_time(&content));

        Ok(Self {
            id,
            slug,
            title,
            tags: draft.tags.unwrap_or_default(),
            excerpt,
            content,
            author: non_blank(draft.author).unwrap_or_else(|| DEFAULT_AUTHOR.to_owned()),
            status: draft.status.unwrap_or_default(),
            read_time,
            created_at: now,
            updated_at: now,
        })
    }

    /// Returns this post with `patch` merged in. `self` is left untouched, so a failed validation
    /// never leaves a half-applied post behind.
    ///
    /// A changed title regenerates the slug unless the patch names one explicitly. New content
    /// re-derives the excerpt and read time unless the patch supplies them as well.
    pub fn patched(
        &self,
        patch: PostPatch,
        now: OffsetDateTime,
    ) -> Result<Self, PostValidationError> {
        let mut post = self.clone();

        if let Some(title) = patch.title {
            if title.trim().is_empty() {
                return Err(PostValidationError::MissingTitle);
            }
            if title != post.title {
                post.slug = title_slug(&title, post.id);
                post.title = title;
            }
        }
        if let Some(requested) = non_blank(patch.slug) {
            post.slug = explicit_slug(requested)?;
        }

        let content_changed = match patch.content {
            Some(content) if content.trim().is_empty() => {
                return Err(PostValidationError::MissingContent);
            }
            Some(content) => {
                post.content = content;
                true
            }
            None => false,
        };

        match (non_blank(patch.excerpt.clone()), patch.excerpt) {
            (Some(excerpt), _) => post.excerpt = excerpt,
            (None, Some(_)) => post.excerpt = derive_excerpt(&post.content),
            (None, None) if content_changed => post.excerpt = derive_excerpt(&post.content),
            (None, None) => {}
        }
        match non_blank(patch.read_time) {
            Some(read_time) => post.read_time = read_time,
            None if content_changed => post.read_time = derive_read_time(&post.content),
            None => {}
        }

        if let Some(author) = patch.author {
            post.author = non_blank(Some(author)).unwrap_or_else(|| DEFAULT_AUTHOR.to_owned());
        }
        if let Some(tags) = patch.tags {
            post.tags = tags;
        }
        if let Some(status) = patch.status {
            post.status = status;
        }

        post.updated_at = now;
        Ok(post)
    }

    #[must_use]
    pub fn identifier(&self) -> PostIdentifier {
        self.id.into()
    }
}

impl PostFilter {
    #[must_use]
    pub fn matches(&self, status: PostStatus, tags: &[String]) -> bool {
        self.status.is_none_or(|wanted| wanted == status)
            && self
                .tag
                .as_ref()
                .is_none_or(|wanted| tags.iter().any(|tag| tag == wanted))
    }
}

#[cfg(test)]
mod tests {
    use crate::model::post::{
        DEFAULT_AUTHOR, EXCERPT_ELLIPSIS, EXCERPT_LENGTH, Post, PostDraft, PostFilter, PostId,
        PostIdentifier, PostPatch, PostStatus, PostValidationError, derive_excerpt,
    };
    use crate::slug::Slug;
    use time::{Duration, macros::datetime};

    fn draft(title: &str, content: &str) -> PostDraft {
        PostDraft {
            title: Some(title.to_owned()),
            content: Some(content.to_owned()),
            ..PostDraft::default()
        }
    }

    fn post(title: &str, content: &str) -> Post {
        Post::from_draft(
            draft(title, content),
            PostId::from(42),
            datetime!(2025-06-01 12:00 UTC),
        )
        .unwrap()
    }

    #[test]
    fn draft_defaults() {
        let created = post("Hello, World!", "Some content");

        assert_eq!(created.id, PostId::from(42));
        assert_eq!(created.slug.get(), "hello-world");
        assert_eq!(created.excerpt, "Some content");
        assert_eq!(created.author, DEFAULT_AUTHOR);
        assert_eq!(created.status, PostStatus::Published);
        assert_eq!(created.read_time, "1 min read");
        assert!(created.tags.is_empty());
        assert_eq!(created.created_at, created.updated_at);
    }

    #[test]
    fn draft_requires_title_and_content() {
        let now = datetime!(2025-06-01 12:00 UTC);

        assert_eq!(
            Post::from_draft(draft("  ", "content"), PostId::from(1), now),
            Err(PostValidationError::MissingTitle)
        );
        assert_eq!(
            Post::from_draft(draft("title", ""), PostId::from(1), now),
            Err(PostValidationError::MissingContent)
        );
        assert_eq!(
            Post::from_draft(PostDraft::default(), PostId::from(1), now),
            Err(PostValidationError::MissingTitle)
        );
    }

    #[test]
    fn long_content_gets_truncated_excerpt() {
        let content = "x".repeat(EXCERPT_LENGTH + 50);
        let created = post("Long", &content);

        assert_eq!(
            created.excerpt,
            format!("{}{EXCERPT_ELLIPSIS}", &content[..EXCERPT_LENGTH])
        );
        assert_eq!(derive_excerpt(&"y".repeat(EXCERPT_LENGTH)), "y".repeat(EXCERPT_LENGTH));
    }

    #[test]
    fn blank_excerpt_counts_as_missing() {
        let created = Post::from_draft(
            PostDraft {
                excerpt: Some(String::new()),
                ..draft("Title", "Body")
            },
            PostId::from(1),
            datetime!(2025-06-01 12:00 UTC),
        )
        .unwrap();

        assert_eq!(created.excerpt, "Body");
    }

    #[test]
    fn unusable_title_falls_back_to_id_slug() {
        let created = post("???", "content");
        assert_eq!(created.slug.get(), "post-42");
    }

    #[test]
    fn explicit_slug_is_normalized() {
        let now = datetime!(2025-06-01 12:00 UTC);
        let created = Post::from_draft(
            PostDraft {
                slug: Some("My Custom Slug".to_owned()),
                ..draft("Title", "Body")
            },
            PostId::from(1),
            now,
        )
        .unwrap();
        assert_eq!(created.slug.get(), "my-custom-slug");

        let rejected = Post::from_draft(
            PostDraft {
                slug: Some("!!!".to_owned()),
                ..draft("Title", "Body")
            },
            PostId::from(1),
            now,
        );
        assert_eq!(rejected, Err(PostValidationError::EmptySlug("!!!".to_owned())));
    }

    #[test]
    fn patch_title_regenerates_slug() {
        let original = post("Old Title", "Body");
        let later = original.updated_at + Duration::minutes(5);

        let updated = original
            .patched(
                PostPatch {
                    title: Some("New Title".to_owned()),
                    ..PostPatch::default()
                },
                later,
            )
            .unwrap();

        assert_eq!(updated.slug.get(), "new-title");
        assert_eq!(updated.title, "New Title");
        assert_eq!(updated.content, original.content);
        assert_eq!(updated.created_at, original.created_at);
        assert_eq!(updated.updated_at, later);
    }

    #[test]
    fn patch_explicit_slug_wins_over_title() {
        let original = post("Old Title", "Body");

        let updated = original
            .patched(
                PostPatch {
                    title: Some("New Title".to_owned()),
                    slug: Some("kept-slug".to_owned()),
                    ..PostPatch::default()
                },
                original.updated_at,
            )
            .unwrap();

        assert_eq!(updated.slug.get(), "kept-slug");
    }

    #[test]
    fn patch_same_title_keeps_custom_slug() {
        let mut original = post("Title", "Body");
        original.slug = Slug::new("custom".to_owned()).unwrap();

        let updated = original
            .patched(
                PostPatch {
                    title: Some("Title".to_owned()),
                    ..PostPatch::default()
                },
                original.updated_at,
            )
            .unwrap();

        assert_eq!(updated.slug.get(), "custom");
    }

    #[test]
    fn patch_content_rederives_excerpt() {
        let original = post("Title", "Body");
        let content = "z".repeat(200);

        let updated = original
            .patched(
                PostPatch {
                    content: Some(content.clone()),
                    ..PostPatch::default()
                },
                original.updated_at,
            )
            .unwrap();
        assert_eq!(updated.excerpt, derive_excerpt(&content));

        let with_excerpt = original
            .patched(
                PostPatch {
                    content: Some(content),
                    excerpt: Some("Hand written".to_owned()),
                    ..PostPatch::default()
                },
                original.updated_at,
            )
            .unwrap();
        assert_eq!(with_excerpt.excerpt, "Hand written");
    }

    #[test]
    fn patch_rejects_blank_required_fields() {
        let original = post("Title", "Body");

        assert_eq!(
            original.patched(
                PostPatch {
                    title: Some(String::new()),
                    ..PostPatch::default()
                },
                original.updated_at
            ),
            Err(PostValidationError::MissingTitle)
        );
        assert_eq!(
            original.patched(
                PostPatch {
                    content: Some(" ".to_owned()),
                    ..PostPatch::default()
                },
                original.updated_at
            ),
            Err(PostValidationError::MissingContent)
        );
    }

    #[test]
    fn labels_accept_category_string_or_list() {
        let single: PostDraft =
            serde_json::from_str(r#"{"title": "t", "content": "c", "category": "Rust"}"#).unwrap();
        assert_eq!(single.tags, Some(vec!["Rust".to_owned()]));

        let many: PostPatch = serde_json::from_str(r#"{"tags": ["a", "b", "a"]}"#).unwrap();
        assert_eq!(
            many.tags,
            Some(vec!["a".to_owned(), "b".to_owned(), "a".to_owned()])
        );

        let absent: PostPatch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.tags, None);
    }

    #[test]
    fn post_serializes_camel_case() {
        let created = post("Title", "Body");
        let json = serde_json::to_value(&created).unwrap();

        assert_eq!(json["id"], "42");
        assert_eq!(json["readTime"], "1 min read");
        assert_eq!(json["createdAt"], "2025-06-01T12:00:00Z");
        assert_eq!(json["status"], "published");
    }

    #[test]
    fn filter_matching() {
        let tags = vec!["rust".to_owned(), "web".to_owned()];

        assert!(PostFilter::default().matches(PostStatus::Draft, &[]));
        assert!(
            PostFilter {
                status: Some(PostStatus::Published),
                tag: Some("web".to_owned()),
            }
            .matches(PostStatus::Published, &tags)
        );
        assert!(
            !PostFilter {
                status: Some(PostStatus::Published),
                tag: None,
            }
            .matches(PostStatus::Draft, &tags)
        );
        assert!(
            !PostFilter {
                status: None,
                tag: Some("go".to_owned()),
            }
            .matches(PostStatus::Published, &tags)
        );
    }

    #[test]
    fn identifier_parsing() {
        let by_id = PostIdentifier::from("123");
        assert_eq!(by_id.as_id(), Some(PostId::from(123)));
        assert_eq!(by_id.as_slug().map(Slug::into_inner), Some("123".to_owned()));

        let by_slug = PostIdentifier::from("hello-world");
        assert_eq!(by_slug.as_id(), None);
        assert!(by_slug.as_slug().is_some());

        assert_eq!(PostIdentifier::from("../etc").as_slug(), None);
    }
}
