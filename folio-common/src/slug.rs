//! Human readable, URL-safe post identifiers.

use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Turns arbitrary text into a slug.
///
/// The text is lower-cased, every run of whitespace or hyphens becomes a single hyphen, everything
/// that is neither an ASCII word character nor a hyphen is dropped, and hyphens at either end are
/// trimmed. Text without any word characters produces an empty string.
#[must_use]
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_whitespace() || c == '-' {
            pending_hyphen = true;
        } else if c.is_ascii_alphanumeric() || c == '_' {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        }
    }

    slug
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct Slug(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The slug is invalid: {0:?}")]
pub struct InvalidSlugError(String);

impl Slug {
    /// Accepts `slug` only if it is non-empty and already in slugified form.
    pub fn new(slug: String) -> Result<Self, InvalidSlugError> {
        if !slug.is_empty() && slugify(&slug) == slug {
            Ok(Self(slug))
        } else {
            Err(InvalidSlugError(slug))
        }
    }

    /// Slugifies `text`, returning `None` when nothing usable is left.
    #[must_use]
    pub fn from_text(text: &str) -> Option<Self> {
        let slug = slugify(text);
        (!slug.is_empty()).then_some(Self(slug))
    }

    /// Stand-in for texts that slugify to nothing, unique as long as `token` is.
    #[must_use]
    pub fn fallback(token: impl Display) -> Self {
        Self(slugify(&format!("post-{token}")))
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for Slug {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Slug {
    type Error = InvalidSlugError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for Slug {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Slug::new(inner).map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"Slug"))
    }
}
