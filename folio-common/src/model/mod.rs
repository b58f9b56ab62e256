pub mod post;
pub mod summary;

use crate::{
    model::post::InvalidPostStatusError,
    slug::InvalidSlugError,
    snowflake::{Epoch, Snowflake, SnowflakeGenerator},
};
use derive_where::derive_where;
use serde::{Deserialize, Serialize};
use std::{fmt::Display, marker::PhantomData, num::ParseIntError, str::FromStr};
use thiserror::Error;
use time::{UtcDateTime, macros::utc_datetime};

/// Raised when a stored record cannot be turned back into a model value.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    Slug(#[from] InvalidSlugError),
    #[error(transparent)]
    PostStatus(#[from] InvalidPostStatusError),
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct FolioEpoch;
impl Epoch for FolioEpoch {
    const EPOCH_TIME: UtcDateTime = utc_datetime!(2025-01-01 00:00);
}

pub type FolioSnowflake = Snowflake<FolioEpoch>;
pub type FolioSnowflakeGenerator = SnowflakeGenerator<FolioEpoch>;

#[derive_where(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<Marker>(FolioSnowflake, #[serde(skip)] PhantomData<Marker>);

impl<Marker> Id<Marker> {
    #[must_use]
    pub fn new(snowflake: FolioSnowflake) -> Self {
        Self(snowflake, PhantomData)
    }

    #[must_use]
    pub fn snowflake(self) -> FolioSnowflake {
        self.0
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> FromStr for Id<Marker> {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FolioSnowflake::from_str(s).map(Self::new)
    }
}

impl<Marker> From<FolioSnowflake> for Id<Marker> {
    fn from(value: FolioSnowflake) -> Self {
        Self::new(value)
    }
}

impl<Marker> From<u64> for Id<Marker> {
    fn from(value: u64) -> Self {
        Id::new(FolioSnowflake::new(value))
    }
}

impl<Marker> From<Id<Marker>> for u64 {
    fn from(value: Id<Marker>) -> Self {
        value.snowflake().get()
    }
}
