//! Module for working with snowflake IDs.
//!
//! A snowflake packs, from the most significant bit down, 42 bits of milliseconds since an
//! [`Epoch`], a 10 bit worker id and a 12 bit per-millisecond increment. Snowflakes generated by
//! one [`SnowflakeGenerator`] are strictly increasing, so they sort by creation time.
//!
//! See <https://discord.com/developers/docs/reference#snowflakes>

use derive_where::derive_where;
use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{self, Unexpected, Visitor},
};
use std::{
    fmt::{Display, Formatter},
    marker::PhantomData,
    num::ParseIntError,
    str::FromStr,
};
use thiserror::Error;
use time::{Duration, UtcDateTime};

pub const TIMESTAMP_OFFSET: u32 = 22;
pub const TIMESTAMP_LENGTH: u32 = 42;
pub const WORKER_ID_OFFSET: u32 = 12;
pub const WORKER_ID_LENGTH: u32 = 10;
pub const INCREMENT_OFFSET: u32 = 0;
pub const INCREMENT_LENGTH: u32 = 12;

const fn low_bits(length: u32) -> u64 {
    (1 << length) - 1
}

pub trait Epoch {
    const EPOCH_TIME: UtcDateTime;
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum SnowflakeTimeError {
    #[error("Specified time was before the snowflake epoch.")]
    TimeBeforeEpoch,
    #[error("Resulting timestamp uses too many bits.")]
    TimestampTooLarge,
}

fn millis_since_epoch<SnowflakeEpoch: Epoch>(
    time: UtcDateTime,
) -> Result<u64, SnowflakeTimeError> {
    let millis = (time - SnowflakeEpoch::EPOCH_TIME).whole_milliseconds();
    let millis = u64::try_from(millis).map_err(|_| SnowflakeTimeError::TimeBeforeEpoch)?;

    if millis > low_bits(TIMESTAMP_LENGTH) {
        return Err(SnowflakeTimeError::TimestampTooLarge);
    }
    Ok(millis)
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct WorkerId(u16);

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Worker id was out of range: {0}")]
pub struct WorkerIdOutOfRangeError(u16);

impl WorkerId {
    #[must_use]
    pub fn new(id: u16) -> Option<Self> {
        (u64::from(id) <= low_bits(WORKER_ID_LENGTH)).then_some(Self(id))
    }

    #[must_use]
    pub fn get(self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for WorkerId {
    type Error = WorkerIdOutOfRangeError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(WorkerIdOutOfRangeError(value))
    }
}

impl<'de> Deserialize<'de> for WorkerId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = u16::deserialize(deserializer)?;
        Self::new(inner).ok_or_else(|| {
            de::Error::invalid_value(Unexpected::Unsigned(inner.into()), &"WorkerId")
        })
    }
}

#[derive_where(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct Snowflake<SnowflakeEpoch>(u64, PhantomData<SnowflakeEpoch>);

impl<SnowflakeEpoch> Snowflake<SnowflakeEpoch> {
    #[must_use]
    pub fn new(inner: u64) -> Self {
        Self(inner, PhantomData)
    }

    fn from_parts(millis: u64, worker_id: WorkerId, increment: u16) -> Self {
        let snowflake = (millis & low_bits(TIMESTAMP_LENGTH)) << TIMESTAMP_OFFSET
            | u64::from(worker_id.get()) << WORKER_ID_OFFSET
            | (u64::from(increment) & low_bits(INCREMENT_LENGTH)) << INCREMENT_OFFSET;

        Self::new(snowflake)
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }

    /// Milliseconds between the epoch and the creation of this snowflake.
    #[must_use]
    pub fn millis(self) -> u64 {
        self.0 >> TIMESTAMP_OFFSET
    }

    #[must_use]
    pub fn worker_id(self) -> WorkerId {
        #[allow(clippy::cast_possible_truncation)]
        WorkerId(((self.0 >> WORKER_ID_OFFSET) & low_bits(WORKER_ID_LENGTH)) as u16)
    }

    #[must_use]
    pub fn increment(self) -> u16 {
        #[allow(clippy::cast_possible_truncation)]
        let increment = ((self.0 >> INCREMENT_OFFSET) & low_bits(INCREMENT_LENGTH)) as u16;
        increment
    }

    #[must_use]
    pub fn created_at(self) -> UtcDateTime
    where
        SnowflakeEpoch: Epoch,
    {
        #[allow(clippy::cast_possible_wrap)]
        let millis = self.millis() as i64;
        SnowflakeEpoch::EPOCH_TIME + Duration::milliseconds(millis)
    }
}

impl<SnowflakeEpoch> Display for Snowflake<SnowflakeEpoch> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<SnowflakeEpoch> FromStr for Snowflake<SnowflakeEpoch> {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u64::from_str(s).map(Self::new)
    }
}

impl<SnowflakeEpoch> From<u64> for Snowflake<SnowflakeEpoch> {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl<SnowflakeEpoch> From<Snowflake<SnowflakeEpoch>> for u64 {
    fn from(value: Snowflake<SnowflakeEpoch>) -> Self {
        value.get()
    }
}

// Serialized as a string so JavaScript clients don't lose precision above 2^53.
impl<SnowflakeEpoch> Serialize for Snowflake<SnowflakeEpoch> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&self.0)
    }
}

impl<'de, SnowflakeEpoch> Deserialize<'de> for Snowflake<SnowflakeEpoch> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SnowflakeVisitor;

        impl Visitor<'_> for SnowflakeVisitor {
            type Value = u64;

            fn expecting(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                f.write_str("a snowflake as an unsigned integer or a decimal string")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<u64, E> {
                Ok(value)
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<u64, E> {
                u64::from_str(value)
                    .map_err(|_| E::invalid_value(Unexpected::Str(value), &self))
            }
        }

        deserializer
            .deserialize_any(SnowflakeVisitor)
            .map(Self::new)
    }
}

#[derive_where(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct SnowflakeGenerator<SnowflakeEpoch> {
    worker_id: WorkerId,
    last_millis: u64,
    next_increment: u16,
    phantom_data: PhantomData<SnowflakeEpoch>,
}

impl<SnowflakeEpoch> SnowflakeGenerator<SnowflakeEpoch> {
    #[must_use]
    pub fn new(worker_id: WorkerId) -> Self {
        Self {
            worker_id,
            last_millis: 0,
            next_increment: 0,
            phantom_data: PhantomData,
        }
    }

    #[must_use]
    pub fn worker_id(self) -> WorkerId {
        self.worker_id
    }

    /// Generates a snowflake for `time`.
    ///
    /// The result is always greater than every snowflake this generator produced before: if the
    /// clock went backwards, or the increment for the current millisecond is used up, the
    /// timestamp is moved forward instead.
    pub fn generate_at(
        &mut self,
        time: UtcDateTime,
    ) -> Result<Snowflake<SnowflakeEpoch>, SnowflakeTimeError>
    where
        SnowflakeEpoch: Epoch,
    {
        let millis = millis_since_epoch::<SnowflakeEpoch>(time)?;

        if millis > self.last_millis {
            self.last_millis = millis;
            self.next_increment = 0;
        } else if u64::from(self.next_increment) > low_bits(INCREMENT_LENGTH) {
            self.last_millis += 1;
            self.next_increment = 0;
        }

        let increment = self.next_increment;
        self.next_increment += 1;

        Ok(Snowflake::from_parts(
            self.last_millis,
            self.worker_id,
            increment,
        ))
    }

    pub fn generate(&mut self) -> Result<Snowflake<SnowflakeEpoch>, SnowflakeTimeError>
    where
        SnowflakeEpoch: Epoch,
    {
        self.generate_at(UtcDateTime::now())
    }
}
