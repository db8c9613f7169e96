use std::fmt;

use chrono::{DateTime, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// 100-nanosecond ticks per second.
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Seconds between 0001-01-01T00:00:00 and the UNIX epoch.
const UNIX_EPOCH_SECONDS: i64 = 62_135_596_800;

const TICKS_MASK: u64 = (1 << 62) - 1;

/// How a [`NetDateTime`] relates to UTC.
///
/// Stored in the top two bits of the 64-bit wire value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DateTimeKind {
    Unspecified = 0,
    Utc = 1,
    Local = 2,
}

impl DateTimeKind {
    pub fn from_bits(bits: u8) -> Result<Self, TypeError> {
        match bits {
            0 => Ok(Self::Unspecified),
            1 => Ok(Self::Utc),
            2 => Ok(Self::Local),
            other => Err(TypeError::InvalidDateTimeKind(other)),
        }
    }
}

/// A calendar timestamp as 100ns ticks since 0001-01-01 plus a [`DateTimeKind`].
///
/// Wire layout: one little-endian `u64`, ticks in the low 62 bits and the
/// kind in the high 2 bits.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetDateTime {
    ticks: u64,
    kind: DateTimeKind,
}

impl NetDateTime {
    /// Create from raw ticks. Ticks must fit in 62 bits.
    pub fn new(ticks: u64, kind: DateTimeKind) -> Result<Self, TypeError> {
        if ticks > TICKS_MASK {
            return Err(TypeError::TicksOutOfRange(ticks));
        }
        Ok(Self { ticks, kind })
    }

    /// Split a 64-bit wire value into ticks and kind.
    pub fn from_bits(bits: u64) -> Result<Self, TypeError> {
        let kind = DateTimeKind::from_bits((bits >> 62) as u8)?;
        Ok(Self {
            ticks: bits & TICKS_MASK,
            kind,
        })
    }

    /// The 64-bit wire value.
    pub fn to_bits(self) -> u64 {
        self.ticks | ((self.kind as u64) << 62)
    }

    pub fn ticks(self) -> u64 {
        self.ticks
    }

    pub fn kind(self) -> DateTimeKind {
        self.kind
    }

    /// Convert from a chrono timestamp. Sub-tick precision is truncated.
    pub fn from_naive(dt: NaiveDateTime, kind: DateTimeKind) -> Result<Self, TypeError> {
        let utc = dt.and_utc();
        let seconds = utc.timestamp() + UNIX_EPOCH_SECONDS;
        if seconds < 0 {
            return Err(TypeError::TicksOutOfRange(0));
        }
        // Leap-second representation can report >= 1e9 nanos.
        let nanos = utc.timestamp_subsec_nanos().min(999_999_999);
        let ticks = (seconds as u64)
            .checked_mul(TICKS_PER_SECOND as u64)
            .and_then(|t| t.checked_add(u64::from(nanos / 100)))
            .ok_or(TypeError::TicksOutOfRange(u64::MAX))?;
        Self::new(ticks, kind)
    }

    /// Convert to a chrono timestamp, ignoring the kind.
    pub fn to_naive(self) -> Option<NaiveDateTime> {
        let seconds = (self.ticks / TICKS_PER_SECOND as u64) as i64 - UNIX_EPOCH_SECONDS;
        let nanos = (self.ticks % TICKS_PER_SECOND as u64) as u32 * 100;
        DateTime::from_timestamp(seconds, nanos).map(|dt| dt.naive_utc())
    }
}

impl fmt::Debug for NetDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NetDateTime({}t, {:?})", self.ticks, self.kind)
    }
}

impl fmt::Display for NetDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_naive() {
            Some(dt) => write!(f, "{dt} ({:?})", self.kind),
            None => write!(f, "{}t ({:?})", self.ticks, self.kind),
        }
    }
}

/// A signed duration in 100-nanosecond ticks.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct TimeSpan(pub i64);

impl TimeSpan {
    pub const fn from_ticks(ticks: i64) -> Self {
        Self(ticks)
    }

    pub fn ticks(self) -> i64 {
        self.0
    }

    /// Convert from a chrono duration. Returns `None` if it does not fit.
    pub fn from_delta(delta: TimeDelta) -> Option<Self> {
        let seconds = delta.num_seconds();
        let rem = delta - TimeDelta::seconds(seconds);
        let sub_ticks = rem.num_nanoseconds()? / 100;
        seconds
            .checked_mul(TICKS_PER_SECOND)
            .and_then(|t| t.checked_add(sub_ticks))
            .map(Self)
    }

    pub fn to_delta(self) -> TimeDelta {
        TimeDelta::seconds(self.0 / TICKS_PER_SECOND)
            + TimeDelta::nanoseconds((self.0 % TICKS_PER_SECOND) * 100)
    }
}

impl fmt::Debug for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimeSpan({}t)", self.0)
    }
}
