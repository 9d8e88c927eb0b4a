//! Transfer rate and ETA derivation from two consecutive samples.
//!
//! All math runs against the nominal tick interval and stays in integers;
//! counters that move backwards produce unknown values instead of wrapping.

use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::RateSample;

const NANOS_PER_SECOND: u128 = 1_000_000_000;

/// Instantaneous transfer rates in bytes per second.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferRate {
    /// Download rate; `None` when it cannot be derived.
    pub download: Option<u64>,
    /// Upload rate; `None` when it cannot be derived.
    pub upload: Option<u64>,
}

impl TransferRate {
    /// Neither direction is known.
    pub const UNKNOWN: Self = Self {
        download: None,
        upload: None,
    };
}

/// Compute per-direction rates between two samples taken `interval` apart.
#[must_use]
pub fn rate(previous: &RateSample, current: &RateSample, interval: Duration) -> TransferRate {
    TransferRate {
        download: current
            .downloaded_since(previous)
            .and_then(|delta| per_second(delta, interval)),
        upload: current
            .uploaded_since(previous)
            .and_then(|delta| per_second(delta, interval)),
    }
}

fn per_second(delta: u64, interval: Duration) -> Option<u64> {
    let nanos = interval.as_nanos();
    if nanos == 0 {
        return None;
    }
    u64::try_from(u128::from(delta) * NANOS_PER_SECOND / nanos).ok()
}

/// Estimated time until a torrent completes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Eta {
    /// Whole seconds remaining.
    Remaining(Duration),
    /// Nothing was downloaded during the last interval.
    Infinite,
    /// Not enough samples, or the counters reset.
    Unknown,
}

/// ETA for `bytes_missing` given `downloaded` bytes over the last `interval`.
#[must_use]
pub fn eta(bytes_missing: u64, downloaded: i64, interval: Duration) -> Eta {
    let Ok(done) = u128::try_from(downloaded) else {
        return Eta::Infinite;
    };
    if done == 0 {
        return Eta::Infinite;
    }
    if interval.is_zero() {
        return Eta::Unknown;
    }
    let seconds = interval.as_nanos() * u128::from(bytes_missing) / done / NANOS_PER_SECOND;
    Eta::Remaining(Duration::from_secs(
        u64::try_from(seconds).unwrap_or(u64::MAX),
    ))
}

impl Eta {
    /// ETA between two samples; a counter reset yields `Unknown`.
    #[must_use]
    pub fn between(
        previous: &RateSample,
        current: &RateSample,
        bytes_missing: u64,
        interval: Duration,
    ) -> Self {
        current
            .downloaded_since(previous)
            .map_or(Self::Unknown, |delta| {
                eta(
                    bytes_missing,
                    i64::try_from(delta).unwrap_or(i64::MAX),
                    interval,
                )
            })
    }
}

impl Display for Eta {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Infinite => formatter.write_str("∞"),
            Self::Unknown => formatter.write_str("?"),
            Self::Remaining(remaining) => {
                let total = remaining.as_secs();
                let hours = total / 3_600;
                let minutes = (total % 3_600) / 60;
                let seconds = total % 60;
                if hours > 0 {
                    write!(formatter, "{hours}h{minutes:02}m")
                } else if minutes > 0 {
                    write!(formatter, "{minutes:02}m{seconds:02}s")
                } else {
                    write!(formatter, "{seconds:02}s")
                }
            }
        }
    }
}
