//! Parsing for user-entered rate limits (KiB/s).

use serde::{Deserialize, Serialize};
use thiserror::Error;

const BYTES_PER_KIB: i64 = 1_024;

/// A process-wide rate limit as the user expressed it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "bytes_per_second", rename_all = "snake_case")]
pub enum RateLimit {
    /// No cap.
    Unlimited,
    /// Cap in bytes per second. Negative values parse but are never applied.
    BytesPerSecond(i64),
}

impl RateLimit {
    /// Limit from a configured KiB/s value; zero means unlimited.
    ///
    /// # Errors
    ///
    /// Returns [`RateInputError::OutOfRange`] when the byte rate overflows.
    pub fn from_kib(kib: i64) -> Result<Self, RateInputError> {
        if kib == 0 {
            return Ok(Self::Unlimited);
        }
        kib.checked_mul(BYTES_PER_KIB)
            .map(Self::BytesPerSecond)
            .ok_or_else(|| RateInputError::OutOfRange {
                input: kib.to_string(),
            })
    }

    /// Value handed to the engine limiter: `None` for unlimited.
    ///
    /// # Errors
    ///
    /// Returns [`RateInputError::Negative`] for negative rates.
    pub fn to_engine(self) -> Result<Option<u64>, RateInputError> {
        match self {
            Self::Unlimited | Self::BytesPerSecond(0) => Ok(None),
            Self::BytesPerSecond(value) => u64::try_from(value)
                .map(Some)
                .map_err(|_| RateInputError::Negative { value }),
        }
    }
}

/// Errors produced while interpreting rate-limit input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RateInputError {
    /// Input is not a base-10 integer.
    #[error("rate is not a number")]
    NotANumber {
        /// Rejected text.
        input: String,
    },
    /// The byte rate does not fit in a signed 64-bit integer.
    #[error("rate is out of range")]
    OutOfRange {
        /// Rejected text.
        input: String,
    },
    /// A negative rate reached a limiter.
    #[error("rate must not be negative")]
    Negative {
        /// Rejected byte rate.
        value: i64,
    },
}

/// Parse a KiB/s string into a [`RateLimit`].
///
/// `"0"` means unlimited. Negative values parse; applying them fails later.
///
/// # Errors
///
/// Returns [`RateInputError::NotANumber`] for non-integer input and
/// [`RateInputError::OutOfRange`] when multiplying by 1024 overflows.
pub fn parse_rate_input(text: &str) -> Result<RateLimit, RateInputError> {
    let trimmed = text.trim();
    let kib: i64 = trimmed
        .parse()
        .map_err(|err: std::num::ParseIntError| match err.kind() {
            std::num::IntErrorKind::PosOverflow | std::num::IntErrorKind::NegOverflow => {
                RateInputError::OutOfRange {
                    input: trimmed.to_string(),
                }
            }
            _ => RateInputError::NotANumber {
                input: trimmed.to_string(),
            },
        })?;
    RateLimit::from_kib(kib).map_err(|_| RateInputError::OutOfRange {
        input: trimmed.to_string(),
    })
}
