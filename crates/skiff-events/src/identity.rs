//! Content-hash identity shared by every per-torrent structure.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// BitTorrent v1 info-hash: the fixed-size identity assigned by the engine.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InfoHash([u8; InfoHash::LEN]);

impl InfoHash {
    /// Length of the hash in bytes.
    pub const LEN: usize = 20;

    /// Wrap raw hash bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; Self::LEN]) -> Self {
        Self(bytes)
    }

    /// Borrow the raw hash bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }

    /// Lowercase hexadecimal rendering (40 characters).
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Display for InfoHash {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.to_hex())
    }
}

impl fmt::Debug for InfoHash {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "InfoHash({})", self.to_hex())
    }
}

/// Error returned when an info-hash string cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoHashError {
    /// Input was neither 40 hex characters nor 32 base32 characters.
    InvalidLength {
        /// Length of the rejected input.
        len: usize,
    },
    /// Input had a valid length but contained characters outside its alphabet.
    InvalidEncoding,
}

impl Display for InfoHashError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLength { .. } => formatter.write_str("info-hash has invalid length"),
            Self::InvalidEncoding => formatter.write_str("info-hash has invalid encoding"),
        }
    }
}

impl std::error::Error for InfoHashError {}

impl FromStr for InfoHash {
    type Err = InfoHashError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.len() {
            40 => {
                let mut bytes = [0_u8; Self::LEN];
                hex::decode_to_slice(value, &mut bytes)
                    .map_err(|_| InfoHashError::InvalidEncoding)?;
                Ok(Self(bytes))
            }
            32 => decode_base32(value)
                .map(Self)
                .ok_or(InfoHashError::InvalidEncoding),
            len => Err(InfoHashError::InvalidLength { len }),
        }
    }
}

// RFC 4648 alphabet, no padding; 32 characters carry exactly 160 bits.
#[expect(
    clippy::cast_possible_truncation,
    reason = "value is masked to a single byte before narrowing"
)]
fn decode_base32(input: &str) -> Option<[u8; InfoHash::LEN]> {
    let mut out = [0_u8; InfoHash::LEN];
    let mut buffer: u32 = 0;
    let mut bits = 0_u32;
    let mut index = 0;
    for byte in input.bytes() {
        let value = match byte.to_ascii_uppercase() {
            upper @ b'A'..=b'Z' => upper - b'A',
            digit @ b'2'..=b'7' => digit - b'2' + 26,
            _ => return None,
        };
        buffer = ((buffer << 5) | u32::from(value)) & 0x0fff;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            *out.get_mut(index)? = ((buffer >> bits) & 0xff) as u8;
            index += 1;
        }
    }
    (index == InfoHash::LEN).then_some(out)
}

impl Serialize for InfoHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for InfoHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}
