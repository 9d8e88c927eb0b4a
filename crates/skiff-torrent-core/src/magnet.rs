//! Local validation of magnet URIs before they reach the engine.

use skiff_events::InfoHash;
use thiserror::Error;
use url::Url;

const BTIH_PREFIX: &str = "urn:btih:";

/// The parts of a magnet link the coordinator cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Magnet {
    /// Identity carried by the `xt` parameter.
    pub info_hash: InfoHash,
    /// Display name from `dn`, if present and non-empty.
    pub display_name: Option<String>,
    /// Tracker URLs from every `tr` parameter.
    pub trackers: Vec<String>,
}

/// Reasons a magnet URI is rejected locally.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MagnetError {
    /// Input could not be parsed as a URI.
    #[error("magnet uri is malformed")]
    Malformed {
        /// Parser diagnostic.
        detail: String,
    },
    /// URI scheme was not `magnet`.
    #[error("uri is not a magnet link")]
    WrongScheme {
        /// Scheme that was supplied.
        scheme: String,
    },
    /// No `xt=urn:btih:` parameter was present.
    #[error("magnet link has no bittorrent info-hash")]
    MissingInfoHash,
    /// The info-hash parameter did not decode.
    #[error("magnet link info-hash is invalid")]
    InvalidInfoHash {
        /// Raw hash text.
        value: String,
    },
}

impl Magnet {
    /// Parse and validate a magnet URI. Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns a [`MagnetError`] when the URI is not a magnet link carrying a
    /// valid BitTorrent v1 info-hash.
    pub fn parse(uri: &str) -> Result<Self, MagnetError> {
        let url = Url::parse(uri.trim()).map_err(|err| MagnetError::Malformed {
            detail: err.to_string(),
        })?;
        if url.scheme() != "magnet" {
            return Err(MagnetError::WrongScheme {
                scheme: url.scheme().to_string(),
            });
        }

        let mut info_hash = None;
        let mut display_name = None;
        let mut trackers = Vec::new();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "xt" if info_hash.is_none() => {
                    if let Some(raw) = strip_btih(&value) {
                        let parsed = raw.parse::<InfoHash>().map_err(|_| {
                            MagnetError::InvalidInfoHash {
                                value: raw.to_string(),
                            }
                        })?;
                        info_hash = Some(parsed);
                    }
                }
                "dn" if !value.trim().is_empty() => display_name = Some(value.into_owned()),
                "tr" => trackers.push(value.into_owned()),
                _ => {}
            }
        }

        Ok(Self {
            info_hash: info_hash.ok_or(MagnetError::MissingInfoHash)?,
            display_name,
            trackers,
        })
    }
}

fn strip_btih(value: &str) -> Option<&str> {
    let prefix = value.get(..BTIH_PREFIX.len())?;
    prefix
        .eq_ignore_ascii_case(BTIH_PREFIX)
        .then(|| &value[BTIH_PREFIX.len()..])
}
