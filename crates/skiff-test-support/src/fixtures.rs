//! Magnet and metadata fixtures.

use skiff_events::InfoHash;
use skiff_torrent_core::{TorrentFile, TorrentInfo};

/// Tracker announced by every fixture magnet.
pub const TRACKER: &str = "udp://tracker.example.org:1337/announce";

/// Deterministic identity derived from `seed`.
#[must_use]
pub fn info_hash(seed: u8) -> InfoHash {
    let mut bytes = [0_u8; InfoHash::LEN];
    for (index, byte) in (0_u8..).zip(bytes.iter_mut()) {
        *byte = seed.wrapping_mul(31).wrapping_add(index);
    }
    InfoHash::from_bytes(bytes)
}

/// Magnet link for [`info_hash`]`(seed)` with a display name and one tracker.
#[must_use]
pub fn magnet_uri(seed: u8) -> String {
    format!(
        "magnet:?xt=urn:btih:{}&dn=fixture-{seed}&tr={}",
        hex::encode(info_hash(seed).as_bytes()),
        TRACKER.replace(':', "%3A").replace('/', "%2F"),
    )
}

/// Magnet link for [`info_hash`]`(seed)` with no optional parameters.
#[must_use]
pub fn bare_magnet_uri(seed: u8) -> String {
    format!("magnet:?xt=urn:btih:{}", info_hash(seed))
}

/// Two-file layout totalling 1.5 MiB in 256 KiB pieces.
#[must_use]
pub fn sample_info(name: &str) -> TorrentInfo {
    TorrentInfo {
        name: name.to_string(),
        piece_count: 6,
        piece_length: 256 * 1_024,
        files: vec![
            TorrentFile {
                path: format!("{name}/disc.iso"),
                size_bytes: 1_048_576,
            },
            TorrentFile {
                path: format!("{name}/README"),
                size_bytes: 524_288,
            },
        ],
        announce: vec![
            vec![TRACKER.to_string(), "http://backup.example.org/announce".into()],
            vec![TRACKER.to_string()],
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_differ_per_seed_and_render_in_magnets() {
        assert_ne!(info_hash(1), info_hash(2));
        assert!(magnet_uri(7).contains(&info_hash(7).to_hex()));
        assert!(bare_magnet_uri(7).ends_with(&info_hash(7).to_hex()));
    }

    #[test]
    fn sample_info_sizes_add_up() {
        let info = sample_info("demo");
        assert_eq!(info.total_size(), 1_572_864);
        assert_eq!(
            u64::from(info.piece_count) * info.piece_length,
            info.total_size()
        );
    }
}
