//! Column text for the torrent table and the details pane.

use crate::model::{TorrentDetails, TorrentRow};

/// Table header, in display order.
pub const COLUMNS: [&str; 7] = [
    "status",
    "name",
    "completed",
    "total",
    "eta",
    "downrate",
    "uprate",
];

/// Horizontal alignment of a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    /// Pad on the right.
    Left,
    /// Pad on the left.
    Right,
}

/// Alignment per column, matching [`COLUMNS`].
pub const ALIGNMENT: [Align; 7] = [
    Align::Left,
    Align::Left,
    Align::Right,
    Align::Right,
    Align::Right,
    Align::Right,
    Align::Right,
];

/// Marker shown in the details pane while metadata is unresolved.
pub const FETCHING_METADATA: &str = "fetching metainfo...";

/// Size in MiB with one decimal, e.g. `1.5m`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_size(bytes: u64) -> String {
    format!("{:.1}m", bytes as f64 / (1_024.0 * 1_024.0))
}

/// Rate in whole KiB/s, e.g. `12k`; unknown rates render as `?`.
#[must_use]
pub fn format_rate(bytes_per_second: Option<u64>) -> String {
    bytes_per_second.map_or_else(|| "?".to_string(), |rate| format!("{}k", rate / 1_024))
}

/// Cell text for a row, matching [`COLUMNS`].
#[must_use]
pub fn row_cells(row: &TorrentRow) -> [String; 7] {
    [
        row.phase.label().to_string(),
        row.name.clone(),
        row.completed.map_or_else(|| "0".to_string(), format_size),
        row.total.map_or_else(|| "?".to_string(), format_size),
        row.eta.to_string(),
        format_rate(row.rate.download),
        format_rate(row.rate.upload),
    ]
}

/// Render rows as a padded text table with a header line.
#[must_use]
pub fn render_table(rows: &[TorrentRow]) -> String {
    let body: Vec<[String; 7]> = rows.iter().map(row_cells).collect();
    let mut widths = COLUMNS.map(|name| name.chars().count());
    for cells in &body {
        for (width, cell) in widths.iter_mut().zip(cells) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let header = COLUMNS.map(str::to_string);
    std::iter::once(&header)
        .chain(body.iter())
        .map(|cells| render_line(cells, &widths))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_line(cells: &[String; 7], widths: &[usize; 7]) -> String {
    cells
        .iter()
        .zip(widths)
        .zip(ALIGNMENT)
        .map(|((cell, width), align)| match align {
            Align::Left => format!("{cell:<width$}"),
            Align::Right => format!("{cell:>width$}"),
        })
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

/// Details pane as labelled lines.
#[must_use]
pub fn detail_lines(details: &TorrentDetails) -> Vec<String> {
    let mut lines = vec![
        format!("{} [{}]", details.id, details.desired.action_label()),
        format!("Added  {}", details.added_at.format("%Y-%m-%d %H:%M:%S UTC")),
    ];
    match &details.metadata {
        None => lines.push(FETCHING_METADATA.to_string()),
        Some(meta) => {
            lines.push("Files".to_string());
            lines.extend(
                meta.files
                    .iter()
                    .map(|file| format!("  {}  {}", file.path, format_size(file.size_bytes))),
            );
            lines.push("Info".to_string());
            lines.push(format!("  Pieces  {}", meta.piece_count));
            lines.push(format!("  Piece length  {}", meta.piece_length));
            lines.push(format!("  Name  {}", meta.name));
            lines.push("Announces".to_string());
            lines.extend(meta.announces.iter().map(|url| format!("  {url}")));
        }
    }
    if let Some(stats) = &details.connection {
        lines.push("Connection stats".to_string());
        let pairs = [
            ("Active peers", stats.active_peers.to_string()),
            ("Half open peers", stats.half_open_peers.to_string()),
            ("Pending peers", stats.pending_peers.to_string()),
            ("Total peers", stats.total_peers.to_string()),
            ("Chunks written", stats.chunks_written.to_string()),
            ("Chunks read", stats.chunks_read.to_string()),
            ("Data written", format_size(stats.data_bytes_written)),
            ("Data read", format_size(stats.data_bytes_read)),
            (
                "Total written (including overhead)",
                format_size(stats.bytes_written),
            ),
            ("Total read", format_size(stats.bytes_read)),
        ];
        lines.extend(
            pairs
                .into_iter()
                .map(|(label, value)| format!("  {label}  {value}")),
        );
    }
    lines
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use skiff_events::{InfoHash, TorrentPhase};

    use super::*;
    use crate::metrics::{Eta, TransferRate};
    use crate::model::{DesiredState, MetadataSummary, TorrentFile, TorrentStats};

    fn row() -> TorrentRow {
        TorrentRow {
            id: InfoHash::from_bytes([1; 20]),
            phase: TorrentPhase::Downloading,
            desired: DesiredState::Active,
            name: "debian.iso".into(),
            completed: Some(1_572_864),
            total: Some(10 * 1_048_576),
            eta: Eta::Remaining(Duration::from_secs(125)),
            rate: TransferRate {
                download: Some(51_200),
                upload: Some(1_023),
            },
        }
    }

    #[test]
    fn sizes_and_rates_use_binary_units() {
        assert_eq!(format_size(0), "0.0m");
        assert_eq!(format_size(1_572_864), "1.5m");
        assert_eq!(format_rate(Some(51_200)), "50k");
        assert_eq!(format_rate(Some(1_023)), "0k");
        assert_eq!(format_rate(None), "?");
    }

    #[test]
    fn row_cells_follow_column_order() {
        let cells = row_cells(&row());
        assert_eq!(
            cells,
            [
                "downloading".to_string(),
                "debian.iso".to_string(),
                "1.5m".to_string(),
                "10.0m".to_string(),
                "02m05s".to_string(),
                "50k".to_string(),
                "0k".to_string(),
            ]
        );
    }

    #[test]
    fn rows_without_metadata_show_placeholders() {
        let placeholder =
            TorrentRow::placeholder(InfoHash::from_bytes([2; 20]), "x".into(), DesiredState::Active);
        let cells = row_cells(&placeholder);
        assert_eq!(cells[0], "starting");
        assert_eq!(cells[2], "0");
        assert_eq!(cells[3], "?");
        assert_eq!(cells[4], "?");
    }

    #[test]
    fn table_aligns_columns() {
        let table = render_table(&[row()]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("status       name"));
        assert!(lines[1].starts_with("downloading  debian.iso"));
        assert!(lines[1].ends_with("50k      0k"));
    }

    #[test]
    fn details_cover_metadata_and_connection_sections() {
        let details = TorrentDetails {
            id: InfoHash::from_bytes([4; 20]),
            desired: DesiredState::Paused,
            added_at: Utc
                .with_ymd_and_hms(2026, 3, 1, 12, 30, 0)
                .single()
                .expect("valid timestamp"),
            metadata: Some(MetadataSummary {
                name: "demo".into(),
                piece_count: 3,
                piece_length: 262_144,
                files: vec![TorrentFile {
                    path: "demo/readme.txt".into(),
                    size_bytes: 1_048_576,
                }],
                announces: vec!["udp://tracker.example:1337".into()],
            }),
            connection: Some(TorrentStats {
                active_peers: 2,
                ..TorrentStats::default()
            }),
        };
        let lines = detail_lines(&details);
        assert!(lines[0].ends_with("[start]"));
        assert_eq!(lines[1], "Added  2026-03-01 12:30:00 UTC");
        assert!(lines.contains(&"  demo/readme.txt  1.0m".to_string()));
        assert!(lines.contains(&"  Pieces  3".to_string()));
        assert!(lines.contains(&"  udp://tracker.example:1337".to_string()));
        assert!(lines.contains(&"  Active peers  2".to_string()));

        let pending = TorrentDetails {
            metadata: None,
            connection: None,
            ..details
        };
        assert!(pending.fetching_metadata());
        assert_eq!(detail_lines(&pending)[2], FETCHING_METADATA);
    }
}
