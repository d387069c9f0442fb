// src/ingest/layout.rs
//
// Physical table layouts. YouTube Studio exports arrive either as a single
// header-row table ("standard") or as several blocks stacked vertically,
// each preceded by a channel-name cell ("stacked"). Parsing tries standard
// first and falls back to stacked; a file neither layout can interpret
// yields an empty result, not an error.

use crate::ingest::columns::ColumnMap;
use crate::ingest::normalize::build_record;
use crate::model::VideoRecord;

/// Reads raw CSV text into trimmed string rows. Unreadable records are
/// skipped; blank lines never surface.
pub fn read_rows(text: &str) -> Vec<Vec<String>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let Ok(record) = record else { continue };
        let row: Vec<String> = record.iter().map(|c| c.trim().to_string()).collect();
        if row.iter().any(|c| !c.is_empty()) {
            rows.push(row);
        }
    }
    rows
}

/// Parses export text in whichever layout matches.
pub fn parse_export_text(text: &str, default_channel: &str) -> Vec<VideoRecord> {
    let rows = read_rows(text);
    let standard = parse_standard(&rows, default_channel);
    if !standard.is_empty() {
        return standard;
    }
    parse_stacked(&rows, default_channel)
}

fn parse_standard(rows: &[Vec<String>], default_channel: &str) -> Vec<VideoRecord> {
    let Some((header, data)) = rows.split_first() else {
        return Vec::new();
    };
    let columns = ColumnMap::resolve(header);
    if !columns.is_video_header() {
        return Vec::new();
    }
    data.iter()
        .enumerate()
        .filter_map(|(i, row)| build_record(row, &columns, default_channel, i))
        .collect()
}

fn parse_stacked(rows: &[Vec<String>], default_channel: &str) -> Vec<VideoRecord> {
    let mut out = Vec::new();
    let mut columns: Option<ColumnMap> = None;
    let mut channel = default_channel.to_string();
    let mut pending_channel: Option<String> = None;
    let mut ordinal = 0usize;

    for row in rows {
        let resolved = ColumnMap::resolve(row);
        if resolved.is_video_header() {
            channel = pending_channel.take().unwrap_or_else(|| default_channel.to_string());
            columns = Some(resolved);
            continue;
        }

        let non_empty: Vec<&String> = row.iter().filter(|c| !c.is_empty()).collect();
        if non_empty.len() == 1 {
            // A lone cell between blocks names the next block's channel.
            pending_channel = Some(non_empty[0].clone());
            continue;
        }

        if let Some(cols) = &columns {
            if let Some(record) = build_record(row, cols, &channel, ordinal) {
                out.push(record);
                ordinal += 1;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const STANDARD: &str = "\
Content,Video title,Video publish time,Views,Likes,Comments added,Duration
abc111,Gear Review Ep 1,2024-01-05,1000,50,10,600
abc222,Gear Review Ep 2,2024-01-12,1500,60,12,640
,Total,,2500,110,22,";

    #[test]
    fn standard_layout_parses_and_drops_total_row() {
        let records = parse_export_text(STANDARD, "Main");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].external_id, "abc111");
        assert_eq!(records[0].channel, "Main");
        assert_eq!(records[1].view_count, 1500);
    }

    const STACKED: &str = "\
Channel Alpha,,,
Video title,Video publish time,Views,Likes
Alpha Vlog 1,2024-02-01,100,5
Alpha Vlog 2,2024-02-08,120,6
Channel Beta,,,
Video title,Video publish time,Views,Likes
Beta Build 1,2024-03-01,300,9";

    #[test]
    fn stacked_layout_yields_per_block_channels() {
        let records = parse_export_text(STACKED, "fallback");
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].channel, "Channel Alpha");
        assert_eq!(records[2].channel, "Channel Beta");
    }

    #[test]
    fn uninterpretable_text_yields_empty_not_error() {
        let records = parse_export_text("just some prose\nwith,random,cells", "ch");
        assert!(records.is_empty());
    }

    #[test]
    fn synthetic_ids_are_assigned_when_absent() {
        let text = "\
Video title,Video publish time,Views
No Id Here,2024-01-05,10
Another,2024-01-06,20";
        let records = parse_export_text(text, "ch");
        assert_eq!(records[0].external_id, "row-0");
        assert_eq!(records[1].external_id, "row-1");
    }
}
