// src/ingest/normalize.rs
//
// Cell-level normalization. Every parser here is total: garbage input
// becomes a default value, never NaN and never an error, so downstream
// arithmetic stays safe.

use crate::ingest::columns::{ColumnMap, Field};
use crate::model::{VideoFormat, VideoRecord};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Aggregate/summary rows carry this literal in the title column.
const AGGREGATE_ROW_MARKER: &str = "Total";

/// Percentage-like values above this are assumed to arrive on a 0-100 scale.
/// Legitimate fractions in (1.0, 1.2] - retention slightly over 100% from
/// replays - pass through untouched.
const PERCENT_SCALE_CUTOFF: f64 = 1.2;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Parses a count-like cell: strips thousands separators and `%`, defaults
/// to 0 on anything non-numeric.
pub fn parse_number(raw: &str) -> f64 {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != ',' && *c != '%' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return 0.0;
    }
    cleaned.parse::<f64>().unwrap_or(0.0)
}

pub fn parse_count(raw: &str) -> u64 {
    let value = parse_number(raw);
    if value.is_sign_negative() {
        0
    } else {
        value.round() as u64
    }
}

/// Parses a percentage-like cell into a 0-1 fraction.
pub fn parse_fraction(raw: &str) -> f64 {
    let value = parse_number(raw);
    if value > PERCENT_SCALE_CUTOFF {
        value / 100.0
    } else {
        value
    }
}

/// Accepts raw integer seconds or `H:MM:SS` / `MM:SS`; unparseable -> 0.
pub fn parse_duration_seconds(raw: &str) -> u64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0;
    }
    if !trimmed.contains(':') {
        return parse_number(trimmed).max(0.0).round() as u64;
    }
    let parts: Vec<&str> = trimmed.split(':').collect();
    let mut numeric = Vec::with_capacity(parts.len());
    for part in &parts {
        match part.trim().parse::<u64>() {
            Ok(n) => numeric.push(n),
            Err(_) => return 0,
        }
    }
    match numeric.as_slice() {
        [m, s] => m * 60 + s,
        [h, m, s] => h * 3600 + m * 60 + s,
        _ => 0,
    }
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%b %d, %Y", "%d %b %Y", "%m/%d/%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%b %d, %Y %H:%M:%S"];

pub fn parse_publish_date(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(Utc.from_utc_datetime(&dt));
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(trimmed, fmt) {
            let dt = d.and_hms_opt(0, 0, 0)?;
            return Some(Utc.from_utc_datetime(&dt));
        }
    }
    None
}

/// Signals feeding format classification.
pub struct FormatSignals<'a> {
    pub content_type: &'a str,
    pub url: &'a str,
    pub duration_seconds: u64,
}

const SHORT_MAX_SECONDS: u64 = 180;

/// Ordered predicate chain; the first rule returning Some wins. A bare
/// `/watch?v=` URL is NOT long-form evidence - Shorts use that URL shape
/// too - so no rule inspects it.
const FORMAT_RULES: &[fn(&FormatSignals<'_>) -> Option<VideoFormat>] = &[
    |s| {
        let ct = s.content_type.to_lowercase();
        if ct.contains("short") {
            Some(VideoFormat::Short)
        } else if ct.contains("long") {
            Some(VideoFormat::Long)
        } else {
            None
        }
    },
    |s| {
        if s.url.contains("/shorts/") {
            Some(VideoFormat::Short)
        } else {
            None
        }
    },
    |s| {
        if s.duration_seconds <= SHORT_MAX_SECONDS {
            Some(VideoFormat::Short)
        } else {
            None
        }
    },
];

pub fn classify_format(signals: &FormatSignals<'_>) -> VideoFormat {
    FORMAT_RULES
        .iter()
        .find_map(|rule| rule(signals))
        .unwrap_or(VideoFormat::Long)
}

/// Builds a record from one data row, or None for rows that are routinely
/// dropped: missing title, the aggregate "Total" row, unparseable date.
pub fn build_record(
    row: &[String],
    columns: &ColumnMap,
    channel: &str,
    synthetic_ordinal: usize,
) -> Option<VideoRecord> {
    let title = columns.cell(row, Field::Title).trim();
    if title.is_empty() || title == AGGREGATE_ROW_MARKER {
        return None;
    }
    let published_at = parse_publish_date(columns.cell(row, Field::PublishDate))?;

    let view_count = parse_count(columns.cell(row, Field::Views));
    let duration_seconds = parse_duration_seconds(columns.cell(row, Field::Duration));
    let avg_view_percentage = parse_fraction(columns.cell(row, Field::AvgViewPercentage));

    let mut watch_hours = parse_number(columns.cell(row, Field::WatchHours)).max(0.0);
    if watch_hours == 0.0 {
        // Backfill only on an exact zero; "absent" and "genuinely zero" are
        // indistinguishable here.
        if columns.has(Field::AvgViewDuration) {
            let avg_secs =
                parse_duration_seconds(columns.cell(row, Field::AvgViewDuration)) as f64;
            watch_hours = view_count as f64 * avg_secs / SECONDS_PER_HOUR;
        } else {
            watch_hours = view_count as f64 * duration_seconds as f64 * avg_view_percentage
                / SECONDS_PER_HOUR;
        }
    }

    let external_id = {
        let raw = columns.cell(row, Field::ExternalId).trim();
        if raw.is_empty() {
            format!("row-{}", synthetic_ordinal)
        } else {
            raw.to_string()
        }
    };

    let channel = {
        let cell = columns.cell(row, Field::Channel).trim();
        if cell.is_empty() {
            channel.to_string()
        } else {
            cell.to_string()
        }
    };

    let format = classify_format(&FormatSignals {
        content_type: columns.cell(row, Field::ContentType),
        url: columns.cell(row, Field::Url),
        duration_seconds,
    });

    Some(VideoRecord {
        external_id,
        title: title.to_string(),
        channel,
        published_at,
        view_count,
        like_count: parse_count(columns.cell(row, Field::Likes)),
        comment_count: parse_count(columns.cell(row, Field::Comments)),
        duration_seconds,
        watch_hours,
        impressions: parse_count(columns.cell(row, Field::Impressions)),
        ctr: parse_fraction(columns.cell(row, Field::Ctr)),
        avg_view_percentage,
        subscribers_gained: parse_number(columns.cell(row, Field::SubscribersGained)) as i64,
        format,
    })
}
