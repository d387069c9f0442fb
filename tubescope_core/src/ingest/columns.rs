// src/ingest/columns.rs
//
// Column resolution for YouTube Studio exports. Header naming drifts across
// export vintages and locales, so each logical field is located first by
// exact lower-cased match, then by the first header containing every keyword
// of one of the field's fuzzy sets, in header order.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Title,
    ExternalId,
    Channel,
    PublishDate,
    Views,
    Likes,
    Comments,
    Duration,
    WatchHours,
    AvgViewDuration,
    AvgViewPercentage,
    Impressions,
    Ctr,
    SubscribersGained,
    ContentType,
    Url,
}

pub struct ColumnRule {
    pub field: Field,
    pub exact: &'static [&'static str],
    pub fuzzy: &'static [&'static [&'static str]],
}

/// Tested in order; the first rule claiming a column wins for its field.
pub const COLUMN_RULES: &[ColumnRule] = &[
    ColumnRule {
        field: Field::Title,
        exact: &["video title", "title"],
        fuzzy: &[&["video", "title"]],
    },
    ColumnRule {
        field: Field::ExternalId,
        exact: &["content", "video id"],
        fuzzy: &[&["video", "id"]],
    },
    ColumnRule {
        field: Field::Channel,
        exact: &["channel", "channel name", "channel title"],
        fuzzy: &[&["channel"]],
    },
    ColumnRule {
        field: Field::PublishDate,
        exact: &["video publish time", "publish date", "publish time", "published"],
        fuzzy: &[&["publish"]],
    },
    ColumnRule {
        field: Field::Views,
        exact: &["views", "view count"],
        fuzzy: &[&["view", "count"]],
    },
    ColumnRule {
        field: Field::Likes,
        exact: &["likes", "like count"],
        fuzzy: &[&["like", "count"]],
    },
    ColumnRule {
        field: Field::Comments,
        exact: &["comments", "comments added", "comment count"],
        fuzzy: &[&["comment"]],
    },
    ColumnRule {
        field: Field::Duration,
        exact: &["duration", "video duration", "video length"],
        // A bare "duration" keyword would also claim "Average view
        // duration", which is retention, not length.
        fuzzy: &[&["video", "duration"], &["video", "length"]],
    },
    ColumnRule {
        field: Field::WatchHours,
        exact: &["watch time (hours)", "watch hours"],
        fuzzy: &[&["watch", "hours"], &["watch", "time"]],
    },
    ColumnRule {
        field: Field::AvgViewDuration,
        exact: &["average view duration"],
        fuzzy: &[&["average", "view", "duration"]],
    },
    ColumnRule {
        field: Field::AvgViewPercentage,
        exact: &["average percentage viewed (%)", "average percentage viewed"],
        fuzzy: &[&["average", "percentage", "viewed"], &["average", "viewed"]],
    },
    ColumnRule {
        field: Field::Impressions,
        exact: &["impressions"],
        fuzzy: &[],
    },
    ColumnRule {
        field: Field::Ctr,
        exact: &["impressions click-through rate (%)", "ctr"],
        fuzzy: &[&["click", "rate"], &["ctr"]],
    },
    ColumnRule {
        field: Field::SubscribersGained,
        exact: &["subscribers gained", "subscribers"],
        fuzzy: &[&["subscriber"]],
    },
    ColumnRule {
        field: Field::ContentType,
        exact: &["content type", "video type", "format"],
        fuzzy: &[&["content", "type"]],
    },
    ColumnRule {
        field: Field::Url,
        exact: &["video url", "url", "video link"],
        fuzzy: &[&["link"]],
    },
];

#[derive(Debug, Default)]
pub struct ColumnMap {
    indices: HashMap<Field, usize>,
}

impl ColumnMap {
    pub fn resolve(headers: &[String]) -> Self {
        let lowered: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
        let mut indices = HashMap::new();

        for rule in COLUMN_RULES {
            let exact_hit = lowered
                .iter()
                .position(|h| rule.exact.contains(&h.as_str()));
            let hit = exact_hit.or_else(|| {
                lowered.iter().position(|h| {
                    rule.fuzzy
                        .iter()
                        .any(|keywords| keywords.iter().all(|k| h.contains(k)))
                })
            });
            if let Some(idx) = hit {
                indices.insert(rule.field, idx);
            }
        }

        Self { indices }
    }

    pub fn get(&self, field: Field) -> Option<usize> {
        self.indices.get(&field).copied()
    }

    pub fn cell<'a>(&self, row: &'a [String], field: Field) -> &'a str {
        self.get(field)
            .and_then(|idx| row.get(idx))
            .map(|s| s.as_str())
            .unwrap_or("")
    }

    pub fn has(&self, field: Field) -> bool {
        self.indices.contains_key(&field)
    }

    /// A row counts as a video-table header once it locates both a title and
    /// a publish-date column.
    pub fn is_video_header(&self) -> bool {
        self.has(Field::Title) && self.has(Field::PublishDate)
    }
}
