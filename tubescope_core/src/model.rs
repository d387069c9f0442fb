// src/model.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// YouTube's vertical short-form vs. traditional video format.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum VideoFormat {
    Short,
    #[default]
    Long,
}

/// One ingested video. Built once by the normalizer and read-only afterward;
/// the detection pipeline only groups references to it.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VideoRecord {
    /// Platform video ID. Synthetic (`row-N`) when the export carried none.
    pub external_id: String,
    pub title: String,
    pub channel: String,
    /// Rows without a parseable publish date are dropped during ingestion,
    /// so every record that reaches the pipeline carries a real date.
    pub published_at: DateTime<Utc>,
    pub view_count: u64,
    pub like_count: u64,
    pub comment_count: u64,
    pub duration_seconds: u64,
    pub watch_hours: f64,
    pub impressions: u64,
    /// Click-through rate as a 0-1 fraction.
    pub ctr: f64,
    /// Average percentage viewed as a 0-1 fraction.
    pub avg_view_percentage: f64,
    pub subscribers_gained: i64,
    pub format: VideoFormat,
}

impl VideoRecord {
    /// Per-video engagement: (likes + comments) / max(views, 1).
    pub fn engagement_rate(&self) -> f64 {
        let views = self.view_count.max(1) as f64;
        (self.like_count + self.comment_count) as f64 / views
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    Pattern,
    Semantic,
}

/// Which deterministic rule produced a pattern series.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PatternSource {
    EpisodeMarker,
    BracketPrefix,
    RecurringPrefix,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
}

/// Intermediate grouping before metrics. A video belongs to at most one
/// pattern series; the semantic pass only sees videos the pattern pass
/// left uncategorized.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SeriesCandidate {
    pub name: String,
    /// Unique member video IDs, in assignment order.
    pub video_ids: Vec<String>,
    pub detection_method: DetectionMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern_source: Option<PatternSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
}

impl SeriesCandidate {
    pub fn pattern(name: impl Into<String>, source: PatternSource) -> Self {
        Self {
            name: name.into(),
            video_ids: Vec::new(),
            detection_method: DetectionMethod::Pattern,
            pattern_source: Some(source),
            confidence: None,
        }
    }

    pub fn semantic(name: impl Into<String>, confidence: Confidence) -> Self {
        Self {
            name: name.into(),
            video_ids: Vec::new(),
            detection_method: DetectionMethod::Semantic,
            pattern_source: None,
            confidence: Some(confidence),
        }
    }

    pub fn push_video(&mut self, id: &str) {
        if !self.video_ids.iter().any(|v| v == id) {
            self.video_ids.push(id.to_string());
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceTrend {
    Growing,
    Declining,
    Stable,
    New,
}

/// Final, metrics-enriched series. Computed once per detection run from
/// immutable `VideoRecord`s; re-running on identical input reproduces the
/// same grouping and metrics (modulo the semantic pass).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SeriesResult {
    pub name: String,
    pub video_ids: Vec<String>,
    pub detection_method: DetectionMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern_source: Option<PatternSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
    pub video_count: usize,
    pub total_views: u64,
    pub avg_views: f64,
    pub avg_engagement_rate: f64,
    pub first_published: DateTime<Utc>,
    pub last_published: DateTime<Utc>,
    /// Mean gap in days between consecutive publish dates; None below 2
    /// dated videos.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cadence_days: Option<f64>,
    pub performance_trend: PerformanceTrend,
}
