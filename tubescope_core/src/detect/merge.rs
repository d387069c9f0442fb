// src/detect/merge.rs
//
// Combines pattern and semantic candidates into final series, then enriches
// each with aggregate metrics. Pattern output is authoritative; a semantic
// cluster that mostly re-describes already-claimed videos is rejected.

use crate::detect::pattern::MIN_SERIES_SIZE;
use crate::model::{PerformanceTrend, SeriesCandidate, SeriesResult, VideoRecord};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// A semantic cluster is rejected when more than this fraction of its
/// members already belong to an accepted series.
const OVERLAP_REJECT_THRESHOLD: f64 = 0.5;

/// A 3-video-or-smaller series younger than this counts as newly started.
const NEW_SERIES_WINDOW_DAYS: i64 = 180;

/// Trend thresholds. Strictly above / strictly below; landing exactly on a
/// boundary reads as stable.
const GROWING_RATIO: f64 = 1.2;
const DECLINING_RATIO: f64 = 0.8;

/// Appends semantic clusters to the pattern series, dropping any cluster
/// whose members overlap the running accepted set by more than half.
/// Acceptance order matters: an accepted cluster's members immediately
/// count against the clusters after it.
pub fn merge_candidates(
    pattern: Vec<SeriesCandidate>,
    semantic: Vec<SeriesCandidate>,
) -> Vec<SeriesCandidate> {
    let mut accepted_ids: HashSet<String> = pattern
        .iter()
        .flat_map(|s| s.video_ids.iter().cloned())
        .collect();
    let mut merged = pattern;

    for cluster in semantic {
        if cluster.video_ids.is_empty() {
            continue;
        }
        let overlapping = cluster
            .video_ids
            .iter()
            .filter(|id| accepted_ids.contains(*id))
            .count();
        let overlap = overlapping as f64 / cluster.video_ids.len() as f64;
        if overlap > OVERLAP_REJECT_THRESHOLD {
            debug!(name = %cluster.name, overlap, "rejecting overlapping semantic cluster");
            continue;
        }
        accepted_ids.extend(cluster.video_ids.iter().cloned());
        merged.push(cluster);
    }
    merged
}

/// Classifies growth from views in publish order. Four or more videos are
/// split in half by count (odd counts put the extra video in the newer
/// half) and the halves' average views compared.
fn classify_trend(members: &[&VideoRecord], now: DateTime<Utc>) -> PerformanceTrend {
    if members.len() <= 3 {
        let earliest = members
            .iter()
            .map(|v| v.published_at)
            .min()
            .unwrap_or(now);
        let age_days = (now - earliest).num_days();
        return if age_days < NEW_SERIES_WINDOW_DAYS {
            PerformanceTrend::New
        } else {
            PerformanceTrend::Stable
        };
    }

    let mut ordered: Vec<&VideoRecord> = members.to_vec();
    ordered.sort_by_key(|v| v.published_at);
    let mid = ordered.len() / 2;
    let half_avg = |slice: &[&VideoRecord]| {
        slice.iter().map(|v| v.view_count).sum::<u64>() as f64 / slice.len() as f64
    };
    let older = half_avg(&ordered[..mid]);
    let newer = half_avg(&ordered[mid..]);

    if newer > older * GROWING_RATIO {
        PerformanceTrend::Growing
    } else if newer < older * DECLINING_RATIO {
        PerformanceTrend::Declining
    } else {
        PerformanceTrend::Stable
    }
}

/// Mean gap in days between consecutive publishes; None below 2 videos.
fn cadence_days(members: &[&VideoRecord]) -> Option<f64> {
    if members.len() < 2 {
        return None;
    }
    let mut dates: Vec<DateTime<Utc>> = members.iter().map(|v| v.published_at).collect();
    dates.sort();
    let total_gap_secs: i64 = dates
        .windows(2)
        .map(|w| (w[1] - w[0]).num_seconds())
        .sum();
    Some(total_gap_secs as f64 / 86_400.0 / (dates.len() - 1) as f64)
}

/// Resolves candidates against the full video set and computes the final
/// per-series metrics. Member IDs that resolve to no known video are
/// ignored; a candidate left below the minimum series size is dropped.
/// Output is sorted by total views descending, name ascending on ties.
pub fn finalize_series(
    candidates: Vec<SeriesCandidate>,
    videos: &[VideoRecord],
    now: DateTime<Utc>,
) -> Vec<SeriesResult> {
    let by_id: HashMap<&str, &VideoRecord> =
        videos.iter().map(|v| (v.external_id.as_str(), v)).collect();

    let mut results: Vec<SeriesResult> = candidates
        .into_iter()
        .filter_map(|candidate| {
            let members: Vec<&VideoRecord> = candidate
                .video_ids
                .iter()
                .filter_map(|id| by_id.get(id.as_str()).copied())
                .collect();
            if members.len() < MIN_SERIES_SIZE {
                debug!(name = %candidate.name, members = members.len(),
                    "dropping series with too few resolvable members");
                return None;
            }

            let total_views: u64 = members.iter().map(|v| v.view_count).sum();
            let avg_views = total_views as f64 / members.len() as f64;
            let avg_engagement_rate =
                members.iter().map(|v| v.engagement_rate()).sum::<f64>() / members.len() as f64;
            let first_published = members.iter().map(|v| v.published_at).min()?;
            let last_published = members.iter().map(|v| v.published_at).max()?;

            Some(SeriesResult {
                name: candidate.name,
                video_count: members.len(),
                total_views,
                avg_views,
                avg_engagement_rate,
                first_published,
                last_published,
                cadence_days: cadence_days(&members),
                performance_trend: classify_trend(&members, now),
                video_ids: candidate.video_ids,
                detection_method: candidate.detection_method,
                pattern_source: candidate.pattern_source,
                confidence: candidate.confidence,
            })
        })
        .collect();

    results.sort_by(|a, b| {
        b.total_views
            .cmp(&a.total_views)
            .then_with(|| a.name.cmp(&b.name))
    });
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Confidence, DetectionMethod, PatternSource, VideoFormat};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    fn video(id: &str, published: DateTime<Utc>, views: u64) -> VideoRecord {
        VideoRecord {
            external_id: id.to_string(),
            title: format!("video {}", id),
            channel: "ch".to_string(),
            published_at: published,
            view_count: views,
            like_count: 10,
            comment_count: 2,
            duration_seconds: 600,
            watch_hours: 5.0,
            impressions: 0,
            ctr: 0.0,
            avg_view_percentage: 0.5,
            subscribers_gained: 0,
            format: VideoFormat::Long,
        }
    }

    fn candidate(name: &str, ids: &[&str]) -> SeriesCandidate {
        let mut c = SeriesCandidate::semantic(name, Confidence::Medium);
        for id in ids {
            c.push_video(id);
        }
        c
    }

    fn pattern_candidate(name: &str, ids: &[&str]) -> SeriesCandidate {
        let mut c = SeriesCandidate::pattern(name, PatternSource::EpisodeMarker);
        for id in ids {
            c.push_video(id);
        }
        c
    }

    #[test]
    fn majority_overlap_rejects_cluster() {
        let pattern = vec![pattern_candidate("Kept", &["a", "b", "c"])];
        // 3 of 5 members already claimed: 60% overlap.
        let semantic = vec![candidate("Echo", &["a", "b", "c", "x", "y"])];
        let merged = merge_candidates(pattern, semantic);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].name, "Kept");
    }

    #[test]
    fn half_overlap_exactly_is_kept() {
        let pattern = vec![pattern_candidate("Kept", &["a", "b"])];
        // 2 of 4 members claimed: exactly 50%, below the strict threshold.
        let semantic = vec![candidate("Fresh", &["a", "b", "x", "y"])];
        let merged = merge_candidates(pattern, semantic);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn accepted_clusters_count_against_later_ones() {
        let semantic = vec![
            candidate("First", &["x", "y", "z"]),
            // 2 of 3 overlap the just-accepted cluster.
            candidate("Second", &["x", "y", "w"]),
        ];
        let merged = merge_candidates(Vec::new(), semantic);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].name, "First");
    }

    #[test]
    fn growing_requires_strictly_more_than_ratio() {
        let t0 = now() - Duration::days(400);
        let videos = vec![
            video("a", t0, 100),
            video("b", t0 + Duration::days(7), 100),
            video("c", t0 + Duration::days(14), 120),
            video("d", t0 + Duration::days(21), 120),
        ];
        // Newer half averages exactly 1.2x the older half.
        let results = finalize_series(
            vec![pattern_candidate("Edge", &["a", "b", "c", "d"])],
            &videos,
            now(),
        );
        assert_eq!(results[0].performance_trend, PerformanceTrend::Stable);

        let videos = vec![
            video("a", t0, 100),
            video("b", t0 + Duration::days(7), 100),
            video("c", t0 + Duration::days(14), 125),
            video("d", t0 + Duration::days(21), 125),
        ];
        let results = finalize_series(
            vec![pattern_candidate("Edge", &["a", "b", "c", "d"])],
            &videos,
            now(),
        );
        assert_eq!(results[0].performance_trend, PerformanceTrend::Growing);
    }

    #[test]
    fn declining_below_ratio() {
        let t0 = now() - Duration::days(400);
        let videos = vec![
            video("a", t0, 1000),
            video("b", t0 + Duration::days(7), 1000),
            video("c", t0 + Duration::days(14), 500),
            video("d", t0 + Duration::days(21), 500),
        ];
        let results = finalize_series(
            vec![pattern_candidate("Slump", &["a", "b", "c", "d"])],
            &videos,
            now(),
        );
        assert_eq!(results[0].performance_trend, PerformanceTrend::Declining);
    }

    #[test]
    fn odd_count_puts_extra_video_in_newer_half() {
        let t0 = now() - Duration::days(400);
        // 5 videos: older half is 2, newer half is 3.
        let videos = vec![
            video("a", t0, 100),
            video("b", t0 + Duration::days(7), 100),
            video("c", t0 + Duration::days(14), 200),
            video("d", t0 + Duration::days(21), 200),
            video("e", t0 + Duration::days(28), 200),
        ];
        let results = finalize_series(
            vec![pattern_candidate("Odd", &["a", "b", "c", "d", "e"])],
            &videos,
            now(),
        );
        assert_eq!(results[0].performance_trend, PerformanceTrend::Growing);
    }

    #[test]
    fn small_recent_series_is_new_and_small_old_series_is_stable() {
        let recent = now() - Duration::days(30);
        let old = now() - Duration::days(400);
        let videos = vec![
            video("a", recent, 10),
            video("b", recent + Duration::days(7), 10),
            video("c", recent + Duration::days(14), 10),
            video("x", old, 10),
            video("y", old + Duration::days(7), 10),
            video("z", old + Duration::days(14), 10),
        ];
        let results = finalize_series(
            vec![
                pattern_candidate("Young", &["a", "b", "c"]),
                pattern_candidate("Veteran", &["x", "y", "z"]),
            ],
            &videos,
            now(),
        );
        let by_name: HashMap<&str, PerformanceTrend> = results
            .iter()
            .map(|r| (r.name.as_str(), r.performance_trend))
            .collect();
        assert_eq!(by_name["Young"], PerformanceTrend::New);
        assert_eq!(by_name["Veteran"], PerformanceTrend::Stable);
    }

    #[test]
    fn cadence_is_mean_gap_in_days() {
        let t0 = now() - Duration::days(400);
        let videos = vec![
            video("a", t0, 10),
            video("b", t0 + Duration::days(7), 10),
            video("c", t0 + Duration::days(21), 10),
        ];
        let results = finalize_series(
            vec![pattern_candidate("Cadence", &["a", "b", "c"])],
            &videos,
            now(),
        );
        // Gaps of 7 and 14 days average to 10.5.
        let cadence = results[0].cadence_days.unwrap();
        assert!((cadence - 10.5).abs() < 1e-9);
    }

    #[test]
    fn results_sorted_by_total_views_descending() {
        let t0 = now() - Duration::days(400);
        let videos = vec![
            video("a", t0, 10),
            video("b", t0, 10),
            video("c", t0, 10),
            video("x", t0, 500),
            video("y", t0, 500),
            video("z", t0, 500),
        ];
        let results = finalize_series(
            vec![
                pattern_candidate("Small", &["a", "b", "c"]),
                pattern_candidate("Big", &["x", "y", "z"]),
            ],
            &videos,
            now(),
        );
        assert_eq!(results[0].name, "Big");
        assert_eq!(results[0].total_views, 1500);
        assert_eq!(results[1].name, "Small");
    }

    #[test]
    fn unknown_member_ids_are_ignored() {
        let t0 = now() - Duration::days(400);
        let videos = vec![video("a", t0, 10), video("b", t0, 20), video("c", t0, 30)];
        let results = finalize_series(
            vec![pattern_candidate("Partial", &["a", "b", "c", "ghost"])],
            &videos,
            now(),
        );
        assert_eq!(results[0].video_count, 3);
        assert_eq!(results[0].total_views, 60);
        assert_eq!(results[0].detection_method, DetectionMethod::Pattern);
    }

    #[test]
    fn under_resolved_candidates_are_dropped() {
        let t0 = now() - Duration::days(400);
        // Three member IDs, but only two resolve against the catalogue.
        let videos = vec![video("a", t0, 10), video("b", t0, 20)];
        let results = finalize_series(
            vec![candidate("Ghostly", &["a", "b", "ghost"])],
            &videos,
            now(),
        );
        assert!(results.is_empty());
    }
}
