// src/detect/pattern.rs
//
// Deterministic series detection. Three ordered strategies over video
// titles; a video assigned by one strategy is invisible to the later ones,
// even if its group later dies for being under-sized. No I/O; identical
// input always produces identical output.

use crate::model::{PatternSource, SeriesCandidate, VideoRecord};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// A series needs this many member videos to survive.
pub const MIN_SERIES_SIZE: usize = 3;

const MIN_NAME_LEN: usize = 3;
const PREFIX_MIN_WORDS: usize = 2;
const PREFIX_MAX_WORDS: usize = 5;

/// Episode-marker sub-patterns, tested in order per title; the first match
/// wins and testing stops for that title. Group 1 always captures the
/// series name.
static EPISODE_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // "<Name> | Ep 5", "<Name> - Part 3", "<Name>: #12"
        Regex::new(r"(?i)^(.{3,}?)\s*[|:\-–—]+\s*(?:ep(?:isode)?|part|#)\s*\.?\s*\d+")
            .expect("episode rule 1"),
        // "Ep 5 | <Name>", "#12 - <Name>"
        Regex::new(r"(?i)^(?:ep(?:isode)?|part|#)\s*\.?\s*\d+\s*[|:\-–—]+\s*(.{3,})$")
            .expect("episode rule 2"),
        // "<Name> Ep 5" with no separator; the marker is a trailing word
        Regex::new(r"(?i)^(.+?)\s+(?:ep(?:isode)?|part|#)\s*\.?\s*\d+\s*$")
            .expect("episode rule 3"),
    ]
});

static BRACKET_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"^\[([^\]]{3,})\]").expect("bracket rule"),
        Regex::new(r"^\(([^)]{3,})\)").expect("paren rule"),
    ]
});

/// Trims stray separators and collapses whitespace in a captured name.
pub fn clean_series_name(raw: &str) -> String {
    let trimmed = raw.trim_matches(|c: char| {
        c.is_whitespace() || matches!(c, '|' | ':' | '-' | '–' | '—' | '#' | '·')
    });
    trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Output partition: every input video lands in exactly one side.
#[derive(Debug)]
pub struct PatternPartition {
    pub series: Vec<SeriesCandidate>,
    pub uncategorized: Vec<VideoRecord>,
}

/// Accumulates candidates in first-seen order, merging strategies that
/// converge on the same cleaned name.
struct CandidateSet {
    order: Vec<SeriesCandidate>,
    by_name: HashMap<String, usize>,
}

impl CandidateSet {
    fn new() -> Self {
        Self {
            order: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    fn assign(&mut self, name: String, source: PatternSource, video_id: &str) {
        let idx = match self.by_name.get(&name) {
            Some(idx) => *idx,
            None => {
                self.order.push(SeriesCandidate::pattern(name.clone(), source));
                self.by_name.insert(name, self.order.len() - 1);
                self.order.len() - 1
            }
        };
        self.order[idx].push_video(video_id);
    }
}

pub fn detect_series_by_pattern(videos: &[VideoRecord]) -> PatternPartition {
    let mut candidates = CandidateSet::new();
    let mut assigned: HashSet<usize> = HashSet::new();

    // Strategy 1: explicit episode markers.
    for (idx, video) in videos.iter().enumerate() {
        for rule in EPISODE_RULES.iter() {
            let Some(caps) = rule.captures(&video.title) else {
                continue;
            };
            let name = clean_series_name(&caps[1]);
            if name.len() < MIN_NAME_LEN {
                // Too short to name a series; later rules may still claim
                // the title.
                continue;
            }
            candidates.assign(name, PatternSource::EpisodeMarker, &video.external_id);
            assigned.insert(idx);
            break;
        }
    }

    // Strategy 2: bracketed/parenthesized prefixes.
    for (idx, video) in videos.iter().enumerate() {
        if assigned.contains(&idx) {
            continue;
        }
        for rule in BRACKET_RULES.iter() {
            let Some(caps) = rule.captures(&video.title) else {
                continue;
            };
            let name = clean_series_name(&caps[1]);
            if name.len() < MIN_NAME_LEN {
                continue;
            }
            candidates.assign(name, PatternSource::BracketPrefix, &video.external_id);
            assigned.insert(idx);
            break;
        }
    }

    // Strategy 3: recurring 2-5 word title prefixes among the remainder.
    let mut prefix_members: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, video) in videos.iter().enumerate() {
        if assigned.contains(&idx) {
            continue;
        }
        let words: Vec<&str> = video.title.split_whitespace().collect();
        let max_len = PREFIX_MAX_WORDS.min(words.len());
        for n in PREFIX_MIN_WORDS..=max_len {
            let prefix = words[..n].join(" ");
            prefix_members.entry(prefix).or_default().push(idx);
        }
    }

    let mut prefix_candidates: Vec<(String, Vec<usize>)> = prefix_members
        .into_iter()
        .filter(|(_, members)| members.len() >= MIN_SERIES_SIZE)
        .collect();
    // Longer prefixes first, then higher video count; name order breaks the
    // remaining ties so runs are reproducible.
    prefix_candidates.sort_by(|a, b| {
        let a_words = a.0.split_whitespace().count();
        let b_words = b.0.split_whitespace().count();
        b_words
            .cmp(&a_words)
            .then(b.1.len().cmp(&a.1.len()))
            .then(a.0.cmp(&b.0))
    });

    for (prefix, members) in prefix_candidates {
        let free: Vec<usize> = members
            .into_iter()
            .filter(|idx| !assigned.contains(idx))
            .collect();
        if free.len() < MIN_SERIES_SIZE {
            continue;
        }
        let name = clean_series_name(&prefix);
        if name.len() < MIN_NAME_LEN {
            continue;
        }
        for idx in free {
            candidates.assign(name.clone(), PatternSource::RecurringPrefix, &videos[idx].external_id);
            assigned.insert(idx);
        }
    }

    // Under-sized groups are discarded; their members fall back out.
    let mut surviving_ids: HashSet<String> = HashSet::new();
    let mut series = Vec::new();
    for candidate in candidates.order {
        if candidate.video_ids.len() >= MIN_SERIES_SIZE {
            surviving_ids.extend(candidate.video_ids.iter().cloned());
            series.push(candidate);
        }
    }

    let uncategorized = videos
        .iter()
        .filter(|v| !surviving_ids.contains(&v.external_id))
        .cloned()
        .collect();

    PatternPartition {
        series,
        uncategorized,
    }
}
