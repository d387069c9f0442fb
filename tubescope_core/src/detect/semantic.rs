// src/detect/semantic.rs
//
// LLM-assisted clustering of the videos the pattern matcher left behind.
// The model reply is treated as hostile input: fenced, prefixed with prose,
// or outright garbage - parsing degrades through fallbacks and bottoms out
// at a caller-supplied value, never an error.

use crate::error::PipelineError;
use crate::llm::{CompletionRequest, LlmClient};
use crate::model::{Confidence, SeriesCandidate, VideoRecord};
use crate::usage::TokenUsage;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

/// Below this many uncategorized videos the semantic pass is not attempted.
pub const MIN_UNCATEGORIZED: usize = 5;
/// At most this many titles go into one prompt.
pub const SEMANTIC_BATCH_LIMIT: usize = 100;

const MAX_OUTPUT_TOKENS: u64 = 2000;
const FEATURE_TAG: &str = "series-detection";

const SYSTEM_PROMPT: &str = "\
You analyze YouTube video titles and group them into recurring content \
series. Rules: a series must contain at least 3 videos; each video belongs \
to at most one series; group by the creator's intent (a recurring show, \
format, or theme), not by surface keyword overlap; do not duplicate any of \
the already-known series you are given. Respond with JSON only, no prose, \
in exactly this shape:
{\"series\":[{\"name\":\"Series Name\",\"confidence\":\"high\",\"video_indices\":[0,1,2]}]}
Use confidence \"high\" or \"medium\".";

pub fn build_prompt(videos: &[VideoRecord], known_series: &[String]) -> String {
    let mut prompt = String::from(
        "Group these videos into recurring content series. Videos (index, title, views):\n",
    );
    for (idx, video) in videos.iter().enumerate() {
        prompt.push_str(&format!(
            "{}. \"{}\" ({} views)\n",
            idx, video.title, video.view_count
        ));
    }
    if known_series.is_empty() {
        prompt.push_str("\nNo series have been detected yet.\n");
    } else {
        prompt.push_str("\nAlready-detected series (do not recreate these):\n");
        for name in known_series {
            prompt.push_str(&format!("- {}\n", name));
        }
    }
    prompt
}

/// Parses a model reply that may be fenced or wrapped in prose. Strategies
/// in order, first success wins; all failed -> `fallback`.
pub fn parse_model_reply(text: &str, fallback: Value) -> Value {
    if let Some(value) = parse_defenced(text) {
        return value;
    }
    if let Some(value) = parse_embedded_fence(text) {
        return value;
    }
    if let Some(value) = parse_balanced_span(text) {
        return value;
    }
    fallback
}

/// Strategy (a): strip one leading/trailing fence (optionally `json`-tagged)
/// and parse the remainder directly.
fn parse_defenced(text: &str) -> Option<Value> {
    let mut body = text.trim();
    if let Some(rest) = body.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        body = rest.strip_suffix("```").unwrap_or(rest).trim();
    }
    serde_json::from_str(body).ok()
}

/// Strategy (b): locate any fenced block in the text and parse its contents.
fn parse_embedded_fence(text: &str) -> Option<Value> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    // Skip an optional language tag up to the end of the fence line.
    let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    serde_json::from_str(body[..end].trim()).ok()
}

/// Strategy (c): first balanced `{...}`/`[...]` span by open/close counting.
fn parse_balanced_span(text: &str) -> Option<Value> {
    let start = text.find(|c| c == '{' || c == '[')?;
    let mut depth = 0usize;
    for (offset, c) in text[start..].char_indices() {
        match c {
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    let span = &text[start..start + offset + c.len_utf8()];
                    return serde_json::from_str(span).ok();
                }
            }
            _ => {}
        }
    }
    None
}

#[derive(Debug, Deserialize, Default)]
struct SemanticReply {
    #[serde(default)]
    series: Vec<SemanticGroup>,
}

#[derive(Debug, Deserialize)]
struct SemanticGroup {
    #[serde(default)]
    name: String,
    #[serde(default)]
    confidence: Option<String>,
    #[serde(default)]
    video_indices: Vec<i64>,
}

/// Result of the semantic stage's LLM call.
#[derive(Debug, Default)]
pub struct SemanticClusters {
    pub clusters: Vec<SeriesCandidate>,
    pub usage: Option<TokenUsage>,
    pub cost_usd: Option<f64>,
}

/// Maps a parsed reply onto the submitted batch. Out-of-range indices are
/// dropped, not errored; groups below 3 distinct valid members are dropped.
pub fn clusters_from_reply(reply: Value, batch: &[VideoRecord]) -> Vec<SeriesCandidate> {
    let parsed: SemanticReply = serde_json::from_value(reply).unwrap_or_default();
    let mut clusters = Vec::new();

    for group in parsed.series {
        let name = group.name.trim();
        if name.is_empty() {
            continue;
        }
        let confidence = match group.confidence.as_deref() {
            Some("high") => Confidence::High,
            _ => Confidence::Medium,
        };
        let mut candidate = SeriesCandidate::semantic(name, confidence);
        for idx in group.video_indices {
            let Ok(idx) = usize::try_from(idx) else {
                continue;
            };
            let Some(video) = batch.get(idx) else { continue };
            candidate.push_video(&video.external_id);
        }
        if candidate.video_ids.len() >= 3 {
            clusters.push(candidate);
        } else {
            debug!(name = %candidate.name, members = candidate.video_ids.len(),
                "dropping semantic group below minimum size");
        }
    }
    clusters
}

/// Runs one clustering call over the uncategorized remainder. The caller
/// decides what a transport failure means; this function only raises it.
pub async fn cluster_uncategorized(
    llm: &dyn LlmClient,
    uncategorized: &[VideoRecord],
    known_series: &[String],
) -> Result<SemanticClusters, PipelineError> {
    if uncategorized.len() < MIN_UNCATEGORIZED {
        return Ok(SemanticClusters::default());
    }
    let batch = &uncategorized[..uncategorized.len().min(SEMANTIC_BATCH_LIMIT)];

    let reply = llm
        .complete(CompletionRequest {
            prompt: build_prompt(batch, known_series),
            system_prompt: SYSTEM_PROMPT.to_string(),
            feature_tag: FEATURE_TAG.to_string(),
            max_output_tokens: MAX_OUTPUT_TOKENS,
        })
        .await?;

    let parsed = parse_model_reply(&reply.text, json!({ "series": [] }));
    let clusters = clusters_from_reply(parsed, batch);

    Ok(SemanticClusters {
        clusters,
        usage: reply.usage,
        cost_usd: reply.cost_usd,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VideoFormat;
    use chrono::{TimeZone, Utc};

    fn video(id: &str, title: &str) -> VideoRecord {
        VideoRecord {
            external_id: id.to_string(),
            title: title.to_string(),
            channel: "ch".to_string(),
            published_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            view_count: 10,
            like_count: 0,
            comment_count: 0,
            duration_seconds: 60,
            watch_hours: 0.0,
            impressions: 0,
            ctr: 0.0,
            avg_view_percentage: 0.0,
            subscribers_gained: 0,
            format: VideoFormat::Short,
        }
    }

    #[test]
    fn fenced_json_parses() {
        let value = parse_model_reply("```json\n{\"series\":[]}\n```", json!(null));
        assert_eq!(value, json!({ "series": [] }));
    }

    #[test]
    fn bare_fence_parses() {
        let value = parse_model_reply("```\n{\"series\":[]}\n```", json!(null));
        assert_eq!(value, json!({ "series": [] }));
    }

    #[test]
    fn fence_inside_prose_parses() {
        let text = "Here are the groups you asked for:\n```json\n{\"series\":[]}\n```\nLet me know!";
        let value = parse_model_reply(text, json!(null));
        assert_eq!(value, json!({ "series": [] }));
    }

    #[test]
    fn balanced_span_inside_prose_parses() {
        let text = "Sure thing. {\"series\": [{\"name\": \"Cooking\", \"video_indices\": [0,1,2]}]} Hope that helps.";
        let value = parse_model_reply(text, json!(null));
        assert_eq!(value["series"][0]["name"], "Cooking");
    }

    #[test]
    fn hopeless_prose_returns_fallback() {
        let fallback = json!({ "series": [] });
        let value = parse_model_reply("I could not find any groupings, sorry.", fallback.clone());
        assert_eq!(value, fallback);
    }

    #[test]
    fn out_of_range_indices_are_dropped() {
        let batch = vec![video("a", "t0"), video("b", "t1"), video("c", "t2")];
        let reply = json!({
            "series": [
                { "name": "Keep", "confidence": "high", "video_indices": [0, 1, 2, 99, -4] },
                { "name": "Drop", "confidence": "medium", "video_indices": [0, 50, 51] }
            ]
        });
        let clusters = clusters_from_reply(reply, &batch);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].name, "Keep");
        assert_eq!(clusters[0].confidence, Some(Confidence::High));
        assert_eq!(clusters[0].video_ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn duplicate_indices_count_once() {
        let batch = vec![video("a", "t0"), video("b", "t1"), video("c", "t2")];
        let reply = json!({
            "series": [ { "name": "Dupes", "video_indices": [0, 0, 1, 1] } ]
        });
        assert!(clusters_from_reply(reply, &batch).is_empty());
    }

    #[test]
    fn unknown_confidence_defaults_to_medium() {
        let batch = vec![video("a", "t0"), video("b", "t1"), video("c", "t2")];
        let reply = json!({
            "series": [ { "name": "S", "confidence": "very sure", "video_indices": [0,1,2] } ]
        });
        let clusters = clusters_from_reply(reply, &batch);
        assert_eq!(clusters[0].confidence, Some(Confidence::Medium));
    }

    #[test]
    fn prompt_lists_titles_views_and_known_series() {
        let batch = vec![video("a", "Alpha"), video("b", "Beta")];
        let prompt = build_prompt(&batch, &["Gear Review".to_string()]);
        assert!(prompt.contains("0. \"Alpha\" (10 views)"));
        assert!(prompt.contains("1. \"Beta\" (10 views)"));
        assert!(prompt.contains("- Gear Review"));
    }

    struct CannedLlm {
        reply: String,
        prompts: std::sync::Mutex<Vec<String>>,
    }

    impl CannedLlm {
        fn new(reply: impl Into<String>) -> Self {
            Self {
                reply: reply.into(),
                prompts: std::sync::Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl LlmClient for CannedLlm {
        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<crate::llm::CompletionReply, PipelineError> {
            self.prompts.lock().unwrap().push(request.prompt);
            Ok(crate::llm::CompletionReply {
                text: self.reply.clone(),
                usage: Some(TokenUsage {
                    input_tokens: 12,
                    output_tokens: 7,
                }),
                cost_usd: Some(0.001),
            })
        }
    }

    #[tokio::test]
    async fn small_remainders_skip_the_call() {
        let llm = CannedLlm::new("{\"series\":[]}");
        let batch = vec![video("a", "t0")];
        let out = cluster_uncategorized(&llm, &batch, &[]).await.unwrap();
        assert!(out.clusters.is_empty());
        assert!(out.usage.is_none());
        assert!(llm.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn batches_are_capped_at_one_hundred_titles() {
        let llm = CannedLlm::new(
            r#"{"series":[{"name":"Tail End","confidence":"high","video_indices":[97,98,99,100,119]}]}"#,
        );
        let batch: Vec<VideoRecord> = (0..120)
            .map(|i| video(&format!("v{}", i), &format!("title {}", i)))
            .collect();
        let out = cluster_uncategorized(&llm, &batch, &[]).await.unwrap();

        let prompts = llm.prompts.lock().unwrap();
        assert!(prompts[0].contains("99. \"title 99\""));
        assert!(!prompts[0].contains("100. \"title 100\""));

        // Indices at or past the cap cannot address the overflow videos.
        assert_eq!(out.clusters.len(), 1);
        assert_eq!(out.clusters[0].video_ids, vec!["v97", "v98", "v99"]);
    }

    #[tokio::test]
    async fn malformed_reply_yields_empty_clusters_not_error() {
        let llm = CannedLlm::new("no json anywhere in this reply");
        let batch: Vec<VideoRecord> =
            (0..6).map(|i| video(&format!("v{}", i), "title")).collect();
        let out = cluster_uncategorized(&llm, &batch, &[]).await.unwrap();
        assert!(out.clusters.is_empty());
        assert_eq!(out.usage.unwrap().input_tokens, 12);
    }
}
