// src/detect/mod.rs
//
// Detection pipeline: pattern pass, optional semantic pass, merge, metrics,
// persistence. The pattern stage is the backbone; everything after it is
// best-effort and degrades without failing the run.

pub mod merge;
pub mod pattern;
pub mod semantic;

use crate::error::PipelineError;
use crate::llm::LlmClient;
use crate::model::{SeriesResult, VideoRecord};
use crate::store::{Progress, SectionStatus, SeriesStore};
use crate::usage::{new_id, RunUsage};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

const SECTION_NAME: &str = "content_series";
const SEMANTIC_SECTION: &str = "semantic_clustering";

/// What happened to the semantic stage of a run. A skip is an outcome, not
/// an error; pattern-detected series are still returned.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SemanticOutcome {
    Completed { clusters_found: usize },
    Skipped { reason: String },
}

/// Everything one detection run produced.
#[derive(Debug, Serialize)]
pub struct DetectionReport {
    pub run_id: String,
    pub channel: String,
    pub series: Vec<SeriesResult>,
    /// IDs of videos no surviving series claimed.
    pub uncategorized: Vec<String>,
    pub semantic: SemanticOutcome,
    pub usage: RunUsage,
}

/// Orchestrates one detection run over ingested videos. Both collaborators
/// are optional: without an LLM the semantic stage is skipped, without a
/// store nothing is persisted.
#[derive(Default)]
pub struct DetectionPipeline {
    llm: Option<Arc<dyn LlmClient>>,
    store: Option<Arc<dyn SeriesStore>>,
}

impl DetectionPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn SeriesStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub async fn run(
        &self,
        videos: &[VideoRecord],
        channel: &str,
    ) -> Result<DetectionReport, PipelineError> {
        let run_id = new_id("run");
        let mut usage = RunUsage::new(&run_id);

        self.report_section(&run_id, SECTION_NAME, SectionStatus::running())
            .await;
        self.report_progress(&run_id, "pattern", 10, "Detecting title patterns")
            .await;

        let partition = pattern::detect_series_by_pattern(videos);
        debug!(
            series = partition.series.len(),
            uncategorized = partition.uncategorized.len(),
            "pattern stage finished"
        );

        self.report_progress(&run_id, "semantic", 50, "Clustering remaining videos")
            .await;

        let known_names: Vec<String> =
            partition.series.iter().map(|s| s.name.clone()).collect();
        let (semantic_clusters, semantic_outcome) = match &self.llm {
            None => (
                Vec::new(),
                SemanticOutcome::Skipped {
                    reason: "no language model configured".to_string(),
                },
            ),
            Some(llm) => {
                match semantic::cluster_uncategorized(
                    llm.as_ref(),
                    &partition.uncategorized,
                    &known_names,
                )
                .await
                {
                    Ok(out) => {
                        if out.usage.is_some() || out.cost_usd.is_some() {
                            usage.add_call(out.usage, out.cost_usd);
                        }
                        let found = out.clusters.len();
                        (out.clusters, SemanticOutcome::Completed { clusters_found: found })
                    }
                    Err(err) => {
                        warn!("semantic stage failed, keeping pattern results: {}", err);
                        self.report_section(
                            &run_id,
                            SEMANTIC_SECTION,
                            SectionStatus::failed(err.to_string()),
                        )
                        .await;
                        (
                            Vec::new(),
                            SemanticOutcome::Skipped {
                                reason: err.to_string(),
                            },
                        )
                    }
                }
            }
        };

        self.report_progress(&run_id, "metrics", 80, "Computing series metrics")
            .await;

        let merged = merge::merge_candidates(partition.series, semantic_clusters);
        let series = merge::finalize_series(merged, videos, Utc::now());

        let claimed: HashSet<&str> = series
            .iter()
            .flat_map(|s| s.video_ids.iter().map(String::as_str))
            .collect();
        let uncategorized: Vec<String> = videos
            .iter()
            .filter(|v| !claimed.contains(v.external_id.as_str()))
            .map(|v| v.external_id.clone())
            .collect();

        self.persist(&run_id, channel, &series, &usage).await;
        self.report_section(
            &run_id,
            SECTION_NAME,
            SectionStatus::completed(json!({
                "series_count": series.len(),
                "uncategorized_count": uncategorized.len(),
            })),
        )
        .await;
        self.report_progress(&run_id, "done", 100, "Series detection complete")
            .await;

        Ok(DetectionReport {
            run_id,
            channel: channel.to_string(),
            series,
            uncategorized,
            semantic: semantic_outcome,
            usage,
        })
    }

    async fn persist(
        &self,
        run_id: &str,
        channel: &str,
        series: &[SeriesResult],
        usage: &RunUsage,
    ) {
        let Some(store) = &self.store else { return };
        match store.upsert_series(series, channel, run_id).await {
            Ok(stored) => {
                for (handle, result) in stored.iter().zip(series) {
                    if let Err(err) = store.assign_videos(&handle.id, &result.video_ids).await {
                        warn!(series = %handle.name, "video assignment failed: {}", err);
                    }
                }
            }
            Err(err) => warn!("series upsert failed: {}", err),
        }
        if usage.requests > 0 {
            if let Err(err) = store.record_cost(run_id, usage).await {
                warn!("cost recording failed: {}", err);
            }
        }
    }

    async fn report_progress(&self, run_id: &str, step: &str, percent: u8, message: &str) {
        let Some(store) = &self.store else { return };
        let progress = Progress {
            step: step.to_string(),
            percent,
            message: message.to_string(),
        };
        if let Err(err) = store.update_progress(run_id, &progress).await {
            warn!(step, "progress update failed: {}", err);
        }
    }

    async fn report_section(&self, run_id: &str, section: &str, status: SectionStatus) {
        let Some(store) = &self.store else { return };
        if let Err(err) = store.update_section_status(run_id, section, &status).await {
            warn!(section, "section status update failed: {}", err);
        }
    }
}
