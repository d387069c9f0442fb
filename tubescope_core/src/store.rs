// src/store.rs

use crate::model::SeriesResult;
use crate::usage::{new_id, RunUsage};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Handle to a persisted series row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSeries {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    pub step: String,
    pub percent: u8,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SectionState {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionStatus {
    pub state: SectionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl SectionStatus {
    pub fn running() -> Self {
        Self {
            state: SectionState::Running,
            result_data: None,
            error_message: None,
        }
    }

    pub fn completed(result_data: Value) -> Self {
        Self {
            state: SectionState::Completed,
            result_data: Some(result_data),
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            state: SectionState::Failed,
            result_data: None,
            error_message: Some(message.into()),
        }
    }
}

/// Persistence collaborator. All calls are fire-and-forget from the
/// pipeline's point of view: a failing store degrades status reporting but
/// never invalidates metrics already computed in memory.
#[async_trait]
pub trait SeriesStore: Send + Sync {
    /// Upserts each series keyed by name + channel. Returns handles in the
    /// same order as the input.
    async fn upsert_series(
        &self,
        series: &[SeriesResult],
        channel: &str,
        run_id: &str,
    ) -> Result<Vec<StoredSeries>, StoreError>;

    async fn assign_videos(&self, series_id: &str, video_ids: &[String]) -> Result<(), StoreError>;

    async fn record_cost(&self, run_id: &str, usage: &RunUsage) -> Result<(), StoreError>;

    async fn update_progress(&self, run_id: &str, progress: &Progress) -> Result<(), StoreError>;

    async fn update_section_status(
        &self,
        run_id: &str,
        section: &str,
        status: &SectionStatus,
    ) -> Result<(), StoreError>;
}

#[derive(Default)]
struct MemoryState {
    series: HashMap<String, (String, SeriesResult)>, // id -> (channel, series)
    assignments: HashMap<String, Vec<String>>,
    costs: HashMap<String, RunUsage>,
    progress: Vec<(String, Progress)>,
    sections: Vec<(String, String, SectionStatus)>,
}

/// Store keeping everything in process memory. Used by tests and CLI runs
/// without a configured backend.
pub struct InMemorySeriesStore {
    state: Mutex<MemoryState>,
}

impl InMemorySeriesStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
        }
    }

    pub fn stored_series(&self) -> Vec<StoredSeries> {
        let state = self.state.lock().expect("series store poisoned");
        state
            .series
            .iter()
            .map(|(id, (_, s))| StoredSeries {
                id: id.clone(),
                name: s.name.clone(),
            })
            .collect()
    }

    pub fn assignments(&self, series_id: &str) -> Vec<String> {
        let state = self.state.lock().expect("series store poisoned");
        state.assignments.get(series_id).cloned().unwrap_or_default()
    }

    pub fn recorded_cost(&self, run_id: &str) -> Option<RunUsage> {
        let state = self.state.lock().expect("series store poisoned");
        state.costs.get(run_id).cloned()
    }

    pub fn progress_log(&self) -> Vec<(String, Progress)> {
        let state = self.state.lock().expect("series store poisoned");
        state.progress.clone()
    }

    pub fn section_log(&self) -> Vec<(String, String, SectionStatus)> {
        let state = self.state.lock().expect("series store poisoned");
        state.sections.clone()
    }
}

impl Default for InMemorySeriesStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SeriesStore for InMemorySeriesStore {
    async fn upsert_series(
        &self,
        series: &[SeriesResult],
        channel: &str,
        _run_id: &str,
    ) -> Result<Vec<StoredSeries>, StoreError> {
        let mut state = self.state.lock().expect("series store poisoned");
        let mut out = Vec::with_capacity(series.len());
        for s in series {
            // Upsert key is name + channel.
            let existing = state
                .series
                .iter()
                .find(|(_, (ch, row))| ch == channel && row.name == s.name)
                .map(|(id, _)| id.clone());
            let id = existing.unwrap_or_else(|| new_id("series"));
            state
                .series
                .insert(id.clone(), (channel.to_string(), s.clone()));
            out.push(StoredSeries {
                id,
                name: s.name.clone(),
            });
        }
        Ok(out)
    }

    async fn assign_videos(&self, series_id: &str, video_ids: &[String]) -> Result<(), StoreError> {
        let mut state = self.state.lock().expect("series store poisoned");
        let entry = state.assignments.entry(series_id.to_string()).or_default();
        for id in video_ids {
            if !entry.contains(id) {
                entry.push(id.clone());
            }
        }
        Ok(())
    }

    async fn record_cost(&self, run_id: &str, usage: &RunUsage) -> Result<(), StoreError> {
        let mut state = self.state.lock().expect("series store poisoned");
        state.costs.insert(run_id.to_string(), usage.clone());
        Ok(())
    }

    async fn update_progress(&self, run_id: &str, progress: &Progress) -> Result<(), StoreError> {
        let mut state = self.state.lock().expect("series store poisoned");
        state.progress.push((run_id.to_string(), progress.clone()));
        Ok(())
    }

    async fn update_section_status(
        &self,
        run_id: &str,
        section: &str,
        status: &SectionStatus,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().expect("series store poisoned");
        state
            .sections
            .push((run_id.to_string(), section.to_string(), status.clone()));
        Ok(())
    }
}
