// src/usage.rs

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Token counts reported by an LLM call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Accumulated external-call spend for one detection run. The pipeline only
/// reports the amounts it used; durable ledger writes belong to the store.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunUsage {
    pub run_id: String,
    pub requests: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
}

impl RunUsage {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            ..Default::default()
        }
    }

    pub fn add_call(&mut self, tokens: Option<TokenUsage>, cost_usd: Option<f64>) {
        self.requests += 1;
        if let Some(t) = tokens {
            self.input_tokens += t.input_tokens;
            self.output_tokens += t.output_tokens;
        }
        if let Some(c) = cost_usd {
            *self.cost_usd.get_or_insert(0.0) += c;
        }
    }
}

pub fn new_id(prefix: &str) -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    let ts = Utc::now().timestamp_millis();
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let pid = std::process::id();
    format!("{}-{}-{}-{}", prefix, ts, pid, seq)
}
