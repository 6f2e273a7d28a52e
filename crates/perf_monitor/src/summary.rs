//! Aggregated render statistics

use crate::error::PerfResult;
use crate::memory::MemorySnapshot;
use crate::render::RenderRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

fn as_ms(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1_000_000.0
}

/// Statistics for renders sharing a label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderStats {
    /// Number of closed renders
    pub count: usize,
    /// Sum of durations in milliseconds
    pub total_ms: f64,
    /// Shortest duration in milliseconds
    pub min_ms: f64,
    /// Longest duration in milliseconds
    pub max_ms: f64,
    /// Mean duration in milliseconds
    pub avg_ms: f64,
}

impl RenderStats {
    /// Stats holding a single duration.
    pub fn new(duration: Duration) -> Self {
        let ms = as_ms(duration);
        Self {
            count: 1,
            total_ms: ms,
            min_ms: ms,
            max_ms: ms,
            avg_ms: ms,
        }
    }

    /// Fold another duration in.
    pub fn record(&mut self, duration: Duration) {
        let ms = as_ms(duration);
        self.count += 1;
        self.total_ms += ms;
        self.min_ms = self.min_ms.min(ms);
        self.max_ms = self.max_ms.max(ms);
        self.avg_ms = self.total_ms / self.count as f64;
    }
}

/// Point-in-time view of the monitor's retained data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerfSummary {
    /// Render statistics by label
    pub renders: BTreeMap<String, RenderStats>,
    /// Most recent memory snapshots, oldest first
    pub memory_snapshots: Vec<MemorySnapshot>,
    /// When the summary was produced
    pub generated_at: DateTime<Utc>,
}

impl PerfSummary {
    /// Aggregate closed records and attach the given snapshots.
    ///
    /// Open records are skipped.
    pub fn from_records<'a, I>(records: I, memory_snapshots: Vec<MemorySnapshot>) -> Self
    where
        I: IntoIterator<Item = &'a RenderRecord>,
    {
        let mut renders: BTreeMap<String, RenderStats> = BTreeMap::new();

        for record in records {
            let Some(duration) = record.duration else {
                continue;
            };
            match renders.get_mut(&record.label) {
                Some(stats) => stats.record(duration),
                None => {
                    renders.insert(record.label.clone(), RenderStats::new(duration));
                }
            }
        }

        Self {
            renders,
            memory_snapshots,
            generated_at: Utc::now(),
        }
    }

    /// Stats for one label.
    pub fn stats(&self, label: &str) -> Option<&RenderStats> {
        self.renders.get(label)
    }

    /// Total closed renders across all labels.
    pub fn total_renders(&self) -> usize {
        self.renders.values().map(|s| s.count).sum()
    }

    /// Serialize to compact JSON.
    pub fn to_json(&self) -> PerfResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize to indented JSON.
    pub fn to_json_pretty(&self) -> PerfResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
