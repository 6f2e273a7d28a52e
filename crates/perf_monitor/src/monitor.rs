//! The instrumentation core
//!
//! [`PerfMonitor`] owns the render records and the snapshot history. It is
//! constructed once from a [`MonitorConfig`] and handed by reference to the
//! code it instruments. When the config disables monitoring, every
//! operation returns early without reading the clock, sampling memory or
//! logging.

use crate::clock::{Clock, SystemClock};
use crate::component::ComponentMonitor;
use crate::config::{MonitorConfig, Thresholds};
use crate::fps::{FpsHandle, FpsSampler};
use crate::logging::TARGET;
use crate::memory::{MemoryProbe, MemorySnapshot, NoMemoryProbe, SnapshotHistory};
use crate::operation::OperationTimer;
use crate::render::{RenderRecord, RenderTracker, RenderToken};
use crate::summary::PerfSummary;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

/// Component lifecycle markers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleEvent {
    /// Component attached
    Mount,
    /// Component detached
    Unmount,
    /// Component re-rendered with new inputs
    Update,
    /// Any other event name
    Custom(String),
}

impl LifecycleEvent {
    /// Event name as logged and used in snapshot labels.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Mount => "mount",
            Self::Unmount => "unmount",
            Self::Update => "update",
            Self::Custom(name) => name,
        }
    }

    /// Mount and unmount take a memory snapshot, however the event was built.
    pub fn takes_snapshot(&self) -> bool {
        matches!(self.as_str(), "mount" | "unmount")
    }

    /// Map a `Custom` event carrying a known name onto its variant.
    pub fn normalized(self) -> Self {
        match self {
            Self::Custom(name) => Self::from(name.as_str()),
            known => known,
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for LifecycleEvent {
    fn from(name: &str) -> Self {
        match name {
            "mount" => Self::Mount,
            "unmount" => Self::Unmount,
            "update" => Self::Update,
            other => Self::Custom(other.to_string()),
        }
    }
}

fn default_probe(enabled: bool) -> Arc<dyn MemoryProbe> {
    if !enabled {
        return Arc::new(NoMemoryProbe);
    }
    process_probe()
}

#[cfg(feature = "process-memory")]
fn process_probe() -> Arc<dyn MemoryProbe> {
    Arc::new(crate::memory::ProcessMemoryProbe::new())
}

#[cfg(not(feature = "process-memory"))]
fn process_probe() -> Arc<dyn MemoryProbe> {
    Arc::new(NoMemoryProbe)
}

/// In-process performance monitor.
#[derive(Debug)]
pub struct PerfMonitor {
    enabled: bool,
    thresholds: Thresholds,
    clock: Arc<dyn Clock>,
    memory_probe: Arc<dyn MemoryProbe>,
    renders: RenderTracker,
    snapshots: SnapshotHistory,
}

impl PerfMonitor {
    /// Create a monitor. Enablement is fixed for the monitor's lifetime.
    pub fn new(config: MonitorConfig) -> Self {
        let enabled = config.is_enabled();
        let thresholds = config.thresholds.clamped();

        Self {
            enabled,
            renders: RenderTracker::new(thresholds.max_render_records, thresholds.slow_render()),
            snapshots: SnapshotHistory::new(thresholds.max_snapshots),
            clock: Arc::new(SystemClock),
            memory_probe: default_probe(enabled),
            thresholds,
        }
    }

    /// Create a monitor that does nothing.
    pub fn disabled() -> Self {
        Self::new(MonitorConfig::production())
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the memory probe.
    pub fn with_memory_probe(mut self, probe: Arc<dyn MemoryProbe>) -> Self {
        self.memory_probe = probe;
        self
    }

    /// Whether monitoring is on.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Active thresholds.
    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    // -------------------------------------------------------------------------
    // Render timing
    // -------------------------------------------------------------------------

    /// Begin timing a render. Returns `None` when disabled.
    pub fn start_render(&mut self, label: &str) -> Option<RenderToken> {
        if !self.enabled {
            return None;
        }
        Some(self.renders.start(label, self.clock.now()))
    }

    /// Finish timing a render.
    ///
    /// Silently ignores `None`, unknown or already-closed tokens.
    pub fn end_render(&mut self, token: Option<RenderToken>) {
        if !self.enabled {
            return;
        }
        let Some(token) = token else {
            return;
        };
        self.renders.end(token, self.clock.now());
    }

    /// Time a synchronous render closure.
    pub fn time_render<R>(&mut self, label: &str, render: impl FnOnce() -> R) -> R {
        let token = self.start_render(label);
        let output = render();
        self.end_render(token);
        output
    }

    /// Look up a retained render record.
    pub fn render(&self, token: RenderToken) -> Option<&RenderRecord> {
        self.renders.get(token)
    }

    /// Retained render records, open and closed.
    pub fn render_count(&self) -> usize {
        self.renders.len()
    }

    /// Retained render records still open.
    pub fn open_render_count(&self) -> usize {
        self.renders.open_count()
    }

    // -------------------------------------------------------------------------
    // Memory snapshots
    // -------------------------------------------------------------------------

    /// Record a labelled memory snapshot.
    ///
    /// Does nothing when disabled or when the probe has no reading.
    pub fn take_snapshot(&mut self, label: &str) -> Option<&MemorySnapshot> {
        if !self.enabled {
            return None;
        }
        let usage = self.memory_probe.sample()?;
        let snapshot = self.snapshots.push(label, usage);

        tracing::info!(
            target: TARGET,
            label = label,
            used_bytes = snapshot.used_bytes,
            "Memory snapshot [{}]: used {:.2} MB, total {:.2} MB, limit {:.2} MB",
            label,
            snapshot.used_mb(),
            snapshot.total_mb(),
            snapshot.limit_mb()
        );
        Some(snapshot)
    }

    /// Record a snapshot labelled `"default"`.
    pub fn take_default_snapshot(&mut self) -> Option<&MemorySnapshot> {
        self.take_snapshot("default")
    }

    /// Retained snapshots, oldest first.
    pub fn snapshots(&self) -> impl DoubleEndedIterator<Item = &MemorySnapshot> {
        self.snapshots.iter()
    }

    /// Number of retained snapshots.
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    /// Log a component lifecycle event.
    ///
    /// Mount and unmount also take a snapshot labelled `<label>_<event>`.
    pub fn log_lifecycle(
        &mut self,
        label: &str,
        event: impl Into<LifecycleEvent>,
        extra: Option<&serde_json::Value>,
    ) {
        if !self.enabled {
            return;
        }
        let event = event.into().normalized();

        match extra {
            Some(extra) => tracing::debug!(
                target: TARGET,
                label = label,
                event = event.as_str(),
                "[{}] {} {}",
                label,
                event,
                extra
            ),
            None => tracing::debug!(
                target: TARGET,
                label = label,
                event = event.as_str(),
                "[{}] {}",
                label,
                event
            ),
        }

        if event.takes_snapshot() {
            self.take_snapshot(&format!("{}_{}", label, event));
        }
    }

    /// Used-bytes growth between the latest mount of `label` and its
    /// following unmount.
    pub fn lifecycle_growth(&self, label: &str) -> Option<i64> {
        self.snapshots.growth_between(
            &format!("{}_{}", label, LifecycleEvent::Mount),
            &format!("{}_{}", label, LifecycleEvent::Unmount),
        )
    }

    /// Accessor bound to one component label.
    pub fn component<'a>(&'a mut self, label: &'a str) -> ComponentMonitor<'a> {
        ComponentMonitor::new(self, label)
    }

    // -------------------------------------------------------------------------
    // Async operations and frame rate
    // -------------------------------------------------------------------------

    /// Timer for async operations, detached from the monitor's borrow.
    pub fn operations(&self) -> OperationTimer {
        OperationTimer::new(
            self.enabled,
            self.thresholds.slow_operation(),
            Arc::clone(&self.clock),
        )
    }

    /// Time an async operation, returning its result unchanged.
    pub async fn measure<F, Fut, T, E>(&self, name: &str, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        self.operations().measure(name, operation).await
    }

    /// Start sampling the frame rate from host frame timestamps.
    ///
    /// Returns `None` when disabled. Must be called within a Tokio runtime.
    pub fn start_fps_logging(&self, frames: mpsc::Receiver<Instant>) -> Option<FpsHandle> {
        if !self.enabled {
            return None;
        }
        let sampler = FpsSampler::new(self.thresholds.fps_window(), self.thresholds.min_fps);
        Some(sampler.spawn(self.clock.now(), frames))
    }

    // -------------------------------------------------------------------------
    // Summary
    // -------------------------------------------------------------------------

    /// Aggregate retained data. Returns `None` when disabled.
    pub fn summary(&self) -> Option<PerfSummary> {
        if !self.enabled {
            return None;
        }
        Some(PerfSummary::from_records(
            self.renders.iter(),
            self.snapshots.recent(self.thresholds.summary_snapshots),
        ))
    }

    /// Drop all render records and snapshots.
    ///
    /// Runs whether or not monitoring is enabled.
    pub fn clear(&mut self) {
        self.renders.clear();
        self.snapshots.clear();
        if self.enabled {
            tracing::info!(target: TARGET, "Performance data cleared");
        }
    }
}
