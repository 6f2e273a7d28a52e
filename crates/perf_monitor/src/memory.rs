//! Memory Snapshot Module
//!
//! Bounded history of heap usage samples. Readings come from a
//! [`MemoryProbe`]; hosts without memory introspection use
//! [`NoMemoryProbe`] and snapshots are silently skipped.
//!
//! # Example
//!
//! ```rust
//! use perf_monitor::memory::{FixedMemoryProbe, HeapUsage, MemoryProbe, SnapshotHistory};
//!
//! let probe = FixedMemoryProbe::new(HeapUsage::new(8 << 20, 16 << 20, 64 << 20));
//! let mut history = SnapshotHistory::new(100);
//!
//! if let Some(usage) = probe.sample() {
//!     history.push("startup", usage);
//! }
//! assert_eq!(history.len(), 1);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Convert bytes to megabytes.
pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

// =============================================================================
// Heap Usage
// =============================================================================

/// A single reading from a memory probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeapUsage {
    /// Bytes currently in use
    pub used_bytes: u64,
    /// Bytes currently reserved
    pub total_bytes: u64,
    /// Upper bound the heap may grow to
    pub limit_bytes: u64,
}

impl HeapUsage {
    /// Create a new reading.
    pub fn new(used_bytes: u64, total_bytes: u64, limit_bytes: u64) -> Self {
        Self {
            used_bytes,
            total_bytes,
            limit_bytes,
        }
    }
}

/// Source of heap usage readings.
///
/// Returning `None` means the host cannot report memory usage.
pub trait MemoryProbe: Send + Sync + fmt::Debug {
    /// Take a reading.
    fn sample(&self) -> Option<HeapUsage>;
}

/// Probe for hosts without memory introspection.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMemoryProbe;

impl MemoryProbe for NoMemoryProbe {
    fn sample(&self) -> Option<HeapUsage> {
        None
    }
}

/// Probe that always reports the same reading.
#[derive(Debug, Clone, Copy)]
pub struct FixedMemoryProbe(HeapUsage);

impl FixedMemoryProbe {
    /// Create a probe returning `usage`.
    pub fn new(usage: HeapUsage) -> Self {
        Self(usage)
    }
}

impl MemoryProbe for FixedMemoryProbe {
    fn sample(&self) -> Option<HeapUsage> {
        Some(self.0)
    }
}

#[cfg(feature = "process-memory")]
pub use process::ProcessMemoryProbe;

#[cfg(feature = "process-memory")]
mod process {
    use super::{HeapUsage, MemoryProbe};
    use std::sync::Mutex;
    use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

    /// Probe reading the current process through `sysinfo`.
    ///
    /// `used` is resident memory, `total` is virtual memory and `limit` is
    /// the system's total physical memory.
    #[derive(Debug)]
    pub struct ProcessMemoryProbe {
        system: Mutex<System>,
        pid: Pid,
    }

    impl Default for ProcessMemoryProbe {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ProcessMemoryProbe {
        /// Create a probe for the running process.
        pub fn new() -> Self {
            Self {
                system: Mutex::new(System::new()),
                pid: Pid::from_u32(std::process::id()),
            }
        }
    }

    impl MemoryProbe for ProcessMemoryProbe {
        fn sample(&self) -> Option<HeapUsage> {
            let mut system = self.system.lock().ok()?;
            system.refresh_memory();
            system.refresh_processes_specifics(
                ProcessesToUpdate::Some(&[self.pid]),
                true,
                ProcessRefreshKind::nothing().with_memory(),
            );

            let process = system.process(self.pid)?;
            Some(HeapUsage::new(
                process.memory(),
                process.virtual_memory(),
                system.total_memory(),
            ))
        }
    }
}

// =============================================================================
// Memory Snapshot
// =============================================================================

/// A labelled heap usage sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySnapshot {
    /// Label given when the snapshot was taken
    pub label: String,
    /// When the snapshot was taken
    pub timestamp: DateTime<Utc>,
    /// Bytes in use
    pub used_bytes: u64,
    /// Bytes reserved
    pub total_bytes: u64,
    /// Heap limit
    pub limit_bytes: u64,
}

impl MemorySnapshot {
    /// Create a snapshot stamped with the current time.
    pub fn new(label: impl Into<String>, usage: HeapUsage) -> Self {
        Self {
            label: label.into(),
            timestamp: Utc::now(),
            used_bytes: usage.used_bytes,
            total_bytes: usage.total_bytes,
            limit_bytes: usage.limit_bytes,
        }
    }

    /// Used memory in megabytes.
    pub fn used_mb(&self) -> f64 {
        bytes_to_mb(self.used_bytes)
    }

    /// Reserved memory in megabytes.
    pub fn total_mb(&self) -> f64 {
        bytes_to_mb(self.total_bytes)
    }

    /// Limit in megabytes.
    pub fn limit_mb(&self) -> f64 {
        bytes_to_mb(self.limit_bytes)
    }
}

// =============================================================================
// Snapshot History
// =============================================================================

/// FIFO-bounded sequence of snapshots.
#[derive(Debug)]
pub struct SnapshotHistory {
    snapshots: VecDeque<MemorySnapshot>,
    max_snapshots: usize,
}

impl SnapshotHistory {
    /// Create an empty history holding at most `max_snapshots` (at least one).
    pub fn new(max_snapshots: usize) -> Self {
        Self {
            snapshots: VecDeque::with_capacity(max_snapshots.clamp(1, 128)),
            max_snapshots: max_snapshots.max(1),
        }
    }

    /// Append a snapshot, evicting the oldest when over capacity.
    pub fn push(&mut self, label: impl Into<String>, usage: HeapUsage) -> &MemorySnapshot {
        while self.snapshots.len() >= self.max_snapshots {
            self.snapshots.pop_front();
        }
        let index = self.snapshots.len();
        self.snapshots.push_back(MemorySnapshot::new(label, usage));
        &self.snapshots[index]
    }

    /// Number of retained snapshots.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether the history is empty.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Iterate snapshots, oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &MemorySnapshot> {
        self.snapshots.iter()
    }

    /// The latest snapshot.
    pub fn latest(&self) -> Option<&MemorySnapshot> {
        self.snapshots.back()
    }

    /// The `count` most recent snapshots, oldest first.
    pub fn recent(&self, count: usize) -> Vec<MemorySnapshot> {
        let skip = self.snapshots.len().saturating_sub(count);
        self.snapshots.iter().skip(skip).cloned().collect()
    }

    /// Change in used bytes between the two most recent snapshots.
    pub fn compare_latest(&self) -> Option<i64> {
        let mut newest_first = self.snapshots.iter().rev();
        let to = newest_first.next()?;
        let from = newest_first.next()?;
        Some(to.used_bytes as i64 - from.used_bytes as i64)
    }

    /// Change in used bytes between the latest `from_label` snapshot and a
    /// later `to_label` snapshot.
    pub fn growth_between(&self, from_label: &str, to_label: &str) -> Option<i64> {
        let to_index = self.snapshots.iter().rposition(|s| s.label == to_label)?;
        let from = self
            .snapshots
            .iter()
            .take(to_index)
            .rfind(|s| s.label == from_label)?;
        let to = &self.snapshots[to_index];
        Some(to.used_bytes as i64 - from.used_bytes as i64)
    }

    /// Drop every snapshot.
    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}
