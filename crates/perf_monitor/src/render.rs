//! Render timing records with bounded, insertion-ordered retention

use crate::logging::TARGET;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Opaque token correlating an end call with its start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RenderToken(Uuid);

impl RenderToken {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for RenderToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One timed render attempt.
#[derive(Debug, Clone)]
pub struct RenderRecord {
    /// Token handed to the caller at start
    pub token: RenderToken,
    /// Caller-supplied name, usually a component identifier
    pub label: String,
    /// When the render started
    pub start: Instant,
    /// When the render ended, `None` while open
    pub end: Option<Instant>,
    /// `end - start`, `None` while open
    pub duration: Option<Duration>,
}

impl RenderRecord {
    fn open(token: RenderToken, label: String, start: Instant) -> Self {
        Self {
            token,
            label,
            start,
            end: None,
            duration: None,
        }
    }

    /// Whether the record is still waiting for its end call.
    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// Duration in milliseconds, if closed.
    pub fn duration_ms(&self) -> Option<f64> {
        self.duration.map(|d| d.as_secs_f64() * 1000.0)
    }
}

/// Tracks render start/end pairs.
///
/// Records are kept in a token map beside an explicit insertion-order queue.
/// Once the record count exceeds `max_records`, the oldest records are
/// evicted when a render ends.
#[derive(Debug)]
pub struct RenderTracker {
    records: HashMap<RenderToken, RenderRecord>,
    order: VecDeque<RenderToken>,
    max_records: usize,
    slow_render: Duration,
}

impl RenderTracker {
    /// Create a tracker with the given ceiling and slow-render threshold.
    pub fn new(max_records: usize, slow_render: Duration) -> Self {
        Self {
            records: HashMap::new(),
            order: VecDeque::new(),
            max_records: max_records.max(1),
            slow_render,
        }
    }

    /// Open a new record and return its token.
    pub fn start(&mut self, label: impl Into<String>, now: Instant) -> RenderToken {
        let token = RenderToken::new();
        self.records
            .insert(token, RenderRecord::open(token, label.into(), now));
        self.order.push_back(token);
        token
    }

    /// Close the record for `token`.
    ///
    /// Returns the render duration, or `None` if the token is unknown or the
    /// record was already closed.
    pub fn end(&mut self, token: RenderToken, now: Instant) -> Option<Duration> {
        let record = self.records.get_mut(&token)?;
        if !record.is_open() {
            return None;
        }

        let duration = now.saturating_duration_since(record.start);
        record.end = Some(now);
        record.duration = Some(duration);

        let duration_ms = duration.as_secs_f64() * 1000.0;
        if duration > self.slow_render {
            tracing::warn!(
                target: TARGET,
                label = record.label.as_str(),
                duration_ms = duration_ms,
                "Slow render detected: {} took {:.2}ms",
                record.label,
                duration_ms
            );
        } else {
            tracing::trace!(
                target: TARGET,
                label = record.label.as_str(),
                duration_ms = duration_ms,
                "render recorded"
            );
        }

        self.evict_overflow();
        Some(duration)
    }

    fn evict_overflow(&mut self) {
        while self.order.len() > self.max_records {
            if let Some(oldest) = self.order.pop_front() {
                self.records.remove(&oldest);
            }
        }
    }

    /// Look up a retained record.
    pub fn get(&self, token: RenderToken) -> Option<&RenderRecord> {
        self.records.get(&token)
    }

    /// Iterate retained records, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &RenderRecord> {
        self.order.iter().filter_map(|token| self.records.get(token))
    }

    /// Number of retained records, open and closed.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no records are retained.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Number of retained records still open.
    pub fn open_count(&self) -> usize {
        self.records.values().filter(|r| r.is_open()).count()
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.records.clear();
        self.order.clear();
    }
}
