//! Monitor configuration and thresholds

use crate::error::{PerfError, PerfResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable that switches debug logging on.
pub const ENV_DEBUG_LOGGING: &str = "PERF_MONITOR_DEBUG_LOGGING";

/// Environment variable that overrides the development-build detection.
pub const ENV_DEV_BUILD: &str = "PERF_MONITOR_DEV_BUILD";

/// Thresholds and capacities used by the monitor.
///
/// All values have defaults tuned for a 60Hz UI. Times are in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Thresholds {
    /// A closed render slower than this emits a warning.
    ///
    /// Default 16ms, one frame at 60Hz.
    pub slow_render_ms: u64,

    /// A measured async operation slower than this emits a warning.
    pub slow_operation_ms: u64,

    /// Maximum render records (open and closed) retained before eviction.
    pub max_render_records: usize,

    /// Maximum memory snapshots retained before eviction.
    pub max_snapshots: usize,

    /// Frame rates below this emit a warning.
    pub min_fps: u32,

    /// Length of one frame-rate measurement window.
    pub fps_window_ms: u64,

    /// Number of recent snapshots included in a summary.
    pub summary_snapshots: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            slow_render_ms: 16,
            slow_operation_ms: 1000,
            max_render_records: 1000,
            max_snapshots: 100,
            min_fps: 50,
            fps_window_ms: 1000,
            summary_snapshots: 10,
        }
    }
}

impl Thresholds {
    /// Builder method to set the slow render threshold.
    pub fn with_slow_render_ms(mut self, ms: u64) -> Self {
        self.slow_render_ms = ms;
        self
    }

    /// Builder method to set the slow operation threshold.
    pub fn with_slow_operation_ms(mut self, ms: u64) -> Self {
        self.slow_operation_ms = ms;
        self
    }

    /// Builder method to set the render record ceiling.
    pub fn with_max_render_records(mut self, max: usize) -> Self {
        self.max_render_records = max;
        self
    }

    /// Builder method to set the snapshot history capacity.
    pub fn with_max_snapshots(mut self, max: usize) -> Self {
        self.max_snapshots = max;
        self
    }

    /// Builder method to set the frame rate floor.
    pub fn with_min_fps(mut self, fps: u32) -> Self {
        self.min_fps = fps;
        self
    }

    /// Builder method to set the frame-rate window.
    pub fn with_fps_window_ms(mut self, ms: u64) -> Self {
        self.fps_window_ms = ms;
        self
    }

    /// Builder method to set how many snapshots a summary carries.
    pub fn with_summary_snapshots(mut self, count: usize) -> Self {
        self.summary_snapshots = count;
        self
    }

    /// Slow render threshold as a duration.
    pub fn slow_render(&self) -> Duration {
        Duration::from_millis(self.slow_render_ms)
    }

    /// Slow operation threshold as a duration.
    pub fn slow_operation(&self) -> Duration {
        Duration::from_millis(self.slow_operation_ms)
    }

    /// Frame-rate window as a duration.
    pub fn fps_window(&self) -> Duration {
        Duration::from_millis(self.fps_window_ms)
    }

    /// Check that capacities and windows are usable.
    pub fn validate(&self) -> PerfResult<()> {
        if self.max_render_records == 0 {
            return Err(PerfError::InvalidConfig(
                "maxRenderRecords must be > 0".to_string(),
            ));
        }
        if self.max_snapshots == 0 {
            return Err(PerfError::InvalidConfig(
                "maxSnapshots must be > 0".to_string(),
            ));
        }
        if self.fps_window_ms == 0 {
            return Err(PerfError::InvalidConfig(
                "fpsWindowMs must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Raise zero capacities and windows to their smallest usable value.
    pub fn clamped(self) -> Self {
        Self {
            max_render_records: self.max_render_records.max(1),
            max_snapshots: self.max_snapshots.max(1),
            fps_window_ms: self.fps_window_ms.max(1),
            ..self
        }
    }
}

/// Configuration handed to [`crate::PerfMonitor`] at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MonitorConfig {
    /// Debug logging switch from the application's feature flags
    pub debug_logging_enabled: bool,
    /// Whether this is a development build
    pub is_development_build: bool,
    /// Thresholds and capacities
    pub thresholds: Thresholds,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            debug_logging_enabled: false,
            is_development_build: cfg!(debug_assertions),
            thresholds: Thresholds::default(),
        }
    }
}

impl MonitorConfig {
    /// Create a config with monitoring switched on in a development build.
    pub fn development() -> Self {
        Self {
            debug_logging_enabled: true,
            is_development_build: true,
            thresholds: Thresholds::default(),
        }
    }

    /// Create a config for a production build (monitoring off).
    pub fn production() -> Self {
        Self {
            debug_logging_enabled: false,
            is_development_build: false,
            thresholds: Thresholds::default(),
        }
    }

    /// Set the debug logging flag.
    pub fn with_debug_logging(mut self, enabled: bool) -> Self {
        self.debug_logging_enabled = enabled;
        self
    }

    /// Set the development build flag.
    pub fn with_development_build(mut self, dev: bool) -> Self {
        self.is_development_build = dev;
        self
    }

    /// Replace the thresholds.
    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Monitoring is on only for debug logging in a development build.
    pub fn is_enabled(&self) -> bool {
        self.debug_logging_enabled && self.is_development_build
    }

    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> PerfResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| PerfError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load flags from the process environment.
    ///
    /// Reads [`ENV_DEBUG_LOGGING`] and [`ENV_DEV_BUILD`]. Unset variables
    /// keep their defaults.
    pub fn from_env() -> PerfResult<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load flags through a variable lookup function.
    pub fn from_vars<F>(lookup: F) -> PerfResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(value) = lookup(ENV_DEBUG_LOGGING) {
            config.debug_logging_enabled = parse_flag(ENV_DEBUG_LOGGING, &value)?;
        }
        if let Some(value) = lookup(ENV_DEV_BUILD) {
            config.is_development_build = parse_flag(ENV_DEV_BUILD, &value)?;
        }
        Ok(config)
    }

    /// Check the thresholds.
    pub fn validate(&self) -> PerfResult<()> {
        self.thresholds.validate()
    }
}

fn parse_flag(key: &str, value: &str) -> PerfResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(PerfError::Config(format!(
            "{} has invalid value '{}'",
            key, other
        ))),
    }
}
