//! In-process Performance Monitor
//!
//! This crate provides low-overhead instrumentation for UI applications:
//! - Render timing with start/end tokens and slow-render warnings
//! - Bounded memory snapshot history fed by a pluggable probe
//! - Async operation timing that passes results and errors through unchanged
//! - Frame-rate sampling as a cancellable background task
//! - On-demand per-label summaries
//!
//! Monitoring is on only when debug logging is enabled in a development
//! build. Otherwise every call is a no-op with the same signature, so call
//! sites never branch on the build mode.
//!
//! Diagnostics are `tracing` events under the `perf_monitor` target.
//!
//! # Feature Flags
//!
//! - `process-memory` (default): sample the current process through `sysinfo`
//!
//! # Example
//!
//! ```rust
//! use perf_monitor::{LifecycleEvent, MonitorConfig, PerfMonitor};
//!
//! let mut monitor = PerfMonitor::new(MonitorConfig::development());
//!
//! monitor.log_lifecycle("Sidebar", LifecycleEvent::Mount, None);
//! let token = monitor.start_render("Sidebar");
//! // ... render ...
//! monitor.end_render(token);
//!
//! let summary = monitor.summary().unwrap();
//! assert_eq!(summary.stats("Sidebar").unwrap().count, 1);
//! ```

pub mod clock;
mod component;
mod config;
mod error;
pub mod fps;
pub mod logging;
pub mod memory;
mod monitor;
mod operation;
mod render;
mod summary;

pub use clock::{Clock, ManualClock, SystemClock};
pub use component::ComponentMonitor;
pub use config::{MonitorConfig, Thresholds, ENV_DEBUG_LOGGING, ENV_DEV_BUILD};
pub use error::{PerfError, PerfResult};
pub use fps::{interval_frames, FpsHandle, FpsReading, FpsReport, FpsSampler};
pub use logging::init_logging;
pub use memory::{FixedMemoryProbe, HeapUsage, MemoryProbe, MemorySnapshot, NoMemoryProbe};
pub use monitor::{LifecycleEvent, PerfMonitor};
pub use operation::OperationTimer;
pub use render::{RenderRecord, RenderToken};
pub use summary::{PerfSummary, RenderStats};

#[cfg(test)]
pub(crate) mod test_support {
    //! Captures tracing events emitted on the current thread.

    use std::fmt;
    use std::sync::{Arc, Mutex};
    use tracing::field::{Field, Visit};
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::{Layer, Registry};

    #[derive(Debug, Clone)]
    pub struct Captured {
        pub level: Level,
        pub message: String,
    }

    #[derive(Debug, Clone, Default)]
    pub struct CaptureLayer {
        events: Arc<Mutex<Vec<Captured>>>,
    }

    impl CaptureLayer {
        pub fn events(&self) -> Vec<Captured> {
            self.events.lock().unwrap().clone()
        }

        pub fn count(&self, level: Level) -> usize {
            self.events().iter().filter(|e| e.level == level).count()
        }

        pub fn count_containing(&self, level: Level, needle: &str) -> usize {
            self.events()
                .iter()
                .filter(|e| e.level == level && e.message.contains(needle))
                .count()
        }
    }

    struct MessageVisitor(String);

    impl Visit for MessageVisitor {
        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            if field.name() == "message" {
                self.0 = format!("{:?}", value);
            }
        }
    }

    impl<S: Subscriber> Layer<S> for CaptureLayer {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut visitor = MessageVisitor(String::new());
            event.record(&mut visitor);
            self.events.lock().unwrap().push(Captured {
                level: *event.metadata().level(),
                message: visitor.0,
            });
        }
    }

    /// Route this thread's events into a fresh capture layer.
    pub fn capture() -> (CaptureLayer, tracing::subscriber::DefaultGuard) {
        let layer = CaptureLayer::default();
        let subscriber = Registry::default().with(layer.clone());
        let guard = tracing::subscriber::set_default(subscriber);
        (layer, guard)
    }
}
