//! Per-component accessor

use crate::monitor::{LifecycleEvent, PerfMonitor};
use crate::render::RenderToken;

/// Monitor view bound to a single component label.
#[derive(Debug)]
pub struct ComponentMonitor<'a> {
    monitor: &'a mut PerfMonitor,
    label: &'a str,
}

impl<'a> ComponentMonitor<'a> {
    pub(crate) fn new(monitor: &'a mut PerfMonitor, label: &'a str) -> Self {
        Self { monitor, label }
    }

    /// The bound label.
    pub fn label(&self) -> &str {
        self.label
    }

    /// Begin timing a render of this component.
    pub fn start_render(&mut self) -> Option<RenderToken> {
        self.monitor.start_render(self.label)
    }

    /// Finish timing a render of this component.
    pub fn end_render(&mut self, token: Option<RenderToken>) {
        self.monitor.end_render(token);
    }

    /// Log a lifecycle event for this component.
    pub fn log_lifecycle(
        &mut self,
        event: impl Into<LifecycleEvent>,
        extra: Option<&serde_json::Value>,
    ) {
        self.monitor.log_lifecycle(self.label, event, extra);
    }
}

#[cfg(test)]
mod tests {
    use crate::clock::ManualClock;
    use crate::memory::{FixedMemoryProbe, HeapUsage};
    use crate::monitor::{LifecycleEvent, PerfMonitor};
    use crate::MonitorConfig;
    use std::sync::Arc;

    #[test]
    fn test_component_delegates_with_label() {
        let clock = Arc::new(ManualClock::new());
        let mut monitor = PerfMonitor::new(MonitorConfig::development())
            .with_clock(clock.clone())
            .with_memory_probe(Arc::new(FixedMemoryProbe::new(HeapUsage::new(1, 2, 3))));

        {
            let mut header = monitor.component("Header");
            assert_eq!(header.label(), "Header");
            header.log_lifecycle(LifecycleEvent::Mount, None);
            let token = header.start_render();
            clock.advance_ms(4);
            header.end_render(token);
            header.log_lifecycle("unmount", None);
        }

        let summary = monitor.summary().unwrap();
        assert_eq!(summary.stats("Header").unwrap().total_ms, 4.0);
        let labels: Vec<_> = monitor.snapshots().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["Header_mount", "Header_unmount"]);
    }

    #[test]
    fn test_component_on_disabled_monitor() {
        let mut monitor = PerfMonitor::disabled();
        let mut list = monitor.component("List");
        let token = list.start_render();
        list.end_render(token);
        assert!(token.is_none());
        assert_eq!(monitor.render_count(), 0);
    }
}
