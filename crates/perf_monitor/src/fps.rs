//! Frame-rate sampling
//!
//! The host delivers one [`Instant`] per display refresh over an mpsc
//! channel. A background task counts frames and, once per window, computes
//! the frame rate and warns when it drops below the floor.
//!
//! Sampling stops when the [`FpsHandle`] is stopped or dropped, or when the
//! host drops its frame sender.

use crate::logging::TARGET;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

/// One frame-rate measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FpsReading {
    /// Frames per second, rounded
    pub fps: u32,
    /// Frames counted in the window
    pub frames: u32,
    /// Actual window length in milliseconds
    pub elapsed_ms: f64,
    /// Whether `fps` fell below the configured floor
    pub below_floor: bool,
}

/// Totals for a finished sampling run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FpsReport {
    /// Frames received
    pub total_frames: u64,
    /// Completed measurement windows
    pub windows: u64,
    /// Windows below the floor
    pub low_fps_windows: u64,
    /// Last reading taken
    pub last: Option<FpsReading>,
}

const MIN_WINDOW: Duration = Duration::from_millis(1);

/// Frame counter driving the sampler.
///
/// Kept separate from the task so it can be driven with synthetic frame
/// timestamps.
#[derive(Debug, Clone)]
pub struct FrameCounter {
    anchor: Instant,
    frames: u32,
    window: Duration,
    min_fps: u32,
    report: FpsReport,
}

impl FrameCounter {
    /// Start counting from `anchor`. Windows shorter than 1ms are raised to 1ms.
    pub fn new(anchor: Instant, window: Duration, min_fps: u32) -> Self {
        Self {
            anchor,
            frames: 0,
            window: window.max(MIN_WINDOW),
            min_fps,
            report: FpsReport::default(),
        }
    }

    /// Count a frame delivered at `at`.
    ///
    /// Returns a reading when at least one window has passed since the
    /// last measurement; the counter and anchor then reset.
    pub fn tick(&mut self, at: Instant) -> Option<FpsReading> {
        self.frames = self.frames.saturating_add(1);
        self.report.total_frames += 1;

        let elapsed = at.saturating_duration_since(self.anchor);
        if elapsed.is_zero() || elapsed < self.window {
            return None;
        }

        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        let fps = (f64::from(self.frames) * 1000.0 / elapsed_ms).round() as u32;
        let reading = FpsReading {
            fps,
            frames: self.frames,
            elapsed_ms,
            below_floor: fps < self.min_fps,
        };

        self.frames = 0;
        self.anchor = at;
        self.report.windows += 1;
        if reading.below_floor {
            self.report.low_fps_windows += 1;
        }
        self.report.last = Some(reading);
        Some(reading)
    }

    /// Totals so far.
    pub fn report(&self) -> &FpsReport {
        &self.report
    }
}

/// Spawns frame-rate sampling tasks.
#[derive(Debug, Clone, Copy)]
pub struct FpsSampler {
    window: Duration,
    min_fps: u32,
}

impl FpsSampler {
    /// Create a sampler with the given window and floor.
    pub fn new(window: Duration, min_fps: u32) -> Self {
        Self { window, min_fps }
    }

    /// Spawn the sampling task on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn spawn(self, anchor: Instant, frames: mpsc::Receiver<Instant>) -> FpsHandle {
        let counter = FrameCounter::new(anchor, self.window, self.min_fps);
        let (stop_tx, stop_rx) = oneshot::channel();
        let (readings_tx, readings_rx) = watch::channel(None);

        let task = tokio::spawn(run(counter, frames, stop_rx, readings_tx));

        tracing::debug!(
            target: TARGET,
            window_ms = self.window.as_millis() as u64,
            min_fps = self.min_fps,
            "FPS logging started"
        );

        FpsHandle {
            stop: stop_tx,
            task,
            readings: readings_rx,
        }
    }
}

async fn run(
    mut counter: FrameCounter,
    mut frames: mpsc::Receiver<Instant>,
    mut stop: oneshot::Receiver<()>,
    readings: watch::Sender<Option<FpsReading>>,
) -> FpsReport {
    loop {
        tokio::select! {
            biased;
            _ = &mut stop => break,
            frame = frames.recv() => {
                let Some(at) = frame else { break };
                if let Some(reading) = counter.tick(at) {
                    if reading.below_floor {
                        tracing::warn!(
                            target: TARGET,
                            fps = reading.fps,
                            "Low FPS detected: {}",
                            reading.fps
                        );
                    }
                    readings.send_replace(Some(reading));
                }
            }
        }
    }

    tracing::debug!(
        target: TARGET,
        windows = counter.report().windows,
        "FPS logging stopped"
    );
    counter.report().clone()
}

/// Handle to a running sampling task.
///
/// Dropping the handle stops sampling.
#[derive(Debug)]
pub struct FpsHandle {
    stop: oneshot::Sender<()>,
    task: JoinHandle<FpsReport>,
    readings: watch::Receiver<Option<FpsReading>>,
}

impl FpsHandle {
    /// Most recent reading, if a window has completed.
    pub fn latest(&self) -> Option<FpsReading> {
        *self.readings.borrow()
    }

    /// Wait for the next reading. Returns `None` once the task has ended.
    pub async fn next_reading(&mut self) -> Option<FpsReading> {
        self.readings.changed().await.ok()?;
        *self.readings.borrow_and_update()
    }

    /// Whether the task has ended.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop sampling and return the totals.
    pub async fn stop(self) -> FpsReport {
        let _ = self.stop.send(());
        join_task(self.task).await
    }

    /// Wait for the host to stop delivering frames, then return the totals.
    pub async fn join(self) -> FpsReport {
        let Self { stop, task, .. } = self;
        let report = join_task(task).await;
        drop(stop);
        report
    }
}

async fn join_task(task: JoinHandle<FpsReport>) -> FpsReport {
    match task.await {
        Ok(report) => report,
        Err(err) => {
            tracing::warn!(target: TARGET, error = %err, "FPS task ended abnormally");
            FpsReport::default()
        }
    }
}

/// Produce frame timestamps from a Tokio interval.
///
/// For hosts without a display-refresh callback. The feeding task ends when
/// the returned receiver is dropped.
///
/// # Panics
///
/// Panics if called outside a Tokio runtime.
pub fn interval_frames(period: Duration) -> (mpsc::Receiver<Instant>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(64);
    let feeder = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            let tick = interval.tick().await;
            if tx.send(tick.into_std()).await.is_err() {
                break;
            }
        }
    });
    (rx, feeder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::capture;
    use tracing::Level;

    fn frames_at_rate(anchor: Instant, per_second: u64, seconds: u64) -> Vec<Instant> {
        (1..=per_second * seconds)
            .map(|k| anchor + Duration::from_secs(k) / per_second as u32)
            .collect()
    }

    #[test]
    fn test_counter_sixty_fps() {
        let t0 = Instant::now();
        let mut counter = FrameCounter::new(t0, Duration::from_secs(1), 50);

        let readings: Vec<_> = frames_at_rate(t0, 60, 2)
            .into_iter()
            .filter_map(|at| counter.tick(at))
            .collect();

        assert_eq!(readings.len(), 2);
        assert!(readings.iter().all(|r| r.fps == 60 && !r.below_floor));
        assert_eq!(counter.report().total_frames, 120);
        assert_eq!(counter.report().low_fps_windows, 0);
    }

    #[test]
    fn test_counter_low_fps() {
        let t0 = Instant::now();
        let mut counter = FrameCounter::new(t0, Duration::from_secs(1), 50);

        let readings: Vec<_> = frames_at_rate(t0, 30, 1)
            .into_iter()
            .filter_map(|at| counter.tick(at))
            .collect();

        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].fps, 30);
        assert_eq!(readings[0].frames, 30);
        assert!(readings[0].below_floor);
        assert_eq!(counter.report().low_fps_windows, 1);
    }

    #[test]
    fn test_counter_rounds_over_long_window() {
        let t0 = Instant::now();
        let mut counter = FrameCounter::new(t0, Duration::from_secs(1), 50);

        let mut reading = None;
        for k in 1..=34u32 {
            reading = counter.tick(t0 + Duration::from_millis(30) * k);
            if k < 34 {
                assert!(reading.is_none());
            }
        }

        // 34 frames over 1020ms
        let reading = reading.unwrap();
        assert_eq!(reading.fps, 33);
        assert_eq!(reading.frames, 34);
        assert_eq!(reading.elapsed_ms, 1020.0);
    }

    #[test]
    fn test_zero_window_needs_elapsed_time() {
        let t0 = Instant::now();
        let mut counter = FrameCounter::new(t0, Duration::ZERO, 50);

        assert!(counter.tick(t0).is_none());
        let reading = counter.tick(t0 + Duration::from_millis(1)).unwrap();
        assert_eq!(reading.frames, 2);
        assert_eq!(reading.fps, 2000);
        assert!(!reading.below_floor);
    }

    #[tokio::test]
    async fn test_task_warns_below_floor() {
        let (logs, _guard) = capture();
        let t0 = Instant::now();
        let (tx, rx) = mpsc::channel(256);
        let handle = FpsSampler::new(Duration::from_secs(1), 50).spawn(t0, rx);

        for at in frames_at_rate(t0, 30, 2) {
            tx.send(at).await.unwrap();
        }
        drop(tx);

        let report = handle.join().await;
        assert_eq!(report.windows, 2);
        assert_eq!(report.low_fps_windows, 2);
        assert_eq!(logs.count_containing(Level::WARN, "Low FPS detected: 30"), 2);
    }

    #[tokio::test]
    async fn test_task_healthy_rate_is_silent() {
        let (logs, _guard) = capture();
        let t0 = Instant::now();
        let (tx, rx) = mpsc::channel(256);
        let mut handle = FpsSampler::new(Duration::from_secs(1), 50).spawn(t0, rx);

        for at in frames_at_rate(t0, 60, 1) {
            tx.send(at).await.unwrap();
        }

        let reading = handle.next_reading().await.unwrap();
        assert_eq!(reading.fps, 60);
        assert_eq!(handle.latest(), Some(reading));
        assert_eq!(logs.count(Level::WARN), 0);

        let report = handle.stop().await;
        assert_eq!(report.total_frames, 60);
    }

    #[tokio::test]
    async fn test_stop_ends_task_while_frames_pending() {
        let (tx, rx) = mpsc::channel::<Instant>(4);
        let handle = FpsSampler::new(Duration::from_secs(1), 50).spawn(Instant::now(), rx);

        let report = handle.stop().await;
        assert_eq!(report.windows, 0);
        assert!(tx.is_closed());
    }

    #[tokio::test]
    async fn test_dropping_handle_stops_task() {
        let (tx, rx) = mpsc::channel::<Instant>(4);
        let handle = FpsSampler::new(Duration::from_secs(1), 50).spawn(Instant::now(), rx);
        drop(handle);

        tokio::time::timeout(Duration::from_secs(1), tx.closed())
            .await
            .expect("sampler should release the frame receiver");
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_frames_feed_sampler() {
        let (frames, feeder) = interval_frames(Duration::from_millis(10));
        let anchor = tokio::time::Instant::now().into_std();
        let mut handle = FpsSampler::new(Duration::from_secs(1), 50).spawn(anchor, frames);

        let reading = handle.next_reading().await.unwrap();
        assert!(reading.fps >= 95 && reading.fps <= 101, "fps = {}", reading.fps);
        assert!(!reading.below_floor);

        handle.stop().await;
        tokio::time::timeout(Duration::from_secs(1), feeder)
            .await
            .expect("feeder should end once frames are no longer received")
            .unwrap();
    }
}
