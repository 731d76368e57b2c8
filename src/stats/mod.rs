//! Culling statistics and the background summary worker
//!
//! The render thread hands one `CullStats` snapshot per frame to the worker
//! over a bounded channel. The worker keeps rolling averages and logs a
//! summary every `log_interval` frames. Reading the summary back never
//! blocks: it goes through `try_lock` and an atomic "summary ready" flag.

use crate::error::{CullError, CullResult};
use crate::region::RegionStats;
use crate::visibility::VisibilityStats;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Frames buffered between the render thread and the worker
const CHANNEL_CAPACITY: usize = 64;

/// One frame's culling statistics
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CullStats {
    pub frame: u64,
    pub frame_time: Duration,
    pub hiz_built: bool,
    pub visibility: VisibilityStats,
    pub regions: RegionStats,
}

impl CullStats {
    /// Visible fraction of the objects in the last consumed readback
    pub fn visible_ratio(&self) -> f32 {
        if self.visibility.tracked == 0 {
            1.0
        } else {
            self.visibility.visible as f32 / self.visibility.tracked as f32
        }
    }

    /// Indirect draws emitted across all passes
    pub fn total_commands(&self) -> u32 {
        self.regions.commands.iter().sum()
    }
}

/// Running totals over the current summary window
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RollingStats {
    /// Frames in the window
    pub frames: u64,
    /// Last frame number seen
    pub last_frame: u64,
    pub average_frame_ms: f64,
    pub average_visible_ratio: f64,
    pub average_commands: f64,
    pub peak_tracked: u32,
    pub peak_regions: u32,
    /// Frames that reported a command overflow
    pub overflow_frames: u64,
    pub skipped_readbacks: u64,
}

impl RollingStats {
    /// Fold one frame into the running averages
    pub fn accumulate(&mut self, stats: &CullStats) {
        self.frames += 1;
        self.last_frame = stats.frame;

        let n = self.frames as f64;
        let blend = |average: &mut f64, sample: f64| *average += (sample - *average) / n;
        blend(&mut self.average_frame_ms, stats.frame_time.as_secs_f64() * 1000.0);
        blend(&mut self.average_visible_ratio, f64::from(stats.visible_ratio()));
        blend(&mut self.average_commands, f64::from(stats.total_commands()));

        self.peak_tracked = self.peak_tracked.max(stats.visibility.tracked);
        self.peak_regions = self.peak_regions.max(stats.regions.regions);
        if stats.regions.overflow > 0 {
            self.overflow_frames += 1;
        }
        self.skipped_readbacks = stats.visibility.skipped_readbacks;
    }

    pub fn log_summary(&self) {
        log::info!(
            "[CullStats] frame {}: {:.2} ms avg, {:.1}% objects visible, {:.0} draws avg, peak {} objects / {} regions, {} overflow frames, {} skipped readbacks",
            self.last_frame,
            self.average_frame_ms,
            self.average_visible_ratio * 100.0,
            self.average_commands,
            self.peak_tracked,
            self.peak_regions,
            self.overflow_frames,
            self.skipped_readbacks
        );
    }
}

struct SharedSummary {
    ready: AtomicBool,
    latest: Mutex<RollingStats>,
}

/// Background thread aggregating per-frame statistics
pub struct StatsWorker {
    sender: Option<Sender<CullStats>>,
    shared: Arc<SharedSummary>,
    dropped: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl StatsWorker {
    pub fn spawn(log_interval: u32) -> CullResult<Self> {
        let (sender, receiver) = bounded(CHANNEL_CAPACITY);
        let shared = Arc::new(SharedSummary {
            ready: AtomicBool::new(false),
            latest: Mutex::new(RollingStats::default()),
        });

        let worker_shared = Arc::clone(&shared);
        let interval = u64::from(log_interval.max(1));
        let handle = std::thread::Builder::new()
            .name("cull-stats".to_string())
            .spawn(move || run_worker(receiver, worker_shared, interval))
            .map_err(|e| CullError::StatsWorker { error: e.to_string() })?;

        log::debug!("[StatsWorker] Started, summary every {} frames", interval);
        Ok(Self {
            sender: Some(sender),
            shared,
            dropped: Arc::new(AtomicU64::new(0)),
            handle: Some(handle),
        })
    }

    /// Hand a frame to the worker. Never blocks; a full channel drops it.
    pub fn record(&self, stats: CullStats) {
        let Some(sender) = &self.sender else { return };
        match sender.try_send(stats) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Disconnected(_)) => {
                log::warn!("[StatsWorker] Worker thread has exited, dropping stats");
            }
        }
    }

    /// Latest completed summary window, if one finished since the last call
    /// and the worker isn't holding the lock right now
    pub fn take_summary(&self) -> Option<RollingStats> {
        if !self.shared.ready.load(Ordering::Acquire) {
            return None;
        }
        let summary = self.shared.latest.try_lock()?.clone();
        self.shared.ready.store(false, Ordering::Release);
        Some(summary)
    }

    /// Frames dropped because the channel was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Close the channel and join the worker
    pub fn shutdown(&mut self) {
        self.sender = None;
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("[StatsWorker] Worker thread panicked");
            }
        }
    }
}

impl Drop for StatsWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(receiver: Receiver<CullStats>, shared: Arc<SharedSummary>, interval: u64) {
    let mut window = RollingStats::default();
    for stats in receiver.iter() {
        window.accumulate(&stats);
        if window.frames >= interval {
            window.log_summary();
            *shared.latest.lock() = std::mem::take(&mut window);
            shared.ready.store(true, Ordering::Release);
        }
    }
    log::debug!("[StatsWorker] Channel closed, exiting");
}
