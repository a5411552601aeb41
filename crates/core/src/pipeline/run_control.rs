use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use crate::shared::settings::DetectionSettings;

/// Live controls shared between a running stream and whoever drives it.
///
/// The UI thread (or a Ctrl-C handler) writes; the detection loop reads
/// once per frame. Everything is atomic so no lock is held across a frame.
#[derive(Debug)]
pub struct RunControl {
    cancelled: AtomicBool,
    confidence_bits: AtomicU64,
    max_detections: AtomicUsize,
    auto_snapshot: AtomicBool,
    snapshot_interval_secs: AtomicU64,
    snapshot_requested: AtomicBool,
}

impl RunControl {
    pub fn new(settings: &DetectionSettings, auto_snapshot: bool, interval: Duration) -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            confidence_bits: AtomicU64::new(settings.confidence.to_bits()),
            max_detections: AtomicUsize::new(settings.max_detections),
            auto_snapshot: AtomicBool::new(auto_snapshot),
            snapshot_interval_secs: AtomicU64::new(interval.as_secs().max(1)),
            snapshot_requested: AtomicBool::new(false),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Applies new thresholds; the next frame picks them up.
    pub fn set_thresholds(&self, confidence: f64, max_detections: usize) {
        self.confidence_bits
            .store(confidence.to_bits(), Ordering::Relaxed);
        self.max_detections.store(max_detections, Ordering::Relaxed);
    }

    pub fn confidence(&self) -> f64 {
        f64::from_bits(self.confidence_bits.load(Ordering::Relaxed))
    }

    pub fn max_detections(&self) -> usize {
        self.max_detections.load(Ordering::Relaxed)
    }

    pub fn set_auto_snapshot(&self, enabled: bool) {
        self.auto_snapshot.store(enabled, Ordering::Relaxed);
    }

    pub fn auto_snapshot(&self) -> bool {
        self.auto_snapshot.load(Ordering::Relaxed)
    }

    pub fn set_snapshot_interval(&self, interval: Duration) {
        self.snapshot_interval_secs
            .store(interval.as_secs().max(1), Ordering::Relaxed);
    }

    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_secs(self.snapshot_interval_secs.load(Ordering::Relaxed))
    }

    /// Asks for the next processed frame to be captured.
    pub fn request_snapshot(&self) {
        self.snapshot_requested.store(true, Ordering::Relaxed);
    }

    /// Consumes a pending manual request.
    pub(crate) fn take_snapshot_request(&self) -> bool {
        self.snapshot_requested.swap(false, Ordering::Relaxed)
    }
}
