use std::time::Instant;

use crate::pipeline::run_control::RunControl;

/// Decides which processed frames become snapshots.
///
/// A frame is captured when a manual request is pending, or when automatic
/// snapshots are on and the interval has passed since the last capture
/// (or since the stream started).
#[derive(Debug, Clone, Copy)]
pub struct SnapshotPolicy {
    last: Instant,
}

impl SnapshotPolicy {
    pub fn new(started: Instant) -> Self {
        Self { last: started }
    }

    pub fn should_capture(&mut self, control: &RunControl, now: Instant) -> bool {
        let requested = control.take_snapshot_request();
        let due = control.auto_snapshot()
            && now.saturating_duration_since(self.last) >= control.snapshot_interval();
        if requested || due {
            self.last = now;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::settings::DetectionSettings;
    use std::time::Duration;

    fn control(auto: bool) -> RunControl {
        RunControl::new(&DetectionSettings::default(), auto, Duration::from_secs(5))
    }

    #[test]
    fn test_no_capture_without_request_or_auto() {
        let start = Instant::now();
        let mut policy = SnapshotPolicy::new(start);
        let control = control(false);
        assert!(!policy.should_capture(&control, start + Duration::from_secs(60)));
    }

    #[test]
    fn test_manual_request_captures_next_frame_once() {
        let start = Instant::now();
        let mut policy = SnapshotPolicy::new(start);
        let control = control(false);
        control.request_snapshot();
        assert!(policy.should_capture(&control, start));
        assert!(!policy.should_capture(&control, start + Duration::from_millis(40)));
    }

    #[test]
    fn test_auto_waits_for_interval_from_start() {
        let start = Instant::now();
        let mut policy = SnapshotPolicy::new(start);
        let control = control(true);
        assert!(!policy.should_capture(&control, start + Duration::from_secs(4)));
        assert!(policy.should_capture(&control, start + Duration::from_secs(5)));
        assert!(!policy.should_capture(&control, start + Duration::from_secs(9)));
        assert!(policy.should_capture(&control, start + Duration::from_secs(10)));
    }

    #[test]
    fn test_manual_capture_restarts_interval() {
        let start = Instant::now();
        let mut policy = SnapshotPolicy::new(start);
        let control = control(true);
        control.request_snapshot();
        assert!(policy.should_capture(&control, start + Duration::from_secs(3)));
        assert!(!policy.should_capture(&control, start + Duration::from_secs(6)));
        assert!(policy.should_capture(&control, start + Duration::from_secs(8)));
    }

    #[test]
    fn test_interval_change_applies_immediately() {
        let start = Instant::now();
        let mut policy = SnapshotPolicy::new(start);
        let control = control(true);
        control.set_snapshot_interval(Duration::from_secs(2));
        assert!(policy.should_capture(&control, start + Duration::from_secs(2)));
    }
}
