//! Lock-free pipeline statistics readable from any thread

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::utils::CachePadded;

/// Counters written by the processing thread, read by the host.
#[derive(Default)]
pub struct PipelineStats {
    frames_processed: CachePadded<AtomicU64>,
    /// Published frames replaced before the display collected them
    frames_dropped: CachePadded<AtomicU64>,
    /// Malformed frames skipped
    format_errors: CachePadded<AtomicU64>,
    /// `f64` bit patterns
    fps: CachePadded<AtomicU64>,
    last_processing_ms: CachePadded<AtomicU64>,
}

/// Point-in-time copy of [`PipelineStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatsSnapshot {
    pub frames_processed: u64,
    pub frames_dropped: u64,
    pub format_errors: u64,
    pub fps: f64,
    pub last_processing_ms: f64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_processed(&self, processing_ms: f64) {
        self.frames_processed.fetch_add(1, Ordering::Relaxed);
        self.last_processing_ms
            .store(processing_ms.to_bits(), Ordering::Relaxed);
        metrics::counter!("edgeview_frames_processed").increment(1);
        metrics::histogram!("edgeview_processing_time_ms").record(processing_ms);
    }

    pub(crate) fn record_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("edgeview_frames_dropped").increment(1);
    }

    pub(crate) fn record_format_error(&self) {
        self.format_errors.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("edgeview_format_errors").increment(1);
    }

    pub(crate) fn record_fps(&self, fps: f64) {
        self.fps.store(fps.to_bits(), Ordering::Relaxed);
        metrics::gauge!("edgeview_fps").set(fps);
    }

    /// Rate of the last completed one-second window, 0 before the first.
    pub fn fps(&self) -> f64 {
        f64::from_bits(self.fps.load(Ordering::Relaxed))
    }

    /// Wall time of the most recent convert + filter pass.
    pub fn last_processing_time_ms(&self) -> f64 {
        f64::from_bits(self.last_processing_ms.load(Ordering::Relaxed))
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            format_errors: self.format_errors.load(Ordering::Relaxed),
            fps: self.fps(),
            last_processing_ms: self.last_processing_time_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_stats_read_zero() {
        assert_eq!(PipelineStats::new().snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn records_are_visible_in_snapshot() {
        let stats = PipelineStats::new();
        stats.record_processed(4.5);
        stats.record_processed(3.25);
        stats.record_dropped();
        stats.record_format_error();
        stats.record_fps(29.97);

        let snap = stats.snapshot();
        assert_eq!(snap.frames_processed, 2);
        assert_eq!(snap.frames_dropped, 1);
        assert_eq!(snap.format_errors, 1);
        assert_eq!(snap.fps, 29.97);
        assert_eq!(snap.last_processing_ms, 3.25);
    }
}
