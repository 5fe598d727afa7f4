use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(1);

/// Frames-per-second over consecutive windows of at least one second.
///
/// The reported rate only changes when a window closes; it reads 0 until
/// the first one does.
#[derive(Debug, Clone)]
pub struct RateMeter {
    frame_count: u32,
    window_start: Instant,
    fps: f64,
}

impl RateMeter {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(window_start: Instant) -> Self {
        Self {
            frame_count: 0,
            window_start,
            fps: 0.0,
        }
    }

    pub fn frame(&mut self) -> Option<f64> {
        self.frame_at(Instant::now())
    }

    /// Count a frame completed at `now`, returning the new rate if a window closed.
    pub fn frame_at(&mut self, now: Instant) -> Option<f64> {
        self.frame_count += 1;

        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < WINDOW {
            return None;
        }

        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        self.fps = self.frame_count as f64 * 1000.0 / elapsed_ms;
        self.frame_count = 0;
        self.window_start = now;
        Some(self.fps)
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }
}

impl Default for RateMeter {
    fn default() -> Self {
        Self::new()
    }
}
