//! Render requests from the processing thread to the display host

use std::sync::atomic::{AtomicBool, Ordering};

/// How the pipeline tells the display host about new frames.
pub trait RenderSignal: Send {
    /// A new frame was published.
    fn request_render(&self);

    /// No more frames will be published.
    fn pipeline_stopped(&self) {}
}

/// Collapses bursts of render requests into a single pending draw.
///
/// The producer calls [`request`](Self::request) per frame and only wakes the
/// host when it returns `true`; the host calls [`acknowledge`](Self::acknowledge)
/// right before drawing whatever the buffer holds at that point.
#[derive(Debug, Default)]
pub struct RenderTrigger {
    pending: AtomicBool,
}

impl RenderTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a draw as pending. `true` if none was pending yet.
    pub fn request(&self) -> bool {
        !self.pending.swap(true, Ordering::AcqRel)
    }

    /// Clear the pending draw, returning whether there was one.
    pub fn acknowledge(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_collapses_to_one_wakeup() {
        let trigger = RenderTrigger::new();
        assert!(trigger.request());
        assert!(!trigger.request());
        assert!(!trigger.request());
        assert!(trigger.is_pending());

        assert!(trigger.acknowledge());
        assert!(!trigger.acknowledge());
        assert!(trigger.request());
    }
}
