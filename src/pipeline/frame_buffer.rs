//! Single-slot, latest-wins handoff between the processing and display threads

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::capture::DisplayFrame;

/// Holds at most one processed frame.
///
/// Publishing never waits for the consumer: an uncollected frame is replaced
/// and handed back to the producer to drop outside the lock. Under overload
/// the display skips frames instead of falling behind.
#[derive(Default)]
pub struct FrameBuffer {
    slot: Mutex<Option<DisplayFrame>>,
    closed: AtomicBool,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `frame` as the newest one, returning the unconsumed frame it displaced.
    pub fn publish(&self, frame: DisplayFrame) -> Option<DisplayFrame> {
        self.lock().replace(frame)
    }

    /// Take the newest frame if one arrived since the last take.
    pub fn take_if_dirty(&self) -> Option<DisplayFrame> {
        self.lock().take()
    }

    pub fn is_dirty(&self) -> bool {
        self.lock().is_some()
    }

    /// Mark that no further frames will be published.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn lock(&self) -> MutexGuard<'_, Option<DisplayFrame>> {
        // The slot is replaced wholesale, a panic elsewhere cannot leave it torn
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    fn frame(sequence: u64) -> DisplayFrame {
        DisplayFrame::new(vec![sequence as u8; 12], 2, 2, sequence, Instant::now()).unwrap()
    }

    #[test]
    fn latest_publish_wins_exactly_once() {
        let buffer = FrameBuffer::new();
        assert!(buffer.publish(frame(1)).is_none());
        let displaced = buffer.publish(frame(2));

        assert_eq!(displaced.map(|f| f.sequence()), Some(1));
        assert_eq!(buffer.take_if_dirty().map(|f| f.sequence()), Some(2));
        assert!(buffer.take_if_dirty().is_none());
    }

    #[test]
    fn empty_buffer_is_clean() {
        let buffer = FrameBuffer::new();
        assert!(!buffer.is_dirty());
        assert!(buffer.take_if_dirty().is_none());
        assert!(!buffer.is_closed());
        buffer.close();
        assert!(buffer.is_closed());
    }

    #[test]
    fn consumer_sees_increasing_sequences_under_contention() {
        let buffer = Arc::new(FrameBuffer::new());
        let producer = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                for seq in 1..=2000 {
                    buffer.publish(frame(seq));
                }
                buffer.close();
            })
        };

        let mut last = 0;
        let mut taken = 0;
        loop {
            let closed = buffer.is_closed();
            if let Some(f) = buffer.take_if_dirty() {
                assert!(f.sequence() > last);
                last = f.sequence();
                taken += 1;
            } else if closed {
                break;
            }
        }
        producer.join().unwrap();

        assert_eq!(last, 2000);
        assert!(taken >= 1 && taken <= 2000);
    }
}
