use crate::frame::FrameData;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, trace};

/// Bounded in-memory frame buffer between the capture loop and the scanner.
///
/// The capture loop overwrites the oldest slot once full; the pull-mode
/// scanner only ever asks for the most recent frame.
pub struct RingBuffer {
    frames: Vec<RwLock<Option<FrameData>>>,
    write_index: AtomicUsize,
    capacity: usize,
    frame_counter: AtomicU64,
    frames_pushed: AtomicU64,
    buffer_overruns: AtomicU64,
}

impl RingBuffer {
    /// Create a new ring buffer with the specified capacity
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Ring buffer capacity must be greater than 0");

        let mut frames = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            frames.push(RwLock::new(None));
        }

        debug!("Created frame ring buffer with capacity {}", capacity);

        Self {
            frames,
            write_index: AtomicUsize::new(0),
            capacity,
            frame_counter: AtomicU64::new(0),
            frames_pushed: AtomicU64::new(0),
            buffer_overruns: AtomicU64::new(0),
        }
    }

    /// Push a new frame into the buffer, overwriting the oldest slot when full
    pub async fn push_frame(&self, frame: FrameData) {
        let index = self.write_index.fetch_add(1, Ordering::Relaxed) % self.capacity;

        trace!("Pushing frame {} to buffer slot {}", frame.id, index);

        let mut slot = self.frames[index].write().await;
        if slot.is_some() {
            self.buffer_overruns.fetch_add(1, Ordering::Relaxed);
            trace!("Buffer overrun at slot {}", index);
        }
        *slot = Some(frame);
        drop(slot);

        self.frames_pushed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the most recently pushed frame, if any
    pub async fn latest_frame(&self) -> Option<FrameData> {
        let current_index = self.write_index.load(Ordering::Relaxed);
        if current_index == 0 {
            return None;
        }

        let index = (current_index - 1) % self.capacity;
        let slot = self.frames[index].read().await;
        slot.clone()
    }

    /// Remove all frames from the buffer
    pub async fn clear(&self) {
        for slot in &self.frames {
            let mut slot = slot.write().await;
            *slot = None;
        }
        self.write_index.store(0, Ordering::Relaxed);
        debug!("Ring buffer cleared");
    }

    /// Get buffer capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Allocate the next frame identifier
    pub fn next_frame_id(&self) -> u64 {
        self.frame_counter.fetch_add(1, Ordering::Relaxed)
    }

    /// Total frames pushed since creation
    pub fn frames_pushed(&self) -> u64 {
        self.frames_pushed.load(Ordering::Relaxed)
    }

    /// Number of slot overwrites since creation
    pub fn buffer_overruns(&self) -> u64 {
        self.buffer_overruns.load(Ordering::Relaxed)
    }
}
