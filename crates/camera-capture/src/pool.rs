//! Bounded frame pool with RAII release

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::frame::{Orientation, VideoFrame};
use crate::CameraError;

/// Returns a frame's resources to wherever they came from
pub trait FrameRelease: Send + Sync {
    fn release(&self, frame: &VideoFrame);
}

/// Frame with RAII cleanup
///
/// Owning a lease is the only way to hold a pooled frame. It cannot be cloned,
/// and dropping it hands the frame back to its releaser exactly once, whichever
/// path the drop happens on (processed, shed, failed or cancelled).
pub struct FrameLease {
    frame: VideoFrame,
    releaser: Arc<dyn FrameRelease>,
}

impl FrameLease {
    /// Wrap a frame that must be handed back to `releaser`
    pub fn new(frame: VideoFrame, releaser: Arc<dyn FrameRelease>) -> Self {
        Self { frame, releaser }
    }

    /// Borrow the leased frame
    pub fn frame(&self) -> &VideoFrame {
        &self.frame
    }

    /// Arrival timestamp in nanoseconds
    pub fn timestamp_ns(&self) -> u64 {
        self.frame.timestamp_ns
    }

    /// Frame sequence number
    pub fn sequence(&self) -> u32 {
        self.frame.sequence
    }
}

impl fmt::Debug for FrameLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameLease")
            .field("sequence", &self.frame.sequence)
            .field("timestamp_ns", &self.frame.timestamp_ns)
            .finish()
    }
}

impl Drop for FrameLease {
    fn drop(&mut self) {
        self.releaser.release(&self.frame);
    }
}

struct PoolSlots {
    capacity: usize,
    outstanding: AtomicUsize,
    acquired: AtomicU64,
    released: AtomicU64,
}

impl FrameRelease for PoolSlots {
    fn release(&self, frame: &VideoFrame) {
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
        self.released.fetch_add(1, Ordering::Relaxed);
        trace!(sequence = frame.sequence, "frame slot returned to pool");
    }
}

/// Finite pool of frame slots
///
/// The producer acquires a slot per captured frame; the slot comes back when
/// the lease is dropped. An exhausted pool means someone is holding frames
/// instead of processing or shedding them.
#[derive(Clone)]
pub struct FramePool {
    slots: Arc<PoolSlots>,
}

impl FramePool {
    /// Create a pool with `capacity` slots
    pub fn new(capacity: usize) -> Self {
        debug!("Creating frame pool with {} slots", capacity);
        Self {
            slots: Arc::new(PoolSlots {
                capacity,
                outstanding: AtomicUsize::new(0),
                acquired: AtomicU64::new(0),
                released: AtomicU64::new(0),
            }),
        }
    }

    /// Lease a slot for a freshly captured frame
    pub fn acquire(
        &self,
        data: Vec<u8>,
        width: u32,
        height: u32,
        timestamp_ns: u64,
        orientation: Orientation,
    ) -> Result<FrameLease, CameraError> {
        let slots = &self.slots;
        slots
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < slots.capacity).then_some(n + 1)
            })
            .map_err(|_| CameraError::Buffer(slots.capacity))?;

        let sequence = slots.acquired.fetch_add(1, Ordering::Relaxed) as u32;
        let frame = VideoFrame::new(data, width, height, timestamp_ns, sequence, orientation);
        let releaser: Arc<dyn FrameRelease> = self.slots.clone();
        Ok(FrameLease::new(frame, releaser))
    }

    /// Number of slots in the pool
    pub fn capacity(&self) -> usize {
        self.slots.capacity
    }

    /// Slots currently leased out
    pub fn outstanding(&self) -> usize {
        self.slots.outstanding.load(Ordering::Acquire)
    }

    /// Total leases handed out since creation
    pub fn acquired_total(&self) -> u64 {
        self.slots.acquired.load(Ordering::Relaxed)
    }

    /// Total leases returned since creation
    pub fn released_total(&self) -> u64 {
        self.slots.released.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for FramePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FramePool")
            .field("capacity", &self.capacity())
            .field("outstanding", &self.outstanding())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn lease(pool: &FramePool, ts_ms: u64) -> Result<FrameLease, CameraError> {
        pool.acquire(vec![0; 12], 2, 2, ts_ms * 1_000_000, Orientation::Deg0)
    }

    #[test]
    fn test_drop_returns_slot() {
        let pool = FramePool::new(2);
        let a = lease(&pool, 0).unwrap();
        assert_eq!(pool.outstanding(), 1);
        drop(a);
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.released_total(), 1);
    }

    #[test]
    fn test_exhausted_pool() {
        let pool = FramePool::new(1);
        let _held = lease(&pool, 0).unwrap();
        assert_eq!(lease(&pool, 1).unwrap_err(), CameraError::Buffer(1));
        // A failed acquire must not leak a slot
        assert_eq!(pool.outstanding(), 1);
        assert_eq!(pool.acquired_total(), 1);
    }

    #[test]
    fn test_sequence_numbers() {
        let pool = FramePool::new(4);
        let a = lease(&pool, 0).unwrap();
        let b = lease(&pool, 1).unwrap();
        assert_eq!(a.sequence(), 0);
        assert_eq!(b.sequence(), 1);
        assert_eq!(b.timestamp_ns(), 1_000_000);
    }

    proptest! {
        #[test]
        fn prop_every_lease_released_once(ops in proptest::collection::vec(any::<bool>(), 1..64)) {
            let pool = FramePool::new(3);
            let mut held = Vec::new();
            for (i, acquire) in ops.iter().enumerate() {
                if *acquire {
                    if let Ok(l) = lease(&pool, i as u64) {
                        held.push(l);
                    }
                } else {
                    held.pop();
                }
                prop_assert!(pool.outstanding() <= pool.capacity());
                prop_assert_eq!(pool.outstanding(), held.len());
            }
            held.clear();
            prop_assert_eq!(pool.acquired_total(), pool.released_total());
        }
    }
}
