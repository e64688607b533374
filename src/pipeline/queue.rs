//! Bounded slot queue handing decoded frames from the I/O worker to the
//! consumer.
//!
//! The queue owns a fixed pool of preallocated sample buffers. A slot
//! cycles free -> producer-held -> committed -> consumer-held -> free, and
//! every transition moves the buffer by value, so exactly one owner holds
//! a slot's samples at any instant and no state is ever shared by pointer.
//!
//! `allocate` never blocks: when the pool is dry the producer drops data
//! instead of stalling the USB callbacks. `read` is the only blocking
//! operation in the crate.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

/// One preallocated frame buffer plus its stable pool index.
///
/// The index identifies the slot across its lifetime (useful in logs); the
/// samples move with the handle, so holding a `FrameSlot` *is* owning the
/// buffer.
pub(crate) struct FrameSlot {
    index: usize,
    pub(crate) samples: Box<[i32]>,
}

impl FrameSlot {
    /// Stable pool index of this slot.
    pub(crate) fn index(&self) -> usize {
        self.index
    }
}

struct Shared {
    /// Slots available to the producer. Order among free slots is
    /// irrelevant; a plain stack keeps the hot path cheap.
    free: Vec<FrameSlot>,
    /// Filled slots in commit order, oldest first.
    committed: VecDeque<FrameSlot>,
    /// Once set, `read` stops blocking and drains to `None`.
    closed: bool,
}

/// Fixed-capacity queue of preallocated frame slots.
pub(crate) struct FrameQueue {
    shared: Mutex<Shared>,
    readable: Condvar,
}

impl FrameQueue {
    /// Creates a queue of `capacity` slots, each holding `frame_len`
    /// zeroed samples.
    pub(crate) fn new(capacity: usize, frame_len: usize) -> Self {
        let free = (0..capacity)
            .map(|index| FrameSlot {
                index,
                samples: vec![0i32; frame_len].into_boxed_slice(),
            })
            .collect();

        Self {
            shared: Mutex::new(Shared {
                free,
                committed: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            readable: Condvar::new(),
        }
    }

    /// Claims a free slot for filling, or `None` if the pool is exhausted.
    ///
    /// Exhaustion is the documented drop policy under consumer
    /// backpressure, not a fault; this never blocks the producer.
    pub(crate) fn allocate(&self) -> Option<FrameSlot> {
        self.shared.lock().free.pop()
    }

    /// Publishes a filled slot to readers, in FIFO order.
    ///
    /// The mutex release/acquire pair orders every write the producer made
    /// to the slot's samples before any read that obtains the slot.
    pub(crate) fn commit(&self, slot: FrameSlot) {
        self.shared.lock().committed.push_back(slot);
        self.readable.notify_one();
    }

    /// Removes and returns the oldest committed slot, blocking until one
    /// is available.
    ///
    /// Returns `None` once the queue has been closed and all committed
    /// slots have been drained.
    pub(crate) fn read(&self) -> Option<FrameSlot> {
        let mut shared = self.shared.lock();
        loop {
            if let Some(slot) = shared.committed.pop_front() {
                return Some(slot);
            }
            if shared.closed {
                return None;
            }
            self.readable.wait(&mut shared);
        }
    }

    /// Returns a consumer-held slot to the free pool.
    pub(crate) fn release(&self, slot: FrameSlot) {
        self.shared.lock().free.push(slot);
    }

    /// Instantaneous count of free slots.
    ///
    /// A backpressure signal, not a precise guarantee: the value may be
    /// stale by the time the caller inspects it. A count trending toward
    /// zero means the consumer is not keeping up.
    pub(crate) fn free_count(&self) -> usize {
        self.shared.lock().free.len()
    }

    /// Marks the queue closed and wakes all blocked readers.
    ///
    /// Committed slots remain readable until drained; after that `read`
    /// returns `None`.
    pub(crate) fn close(&self) {
        self.shared.lock().closed = true;
        self.readable.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_allocate_exhausts_at_capacity() {
        let queue = FrameQueue::new(3, 4);

        let a = queue.allocate().unwrap();
        let b = queue.allocate().unwrap();
        let c = queue.allocate().unwrap();
        assert!(queue.allocate().is_none(), "pool of 3 yielded a 4th slot");

        queue.release(a);
        assert!(queue.allocate().is_some());

        queue.release(b);
        queue.release(c);
    }

    #[test]
    fn test_slots_are_presized_and_zeroed() {
        let queue = FrameQueue::new(1, 8);
        let slot = queue.allocate().unwrap();
        assert_eq!(slot.samples.len(), 8);
        assert!(slot.samples.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_read_is_fifo() {
        let queue = FrameQueue::new(2, 1);

        let mut a = queue.allocate().unwrap();
        a.samples[0] = 1;
        let mut b = queue.allocate().unwrap();
        b.samples[0] = 2;

        queue.commit(a);
        queue.commit(b);

        assert_eq!(queue.read().unwrap().samples[0], 1);
        assert_eq!(queue.read().unwrap().samples[0], 2);
    }

    #[test]
    fn test_free_count_tracks_transitions() {
        let queue = FrameQueue::new(2, 1);
        assert_eq!(queue.free_count(), 2);

        let slot = queue.allocate().unwrap();
        assert_eq!(queue.free_count(), 1);

        queue.commit(slot);
        assert_eq!(queue.free_count(), 1, "committed slots are not free");

        let slot = queue.read().unwrap();
        queue.release(slot);
        assert_eq!(queue.free_count(), 2);
    }

    #[test]
    fn test_read_blocks_until_commit() {
        let queue = Arc::new(FrameQueue::new(1, 1));

        let reader = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || queue.read().map(|s| s.samples[0]))
        };

        // Give the reader time to park on the condvar.
        std::thread::sleep(Duration::from_millis(50));

        let mut slot = queue.allocate().unwrap();
        slot.samples[0] = 42;
        queue.commit(slot);

        assert_eq!(reader.join().unwrap(), Some(42));
    }

    #[test]
    fn test_close_wakes_blocked_reader() {
        let queue = Arc::new(FrameQueue::new(1, 1));

        let reader = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || queue.read())
        };

        std::thread::sleep(Duration::from_millis(50));
        queue.close();

        assert!(reader.join().unwrap().is_none());
    }

    #[test]
    fn test_close_drains_committed_before_none() {
        let queue = FrameQueue::new(1, 1);
        let slot = queue.allocate().unwrap();
        queue.commit(slot);
        queue.close();

        assert!(queue.read().is_some(), "committed frame lost on close");
        assert!(queue.read().is_none());
    }
}
