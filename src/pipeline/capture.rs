//! Inbound capture path: runs inside the USB completion handling, turning
//! one raw transfer into one committed frame.

use std::sync::Arc;

use crate::pipeline::queue::FrameQueue;
use crate::pipeline::sequence::SequenceTracker;
use crate::protocol;
use crate::session::SessionState;

/// How many decoded transfers between periodic progress logs.
const PROGRESS_LOG_INTERVAL: u64 = 512;

/// Decode-and-commit engine for completed inbound transfers.
///
/// Owned by the I/O worker and driven synchronously from the inbound
/// completion callback, before the next submission: check the sample
/// counter for gaps, claim a slot (or drop the transfer when the pool is
/// dry), decode, commit, and scrub the raw buffer.
pub(crate) struct CaptureEngine {
    queue: Arc<FrameQueue>,
    state: Arc<SessionState>,
    tracker: SequenceTracker,
}

impl CaptureEngine {
    pub(crate) fn new(queue: Arc<FrameQueue>, state: Arc<SessionState>) -> Self {
        Self {
            queue,
            state,
            tracker: SequenceTracker::new(protocol::TRANSFER_STRIDE),
        }
    }

    /// Processes one completed inbound transfer.
    ///
    /// The raw buffer is zeroed afterwards so a later transfer that
    /// completes short cannot resurrect stale samples.
    pub(crate) fn ingest(&mut self, raw: &mut [u8]) {
        let counter = protocol::transfer_counter(raw);
        if self.tracker.observe(counter) {
            let xruns = self.state.record_xrun();
            tracing::warn!(counter, xruns, "sample counter gap - audio data lost");
        }

        match self.queue.allocate() {
            Some(mut slot) => {
                protocol::decode_transfer(raw, &mut slot.samples);
                tracing::trace!(slot = slot.index(), counter, "transfer decoded");
                self.queue.commit(slot);

                let frames = self.state.record_decoded();
                if frames % PROGRESS_LOG_INTERVAL == 0 {
                    tracing::debug!(
                        frames,
                        free_slots = self.queue.free_count(),
                        "capture progress"
                    );
                }
            }
            None => {
                // Queue exhaustion is the drop policy, not a fault: the
                // consumer is behind and this transfer's audio is lost.
                let dropped = self.state.record_dropped();
                tracing::trace!(dropped, "frame queue full, dropping transfer");
            }
        }

        raw.fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{build_transfer, FRAME_SAMPLES, IN_TRANSFER_LEN, TRANSFER_STRIDE};

    fn engine_with_queue(capacity: usize) -> (CaptureEngine, Arc<FrameQueue>, Arc<SessionState>) {
        let queue = Arc::new(FrameQueue::new(capacity, FRAME_SAMPLES));
        let state = Arc::new(SessionState::new());
        let engine = CaptureEngine::new(Arc::clone(&queue), Arc::clone(&state));
        (engine, queue, state)
    }

    #[test]
    fn test_happy_path_delivers_exact_ramp() {
        let (mut engine, queue, state) = engine_with_queue(4);

        let mut raw = build_transfer(0, |i| i as i32);
        engine.ingest(&mut raw);

        let slot = queue.read().unwrap();
        assert_eq!(slot.samples.len(), FRAME_SAMPLES);
        let expected: Vec<i32> = (0..FRAME_SAMPLES as i32).collect();
        assert_eq!(&slot.samples[..], &expected[..]);
        assert_eq!(state.xruns(), 0);
        queue.release(slot);
    }

    #[test]
    fn test_consecutive_transfers_no_xrun() {
        let (mut engine, queue, state) = engine_with_queue(4);

        let mut first = build_transfer(0, |_| 1);
        let mut second = build_transfer(TRANSFER_STRIDE, |_| 2);
        engine.ingest(&mut first);
        engine.ingest(&mut second);

        assert_eq!(state.xruns(), 0);
        // FIFO: the transfer decoded first is read first.
        assert_eq!(queue.read().unwrap().samples[0], 1);
        assert_eq!(queue.read().unwrap().samples[0], 2);
    }

    #[test]
    fn test_counter_gap_counts_one_xrun() {
        let (mut engine, _queue, state) = engine_with_queue(4);

        let mut first = build_transfer(0, |_| 0);
        // Exactly one transfer's worth of data went missing in between.
        let mut second = build_transfer(2 * TRANSFER_STRIDE, |_| 0);
        engine.ingest(&mut first);
        engine.ingest(&mut second);

        assert_eq!(state.xruns(), 1);
    }

    #[test]
    fn test_raw_buffer_is_scrubbed_after_ingest() {
        let (mut engine, _queue, _state) = engine_with_queue(4);

        let mut raw = build_transfer(0, |_| i32::MAX);
        engine.ingest(&mut raw);

        assert_eq!(raw.len(), IN_TRANSFER_LEN);
        assert!(raw.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_exhausted_queue_drops_silently_but_tracks_counter() {
        let (mut engine, queue, state) = engine_with_queue(1);

        let mut first = build_transfer(0, |_| 7);
        let mut second = build_transfer(TRANSFER_STRIDE, |_| 8);

        engine.ingest(&mut first);
        // Pool of one is now committed; this transfer has nowhere to go.
        engine.ingest(&mut second);

        let stats = state.snapshot();
        assert_eq!(stats.frames_decoded, 1);
        assert_eq!(stats.frames_dropped, 1);
        assert_eq!(stats.xruns, 0, "a queue-full drop is not an xrun");

        // The drop still advanced the tracker: the next on-stride transfer
        // after the dropped one is clean.
        let mut third = build_transfer(2 * TRANSFER_STRIDE, |_| 9);
        let slot = queue.read().unwrap();
        queue.release(slot);
        engine.ingest(&mut third);
        assert_eq!(state.xruns(), 0);
    }
}
