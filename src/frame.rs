//! Decoded audio frames delivered to the consumer.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use crate::pipeline::{FrameQueue, FrameSlot};
use crate::protocol::{IN_CHANNELS, SAMPLE_RATE};

/// One fully decoded inbound transfer: 10752 signed 32-bit samples in host
/// byte order, channel-interleaved in the wire's channel order (see
/// [`protocol::CHANNEL_NAMES`](crate::protocol::CHANNEL_NAMES)).
///
/// An `AudioFrame` holds exclusive ownership of one queue slot; dropping
/// it returns the slot to the free pool. Hold frames only as long as
/// needed: a frame kept alive is a slot the producer cannot refill, and
/// an exhausted pool makes the producer drop incoming audio.
///
/// Derefs to `&[i32]`, so slice operations apply directly:
///
/// ```ignore
/// let frame = session.next_frame()?;
/// let first_master_sample = frame[0];
/// let peak = frame.iter().map(|s| s.abs()).max();
/// ```
pub struct AudioFrame {
    /// `Some` until dropped; `take`n in `Drop` to move the slot back.
    slot: Option<FrameSlot>,
    queue: Arc<FrameQueue>,
}

impl AudioFrame {
    pub(crate) fn new(slot: FrameSlot, queue: Arc<FrameQueue>) -> Self {
        Self {
            slot: Some(slot),
            queue,
        }
    }

    /// The decoded samples, channel-interleaved.
    pub fn samples(&self) -> &[i32] {
        match &self.slot {
            Some(slot) => &slot.samples,
            None => &[],
        }
    }

    /// Number of interleaved channels.
    pub fn channels(&self) -> usize {
        IN_CHANNELS
    }

    /// Number of sample indexes per channel in this frame.
    pub fn samples_per_channel(&self) -> usize {
        self.samples().len() / IN_CHANNELS
    }

    /// Duration of audio covered by this frame.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples_per_channel() as f64 / f64::from(SAMPLE_RATE))
    }
}

impl Deref for AudioFrame {
    type Target = [i32];

    fn deref(&self) -> &[i32] {
        self.samples()
    }
}

impl fmt::Debug for AudioFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioFrame")
            .field("samples", &self.samples().len())
            .field("channels", &self.channels())
            .finish()
    }
}

impl Drop for AudioFrame {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            self.queue.release(slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FRAME_SAMPLES;

    fn frame_from_pool() -> (AudioFrame, Arc<FrameQueue>) {
        let queue = Arc::new(FrameQueue::new(2, FRAME_SAMPLES));
        let mut slot = queue.allocate().unwrap();
        slot.samples[0] = 123;
        (AudioFrame::new(slot, Arc::clone(&queue)), queue)
    }

    #[test]
    fn test_frame_geometry() {
        let (frame, _queue) = frame_from_pool();
        assert_eq!(frame.len(), FRAME_SAMPLES);
        assert_eq!(frame.channels(), 12);
        assert_eq!(frame.samples_per_channel(), 896);
        // 896 samples at 48kHz.
        assert!((frame.duration().as_secs_f64() - 896.0 / 48_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_frame_derefs_to_samples() {
        let (frame, _queue) = frame_from_pool();
        assert_eq!(frame[0], 123);
        assert_eq!(frame.iter().copied().max(), Some(123));
    }

    #[test]
    fn test_drop_returns_slot_to_pool() {
        let (frame, queue) = frame_from_pool();
        assert_eq!(queue.free_count(), 1);
        drop(frame);
        assert_eq!(queue.free_count(), 2);
    }
}
