//! Configuration for a streaming session.

use std::time::Duration;

/// Configuration for stream behavior.
///
/// Use [`StreamConfig::default()`] for sensible defaults, or customize as
/// needed.
///
/// # Example
///
/// ```
/// use overbridge::StreamConfig;
///
/// let config = StreamConfig {
///     queue_capacity: 16,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Number of preallocated frame slots in the handoff queue.
    ///
    /// Each slot holds one decoded transfer (10752 samples, ~42 KiB). The
    /// default of 64 buffers roughly 1.8 seconds of audio, which absorbs
    /// any realistic consumer jitter. When the pool runs dry the producer
    /// drops whole transfers rather than blocking; see
    /// [`Session::queue_depth`](crate::Session::queue_depth).
    /// Default: 64
    pub queue_capacity: usize,

    /// Timeout applied to each USB interrupt transfer.
    ///
    /// Also bounds the worker's shutdown latency, since the event loop
    /// checks the stop flag once per transfer timeout at the latest.
    /// Default: 100ms
    pub transfer_timeout: Duration,

    /// Whether the I/O worker requests real-time (SCHED_FIFO) priority.
    ///
    /// Elevation is best-effort: if the OS denies it the worker logs a
    /// warning and keeps running at default priority.
    /// Default: true
    pub realtime_priority: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            transfer_timeout: Duration::from_millis(100),
            realtime_priority: true,
        }
    }
}
