//! Streaming session lifecycle and the public API surface.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::config::StreamConfig;
use crate::device::{self, DeviceId, UsbDevice};
use crate::error::OverbridgeError;
use crate::frame::AudioFrame;
use crate::pipeline::{spawn_worker, CaptureEngine, FrameQueue, TransferScheduler};
use crate::protocol::FRAME_SAMPLES;

/// Statistics about a streaming session.
///
/// A point-in-time snapshot; counters only ever grow while the session
/// lives. `frames_dropped` counts transfers lost to queue exhaustion
/// (consumer too slow), while `xruns` counts gaps in the device's sample
/// counter (data the host never received); the two are independent.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionStats {
    /// Transfers decoded and committed to the queue.
    pub frames_decoded: u64,
    /// Transfers dropped because no free slot was available.
    pub frames_dropped: u64,
    /// Detected discontinuities in the device's sample counter.
    pub xruns: u32,
}

/// Internal state shared between the session handle and the I/O worker.
pub(crate) struct SessionState {
    running: AtomicBool,
    xruns: AtomicU32,
    frames_decoded: AtomicU64,
    frames_dropped: AtomicU64,
}

impl SessionState {
    pub(crate) fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            xruns: AtomicU32::new(0),
            frames_decoded: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
        }
    }

    pub(crate) fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    pub(crate) fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Increments the xrun counter and returns the new value.
    pub(crate) fn record_xrun(&self) -> u32 {
        self.xruns.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn record_decoded(&self) -> u64 {
        self.frames_decoded.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn record_dropped(&self) -> u64 {
        self.frames_dropped.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn xruns(&self) -> u32 {
        self.xruns.load(Ordering::SeqCst)
    }

    pub(crate) fn snapshot(&self) -> SessionStats {
        SessionStats {
            frames_decoded: self.frames_decoded.load(Ordering::SeqCst),
            frames_dropped: self.frames_dropped.load(Ordering::SeqCst),
            xruns: self.xruns.load(Ordering::SeqCst),
        }
    }
}

/// Handle to an opened Overbridge device.
///
/// A session owns everything: the configured USB device, the preallocated
/// transfers, the frame queue, and (once streaming) the I/O worker thread.
///
/// # Lifecycle
///
/// 1. [`Session::open`] finds and configures a device
/// 2. [`Session::start_streaming`] spawns the worker; frames start
///    accumulating in the queue
/// 3. [`Session::next_frame`] / [`Session::read_frame`] consume them
/// 4. [`Session::shutdown`] (or dropping the session) stops the worker and
///    releases the device
///
/// # Example
///
/// ```no_run
/// use overbridge::{Session, VERIFIED_DEVICES};
///
/// let mut session = Session::open(&VERIFIED_DEVICES)?;
/// session.start_streaming()?;
///
/// for _ in 0..100 {
///     let frame = session.next_frame()?;
///     // 10752 interleaved i32 samples, ~18.7ms of 12-channel audio
///     assert_eq!(frame.len(), 10752);
/// }
///
/// println!("xruns: {}", session.xrun_count());
/// session.shutdown()?;
/// # Ok::<(), overbridge::OverbridgeError>(())
/// ```
pub struct Session {
    state: Arc<SessionState>,
    queue: Arc<FrameQueue>,
    /// Present until `start_streaming` hands it to the worker.
    scheduler: Option<TransferScheduler>,
    worker: Option<JoinHandle<()>>,
    /// Kept alive for the whole session; dropping it closes the device.
    usb: UsbDevice,
    config: StreamConfig,
}

impl Session {
    /// Opens the first connected device matching the allow-list with
    /// default configuration.
    ///
    /// Runs the full setup sequence: USB backend init, device matching,
    /// configuration/interface/alternate-setting application, endpoint
    /// clears, transfer allocation, and queue preallocation.
    ///
    /// # Errors
    ///
    /// Returns the variant naming the first step that failed. Resources
    /// acquired before the failure are released before returning.
    pub fn open(allow_list: &[DeviceId]) -> Result<Self, OverbridgeError> {
        Self::open_with_config(allow_list, StreamConfig::default())
    }

    /// Opens a device with explicit stream configuration.
    ///
    /// # Errors
    ///
    /// As [`Session::open`], plus `QueueSetup` if the configuration is
    /// invalid.
    pub fn open_with_config(
        allow_list: &[DeviceId],
        config: StreamConfig,
    ) -> Result<Self, OverbridgeError> {
        if config.queue_capacity == 0 {
            return Err(OverbridgeError::QueueSetup {
                reason: "queue_capacity must be at least 1".into(),
            });
        }

        let usb = device::open(allow_list)?;
        let state = Arc::new(SessionState::new());
        let queue = Arc::new(FrameQueue::new(config.queue_capacity, FRAME_SAMPLES));
        let engine = CaptureEngine::new(Arc::clone(&queue), Arc::clone(&state));
        let scheduler = TransferScheduler::new(
            &usb.handle,
            engine,
            Arc::clone(&state),
            config.transfer_timeout,
        )?;

        tracing::info!(queue_slots = config.queue_capacity, "session ready");

        Ok(Self {
            state,
            queue,
            scheduler: Some(scheduler),
            worker: None,
            usb,
            config,
        })
    }

    /// Spawns the real-time I/O worker and begins streaming.
    ///
    /// # Errors
    ///
    /// `AlreadyStreaming` if called twice, `WorkerSpawn` if the OS refuses
    /// the thread.
    pub fn start_streaming(&mut self) -> Result<(), OverbridgeError> {
        let scheduler = self
            .scheduler
            .take()
            .ok_or(OverbridgeError::AlreadyStreaming)?;

        self.state.start();
        match spawn_worker(
            self.usb.context.clone(),
            scheduler,
            Arc::clone(&self.queue),
            Arc::clone(&self.state),
            self.config.transfer_timeout,
            self.config.realtime_priority,
        ) {
            Ok(worker) => {
                self.worker = Some(worker);
                Ok(())
            }
            Err(err) => {
                self.state.stop();
                Err(err)
            }
        }
    }

    /// Returns `true` while the I/O worker is running.
    pub fn is_streaming(&self) -> bool {
        self.state.running()
    }

    /// Blocks until the next frame is available and takes ownership of it.
    ///
    /// Frames arrive in the order they were captured. This is the only
    /// blocking call in the crate.
    ///
    /// # Errors
    ///
    /// `StreamStopped` once the worker has shut down and the queue has
    /// been drained.
    pub fn next_frame(&self) -> Result<AudioFrame, OverbridgeError> {
        let slot = self.queue.read().ok_or(OverbridgeError::StreamStopped)?;
        Ok(AudioFrame::new(slot, Arc::clone(&self.queue)))
    }

    /// Blocking read that copies the next frame into `out` and immediately
    /// returns the slot to the pool.
    ///
    /// # Errors
    ///
    /// As [`Session::next_frame`].
    ///
    /// # Panics
    ///
    /// Panics if `out` holds fewer than
    /// [`protocol::FRAME_SAMPLES`](crate::protocol::FRAME_SAMPLES) samples.
    pub fn read_frame(&self, out: &mut [i32]) -> Result<(), OverbridgeError> {
        let frame = self.next_frame()?;
        out[..FRAME_SAMPLES].copy_from_slice(frame.samples());
        Ok(())
    }

    /// Current number of free queue slots.
    ///
    /// A health signal: a value trending toward zero means the consumer is
    /// falling behind and the producer will start dropping transfers.
    pub fn queue_depth(&self) -> usize {
        self.queue.free_count()
    }

    /// Number of detected sample-counter discontinuities so far.
    pub fn xrun_count(&self) -> u32 {
        self.state.xruns()
    }

    /// Returns current session statistics.
    pub fn stats(&self) -> SessionStats {
        self.state.snapshot()
    }

    /// Stops streaming and releases the device.
    ///
    /// Clears the run flag, joins the worker (which exits within one
    /// event-processing iteration and lets in-flight transfers finish or
    /// time out), wakes any blocked reader, then closes the USB handle.
    /// Dropping the session performs the same cleanup.
    ///
    /// # Errors
    ///
    /// Currently infallible; the `Result` reserves room for reporting
    /// shutdown problems without an API break.
    pub fn shutdown(mut self) -> Result<(), OverbridgeError> {
        self.shutdown_internal();
        Ok(())
    }

    fn shutdown_internal(&mut self) {
        self.state.stop();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("io worker panicked during shutdown");
            }
        }
        // The worker closes the queue on a normal exit; closing again is
        // harmless and covers sessions that never started streaming.
        self.queue.close();
        tracing::debug!("session shut down");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown_internal();
    }
}
