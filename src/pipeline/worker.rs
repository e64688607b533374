//! The real-time I/O worker thread.
//!
//! One dedicated thread owns the entire producer side: it elevates itself
//! to real-time priority (best effort), performs the first transfer
//! submissions, then drives libusb event processing until the session's
//! run flag clears. Decode and commit happen inline in the completion
//! callbacks, so this loop is the only place producer code ever runs.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use rusb::UsbContext;

use crate::error::OverbridgeError;
use crate::pipeline::queue::FrameQueue;
use crate::pipeline::transfer::TransferScheduler;
use crate::session::SessionState;

/// Spawns the I/O worker.
///
/// The thread exits within one event-processing iteration of the run flag
/// clearing (bounded by the transfer timeout), drains any transfer still
/// in flight, and closes the queue so blocked readers wake up.
pub(crate) fn spawn_worker(
    usb_ctx: rusb::Context,
    scheduler: TransferScheduler,
    queue: Arc<FrameQueue>,
    state: Arc<SessionState>,
    transfer_timeout: Duration,
    realtime_priority: bool,
) -> Result<JoinHandle<()>, OverbridgeError> {
    std::thread::Builder::new()
        .name("overbridge-io".into())
        .spawn(move || {
            run(
                &usb_ctx,
                scheduler,
                &queue,
                &state,
                transfer_timeout,
                realtime_priority,
            );
        })
        .map_err(|source| OverbridgeError::WorkerSpawn { source })
}

fn run(
    usb_ctx: &rusb::Context,
    mut scheduler: TransferScheduler,
    queue: &FrameQueue,
    state: &SessionState,
    transfer_timeout: Duration,
    realtime_priority: bool,
) {
    if realtime_priority {
        promote_to_realtime();
    }

    scheduler.start();
    tracing::info!("streaming started");

    while state.running() {
        if let Err(err) = usb_ctx.handle_events(Some(transfer_timeout)) {
            tracing::warn!(%err, "usb event processing failed, stopping stream");
            break;
        }
    }

    // Down the flag first (the loop may have exited on an error instead)
    // so the callbacks stop resubmitting, then give whatever is still in
    // flight one timeout period to complete or expire.
    state.stop();
    let deadline = Instant::now() + 2 * transfer_timeout;
    while scheduler.pending() && Instant::now() < deadline {
        if usb_ctx.handle_events(Some(transfer_timeout)).is_err() {
            break;
        }
    }

    queue.close();
    tracing::debug!("io worker exiting");
}

/// Requests SCHED_FIFO at the maximum priority for the current thread.
///
/// Denial is expected for unprivileged processes without an rtprio limit;
/// the stream still works at default priority, just with less headroom
/// against scheduling-induced drop-outs.
#[cfg(unix)]
fn promote_to_realtime() {
    // SAFETY: scheduler syscalls on the current thread with a
    // stack-local, zero-initialized parameter struct.
    unsafe {
        let max = libc::sched_get_priority_max(libc::SCHED_FIFO);
        if max < 0 {
            tracing::warn!("cannot query SCHED_FIFO priority range");
            return;
        }
        let mut param: libc::sched_param = std::mem::zeroed();
        param.sched_priority = max;
        let rc = libc::pthread_setschedparam(libc::pthread_self(), libc::SCHED_FIFO, &param);
        if rc == 0 {
            tracing::debug!(priority = max, "io worker running with SCHED_FIFO priority");
        } else {
            tracing::warn!(
                priority = max,
                rc,
                "real-time priority denied, continuing at default priority"
            );
        }
    }
}

#[cfg(not(unix))]
fn promote_to_realtime() {
    tracing::warn!("real-time priority elevation not implemented on this platform");
}
