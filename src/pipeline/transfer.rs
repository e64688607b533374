//! Asynchronous USB interrupt transfer scheduling.
//!
//! The device requires full-duplex interrupt traffic: audio arrives on the
//! IN endpoint while the host keeps a matching stream of silent keep-alive
//! blocks flowing to the OUT endpoint. Each endpoint runs a two-state
//! cycle (idle -> pending -> completion -> resubmit) driven entirely by
//! libusb completion callbacks, which the worker thread dispatches through
//! `libusb_handle_events`.
//!
//! rusb's safe layer only exposes blocking transfers, so this module uses
//! the `rusb::ffi` (libusb1-sys) asynchronous API directly. All unsafe
//! code in the crate lives here; everything reachable from the callbacks
//! is owned by one boxed context whose address is pinned for the lifetime
//! of the transfers.

use std::os::raw::{c_int, c_void};
use std::sync::Arc;
use std::time::Duration;

use rusb::ffi;

use crate::error::OverbridgeError;
use crate::pipeline::capture::CaptureEngine;
use crate::protocol::{self, ENDPOINT_IN, ENDPOINT_OUT, IN_TRANSFER_LEN, OUT_TRANSFER_LEN};
use crate::session::SessionState;

/// State shared between the two completion callbacks.
///
/// Boxed by [`TransferScheduler`] so the `user_data` pointer handed to
/// libusb stays valid for as long as the transfers exist. Only the worker
/// thread (inside `libusb_handle_events`) ever touches it after start.
struct CycleContext {
    engine: CaptureEngine,
    state: Arc<SessionState>,
    /// Raw inbound transfer buffer; never leaves the producer side.
    in_buf: Box<[u8]>,
    /// Raw outbound keep-alive buffer; payload stays zeroed (silence).
    out_buf: Box<[u8]>,
    /// Running counter written into outbound block headers.
    out_counter: u16,
    in_pending: bool,
    out_pending: bool,
    xfr_in: *mut ffi::libusb_transfer,
    xfr_out: *mut ffi::libusb_transfer,
}

impl CycleContext {
    /// Arms the inbound cycle.
    fn submit_in(&mut self) {
        // SAFETY: xfr_in is a live transfer whose buffer and length point
        // into in_buf, which this context owns.
        let rc = unsafe { ffi::libusb_submit_transfer(self.xfr_in) };
        if rc == 0 {
            self.in_pending = true;
        } else {
            tracing::warn!(rc, "inbound submit failed, inbound cycle stopped");
        }
    }

    /// Refreshes the keep-alive headers and arms the outbound cycle.
    fn submit_out(&mut self) {
        self.out_counter = protocol::fill_keepalive(&mut self.out_buf, self.out_counter);
        // SAFETY: as for submit_in, with out_buf.
        let rc = unsafe { ffi::libusb_submit_transfer(self.xfr_out) };
        if rc == 0 {
            self.out_pending = true;
        } else {
            tracing::warn!(rc, "outbound submit failed, keep-alive cycle stopped");
        }
    }
}

extern "system" fn in_transfer_done(xfr: *mut ffi::libusb_transfer) {
    // SAFETY: user_data was set to the CycleContext owning this transfer,
    // and callbacks are dispatched only on the worker thread, so no other
    // reference to the context is live.
    let ctx = unsafe { &mut *(*xfr).user_data.cast::<CycleContext>() };
    ctx.in_pending = false;

    let status = unsafe { (*xfr).status };
    if status == ffi::constants::LIBUSB_TRANSFER_COMPLETED {
        ctx.engine.ingest(&mut ctx.in_buf);
    } else {
        // A failed transfer just means no frame this round; it is not
        // counted as an xrun and the stream keeps going.
        tracing::trace!(status, "inbound transfer did not complete");
    }

    // Resubmit regardless of completion status: the device stalls or
    // desynchronizes its counter if the IN pipe is ever left unarmed.
    if ctx.state.running() {
        ctx.submit_in();
    }
}

extern "system" fn out_transfer_done(xfr: *mut ffi::libusb_transfer) {
    // SAFETY: see in_transfer_done.
    let ctx = unsafe { &mut *(*xfr).user_data.cast::<CycleContext>() };
    ctx.out_pending = false;

    // The next outbound submission must wait for this callback;
    // submitting early races the device's timing on slower hosts.
    if ctx.state.running() {
        ctx.submit_out();
    }
}

/// Owns the pair of libusb interrupt transfers and keeps them cycling.
///
/// Created during session setup (so allocation failure surfaces in the
/// init error taxonomy) and handed to the worker thread, which performs
/// the first submissions and then drives completions until the session's
/// run flag clears. Transfers are freed on drop, by which point the worker
/// has drained anything still in flight.
pub(crate) struct TransferScheduler {
    ctx: Box<CycleContext>,
}

// SAFETY: the scheduler is built on the session thread and then moved into
// the worker thread, which is the only thread that touches the transfers
// and buffers from that point on. The raw transfer pointers are what make
// the type !Send by default; the single-owner handoff keeps the move sound.
unsafe impl Send for TransferScheduler {}

impl TransferScheduler {
    /// Allocates and fills both transfers against the given device handle.
    pub(crate) fn new(
        handle: &rusb::DeviceHandle<rusb::Context>,
        engine: CaptureEngine,
        state: Arc<SessionState>,
        timeout: Duration,
    ) -> Result<Self, OverbridgeError> {
        // SAFETY: plain allocation; null checks follow.
        let xfr_in = unsafe { ffi::libusb_alloc_transfer(0) };
        if xfr_in.is_null() {
            return Err(OverbridgeError::TransferAlloc);
        }
        // SAFETY: as above.
        let xfr_out = unsafe { ffi::libusb_alloc_transfer(0) };
        if xfr_out.is_null() {
            // SAFETY: xfr_in was just allocated and never submitted.
            unsafe { ffi::libusb_free_transfer(xfr_in) };
            return Err(OverbridgeError::TransferAlloc);
        }

        let mut ctx = Box::new(CycleContext {
            engine,
            state,
            in_buf: vec![0u8; IN_TRANSFER_LEN].into_boxed_slice(),
            out_buf: vec![0u8; OUT_TRANSFER_LEN].into_boxed_slice(),
            out_counter: 0,
            in_pending: false,
            out_pending: false,
            xfr_in,
            xfr_out,
        });

        let timeout_ms = timeout.as_millis() as u32;
        let user_data = (&mut *ctx as *mut CycleContext).cast::<c_void>();

        // SAFETY: both transfers are freshly allocated; the buffers live in
        // the boxed context, which outlives the transfers (freed in Drop
        // before the context is).
        unsafe {
            (*xfr_in).dev_handle = handle.as_raw();
            (*xfr_in).endpoint = ENDPOINT_IN;
            (*xfr_in).transfer_type = ffi::constants::LIBUSB_TRANSFER_TYPE_INTERRUPT;
            (*xfr_in).timeout = timeout_ms;
            (*xfr_in).buffer = ctx.in_buf.as_mut_ptr();
            (*xfr_in).length = ctx.in_buf.len() as c_int;
            (*xfr_in).callback = in_transfer_done;
            (*xfr_in).user_data = user_data;

            (*xfr_out).dev_handle = handle.as_raw();
            (*xfr_out).endpoint = ENDPOINT_OUT;
            (*xfr_out).transfer_type = ffi::constants::LIBUSB_TRANSFER_TYPE_INTERRUPT;
            (*xfr_out).timeout = timeout_ms;
            (*xfr_out).buffer = ctx.out_buf.as_mut_ptr();
            (*xfr_out).length = ctx.out_buf.len() as c_int;
            (*xfr_out).callback = out_transfer_done;
            (*xfr_out).user_data = user_data;
        }

        Ok(Self { ctx })
    }

    /// Performs the first outbound and inbound submissions.
    ///
    /// Everything after this lives in the completion callbacks, dispatched
    /// by the worker's event-processing loop.
    pub(crate) fn start(&mut self) {
        self.ctx.submit_out();
        self.ctx.submit_in();
    }

    /// True while either endpoint still has a transfer in flight.
    pub(crate) fn pending(&self) -> bool {
        self.ctx.in_pending || self.ctx.out_pending
    }
}

impl Drop for TransferScheduler {
    fn drop(&mut self) {
        // SAFETY: by the time the scheduler drops, the worker has stopped
        // resubmitting and drained in-flight transfers, so both are idle.
        unsafe {
            ffi::libusb_free_transfer(self.ctx.xfr_in);
            ffi::libusb_free_transfer(self.ctx.xfr_out);
        }
    }
}
