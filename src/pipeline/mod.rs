//! Streaming pipeline internals.
//!
//! The pipeline connects the USB device to the consumer through a bounded
//! slot queue:
//!
//! ```text
//! I/O Worker -> Transfer Cycles -> Capture Engine -> Frame Queue -> Consumer
//! ```
//!
//! - **Transfer Cycles**: one perpetually-armed interrupt transfer per
//!   endpoint (audio in, keep-alive out), resubmitted from completion
//!   callbacks
//! - **Capture Engine**: decodes each completed inbound transfer and
//!   commits it, checking the sample counter for gaps on the way
//! - **Frame Queue**: fixed pool of preallocated slots; the producer never
//!   blocks (full pool drops data), the consumer's read is the crate's
//!   only blocking operation
//!
//! Everything left of the queue runs on the worker thread; the raw
//! transfer buffers never cross it.

mod capture;
mod queue;
mod sequence;
mod transfer;
mod worker;

pub(crate) use capture::CaptureEngine;
pub(crate) use queue::{FrameQueue, FrameSlot};
pub(crate) use transfer::TransferScheduler;
pub(crate) use worker::spawn_worker;
