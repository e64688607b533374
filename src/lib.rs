//! # overbridge
//!
//! **Note:** This crate is under active development. The API may change
//! before 1.0.
//!
//! Real-time multi-channel audio capture from Elektron Overbridge devices.
//!
//! `overbridge` speaks the proprietary USB interrupt-transfer protocol of
//! the Digitakt/Digitone family and delivers the device's 12 channels of
//! 48kHz audio as fixed-size frames of interleaved `i32` samples, decoded
//! bit-exactly from the wire and handed over through a bounded,
//! preallocated queue.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use overbridge::{Session, VERIFIED_DEVICES};
//!
//! let mut session = Session::open(&VERIFIED_DEVICES)?;
//! session.start_streaming()?;
//!
//! loop {
//!     // Blocks until ~18.7ms of audio (10752 samples) is ready.
//!     let frame = session.next_frame()?;
//!     process(&frame);
//!
//!     if session.xrun_count() > 0 {
//!         eprintln!("audio was lost; consumer too slow?");
//!     }
//! }
//! ```
//!
//! ## Architecture
//!
//! The crate maintains a strict thread boundary:
//!
//! - **I/O Worker**: a dedicated real-time thread keeps one inbound and
//!   one outbound interrupt transfer perpetually in flight and decodes
//!   completed transfers inline in the completion callbacks
//! - **Frame Queue**: a fixed pool of preallocated slots hands decoded
//!   frames across the boundary; the producer never blocks (a full pool
//!   drops data), the consumer's read is the only blocking call
//! - **Consumer**: any thread calls [`Session::next_frame`] and owns each
//!   frame until dropping it returns the slot to the pool
//!
//! Lost data is detected via the device's wrapping sample counter and
//! surfaced through [`Session::xrun_count`]; detection is advisory and
//! never interrupts the stream.

#![warn(missing_docs)]

mod config;
pub mod device;
mod error;
mod frame;
mod pipeline;
pub mod protocol;
mod session;

pub use config::StreamConfig;
pub use device::{DeviceId, ELEKTRON_VID, KNOWN_DEVICES, VERIFIED_DEVICES};
pub use error::OverbridgeError;
pub use frame::AudioFrame;
pub use session::{Session, SessionStats};
