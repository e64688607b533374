//! Error types for overbridge.
//!
//! Errors are split into two categories:
//! - **Setup errors**: each step of device initialization has its own
//!   variant, so a failure names exactly what went wrong
//! - **Runtime conditions**: individual transfer failures and queue
//!   exhaustion are *not* errors; the stream keeps running and they are
//!   observable through [`Session::stats`](crate::Session::stats) and
//!   [`Session::queue_depth`](crate::Session::queue_depth) instead

/// Errors returned by session setup and the blocking read path.
///
/// Setup runs a fixed sequence of USB steps (open, configure, claim,
/// alternate settings, endpoint clears, transfer and queue allocation);
/// the variant identifies the first step that failed. Any resources
/// acquired before the failure are released before the error is returned,
/// so a failed [`Session::open`](crate::Session::open) never leaks a
/// half-configured device.
#[derive(Debug, thiserror::Error)]
pub enum OverbridgeError {
    /// The USB backend (libusb) could not be initialized.
    #[error("usb backend init failed: {source}")]
    BackendInit {
        /// The underlying USB error.
        #[source]
        source: rusb::Error,
    },

    /// No device on the allow-list is connected (or accessible).
    #[error("no matching usb device found")]
    DeviceNotFound,

    /// The device refused the required USB configuration.
    #[error("cannot set usb configuration {configuration}: {source}")]
    SetConfiguration {
        /// Configuration value that was being applied.
        configuration: u8,
        /// The underlying USB error.
        #[source]
        source: rusb::Error,
    },

    /// An interface could not be claimed.
    ///
    /// On Linux this usually means another driver (or a second Overbridge
    /// session) holds the interface.
    #[error("cannot claim usb interface {interface}: {source}")]
    ClaimInterface {
        /// Interface number that failed to claim.
        interface: u8,
        /// The underlying USB error.
        #[source]
        source: rusb::Error,
    },

    /// An interface's alternate setting could not be selected.
    #[error("cannot set alt setting {setting} on interface {interface}: {source}")]
    SetAltSetting {
        /// Interface the setting applies to.
        interface: u8,
        /// Alternate setting that was requested.
        setting: u8,
        /// The underlying USB error.
        #[source]
        source: rusb::Error,
    },

    /// A streaming endpoint's halt condition could not be cleared.
    #[error("cannot clear endpoint {endpoint:#04x}: {source}")]
    ClearEndpoint {
        /// Endpoint address that failed to clear.
        endpoint: u8,
        /// The underlying USB error.
        #[source]
        source: rusb::Error,
    },

    /// libusb could not allocate the streaming transfers.
    #[error("cannot allocate usb transfers")]
    TransferAlloc,

    /// The frame queue could not be set up with the requested geometry.
    #[error("cannot set up frame queue: {reason}")]
    QueueSetup {
        /// Why the queue configuration was rejected.
        reason: String,
    },

    /// The I/O worker thread could not be spawned.
    #[error("cannot spawn io worker thread: {source}")]
    WorkerSpawn {
        /// The underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The session is already streaming.
    #[error("session is already streaming")]
    AlreadyStreaming,

    /// The stream has stopped and no more frames will arrive.
    ///
    /// Returned by the blocking read once the worker has shut down and the
    /// committed frames have been drained.
    #[error("stream stopped")]
    StreamStopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_error_display_names_the_step() {
        let err = OverbridgeError::ClaimInterface {
            interface: 2,
            source: rusb::Error::Busy,
        };
        assert!(err.to_string().contains("interface 2"));

        let err = OverbridgeError::SetAltSetting {
            interface: 1,
            setting: 3,
            source: rusb::Error::Io,
        };
        assert!(err.to_string().contains("alt setting 3"));
        assert!(err.to_string().contains("interface 1"));
    }

    #[test]
    fn test_clear_endpoint_display_uses_hex() {
        let err = OverbridgeError::ClearEndpoint {
            endpoint: 0x83,
            source: rusb::Error::Pipe,
        };
        assert!(err.to_string().contains("0x83"));
    }

    #[test]
    fn test_device_not_found_display() {
        assert_eq!(
            OverbridgeError::DeviceNotFound.to_string(),
            "no matching usb device found"
        );
    }

    #[test]
    fn test_source_is_preserved() {
        use std::error::Error as _;

        let err = OverbridgeError::BackendInit {
            source: rusb::Error::NoMem,
        };
        assert!(err.source().is_some());
        assert!(OverbridgeError::StreamStopped.source().is_none());
    }
}
