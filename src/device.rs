//! USB device discovery and the Overbridge configuration sequence.
//!
//! The configuration steps and their order come from a captured Overbridge
//! session; the device is sensitive to deviations, so they are replayed
//! verbatim: set configuration 1 (twice), claim the streaming interfaces,
//! select their alternate settings, then clear both endpoints.

use rusb::{Context, DeviceHandle, UsbContext};

use crate::error::OverbridgeError;
use crate::protocol::{ENDPOINT_IN, ENDPOINT_OUT};

/// USB vendor id shared by all Elektron devices.
pub const ELEKTRON_VID: u16 = 0x1935;

/// A vendor/product pair identifying one device model.
///
/// Passed to [`Session::open`](crate::Session::open) as an allow-list; the
/// first connected match is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceId {
    /// USB vendor id.
    pub vendor_id: u16,
    /// USB product id.
    pub product_id: u16,
}

impl DeviceId {
    /// Creates an id from an arbitrary vendor/product pair.
    pub const fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }

    /// Creates an id for an Elektron product.
    pub const fn elektron(product_id: u16) -> Self {
        Self::new(ELEKTRON_VID, product_id)
    }
}

/// Digitakt.
pub const DIGITAKT: DeviceId = DeviceId::elektron(0x000c);
/// Digitone.
pub const DIGITONE: DeviceId = DeviceId::elektron(0x0014);
/// Digitone Keys.
pub const DIGITONE_KEYS: DeviceId = DeviceId::elektron(0x001c);
/// Analog Four MK1.
pub const ANALOG_FOUR_MK1: DeviceId = DeviceId::elektron(0x0004);
/// Analog Keys.
pub const ANALOG_KEYS: DeviceId = DeviceId::elektron(0x0006);
/// Analog Rytm MK1.
pub const ANALOG_RYTM_MK1: DeviceId = DeviceId::elektron(0x0008);
/// Analog Heat MK1.
pub const ANALOG_HEAT_MK1: DeviceId = DeviceId::elektron(0x000a);
/// Analog Four MK2.
pub const ANALOG_FOUR_MK2: DeviceId = DeviceId::elektron(0x000e);
/// Analog Rytm MK2.
pub const ANALOG_RYTM_MK2: DeviceId = DeviceId::elektron(0x0010);
/// Analog Heat MK2.
pub const ANALOG_HEAT_MK2: DeviceId = DeviceId::elektron(0x0016);

/// The models this implementation has been validated against.
pub const VERIFIED_DEVICES: [DeviceId; 2] = [DIGITAKT, DIGITONE];

/// All known Overbridge-capable family members.
///
/// Only [`VERIFIED_DEVICES`] are known to work; the siblings speak the
/// same protocol generation but have not been tested and may need
/// different channel layouts.
pub const KNOWN_DEVICES: [DeviceId; 10] = [
    DIGITAKT,
    DIGITONE,
    DIGITONE_KEYS,
    ANALOG_FOUR_MK1,
    ANALOG_KEYS,
    ANALOG_RYTM_MK1,
    ANALOG_HEAT_MK1,
    ANALOG_FOUR_MK2,
    ANALOG_RYTM_MK2,
    ANALOG_HEAT_MK2,
];

/// USB configuration value the streaming interfaces live on.
const CONFIGURATION: u8 = 1;

/// Streaming interfaces and their required alternate settings, in the
/// order the captured init sequence applies them.
const STREAM_INTERFACES: [(u8, u8); 2] = [(2, 2), (1, 3)];

/// An opened, fully configured device.
///
/// Claimed interfaces are released and the handle closed when this drops,
/// which is also what rolls back a partially completed setup: a failure
/// at any step drops everything acquired so far before the error returns.
pub(crate) struct UsbDevice {
    pub(crate) context: Context,
    pub(crate) handle: DeviceHandle<Context>,
}

/// Opens the first connected device matching the allow-list and runs the
/// configuration sequence on it.
pub(crate) fn open(allow_list: &[DeviceId]) -> Result<UsbDevice, OverbridgeError> {
    let context = Context::new().map_err(|source| OverbridgeError::BackendInit { source })?;

    let mut matched = None;
    for id in allow_list {
        if let Some(handle) = context.open_device_with_vid_pid(id.vendor_id, id.product_id) {
            matched = Some((*id, handle));
            break;
        }
    }
    let (id, mut handle) = matched.ok_or(OverbridgeError::DeviceNotFound)?;

    tracing::info!(
        vendor_id = id.vendor_id,
        product_id = id.product_id,
        "opened overbridge device"
    );

    configure(&mut handle)?;

    Ok(UsbDevice { context, handle })
}

fn configure(handle: &mut DeviceHandle<Context>) -> Result<(), OverbridgeError> {
    // The captured init sequence sets the configuration twice.
    for _ in 0..2 {
        handle
            .set_active_configuration(CONFIGURATION)
            .map_err(|source| OverbridgeError::SetConfiguration {
                configuration: CONFIGURATION,
                source,
            })?;
    }

    for (interface, _) in STREAM_INTERFACES {
        handle
            .claim_interface(interface)
            .map_err(|source| OverbridgeError::ClaimInterface { interface, source })?;
    }

    for (interface, setting) in STREAM_INTERFACES {
        handle
            .set_alternate_setting(interface, setting)
            .map_err(|source| OverbridgeError::SetAltSetting {
                interface,
                setting,
                source,
            })?;
    }

    for endpoint in [ENDPOINT_IN, ENDPOINT_OUT] {
        handle
            .clear_halt(endpoint)
            .map_err(|source| OverbridgeError::ClearEndpoint { endpoint, source })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verified_devices_are_known() {
        for id in VERIFIED_DEVICES {
            assert!(KNOWN_DEVICES.contains(&id));
        }
    }

    #[test]
    fn test_known_devices_share_the_vendor() {
        for id in KNOWN_DEVICES {
            assert_eq!(id.vendor_id, ELEKTRON_VID);
        }
    }

    #[test]
    fn test_device_id_construction() {
        let id = DeviceId::new(0x1935, 0x000c);
        assert_eq!(id, DIGITAKT);
        assert_eq!(DeviceId::elektron(0x0014), DIGITONE);
    }

    // Note: device tests require connected hardware and are skipped in CI.
    #[test]
    #[ignore = "requires a connected Overbridge device"]
    fn test_open_verified_device() {
        let device = open(&VERIFIED_DEVICES).unwrap();
        drop(device);
    }
}
