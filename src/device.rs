//! Device slot numbering.
//!
//! The driver exposes [`MAX_DEVICE`] fixed slots. Slots `1..=10` are keyboards
//! and `11..=20` are mice; slot 0 and anything above 20 are never valid.

use crate::error::{InterceptionError, Result};
use std::fmt;

pub const MAX_KEYBOARD: usize = 10;
pub const MAX_MOUSE: usize = 10;
pub const MAX_DEVICE: usize = MAX_KEYBOARD + MAX_MOUSE;

/// Device slot id as numbered by the driver
pub type Device = i32;

/// Function type for device predicates
pub type PredicateFn = fn(Device) -> bool;

/// Keyboard device constructor
#[inline]
pub const fn keyboard(index: usize) -> Device {
    (index as i32) + 1
}

/// Mouse device constructor
#[inline]
pub const fn mouse(index: usize) -> Device {
    (MAX_KEYBOARD as i32) + (index as i32) + 1
}

/// Check if device is a keyboard
pub fn is_keyboard(device: Device) -> bool {
    device >= keyboard(0) && device <= keyboard(MAX_KEYBOARD - 1)
}

/// Check if device is a mouse
pub fn is_mouse(device: Device) -> bool {
    device >= mouse(0) && device <= mouse(MAX_MOUSE - 1)
}

/// Check if device ID is invalid
pub fn is_invalid(device: Device) -> bool {
    !is_keyboard(device) && !is_mouse(device)
}

/// Maps a device id to its zero-based slot index, rejecting out-of-range ids.
pub fn slot_index(device: Device) -> Result<usize> {
    if is_invalid(device) {
        return Err(InterceptionError::InvalidDevice(device));
    }
    Ok((device - 1) as usize)
}

/// Iterates every slot id in driver order.
pub fn all_devices() -> impl Iterator<Item = Device> {
    1..=MAX_DEVICE as Device
}

/// Which record shape a slot exchanges with the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Keyboard,
    Mouse,
}

impl DeviceKind {
    /// Classifies a device id, `None` when it is outside both ranges.
    pub fn of(device: Device) -> Option<Self> {
        if is_keyboard(device) {
            Some(Self::Keyboard)
        } else if is_mouse(device) {
            Some(Self::Mouse)
        } else {
            None
        }
    }

    /// Like [`DeviceKind::of`] but fails with `InvalidDevice`.
    pub fn require(device: Device) -> Result<Self> {
        Self::of(device).ok_or(InterceptionError::InvalidDevice(device))
    }

    /// The predicate selecting every slot of this kind.
    pub fn predicate(self) -> PredicateFn {
        match self {
            Self::Keyboard => is_keyboard,
            Self::Mouse => is_mouse,
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keyboard => f.write_str("keyboard"),
            Self::Mouse => f.write_str("mouse"),
        }
    }
}

/// Decodes the hardware id buffer returned by the driver.
///
/// The driver writes a UTF-16LE multi-string; only the first entry is kept.
/// An empty buffer means no device is attached to the slot.
pub fn decode_hardware_id(device: Device, raw: &[u8]) -> Result<String> {
    let units: Vec<u16> = raw
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|&unit| unit != 0)
        .collect();

    if units.is_empty() {
        return Err(InterceptionError::DeviceNotFound(device));
    }
    Ok(String::from_utf16_lossy(&units))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_functions() {
        for i in 0..MAX_KEYBOARD {
            let dev = keyboard(i);
            assert!(is_keyboard(dev));
            assert!(!is_mouse(dev));
            assert!(!is_invalid(dev));
        }

        for i in 0..MAX_MOUSE {
            let dev = mouse(i);
            assert!(is_mouse(dev));
            assert!(!is_keyboard(dev));
            assert!(!is_invalid(dev));
        }

        assert!(is_invalid(0));
        assert!(is_invalid(-1));
        assert!(is_invalid(MAX_DEVICE as Device + 1));
    }

    #[test]
    fn classification_is_exclusive_and_exhaustive() {
        for dev in -5..30 {
            let inside = (1..=20).contains(&dev);
            assert_eq!(is_keyboard(dev) || is_mouse(dev), inside, "device {dev}");
            assert!(!(is_keyboard(dev) && is_mouse(dev)), "device {dev}");
        }
        assert_eq!(keyboard(0), 1);
        assert_eq!(keyboard(9), 10);
        assert_eq!(mouse(0), 11);
        assert_eq!(mouse(9), 20);
        assert_eq!(all_devices().count(), MAX_DEVICE);
    }

    #[test]
    fn slot_index_rejects_out_of_range() {
        assert_eq!(slot_index(1).unwrap(), 0);
        assert_eq!(slot_index(20).unwrap(), 19);
        assert!(matches!(slot_index(0), Err(InterceptionError::InvalidDevice(0))));
        assert!(matches!(slot_index(21), Err(InterceptionError::InvalidDevice(21))));
    }

    #[test]
    fn kind_lookup() {
        assert_eq!(DeviceKind::of(3), Some(DeviceKind::Keyboard));
        assert_eq!(DeviceKind::of(15), Some(DeviceKind::Mouse));
        assert_eq!(DeviceKind::of(0), None);
        assert!((DeviceKind::Mouse.predicate())(11));
        assert!(!(DeviceKind::Mouse.predicate())(10));
    }

    #[test]
    fn hardware_id_decoding() {
        let mut raw = Vec::new();
        for unit in "HID\\VID_046D".encode_utf16().chain([0, 0x41, 0, 0]) {
            raw.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_hardware_id(1, &raw).unwrap(), "HID\\VID_046D");

        assert!(matches!(
            decode_hardware_id(4, &[]),
            Err(InterceptionError::DeviceNotFound(4))
        ));
        assert!(matches!(
            decode_hardware_id(4, &[0, 0]),
            Err(InterceptionError::DeviceNotFound(4))
        ));
    }
}
