use super::{Driver, Precedence};
use crate::device::Device;
use crate::error::{InterceptionError, Result};
use crate::filter::Filter;
use std::time::Duration;

/// Stand-in for the Windows backend on hosts where the driver cannot exist.
///
/// It can never be opened, so every driver-dependent entry point reports
/// `DriverNotFound` while the rest of the crate stays usable.
#[derive(Debug)]
pub struct NativeDriver {
    _private: (),
}

impl NativeDriver {
    pub fn open() -> Result<Self> {
        Err(InterceptionError::DriverNotFound)
    }
}

impl Driver for NativeDriver {
    fn is_present(&self, _device: Device) -> bool {
        false
    }

    fn set_filter(&self, _device: Device, _filter: Filter) -> Result<()> {
        Err(InterceptionError::DriverNotFound)
    }

    fn get_filter(&self, _device: Device) -> Result<Filter> {
        Err(InterceptionError::DriverNotFound)
    }

    fn set_precedence(&self, _device: Device, _precedence: Precedence) -> Result<()> {
        Err(InterceptionError::DriverNotFound)
    }

    fn get_precedence(&self, _device: Device) -> Result<Precedence> {
        Err(InterceptionError::DriverNotFound)
    }

    fn wait(&self, _timeout: Option<Duration>) -> Result<Device> {
        Err(InterceptionError::DriverNotFound)
    }

    fn read(&self, _device: Device, _buf: &mut [u8]) -> Result<usize> {
        Err(InterceptionError::DriverNotFound)
    }

    fn write(&self, _device: Device, _buf: &[u8]) -> Result<usize> {
        Err(InterceptionError::DriverNotFound)
    }

    fn hardware_id(&self, _device: Device, _buf: &mut [u8]) -> Result<usize> {
        Err(InterceptionError::DriverNotFound)
    }

    fn interrupt(&self) {}
}
