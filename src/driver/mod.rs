//! The handle-based call interface of the filter driver.
//!
//! [`Driver`] is the seam between the protocol logic in this crate and the
//! privileged kernel component. Buffers crossing it are raw wire records as
//! produced by [`crate::stroke`]; the driver never sees typed strokes.

use crate::device::Device;
use crate::error::Result;
use crate::filter::Filter;
use std::time::Duration;

pub mod mock;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use self::windows::NativeDriver;

#[cfg(not(windows))]
mod unsupported;
#[cfg(not(windows))]
pub use self::unsupported::NativeDriver;

/// Precedence value for device handling order
pub type Precedence = i32;

/// Native operations of an opened driver.
///
/// Implementations own their native resources and release them on drop.
/// Every method may be called from any thread; `wait` must be unblocked by a
/// concurrent [`Driver::interrupt`].
pub trait Driver: Send + Sync {
    /// Whether the slot was opened and can be addressed.
    fn is_present(&self, device: Device) -> bool;

    fn set_filter(&self, device: Device, filter: Filter) -> Result<()>;

    fn get_filter(&self, device: Device) -> Result<Filter>;

    fn set_precedence(&self, device: Device, precedence: Precedence) -> Result<()>;

    fn get_precedence(&self, device: Device) -> Result<Precedence>;

    /// Blocks until some slot has a surfaced stroke queued.
    ///
    /// Fails with `WaitTimeout` once `timeout` elapses and with
    /// `ContextClosed` after [`Driver::interrupt`].
    fn wait(&self, timeout: Option<Duration>) -> Result<Device>;

    /// Copies queued records into `buf` without blocking, returning the byte
    /// count. Zero means nothing was queued.
    fn read(&self, device: Device, buf: &mut [u8]) -> Result<usize>;

    /// Injects the records in `buf`, returning the byte count accepted.
    fn write(&self, device: Device, buf: &[u8]) -> Result<usize>;

    /// Fills `buf` with the slot's UTF-16LE hardware id, returning the byte
    /// count. Zero means no device is attached.
    fn hardware_id(&self, device: Device, buf: &mut [u8]) -> Result<usize>;

    /// Wakes every pending and future `wait` with `ContextClosed`.
    fn interrupt(&self);
}
