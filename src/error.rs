//! Error taxonomy shared by every layer of the crate.

use crate::config::ConfigError;
use crate::device::{Device, DeviceKind};
use thiserror::Error;

/// Error types for Interception operations
#[derive(Debug, Error)]
pub enum InterceptionError {
    /// The driver is not installed or not loaded
    #[error("the Interception driver is not installed or not loaded")]
    DriverNotFound,
    /// Device id outside the 1..=20 slot range
    #[error("invalid device id {0}, expected 1..=20")]
    InvalidDevice(Device),
    /// The driver reports no physical device behind the slot
    #[error("no device present at slot {0}")]
    DeviceNotFound(Device),
    /// A keyboard stroke was addressed to a mouse slot or vice versa
    #[error("stroke kind does not match device {0}")]
    StrokeKindMismatch(Device),
    /// Key name not in the supported key table
    #[error("unknown key {0:?}")]
    UnknownKey(String),
    /// Button name not in the supported button set
    #[error("unknown mouse button {0:?}")]
    UnknownButton(String),
    /// Non-blocking receive found nothing queued
    #[error("no stroke pending on device {0}")]
    NoPendingStroke(Device),
    /// Operation attempted on a closed context
    #[error("interception context is closed")]
    ContextClosed,
    /// Wait elapsed without a filtered stroke arriving
    #[error("wait timed out")]
    WaitTimeout,
    /// A native record did not match the stroke layout
    #[error("malformed {kind} record: {reason}")]
    Decode {
        kind: DeviceKind,
        reason: &'static str,
    },
    /// Failed to create the wait event
    #[error("failed to create event, error code: {0}")]
    CreateEvent(u32),
    /// Device I/O control failed
    #[error("device I/O control failed, error code: {0}")]
    DeviceIoControl(u32),
    /// Wait operation failed
    #[error("wait operation failed, error code: {0}")]
    WaitFailed(u32),
    /// Screen metrics could not be queried
    #[error("screen metrics unavailable: {0}")]
    Screen(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, InterceptionError>;
