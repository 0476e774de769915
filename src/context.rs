//! The driver context: one exclusively owned driver handle plus its filters.
//!
//! A [`Context`] is open from construction until [`Context::close`] or drop.
//! Every operation on a closed context fails with `ContextClosed` instead of
//! reaching the driver. `close` may be called from another thread while one
//! thread is blocked in [`Context::wait`]; that wait returns `ContextClosed`
//! and the native handle is released once it has.

use crate::device::{self, Device, DeviceKind, PredicateFn};
use crate::driver::{Driver, NativeDriver, Precedence};
use crate::error::{InterceptionError, Result};
use crate::filter::{Filter, FilterTable};
use crate::stroke::{self, Stroke};
use log::{debug, info};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::Duration;

/// Main interception context for managing devices and input capture
pub struct Context<D: Driver = NativeDriver> {
    driver: Mutex<Option<Arc<D>>>,
    filters: Mutex<FilterTable>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Context<NativeDriver> {
    /// Opens the Interception driver.
    ///
    /// Fails with `DriverNotFound` when the driver is not installed or not
    /// loaded, even if no input devices are attached.
    pub fn open() -> Result<Self> {
        NativeDriver::open().map(Self::with_driver)
    }
}

impl<D: Driver> Context<D> {
    /// Wraps an already opened driver.
    pub fn with_driver(driver: D) -> Self {
        Context {
            driver: Mutex::new(Some(Arc::new(driver))),
            filters: Mutex::new(FilterTable::new()),
        }
    }

    fn driver(&self) -> Result<Arc<D>> {
        lock(&self.driver)
            .as_ref()
            .cloned()
            .ok_or(InterceptionError::ContextClosed)
    }

    pub fn is_open(&self) -> bool {
        lock(&self.driver).is_some()
    }

    /// Releases the driver handle. Calling it again does nothing.
    pub fn close(&self) {
        if let Some(driver) = lock(&self.driver).take() {
            driver.interrupt();
            info!("interception context closed");
        }
    }

    /// Slots the driver can address, in slot order.
    pub fn devices(&self) -> Result<Vec<Device>> {
        let driver = self.driver()?;
        Ok(device::all_devices()
            .filter(|&device| driver.is_present(device))
            .collect())
    }

    /// Set a filter for devices matching the predicate
    ///
    /// Overwrites any mask previously installed on those slots. Slots the
    /// driver cannot address are skipped. The local table only changes once
    /// the driver has accepted the filter on every targeted slot.
    pub fn set_filter(&self, predicate: PredicateFn, filter: Filter) -> Result<()> {
        let driver = self.driver()?;
        let targets: Vec<Device> = device::all_devices()
            .filter(|&device| predicate(device) && driver.is_present(device))
            .collect();

        let mut table = lock(&self.filters);
        for &device in &targets {
            driver.set_filter(device, filter)?;
        }
        let changed = table.set(|device| targets.contains(&device), filter);
        debug!("installed filter {filter:#06x} on {} device(s)", changed.len());
        Ok(())
    }

    /// Get the filter the driver holds for a specific device
    pub fn filter(&self, device: Device) -> Result<Filter> {
        device::slot_index(device)?;
        self.driver()?.get_filter(device)
    }

    /// Snapshot of the filters installed through this context.
    pub fn filter_table(&self) -> FilterTable {
        lock(&self.filters).clone()
    }

    /// Get the precedence for a specific device
    pub fn precedence(&self, device: Device) -> Result<Precedence> {
        device::slot_index(device)?;
        self.driver()?.get_precedence(device)
    }

    /// Set the precedence for a specific device
    pub fn set_precedence(&self, device: Device, precedence: Precedence) -> Result<()> {
        device::slot_index(device)?;
        self.driver()?.set_precedence(device, precedence)
    }

    /// Blocks until a filtered stroke is pending on some device.
    pub fn wait(&self) -> Result<Device> {
        self.wait_for(None)
    }

    /// Like [`Context::wait`] but fails with `WaitTimeout` after `timeout`.
    pub fn wait_with_timeout(&self, timeout: Duration) -> Result<Device> {
        self.wait_for(Some(timeout))
    }

    fn wait_for(&self, timeout: Option<Duration>) -> Result<Device> {
        let driver = self.driver()?;
        let device = driver.wait(timeout)?;
        // The handle may have been closed while this thread was blocked.
        if !self.is_open() {
            return Err(InterceptionError::ContextClosed);
        }
        Ok(device)
    }

    /// Takes the next queued stroke from `device` without blocking.
    pub fn receive(&self, device: Device) -> Result<Stroke> {
        self.receive_many(device, 1)?
            .pop()
            .ok_or(InterceptionError::NoPendingStroke(device))
    }

    /// Takes up to `max_strokes` queued strokes from `device` in one call.
    ///
    /// Returns an empty vector when nothing is queued.
    pub fn receive_many(&self, device: Device, max_strokes: usize) -> Result<Vec<Stroke>> {
        let kind = DeviceKind::require(device)?;
        let driver = self.driver()?;
        if max_strokes == 0 {
            return Ok(Vec::new());
        }

        let mut raw = vec![0u8; max_strokes * stroke::record_len(kind)];
        let read = driver.read(device, &mut raw)?;
        let strokes = stroke::decode_batch(kind, &raw[..read])?;
        debug!("received {} stroke(s) from device {device}", strokes.len());
        Ok(strokes)
    }

    /// Injects one stroke into `device`.
    pub fn send(&self, device: Device, stroke: &Stroke) -> Result<()> {
        self.send_many(device, std::slice::from_ref(stroke))?;
        Ok(())
    }

    /// Injects strokes into `device`, returning how many the driver accepted.
    pub fn send_many(&self, device: Device, strokes: &[Stroke]) -> Result<usize> {
        let kind = DeviceKind::require(device)?;
        let raw = stroke::encode_batch(kind, strokes)
            .map_err(|_| InterceptionError::StrokeKindMismatch(device))?;
        let driver = self.driver()?;
        if strokes.is_empty() {
            return Ok(0);
        }

        let written = driver.write(device, &raw)?;
        debug!("sent {} stroke(s) to device {device}", strokes.len());
        Ok(written / stroke::record_len(kind))
    }

    /// Native hardware identifier of the device behind a slot.
    pub fn hardware_id(&self, device: Device) -> Result<String> {
        device::slot_index(device)?;
        let driver = self.driver()?;
        let mut buffer = vec![0u8; 512];
        let size = driver.hardware_id(device, &mut buffer)?;
        device::decode_hardware_id(device, &buffer[..size])
    }
}

impl<D: Driver> Drop for Context<D> {
    fn drop(&mut self) {
        self.close();
    }
}

static SHARED: OnceLock<Option<Arc<Context<NativeDriver>>>> = OnceLock::new();

/// The process-wide context used by input actions.
///
/// The driver is opened on first use; the outcome, success or failure, is
/// kept for the life of the process.
pub fn shared_context() -> Result<Arc<Context<NativeDriver>>> {
    SHARED
        .get_or_init(|| match Context::open() {
            Ok(context) => Some(Arc::new(context)),
            Err(err) => {
                info!("interception driver unavailable: {err}");
                None
            }
        })
        .clone()
        .ok_or(InterceptionError::DriverNotFound)
}

/// Whether the Interception driver could be opened in this process.
pub fn is_driver_available() -> bool {
    shared_context().is_ok()
}
