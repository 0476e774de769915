//! Win32 backend: one device file and one wait event per slot.

use super::{Driver, Precedence};
use crate::device::{self, Device, MAX_DEVICE};
use crate::error::{InterceptionError, Result};
use crate::filter::{Filter, FILTER_NONE};
use log::{debug, info};
use std::ffi::c_void;
use std::mem::size_of;
use std::ptr;
use std::time::Duration;
use windows_sys::Win32::{
    Foundation::{
        CloseHandle, GetLastError, FALSE, HANDLE, INVALID_HANDLE_VALUE, TRUE, WAIT_FAILED,
        WAIT_OBJECT_0, WAIT_TIMEOUT,
    },
    Storage::FileSystem::{CreateFileW, FILE_SHARE_NONE, OPEN_EXISTING},
    System::{
        Threading::{CreateEventW, SetEvent, WaitForMultipleObjects, INFINITE},
        IO::DeviceIoControl,
    },
};

// Not exported by windows-sys under the features this crate enables.
const GENERIC_READ: u32 = 0x8000_0000;
const FILE_DEVICE_UNKNOWN: u32 = 0x22;
const METHOD_BUFFERED: u32 = 0;
const FILE_ANY_ACCESS: u32 = 0;

const fn ctl_code(device_type: u32, function: u32, method: u32, access: u32) -> u32 {
    (device_type << 16) | (access << 14) | (function << 2) | method
}

/// Buffered, any-access control code on the driver's device type.
const fn driver_ioctl(function: u32) -> u32 {
    ctl_code(FILE_DEVICE_UNKNOWN, function, METHOD_BUFFERED, FILE_ANY_ACCESS)
}

const IOCTL_SET_PRECEDENCE: u32 = driver_ioctl(0x801);
const IOCTL_GET_PRECEDENCE: u32 = driver_ioctl(0x802);
const IOCTL_SET_FILTER: u32 = driver_ioctl(0x804);
const IOCTL_GET_FILTER: u32 = driver_ioctl(0x808);
const IOCTL_SET_EVENT: u32 = driver_ioctl(0x810);
const IOCTL_WRITE: u32 = driver_ioctl(0x820);
const IOCTL_READ: u32 = driver_ioctl(0x840);
const IOCTL_GET_HARDWARE_ID: u32 = driver_ioctl(0x880);

struct SlotHandle {
    handle: HANDLE,
    unempty_event: HANDLE,
}

impl SlotHandle {
    fn open(index: usize) -> std::result::Result<Self, u32> {
        let device_name = format!("\\\\.\\interception{index:02}");
        let device_name_w: Vec<u16> = device_name
            .encode_utf16()
            .chain(std::iter::once(0))
            .collect();

        unsafe {
            let handle = CreateFileW(
                device_name_w.as_ptr(),
                GENERIC_READ,
                FILE_SHARE_NONE,
                ptr::null(),
                OPEN_EXISTING,
                0,
                ptr::null_mut(),
            );

            if handle == INVALID_HANDLE_VALUE {
                return Err(GetLastError());
            }

            let unempty_event = CreateEventW(
                ptr::null(),
                TRUE,  // Manual reset
                FALSE, // Initially non-signaled
                ptr::null(),
            );

            if unempty_event.is_null() {
                let error = GetLastError();
                CloseHandle(handle);
                return Err(error);
            }

            // The driver signals this event whenever the slot's queue is non-empty.
            let event_handles = [unempty_event, ptr::null_mut()];
            let mut bytes_returned = 0;

            let result = DeviceIoControl(
                handle,
                IOCTL_SET_EVENT,
                event_handles.as_ptr() as *const c_void,
                (event_handles.len() * size_of::<HANDLE>()) as u32,
                ptr::null_mut(),
                0,
                &mut bytes_returned,
                ptr::null_mut(),
            );

            if result == 0 {
                let error = GetLastError();
                CloseHandle(handle);
                CloseHandle(unempty_event);
                return Err(error);
            }

            Ok(SlotHandle {
                handle,
                unempty_event,
            })
        }
    }

    fn ioctl(&self, code: u32, input: &[u8], output: &mut [u8]) -> Result<usize> {
        let mut bytes_returned = 0;
        let result = unsafe {
            DeviceIoControl(
                self.handle,
                code,
                if input.is_empty() {
                    ptr::null()
                } else {
                    input.as_ptr() as *const c_void
                },
                input.len() as u32,
                if output.is_empty() {
                    ptr::null_mut()
                } else {
                    output.as_mut_ptr() as *mut c_void
                },
                output.len() as u32,
                &mut bytes_returned,
                ptr::null_mut(),
            )
        };

        if result == 0 {
            return Err(InterceptionError::DeviceIoControl(unsafe { GetLastError() }));
        }
        Ok(bytes_returned as usize)
    }
}

impl Drop for SlotHandle {
    fn drop(&mut self) {
        unsafe {
            if self.handle != INVALID_HANDLE_VALUE {
                CloseHandle(self.handle);
            }
            if !self.unempty_event.is_null() {
                CloseHandle(self.unempty_event);
            }
        }
    }
}

/// The Interception driver reached through `\\.\interceptionNN` device files.
pub struct NativeDriver {
    slots: Vec<Option<SlotHandle>>,
    /// Manual-reset event appended to every wait so `interrupt` can wake it.
    cancel_event: HANDLE,
}

// Kernel handles may be used from any thread; the driver serialises access.
unsafe impl Send for NativeDriver {}
unsafe impl Sync for NativeDriver {}

impl NativeDriver {
    /// Opens every slot the driver exposes.
    ///
    /// Failing to open the first slot means the driver is not loaded; later
    /// slots that fail are left unaddressable.
    pub fn open() -> Result<Self> {
        let mut slots = Vec::with_capacity(MAX_DEVICE);

        for i in 0..MAX_DEVICE {
            match SlotHandle::open(i) {
                Ok(slot) => slots.push(Some(slot)),
                Err(code) if i == 0 => {
                    debug!("interception00 could not be opened, error code {code}");
                    return Err(InterceptionError::DriverNotFound);
                }
                Err(code) => {
                    debug!("interception{i:02} unavailable, error code {code}");
                    slots.push(None);
                }
            }
        }

        let cancel_event = unsafe { CreateEventW(ptr::null(), TRUE, FALSE, ptr::null()) };
        if cancel_event.is_null() {
            return Err(InterceptionError::CreateEvent(unsafe { GetLastError() }));
        }

        info!(
            "opened interception driver with {} slots",
            slots.iter().flatten().count()
        );
        Ok(NativeDriver {
            slots,
            cancel_event,
        })
    }

    fn slot(&self, device: Device) -> Result<&SlotHandle> {
        let index = device::slot_index(device)?;
        self.slots[index]
            .as_ref()
            .ok_or(InterceptionError::DeviceNotFound(device))
    }
}

impl Drop for NativeDriver {
    fn drop(&mut self) {
        unsafe {
            if !self.cancel_event.is_null() {
                CloseHandle(self.cancel_event);
            }
        }
    }
}

impl Driver for NativeDriver {
    fn is_present(&self, device: Device) -> bool {
        self.slot(device).is_ok()
    }

    fn set_filter(&self, device: Device, filter: Filter) -> Result<()> {
        self.slot(device)?
            .ioctl(IOCTL_SET_FILTER, &filter.to_ne_bytes(), &mut [])?;
        Ok(())
    }

    fn get_filter(&self, device: Device) -> Result<Filter> {
        let mut out = FILTER_NONE.to_ne_bytes();
        self.slot(device)?.ioctl(IOCTL_GET_FILTER, &[], &mut out)?;
        Ok(Filter::from_ne_bytes(out))
    }

    fn set_precedence(&self, device: Device, precedence: Precedence) -> Result<()> {
        self.slot(device)?
            .ioctl(IOCTL_SET_PRECEDENCE, &precedence.to_ne_bytes(), &mut [])?;
        Ok(())
    }

    fn get_precedence(&self, device: Device) -> Result<Precedence> {
        let mut out = [0u8; size_of::<Precedence>()];
        self.slot(device)?
            .ioctl(IOCTL_GET_PRECEDENCE, &[], &mut out)?;
        Ok(Precedence::from_ne_bytes(out))
    }

    /// Returns the lowest-numbered ready slot, which is the order
    /// `WaitForMultipleObjects` reports signalled handles in.
    fn wait(&self, timeout: Option<Duration>) -> Result<Device> {
        let mut wait_handles: Vec<HANDLE> = Vec::with_capacity(MAX_DEVICE + 1);
        let mut devices: Vec<Device> = Vec::with_capacity(MAX_DEVICE);

        for (i, slot) in self.slots.iter().enumerate() {
            if let Some(slot) = slot {
                wait_handles.push(slot.unempty_event);
                devices.push((i + 1) as Device);
            }
        }
        wait_handles.push(self.cancel_event);

        let timeout_ms = match timeout {
            None => INFINITE,
            Some(timeout) => timeout.as_millis().min((INFINITE - 1) as u128) as u32,
        };

        let result = unsafe {
            WaitForMultipleObjects(
                wait_handles.len() as u32,
                wait_handles.as_ptr(),
                FALSE, // Wait for any
                timeout_ms,
            )
        };

        match result {
            WAIT_TIMEOUT => Err(InterceptionError::WaitTimeout),
            WAIT_FAILED => Err(InterceptionError::WaitFailed(unsafe { GetLastError() })),
            index => {
                let wait_index = index.wrapping_sub(WAIT_OBJECT_0) as usize;
                match devices.get(wait_index) {
                    Some(&device) => Ok(device),
                    None if wait_index == devices.len() => Err(InterceptionError::ContextClosed),
                    None => Err(InterceptionError::WaitFailed(index)),
                }
            }
        }
    }

    fn read(&self, device: Device, buf: &mut [u8]) -> Result<usize> {
        self.slot(device)?.ioctl(IOCTL_READ, &[], buf)
    }

    fn write(&self, device: Device, buf: &[u8]) -> Result<usize> {
        self.slot(device)?.ioctl(IOCTL_WRITE, buf, &mut [])
    }

    fn hardware_id(&self, device: Device, buf: &mut [u8]) -> Result<usize> {
        self.slot(device)?.ioctl(IOCTL_GET_HARDWARE_ID, &[], buf)
    }

    fn interrupt(&self) {
        unsafe {
            SetEvent(self.cancel_event);
        }
    }
}
