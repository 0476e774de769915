//! In-memory driver for tests.
//!
//! `MockDriver` speaks the same wire records as the real driver and applies
//! installed filters the way the driver does: scripted input that a slot's
//! filter does not select is passed straight through and never surfaced.
//!
//! Every observable effect is appended to a shared [`Journal`], including the
//! sleeps of a [`MockSleeper`] built from the same driver, so tests can assert
//! the exact interleaving of strokes and delays.
//!
//! ```ignore
//! let driver = MockDriver::new();
//! let journal = driver.journal();
//! let context = Context::with_driver(driver.clone());
//! driver.push_incoming(1, KeyStroke::down(0x1E));
//! assert_eq!(context.wait()?, 1);
//! ```

use super::{Driver, Precedence};
use crate::actions::Sleeper;
use crate::device::{self, Device, DeviceKind, MAX_DEVICE};
use crate::error::{InterceptionError, Result};
use crate::filter::{self, Filter, FILTER_NONE};
use crate::stroke::{self, Stroke};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// One recorded effect.
#[derive(Debug, Clone, PartialEq)]
pub enum MockEvent {
    /// A stroke injected through `write`
    Sent { device: Device, stroke: Stroke },
    /// A stroke handed to the caller through `read`
    Received { device: Device, stroke: Stroke },
    /// Scripted input the slot's filter did not select
    PassedThrough { device: Device, stroke: Stroke },
    FilterSet { device: Device, filter: Filter },
    Slept(Duration),
}

/// Shared, ordered log of [`MockEvent`]s.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<MockEvent>>>);

impl Journal {
    fn push(&self, event: MockEvent) {
        lock(&self.0).push(event);
    }

    pub fn events(&self) -> Vec<MockEvent> {
        lock(&self.0).clone()
    }

    /// Only the injected strokes, in order.
    pub fn sent(&self) -> Vec<(Device, Stroke)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                MockEvent::Sent { device, stroke } => Some((device, stroke)),
                _ => None,
            })
            .collect()
    }

    /// Only the sleeps, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                MockEvent::Slept(duration) => Some(duration),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        lock(&self.0).clear();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct Slots {
    filters: [Filter; MAX_DEVICE],
    precedence: [Precedence; MAX_DEVICE],
    present: [bool; MAX_DEVICE],
    hardware_ids: [Option<String>; MAX_DEVICE],
    /// Raw input not yet seen by the filter, in arrival order.
    incoming: VecDeque<(Device, Stroke)>,
    /// Surfaced strokes waiting for `read`, per slot.
    queued: [VecDeque<Stroke>; MAX_DEVICE],
    interrupted: bool,
}

struct Inner {
    slots: Mutex<Slots>,
    arrived: Condvar,
    journal: Journal,
    calls: AtomicUsize,
}

/// Scriptable stand-in for the kernel driver.
#[derive(Clone)]
pub struct MockDriver {
    inner: Arc<Inner>,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    /// A driver with all 20 slots present and no filters installed.
    pub fn new() -> Self {
        let slots = Slots {
            filters: [FILTER_NONE; MAX_DEVICE],
            precedence: [0; MAX_DEVICE],
            present: [true; MAX_DEVICE],
            hardware_ids: Default::default(),
            incoming: VecDeque::new(),
            queued: Default::default(),
            interrupted: false,
        };
        MockDriver {
            inner: Arc::new(Inner {
                slots: Mutex::new(slots),
                arrived: Condvar::new(),
                journal: Journal::default(),
                calls: AtomicUsize::new(0),
            }),
        }
    }

    pub fn journal(&self) -> Journal {
        self.inner.journal.clone()
    }

    /// A sleeper that records into this driver's journal instead of sleeping.
    pub fn sleeper(&self) -> MockSleeper {
        MockSleeper {
            journal: self.journal(),
        }
    }

    /// Number of `Driver` trait calls made so far.
    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    /// Simulates a physical stroke arriving on `device`.
    pub fn push_incoming(&self, device: Device, stroke: impl Into<Stroke>) {
        lock(&self.inner.slots)
            .incoming
            .push_back((device, stroke.into()));
        self.inner.arrived.notify_all();
    }

    /// Scripted input the driver has not looked at yet.
    pub fn pending_input(&self) -> usize {
        lock(&self.inner.slots).incoming.len()
    }

    /// Detaches the slot so it can no longer be addressed.
    pub fn remove_device(&self, device: Device) {
        if let Ok(index) = device::slot_index(device) {
            lock(&self.inner.slots).present[index] = false;
        }
    }

    pub fn set_hardware_id(&self, device: Device, id: &str) {
        if let Ok(index) = device::slot_index(device) {
            lock(&self.inner.slots).hardware_ids[index] = Some(id.to_owned());
        }
    }

    fn enter(&self) {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn present_index(&self, slots: &Slots, device: Device) -> Result<usize> {
        let index = device::slot_index(device)?;
        if !slots.present[index] {
            return Err(InterceptionError::DeviceNotFound(device));
        }
        Ok(index)
    }

    /// Runs scripted input through the filters until a slot has something
    /// queued, returning the lowest such slot.
    fn next_ready(&self, slots: &mut Slots) -> Option<Device> {
        loop {
            if let Some(index) = slots.queued.iter().position(|queue| !queue.is_empty()) {
                return Some((index + 1) as Device);
            }
            let (device, stroke) = slots.incoming.pop_front()?;
            let Ok(index) = device::slot_index(device) else {
                continue;
            };
            if filter::surfaces(slots.filters[index], &stroke) {
                slots.queued[index].push_back(stroke);
            } else {
                self.inner
                    .journal
                    .push(MockEvent::PassedThrough { device, stroke });
            }
        }
    }
}

impl Driver for MockDriver {
    fn is_present(&self, device: Device) -> bool {
        self.enter();
        let slots = lock(&self.inner.slots);
        self.present_index(&slots, device).is_ok()
    }

    fn set_filter(&self, device: Device, filter: Filter) -> Result<()> {
        self.enter();
        let mut slots = lock(&self.inner.slots);
        let index = self.present_index(&slots, device)?;
        slots.filters[index] = filter;
        self.inner
            .journal
            .push(MockEvent::FilterSet { device, filter });
        Ok(())
    }

    fn get_filter(&self, device: Device) -> Result<Filter> {
        self.enter();
        let slots = lock(&self.inner.slots);
        let index = self.present_index(&slots, device)?;
        Ok(slots.filters[index])
    }

    fn set_precedence(&self, device: Device, precedence: Precedence) -> Result<()> {
        self.enter();
        let mut slots = lock(&self.inner.slots);
        let index = self.present_index(&slots, device)?;
        slots.precedence[index] = precedence;
        Ok(())
    }

    fn get_precedence(&self, device: Device) -> Result<Precedence> {
        self.enter();
        let slots = lock(&self.inner.slots);
        let index = self.present_index(&slots, device)?;
        Ok(slots.precedence[index])
    }

    fn wait(&self, timeout: Option<Duration>) -> Result<Device> {
        self.enter();
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let mut slots = lock(&self.inner.slots);
        loop {
            if slots.interrupted {
                return Err(InterceptionError::ContextClosed);
            }
            if let Some(device) = self.next_ready(&mut slots) {
                return Ok(device);
            }
            slots = match deadline {
                None => self
                    .inner
                    .arrived
                    .wait(slots)
                    .unwrap_or_else(|poisoned| poisoned.into_inner()),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(InterceptionError::WaitTimeout);
                    }
                    self.inner
                        .arrived
                        .wait_timeout(slots, deadline - now)
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .0
                }
            };
        }
    }

    fn read(&self, device: Device, buf: &mut [u8]) -> Result<usize> {
        self.enter();
        let kind = DeviceKind::require(device)?;
        let capacity = buf.len() / stroke::record_len(kind);
        let mut slots = lock(&self.inner.slots);
        let index = self.present_index(&slots, device)?;

        let mut raw = Vec::with_capacity(buf.len());
        for _ in 0..capacity {
            let Some(stroke) = slots.queued[index].pop_front() else {
                break;
            };
            stroke.encode_into(&mut raw);
            self.inner
                .journal
                .push(MockEvent::Received { device, stroke });
        }
        buf[..raw.len()].copy_from_slice(&raw);
        Ok(raw.len())
    }

    fn write(&self, device: Device, buf: &[u8]) -> Result<usize> {
        self.enter();
        let kind = DeviceKind::require(device)?;
        {
            let slots = lock(&self.inner.slots);
            self.present_index(&slots, device)?;
        }
        for stroke in stroke::decode_batch(kind, buf)? {
            self.inner.journal.push(MockEvent::Sent { device, stroke });
        }
        Ok(buf.len())
    }

    fn hardware_id(&self, device: Device, buf: &mut [u8]) -> Result<usize> {
        self.enter();
        let slots = lock(&self.inner.slots);
        let index = self.present_index(&slots, device)?;
        let Some(id) = &slots.hardware_ids[index] else {
            return Ok(0);
        };

        let mut raw = Vec::new();
        for unit in id.encode_utf16().chain([0, 0]) {
            raw.extend_from_slice(&unit.to_le_bytes());
        }
        let len = raw.len().min(buf.len());
        buf[..len].copy_from_slice(&raw[..len]);
        Ok(len)
    }

    fn interrupt(&self) {
        lock(&self.inner.slots).interrupted = true;
        self.inner.arrived.notify_all();
    }
}

/// Records requested delays into a [`Journal`] and returns immediately.
#[derive(Debug, Clone)]
pub struct MockSleeper {
    journal: Journal,
}

impl Sleeper for MockSleeper {
    fn sleep(&self, duration: Duration) {
        self.journal.push(MockEvent::Slept(duration));
    }
}
