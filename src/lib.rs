//! # Interception Input
//!
//! Client for the [Interception](https://github.com/oblitum/Interception)
//! keyboard/mouse filter driver, with synthetic input built on top of it.
//!
//! The driver exposes 20 device slots: keyboards on 1..=10 and mice on
//! 11..=20. A [`Context`] owns the driver handle and speaks the stroke
//! protocol: install filters, wait for a filtered stroke, receive it, and
//! send it (or anything else) back.
//!
//! On hosts without the driver, everything that does not need it still works.
//! Driver-dependent calls fail with [`InterceptionError::DriverNotFound`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use interception_input::{is_keyboard, Context, Stroke, FILTER_KEY_ALL};
//!
//! let context = Context::open().expect("Failed to open the interception driver");
//! context
//!     .set_filter(is_keyboard, FILTER_KEY_ALL)
//!     .expect("Failed to set keyboard filter");
//!
//! loop {
//!     let device = context.wait().expect("wait failed");
//!     let stroke = context.receive(device).expect("receive failed");
//!     if let Stroke::Key(key) = stroke {
//!         if key.is_escape() {
//!             break;
//!         }
//!     }
//!     context.send(device, &stroke).expect("send failed");
//! }
//! ```
//!
//! Synthetic input goes through [`InputActions`]:
//!
//! ```rust,no_run
//! use interception_input::{InputActions, InputConfig, DEFAULT_INTERVAL};
//!
//! let actions = InputActions::new(InputConfig::default()).expect("driver not available");
//! actions.move_to(400, 300).unwrap();
//! actions.left_click(1, DEFAULT_INTERVAL).unwrap();
//! actions.press("enter", 1, DEFAULT_INTERVAL).unwrap();
//! ```

pub mod actions;
pub mod config;
pub mod context;
pub mod device;
pub mod driver;
pub mod error;
pub mod filter;
pub mod keys;
pub mod listen;
pub mod screen;
pub mod stroke;

pub use actions::{
    ButtonHold, InputActions, KeyHold, ScrollDirection, Sleeper, ThreadSleeper,
    DEFAULT_CLICK_DELAY, DEFAULT_INTERVAL, DEFAULT_WRITE_INTERVAL,
};
pub use config::{ConfigError, InputConfig};
pub use context::{is_driver_available, shared_context, Context};
pub use device::{
    is_invalid, is_keyboard, is_mouse, keyboard, mouse, Device, DeviceKind, PredicateFn,
    MAX_DEVICE, MAX_KEYBOARD, MAX_MOUSE,
};
pub use driver::{Driver, NativeDriver, Precedence};
pub use error::{InterceptionError, Result};
pub use filter::*;
pub use keys::{Key, MouseButton};
pub use listen::{
    capture_keyboard, capture_keyboard_with, capture_mouse, capture_mouse_with,
    listen_to_keyboard, listen_to_keyboard_with, listen_to_mouse, listen_to_mouse_with,
    LoopOutcome,
};
pub use screen::{FixedScreen, ScreenMetrics, SystemScreen};
pub use stroke::*;
