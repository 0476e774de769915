//! Blocking capture and listen loops.
//!
//! Each loop installs its filters, then waits, receives and re-sends strokes
//! so the OS still sees them, until an Escape stroke arrives on a keyboard.
//! Any Escape transition ends a loop, and that stroke itself is swallowed.
//!
//! | loop                 | keyboard filter   | mouse filter                    |
//! |----------------------|-------------------|---------------------------------|
//! | `capture_keyboard`   | `FILTER_KEY_DOWN` | none                            |
//! | `listen_to_keyboard` | `FILTER_KEY_ALL`  | none                            |
//! | `capture_mouse`      | `FILTER_KEY_DOWN` | `FILTER_MOUSE_LEFT_BUTTON_DOWN` |
//! | `listen_to_mouse`    | `FILTER_KEY_DOWN` | `FILTER_MOUSE_ALL`              |
//!
//! The mouse loops filter keyboards only so that Escape can stop them; the
//! key presses they see are re-sent without being reported.

use crate::context::Context;
use crate::device::{is_keyboard, is_mouse, Device};
use crate::driver::Driver;
use crate::error::{InterceptionError, Result};
use crate::filter::{
    Filter, FILTER_KEY_ALL, FILTER_KEY_DOWN, FILTER_MOUSE_ALL, FILTER_MOUSE_LEFT_BUTTON_DOWN,
};
use crate::stroke::Stroke;
use log::{debug, info};

/// How a loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopOutcome {
    /// Escape was pressed on this keyboard.
    Escape(Device),
    /// The context was closed while the loop was running.
    Closed,
}

#[derive(Debug, Clone, Copy)]
struct LoopMode {
    name: &'static str,
    keyboard_filter: Filter,
    mouse_filter: Option<Filter>,
}

const CAPTURE_KEYBOARD: LoopMode = LoopMode {
    name: "keyboard capture",
    keyboard_filter: FILTER_KEY_DOWN,
    mouse_filter: None,
};

const LISTEN_KEYBOARD: LoopMode = LoopMode {
    name: "keyboard listen",
    keyboard_filter: FILTER_KEY_ALL,
    mouse_filter: None,
};

const CAPTURE_MOUSE: LoopMode = LoopMode {
    name: "mouse capture",
    keyboard_filter: FILTER_KEY_DOWN,
    mouse_filter: Some(FILTER_MOUSE_LEFT_BUTTON_DOWN),
};

const LISTEN_MOUSE: LoopMode = LoopMode {
    name: "mouse listen",
    keyboard_filter: FILTER_KEY_DOWN,
    mouse_filter: Some(FILTER_MOUSE_ALL),
};

fn is_escape(stroke: &Stroke) -> bool {
    stroke
        .as_key()
        .is_some_and(|key| key.is_escape())
}

fn run<D: Driver>(
    context: &Context<D>,
    mode: LoopMode,
    mut on_stroke: impl FnMut(Device, &Stroke),
) -> Result<LoopOutcome> {
    context.set_filter(is_keyboard, mode.keyboard_filter)?;
    if let Some(filter) = mode.mouse_filter {
        context.set_filter(is_mouse, filter)?;
    }
    info!("{} started, press ESC to stop", mode.name);

    // Keyboard strokes are only reported when the loop is about keyboards.
    let report_keys = mode.mouse_filter.is_none();
    loop {
        let device = match context.wait() {
            Ok(device) => device,
            Err(InterceptionError::ContextClosed) => {
                info!("{} stopped, context closed", mode.name);
                return Ok(LoopOutcome::Closed);
            }
            Err(err) => return Err(err),
        };
        let stroke = match context.receive(device) {
            Ok(stroke) => stroke,
            Err(InterceptionError::ContextClosed) => {
                info!("{} stopped, context closed", mode.name);
                return Ok(LoopOutcome::Closed);
            }
            Err(err) => return Err(err),
        };

        if is_keyboard(device) && is_escape(&stroke) {
            info!("{} stopped by ESC on device {device}", mode.name);
            return Ok(LoopOutcome::Escape(device));
        }

        if report_keys || is_mouse(device) {
            on_stroke(device, &stroke);
        }
        match context.send(device, &stroke) {
            Ok(()) => {}
            Err(InterceptionError::ContextClosed) => return Ok(LoopOutcome::Closed),
            Err(err) => return Err(err),
        }
    }
}

/// Opens a context for one loop and closes it on every exit path.
fn run_native(mode: LoopMode) -> Result<Device> {
    let context = Context::open()?;
    let outcome = run(&context, mode, |device, stroke| {
        info!("received {stroke:?} on device {device}");
    });
    context.close();
    match outcome? {
        LoopOutcome::Escape(device) => Ok(device),
        LoopOutcome::Closed => Err(InterceptionError::ContextClosed),
    }
}

/// Surfaces key presses until Escape, returning the keyboard it came from.
pub fn capture_keyboard() -> Result<Device> {
    run_native(CAPTURE_KEYBOARD)
}

/// Surfaces left-button presses until Escape, returning the keyboard it came from.
pub fn capture_mouse() -> Result<Device> {
    run_native(CAPTURE_MOUSE)
}

/// Surfaces every key transition until Escape.
pub fn listen_to_keyboard() -> Result<Device> {
    run_native(LISTEN_KEYBOARD)
}

/// Surfaces every mouse stroke until Escape.
pub fn listen_to_mouse() -> Result<Device> {
    run_native(LISTEN_MOUSE)
}

/// [`capture_keyboard`] on a caller-owned context.
///
/// Closing `context` from another thread ends the loop with
/// [`LoopOutcome::Closed`].
pub fn capture_keyboard_with<D: Driver>(
    context: &Context<D>,
    on_stroke: impl FnMut(Device, &Stroke),
) -> Result<LoopOutcome> {
    run(context, CAPTURE_KEYBOARD, on_stroke)
}

/// [`capture_mouse`] on a caller-owned context.
pub fn capture_mouse_with<D: Driver>(
    context: &Context<D>,
    on_stroke: impl FnMut(Device, &Stroke),
) -> Result<LoopOutcome> {
    run(context, CAPTURE_MOUSE, on_stroke)
}

/// [`listen_to_keyboard`] on a caller-owned context.
pub fn listen_to_keyboard_with<D: Driver>(
    context: &Context<D>,
    on_stroke: impl FnMut(Device, &Stroke),
) -> Result<LoopOutcome> {
    run(context, LISTEN_KEYBOARD, on_stroke)
}

/// [`listen_to_mouse`] on a caller-owned context.
pub fn listen_to_mouse_with<D: Driver>(
    context: &Context<D>,
    on_stroke: impl FnMut(Device, &Stroke),
) -> Result<LoopOutcome> {
    debug!("listening to mouse on a caller-owned context");
    run(context, LISTEN_MOUSE, on_stroke)
}
