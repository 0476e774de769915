//! Screen metrics and the driver's absolute coordinate space.
//!
//! Absolute mouse moves are expressed to the driver in `0..=65535` on both
//! axes, spanning the whole screen regardless of its pixel resolution.

use crate::error::Result;

/// Upper bound of the driver's absolute coordinate space.
pub const ABSOLUTE_MAX: i32 = 0xFFFF;

/// Source of the current screen size and cursor position.
pub trait ScreenMetrics: Send + Sync {
    /// Primary screen `(width, height)` in pixels.
    fn size(&self) -> Result<(i32, i32)>;

    /// Cursor position in pixels.
    fn cursor_position(&self) -> Result<(i32, i32)>;
}

/// Converts a pixel position to driver coordinates.
///
/// Rounds to the nearest unit, so the cursor may land one pixel off the
/// requested position after the OS maps it back. Positions outside the screen
/// are clamped to its edges.
pub fn to_absolute(x: i32, y: i32, (width, height): (i32, i32)) -> (i32, i32) {
    (scale(x, width), scale(y, height))
}

fn scale(pixel: i32, extent: i32) -> i32 {
    if extent <= 0 {
        return 0;
    }
    let scaled = (f64::from(ABSOLUTE_MAX) * f64::from(pixel) / f64::from(extent)).round();
    (scaled as i32).clamp(0, ABSOLUTE_MAX)
}

/// Fixed metrics, for headless use and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedScreen {
    pub width: i32,
    pub height: i32,
    pub cursor: (i32, i32),
}

impl FixedScreen {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            cursor: (0, 0),
        }
    }
}

impl ScreenMetrics for FixedScreen {
    fn size(&self) -> Result<(i32, i32)> {
        Ok((self.width, self.height))
    }

    fn cursor_position(&self) -> Result<(i32, i32)> {
        Ok(self.cursor)
    }
}

/// Metrics of the interactive desktop.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemScreen;

#[cfg(windows)]
impl ScreenMetrics for SystemScreen {
    fn size(&self) -> Result<(i32, i32)> {
        use crate::error::InterceptionError;
        use windows_sys::Win32::UI::WindowsAndMessaging::{
            GetSystemMetrics, SM_CXSCREEN, SM_CYSCREEN,
        };

        let (width, height) =
            unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) };
        if width <= 0 || height <= 0 {
            return Err(InterceptionError::Screen(
                "GetSystemMetrics reported an empty screen".into(),
            ));
        }
        Ok((width, height))
    }

    fn cursor_position(&self) -> Result<(i32, i32)> {
        use crate::error::InterceptionError;
        use windows_sys::Win32::Foundation::{GetLastError, POINT};
        use windows_sys::Win32::UI::WindowsAndMessaging::GetCursorPos;

        let mut point = POINT { x: 0, y: 0 };
        if unsafe { GetCursorPos(&mut point) } == 0 {
            let code = unsafe { GetLastError() };
            return Err(InterceptionError::Screen(format!(
                "GetCursorPos failed, error code: {code}"
            )));
        }
        Ok((point.x, point.y))
    }
}

#[cfg(not(windows))]
impl ScreenMetrics for SystemScreen {
    fn size(&self) -> Result<(i32, i32)> {
        Err(crate::error::InterceptionError::Screen(
            "no screen metrics on this platform".into(),
        ))
    }

    fn cursor_position(&self) -> Result<(i32, i32)> {
        Err(crate::error::InterceptionError::Screen(
            "no screen metrics on this platform".into(),
        ))
    }
}
