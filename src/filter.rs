//! Per-slot filter masks.
//!
//! A filter selects which stroke states the driver diverts to the context
//! instead of forwarding straight to the OS. Keyboard and mouse bits overlap
//! numerically, so a mask only means something against the kind of slot it is
//! installed on.

use crate::device::{self, Device, MAX_DEVICE};
use crate::error::Result;
use crate::stroke::{
    Stroke, KEY_UP, MOUSE_BUTTON_4_DOWN, MOUSE_BUTTON_4_UP, MOUSE_BUTTON_5_DOWN,
    MOUSE_BUTTON_5_UP, MOUSE_HWHEEL, MOUSE_LEFT_BUTTON_DOWN, MOUSE_LEFT_BUTTON_UP,
    MOUSE_MIDDLE_BUTTON_DOWN, MOUSE_MIDDLE_BUTTON_UP, MOUSE_MOVE_ABSOLUTE,
    MOUSE_RIGHT_BUTTON_DOWN, MOUSE_RIGHT_BUTTON_UP, MOUSE_WHEEL,
};

/// Bitmask of the stroke states a slot diverts to the context.
pub type Filter = u16;

/// Select nothing; every stroke goes straight to the OS
pub const FILTER_NONE: Filter = 0x0000;
/// Select every stroke
pub const FILTER_ALL: Filter = 0xFFFF;

// Keyboard bits. Everything past UP is the key state bit shifted left by one.
/// Key down strokes
pub const FILTER_KEY_DOWN: Filter = 0x01;
/// Key up strokes
pub const FILTER_KEY_UP: Filter = 0x02;
/// E0-prefixed keys
pub const FILTER_KEY_E0: Filter = 0x04;
/// E1-prefixed keys
pub const FILTER_KEY_E1: Filter = 0x08;
/// Terminal Services LED updates
pub const FILTER_KEY_TERMSRV_SET_LED: Filter = 0x10;
/// Terminal Services shadow strokes
pub const FILTER_KEY_TERMSRV_SHADOW: Filter = 0x20;
/// Terminal Services virtual key packets
pub const FILTER_KEY_TERMSRV_VKPACKET: Filter = 0x40;

// Mouse bits match the mouse state bits one for one.
/// Left button down
pub const FILTER_MOUSE_LEFT_BUTTON_DOWN: Filter = MOUSE_LEFT_BUTTON_DOWN;
/// Left button up
pub const FILTER_MOUSE_LEFT_BUTTON_UP: Filter = MOUSE_LEFT_BUTTON_UP;
/// Right button down
pub const FILTER_MOUSE_RIGHT_BUTTON_DOWN: Filter = MOUSE_RIGHT_BUTTON_DOWN;
/// Right button up
pub const FILTER_MOUSE_RIGHT_BUTTON_UP: Filter = MOUSE_RIGHT_BUTTON_UP;
/// Middle button down
pub const FILTER_MOUSE_MIDDLE_BUTTON_DOWN: Filter = MOUSE_MIDDLE_BUTTON_DOWN;
/// Middle button up
pub const FILTER_MOUSE_MIDDLE_BUTTON_UP: Filter = MOUSE_MIDDLE_BUTTON_UP;
/// Button 4 down
pub const FILTER_MOUSE_BUTTON_4_DOWN: Filter = MOUSE_BUTTON_4_DOWN;
/// Button 4 up
pub const FILTER_MOUSE_BUTTON_4_UP: Filter = MOUSE_BUTTON_4_UP;
/// Button 5 down
pub const FILTER_MOUSE_BUTTON_5_DOWN: Filter = MOUSE_BUTTON_5_DOWN;
/// Button 5 up
pub const FILTER_MOUSE_BUTTON_5_UP: Filter = MOUSE_BUTTON_5_UP;
/// Vertical wheel turns
pub const FILTER_MOUSE_WHEEL: Filter = MOUSE_WHEEL;
/// Horizontal wheel turns
pub const FILTER_MOUSE_HWHEEL: Filter = MOUSE_HWHEEL;
/// Any cursor movement, relative or absolute.
pub const FILTER_MOUSE_MOVE: Filter = 0x1000;

/// No keyboard strokes
pub const FILTER_KEY_NONE: Filter = FILTER_NONE;
/// Every keyboard stroke
pub const FILTER_KEY_ALL: Filter = FILTER_ALL;
/// No mouse strokes
pub const FILTER_MOUSE_NONE: Filter = FILTER_NONE;
/// Every mouse stroke
pub const FILTER_MOUSE_ALL: Filter = FILTER_ALL;

/// The filter bits a stroke raises when the driver sees it.
pub fn stroke_bits(stroke: &Stroke) -> Filter {
    match stroke {
        Stroke::Key(key) => {
            let transition = if key.state & KEY_UP != 0 {
                FILTER_KEY_UP
            } else {
                FILTER_KEY_DOWN
            };
            // E0, E1 and the terminal-services bits sit one position higher
            // in the filter than in the key state.
            transition | ((key.state & !KEY_UP) << 1)
        }
        Stroke::Mouse(mouse) => {
            let moved = mouse.x != 0 || mouse.y != 0 || mouse.flags & MOUSE_MOVE_ABSOLUTE != 0;
            mouse.state | if moved { FILTER_MOUSE_MOVE } else { 0 }
        }
    }
}

/// Whether a stroke passing through a slot with `filter` is surfaced.
pub fn surfaces(filter: Filter, stroke: &Stroke) -> bool {
    filter & stroke_bits(stroke) != 0
}

/// Filter state tracked per slot for one context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterTable {
    masks: [Filter; MAX_DEVICE],
}

impl Default for FilterTable {
    fn default() -> Self {
        Self {
            masks: [FILTER_NONE; MAX_DEVICE],
        }
    }
}

impl FilterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the mask of every slot matching `predicate`.
    ///
    /// Returns the affected devices in slot order.
    pub fn set(&mut self, predicate: impl Fn(Device) -> bool, filter: Filter) -> Vec<Device> {
        let mut changed = Vec::new();
        for device in device::all_devices().filter(|&d| predicate(d)) {
            self.masks[(device - 1) as usize] = filter;
            changed.push(device);
        }
        changed
    }

    pub fn get(&self, device: Device) -> Result<Filter> {
        Ok(self.masks[device::slot_index(device)?])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{is_keyboard, is_mouse};
    use crate::stroke::{
        KeyStroke, MouseStroke, KEY_E0, MOUSE_LEFT_BUTTON_DOWN, MOUSE_LEFT_BUTTON_UP,
        MOUSE_WHEEL,
    };

    #[test]
    fn test_filter_combinations() {
        let combined_filter = FILTER_KEY_UP | FILTER_MOUSE_WHEEL;
        assert_eq!(combined_filter, 0x02 | 0x400);
        assert!(combined_filter & FILTER_KEY_UP != 0);
        assert!(combined_filter & FILTER_MOUSE_WHEEL != 0);
        assert!(combined_filter & FILTER_KEY_DOWN == 0);
    }

    #[test]
    fn key_stroke_bits() {
        assert_eq!(stroke_bits(&KeyStroke::down(0x1E).into()), FILTER_KEY_DOWN);
        assert_eq!(stroke_bits(&KeyStroke::up(0x1E).into()), FILTER_KEY_UP);
        assert_eq!(
            stroke_bits(&KeyStroke::new(0x48, KEY_UP | KEY_E0).into()),
            FILTER_KEY_UP | FILTER_KEY_E0
        );
    }

    #[test]
    fn mouse_stroke_bits() {
        assert_eq!(
            stroke_bits(&MouseStroke::button(MOUSE_LEFT_BUTTON_DOWN).into()),
            FILTER_MOUSE_LEFT_BUTTON_DOWN
        );
        assert_eq!(
            stroke_bits(&MouseStroke::move_relative(3, 0).into()),
            FILTER_MOUSE_MOVE
        );
        assert_eq!(
            stroke_bits(&MouseStroke::wheel(-120).into()),
            FILTER_MOUSE_WHEEL
        );
    }

    #[test]
    fn down_only_filter_drops_releases() {
        let down: Stroke = KeyStroke::down(0x01).into();
        let up: Stroke = KeyStroke::up(0x01).into();
        assert!(surfaces(FILTER_KEY_DOWN, &down));
        assert!(!surfaces(FILTER_KEY_DOWN, &up));
        assert!(surfaces(FILTER_KEY_ALL, &up));
        assert!(!surfaces(FILTER_KEY_NONE, &down));

        let release: Stroke = MouseStroke::button(MOUSE_LEFT_BUTTON_UP).into();
        assert!(!surfaces(FILTER_MOUSE_LEFT_BUTTON_DOWN, &release));
        assert!(surfaces(FILTER_MOUSE_ALL, &MouseStroke::button(MOUSE_WHEEL).into()));
    }

    #[test]
    fn table_masks_are_independent_per_kind() {
        let mut table = FilterTable::new();
        assert_eq!(table.get(3).unwrap(), FILTER_NONE);

        let changed = table.set(is_keyboard, FILTER_KEY_DOWN);
        assert_eq!(changed, (1..=10).collect::<Vec<_>>());
        table.set(is_mouse, FILTER_MOUSE_ALL);

        assert_eq!(table.get(1).unwrap(), FILTER_KEY_DOWN);
        assert_eq!(table.get(20).unwrap(), FILTER_MOUSE_ALL);

        // A later call for the same kind replaces the earlier mask.
        table.set(is_keyboard, FILTER_KEY_ALL);
        assert_eq!(table.get(5).unwrap(), FILTER_KEY_ALL);
        assert_eq!(table.get(11).unwrap(), FILTER_MOUSE_ALL);

        assert!(table.get(0).is_err());
        assert!(table.get(21).is_err());

        // A predicate may narrow the kind down to single slots.
        assert_eq!(table.set(|d| d == 2 || d == 12, FILTER_NONE), vec![2, 12]);
        assert_eq!(table.get(2).unwrap(), FILTER_NONE);
        assert_eq!(table.get(3).unwrap(), FILTER_KEY_ALL);
    }
}
