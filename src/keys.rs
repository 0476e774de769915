//! Symbolic key and button names.
//!
//! Scancodes are scan code set 1 make codes. Keys that the keyboard reports
//! behind an `E0` prefix carry `extended = true` and are sent with `KEY_E0`.

use crate::error::{InterceptionError, Result};
use crate::stroke::{
    MouseState, KEY_DOWN, KEY_E0, KEY_UP, MOUSE_BUTTON_4_DOWN, MOUSE_BUTTON_4_UP,
    MOUSE_BUTTON_5_DOWN, MOUSE_BUTTON_5_UP, MOUSE_LEFT_BUTTON_DOWN, MOUSE_LEFT_BUTTON_UP,
    MOUSE_MIDDLE_BUTTON_DOWN, MOUSE_MIDDLE_BUTTON_UP, MOUSE_RIGHT_BUTTON_DOWN,
    MOUSE_RIGHT_BUTTON_UP,
};
use crate::stroke::{KeyState, KeyStroke};
use std::fmt;
use std::str::FromStr;

/// A resolved key: scancode plus whether it needs the E0 prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Key {
    pub code: u16,
    pub extended: bool,
}

const fn k(code: u16) -> Key {
    Key {
        code,
        extended: false,
    }
}

const fn e0(code: u16) -> Key {
    Key {
        code,
        extended: true,
    }
}

static KEY_TABLE: &[(&str, Key)] = &[
    ("esc", k(0x01)),
    ("escape", k(0x01)),
    ("1", k(0x02)),
    ("2", k(0x03)),
    ("3", k(0x04)),
    ("4", k(0x05)),
    ("5", k(0x06)),
    ("6", k(0x07)),
    ("7", k(0x08)),
    ("8", k(0x09)),
    ("9", k(0x0A)),
    ("0", k(0x0B)),
    ("-", k(0x0C)),
    ("=", k(0x0D)),
    ("backspace", k(0x0E)),
    ("tab", k(0x0F)),
    ("q", k(0x10)),
    ("w", k(0x11)),
    ("e", k(0x12)),
    ("r", k(0x13)),
    ("t", k(0x14)),
    ("y", k(0x15)),
    ("u", k(0x16)),
    ("i", k(0x17)),
    ("o", k(0x18)),
    ("p", k(0x19)),
    ("[", k(0x1A)),
    ("]", k(0x1B)),
    ("enter", k(0x1C)),
    ("return", k(0x1C)),
    ("ctrl", k(0x1D)),
    ("ctrlleft", k(0x1D)),
    ("a", k(0x1E)),
    ("s", k(0x1F)),
    ("d", k(0x20)),
    ("f", k(0x21)),
    ("g", k(0x22)),
    ("h", k(0x23)),
    ("j", k(0x24)),
    ("k", k(0x25)),
    ("l", k(0x26)),
    (";", k(0x27)),
    ("'", k(0x28)),
    ("`", k(0x29)),
    ("shift", k(0x2A)),
    ("shiftleft", k(0x2A)),
    ("\\", k(0x2B)),
    ("z", k(0x2C)),
    ("x", k(0x2D)),
    ("c", k(0x2E)),
    ("v", k(0x2F)),
    ("b", k(0x30)),
    ("n", k(0x31)),
    ("m", k(0x32)),
    (",", k(0x33)),
    (".", k(0x34)),
    ("/", k(0x35)),
    ("shiftright", k(0x36)),
    ("multiply", k(0x37)),
    ("alt", k(0x38)),
    ("altleft", k(0x38)),
    ("space", k(0x39)),
    ("capslock", k(0x3A)),
    ("f1", k(0x3B)),
    ("f2", k(0x3C)),
    ("f3", k(0x3D)),
    ("f4", k(0x3E)),
    ("f5", k(0x3F)),
    ("f6", k(0x40)),
    ("f7", k(0x41)),
    ("f8", k(0x42)),
    ("f9", k(0x43)),
    ("f10", k(0x44)),
    ("numlock", k(0x45)),
    ("scrolllock", k(0x46)),
    ("num7", k(0x47)),
    ("num8", k(0x48)),
    ("num9", k(0x49)),
    ("subtract", k(0x4A)),
    ("num4", k(0x4B)),
    ("num5", k(0x4C)),
    ("num6", k(0x4D)),
    ("add", k(0x4E)),
    ("num1", k(0x4F)),
    ("num2", k(0x50)),
    ("num3", k(0x51)),
    ("num0", k(0x52)),
    ("decimal", k(0x53)),
    ("f11", k(0x57)),
    ("f12", k(0x58)),
    ("ctrlright", e0(0x1D)),
    ("altright", e0(0x38)),
    ("divide", e0(0x35)),
    ("numenter", e0(0x1C)),
    ("home", e0(0x47)),
    ("up", e0(0x48)),
    ("pageup", e0(0x49)),
    ("left", e0(0x4B)),
    ("right", e0(0x4D)),
    ("end", e0(0x4F)),
    ("down", e0(0x50)),
    ("pagedown", e0(0x51)),
    ("insert", e0(0x52)),
    ("delete", e0(0x53)),
    ("win", e0(0x5B)),
    ("winleft", e0(0x5B)),
    ("winright", e0(0x5C)),
    ("apps", e0(0x5D)),
];

/// Every supported key name, in table order.
pub fn key_names() -> impl Iterator<Item = &'static str> {
    KEY_TABLE.iter().map(|(name, _)| *name)
}

/// Looks up a key by name, ignoring ASCII case.
pub fn lookup(name: &str) -> Option<Key> {
    let name = name.to_ascii_lowercase();
    KEY_TABLE
        .iter()
        .find(|(entry, _)| *entry == name)
        .map(|(_, key)| *key)
}

/// Resolves a key name or fails with `UnknownKey`.
pub fn resolve(name: &str) -> Result<Key> {
    lookup(name).ok_or_else(|| InterceptionError::UnknownKey(name.to_owned()))
}

/// Resolves a single typed character, as used when writing text.
pub fn resolve_char(c: char) -> Result<Key> {
    let found = match c {
        ' ' => lookup("space"),
        '\n' => lookup("enter"),
        '\t' => lookup("tab"),
        _ => lookup(c.encode_utf8(&mut [0u8; 4])),
    };
    found.ok_or_else(|| InterceptionError::UnknownKey(c.to_string()))
}

impl Key {
    fn state(self, transition: KeyState) -> KeyState {
        if self.extended {
            transition | KEY_E0
        } else {
            transition
        }
    }

    pub fn down(self) -> KeyStroke {
        KeyStroke::new(self.code, self.state(KEY_DOWN))
    }

    pub fn up(self) -> KeyStroke {
        KeyStroke::new(self.code, self.state(KEY_UP))
    }
}

/// The mouse buttons actions can press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Mouse4,
    Mouse5,
}

impl MouseButton {
    /// The `(down, up)` state pair for this button.
    pub const fn states(self) -> (MouseState, MouseState) {
        match self {
            Self::Left => (MOUSE_LEFT_BUTTON_DOWN, MOUSE_LEFT_BUTTON_UP),
            Self::Right => (MOUSE_RIGHT_BUTTON_DOWN, MOUSE_RIGHT_BUTTON_UP),
            Self::Middle => (MOUSE_MIDDLE_BUTTON_DOWN, MOUSE_MIDDLE_BUTTON_UP),
            Self::Mouse4 => (MOUSE_BUTTON_4_DOWN, MOUSE_BUTTON_4_UP),
            Self::Mouse5 => (MOUSE_BUTTON_5_DOWN, MOUSE_BUTTON_5_UP),
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Middle => "middle",
            Self::Mouse4 => "mouse4",
            Self::Mouse5 => "mouse5",
        }
    }
}

impl FromStr for MouseButton {
    type Err = InterceptionError;

    fn from_str(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            "middle" => Ok(Self::Middle),
            "mouse4" => Ok(Self::Mouse4),
            "mouse5" => Ok(Self::Mouse5),
            _ => Err(InterceptionError::UnknownButton(name.to_owned())),
        }
    }
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stroke::SCANCODE_ESC;

    #[test]
    fn lookup_ignores_case() {
        assert_eq!(lookup("A"), Some(k(0x1E)));
        assert_eq!(lookup("a"), Some(k(0x1E)));
        assert_eq!(lookup("Enter"), Some(k(0x1C)));
        assert_eq!(lookup("foo"), None);
        assert!(matches!(resolve("foo"), Err(InterceptionError::UnknownKey(name)) if name == "foo"));
    }

    #[test]
    fn escape_is_scancode_one() {
        assert_eq!(resolve("esc").unwrap().code, SCANCODE_ESC);
        assert_eq!(resolve("escape").unwrap().code, SCANCODE_ESC);
    }

    #[test]
    fn names_are_unique_lowercase_and_in_range() {
        let names: Vec<_> = key_names().collect();
        for (i, name) in names.iter().enumerate() {
            assert_eq!(*name, name.to_ascii_lowercase());
            assert!(!names[i + 1..].contains(name), "duplicate {name}");
            let key = lookup(name).unwrap();
            assert!((0x01..=0x7F).contains(&key.code), "{name}");
        }
    }

    #[test]
    fn extended_keys_carry_e0() {
        let up = resolve("up").unwrap();
        assert_eq!(up.down().state, KEY_DOWN | KEY_E0);
        assert_eq!(up.up().state, KEY_UP | KEY_E0);
        assert_eq!(resolve("a").unwrap().up().state, KEY_UP);
    }

    #[test]
    fn typed_characters() {
        assert_eq!(resolve_char(' ').unwrap(), k(0x39));
        assert_eq!(resolve_char('\n').unwrap(), k(0x1C));
        assert_eq!(resolve_char('-').unwrap(), k(0x0C));
        assert!(matches!(resolve_char('é'), Err(InterceptionError::UnknownKey(_))));
    }

    #[test]
    fn buttons() {
        assert_eq!("left".parse::<MouseButton>().unwrap(), MouseButton::Left);
        assert_eq!("Mouse5".parse::<MouseButton>().unwrap(), MouseButton::Mouse5);
        assert_eq!(
            MouseButton::Right.states(),
            (MOUSE_RIGHT_BUTTON_DOWN, MOUSE_RIGHT_BUTTON_UP)
        );
        assert!(matches!(
            "thumb".parse::<MouseButton>(),
            Err(InterceptionError::UnknownButton(name)) if name == "thumb"
        ));
    }
}
