//! Stroke records and their driver wire layout.
//!
//! A stroke is one atomic input event. In memory it is a [`KeyStroke`] or a
//! [`MouseStroke`]; on the wire it is the driver's `KEYBOARD_INPUT_DATA` (12
//! bytes) or `MOUSE_INPUT_DATA` (24 bytes) record, little endian. Which shape a
//! buffer holds is decided by the slot it came from, never by its content.

use crate::device::DeviceKind;
use crate::error::{InterceptionError, Result};
use std::mem;

/// Bits of [`KeyStroke::state`].
pub type KeyState = u16;

/// Key down event
pub const KEY_DOWN: KeyState = 0x00;
/// Key up event
pub const KEY_UP: KeyState = 0x01;
/// Scancode carries the E0 prefix.
pub const KEY_E0: KeyState = 0x02;
/// Scancode carries the E1 prefix.
pub const KEY_E1: KeyState = 0x04;
/// Terminal Services LED update
pub const KEY_TERMSRV_SET_LED: KeyState = 0x08;
/// Terminal Services shadow stroke
pub const KEY_TERMSRV_SHADOW: KeyState = 0x10;
/// Terminal Services virtual key packet
pub const KEY_TERMSRV_VKPACKET: KeyState = 0x20;

const KEY_STATE_MASK: KeyState = 0x3F;

/// Escape scancode, the termination signal of capture and listen loops
pub const SCANCODE_ESC: u16 = 0x01;

/// Bits of [`MouseStroke::state`]: button transitions and wheel turns.
pub type MouseState = u16;

/// Left mouse button down
pub const MOUSE_LEFT_BUTTON_DOWN: MouseState = 0x001;
/// Left mouse button up
pub const MOUSE_LEFT_BUTTON_UP: MouseState = 0x002;
/// Right mouse button down
pub const MOUSE_RIGHT_BUTTON_DOWN: MouseState = 0x004;
/// Right mouse button up
pub const MOUSE_RIGHT_BUTTON_UP: MouseState = 0x008;
/// Middle mouse button down
pub const MOUSE_MIDDLE_BUTTON_DOWN: MouseState = 0x010;
/// Middle mouse button up
pub const MOUSE_MIDDLE_BUTTON_UP: MouseState = 0x020;
/// Mouse button 4 down
pub const MOUSE_BUTTON_4_DOWN: MouseState = 0x040;
/// Mouse button 4 up
pub const MOUSE_BUTTON_4_UP: MouseState = 0x080;
/// Mouse button 5 down
pub const MOUSE_BUTTON_5_DOWN: MouseState = 0x100;
/// Mouse button 5 up
pub const MOUSE_BUTTON_5_UP: MouseState = 0x200;
/// `rolling` holds a vertical wheel delta.
pub const MOUSE_WHEEL: MouseState = 0x400;
/// `rolling` holds a horizontal wheel delta.
pub const MOUSE_HWHEEL: MouseState = 0x800;

const MOUSE_STATE_MASK: MouseState = 0x0FFF;

/// Bits of [`MouseStroke::flags`]: how `x` and `y` are to be read.
pub type MouseFlag = u16;

/// `x` and `y` are deltas from the last position
pub const MOUSE_MOVE_RELATIVE: MouseFlag = 0x000;
/// `x` and `y` are absolute, 0..=65535
pub const MOUSE_MOVE_ABSOLUTE: MouseFlag = 0x001;
/// Absolute coordinates span all monitors instead of the primary one.
pub const MOUSE_VIRTUAL_DESKTOP: MouseFlag = 0x002;
/// Mouse attributes changed; no movement data
pub const MOUSE_ATTRIBUTES_CHANGED: MouseFlag = 0x004;
/// Do not coalesce this move with the previous one
pub const MOUSE_MOVE_NOCOALESCE: MouseFlag = 0x008;
/// Terminal Services shadow input
pub const MOUSE_TERMSRV_SRC_SHADOW: MouseFlag = 0x100;

const MOUSE_FLAG_MASK: MouseFlag = 0x010F;

/// One wheel notch, as reported by `rolling`
pub const WHEEL_DELTA: i16 = 120;

/// One key transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyStroke {
    /// Set-1 scancode, without any E0/E1 prefix
    pub code: u16,
    pub state: KeyState,
    /// Driver-specific extra data, passed through untouched
    pub information: u32,
}

/// One mouse report: a move, a button transition, a wheel turn, or several at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MouseStroke {
    pub state: MouseState,
    pub flags: MouseFlag,
    /// Wheel delta in multiples of [`WHEEL_DELTA`]
    pub rolling: i16,
    /// X coordinate, 0..=65535 when `flags` has `MOUSE_MOVE_ABSOLUTE`
    pub x: i32,
    /// Y coordinate, 0..=65535 when `flags` has `MOUSE_MOVE_ABSOLUTE`
    pub y: i32,
    pub information: u32,
}

/// Either kind of input stroke
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stroke {
    Key(KeyStroke),
    Mouse(MouseStroke),
}

// Driver-side records, field for field as the driver reads and writes them.

#[derive(Clone, Copy)]
#[repr(C)]
struct KeyboardInputData {
    unit_id: u16,
    make_code: u16,
    flags: u16,
    reserved: u16,
    extra_information: u32,
}
#[allow(clippy::unnecessary_operation, clippy::identity_op)]
const _: () = {
    ["Size of KeyboardInputData"][mem::size_of::<KeyboardInputData>() - 12usize];
    ["Offset of field: KeyboardInputData::make_code"]
        [mem::offset_of!(KeyboardInputData, make_code) - 2usize];
    ["Offset of field: KeyboardInputData::flags"]
        [mem::offset_of!(KeyboardInputData, flags) - 4usize];
    ["Offset of field: KeyboardInputData::extra_information"]
        [mem::offset_of!(KeyboardInputData, extra_information) - 8usize];
};

#[derive(Clone, Copy)]
#[repr(C)]
struct MouseInputData {
    unit_id: u16,
    flags: u16,
    button_flags: u16,
    button_data: u16,
    raw_buttons: u32,
    last_x: i32,
    last_y: i32,
    extra_information: u32,
}
#[allow(clippy::unnecessary_operation, clippy::identity_op)]
const _: () = {
    ["Size of MouseInputData"][mem::size_of::<MouseInputData>() - 24usize];
    ["Offset of field: MouseInputData::button_flags"]
        [mem::offset_of!(MouseInputData, button_flags) - 4usize];
    ["Offset of field: MouseInputData::raw_buttons"]
        [mem::offset_of!(MouseInputData, raw_buttons) - 8usize];
    ["Offset of field: MouseInputData::last_x"][mem::offset_of!(MouseInputData, last_x) - 12usize];
    ["Offset of field: MouseInputData::extra_information"]
        [mem::offset_of!(MouseInputData, extra_information) - 20usize];
};

/// Wire size of one keyboard record
pub const KEY_RECORD_LEN: usize = mem::size_of::<KeyboardInputData>();
/// Wire size of one mouse record
pub const MOUSE_RECORD_LEN: usize = mem::size_of::<MouseInputData>();

/// Wire size of one record for the given device kind
pub const fn record_len(kind: DeviceKind) -> usize {
    match kind {
        DeviceKind::Keyboard => KEY_RECORD_LEN,
        DeviceKind::Mouse => MOUSE_RECORD_LEN,
    }
}

fn u16_at(raw: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([raw[at], raw[at + 1]])
}

fn u32_at(raw: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]])
}

impl KeyboardInputData {
    fn to_bytes(self) -> [u8; KEY_RECORD_LEN] {
        let mut out = [0u8; KEY_RECORD_LEN];
        out[0..2].copy_from_slice(&self.unit_id.to_le_bytes());
        out[2..4].copy_from_slice(&self.make_code.to_le_bytes());
        out[4..6].copy_from_slice(&self.flags.to_le_bytes());
        out[6..8].copy_from_slice(&self.reserved.to_le_bytes());
        out[8..12].copy_from_slice(&self.extra_information.to_le_bytes());
        out
    }

    fn from_bytes(raw: &[u8]) -> Self {
        Self {
            unit_id: u16_at(raw, 0),
            make_code: u16_at(raw, 2),
            flags: u16_at(raw, 4),
            reserved: u16_at(raw, 6),
            extra_information: u32_at(raw, 8),
        }
    }
}

impl MouseInputData {
    fn to_bytes(self) -> [u8; MOUSE_RECORD_LEN] {
        let mut out = [0u8; MOUSE_RECORD_LEN];
        out[0..2].copy_from_slice(&self.unit_id.to_le_bytes());
        out[2..4].copy_from_slice(&self.flags.to_le_bytes());
        out[4..6].copy_from_slice(&self.button_flags.to_le_bytes());
        out[6..8].copy_from_slice(&self.button_data.to_le_bytes());
        out[8..12].copy_from_slice(&self.raw_buttons.to_le_bytes());
        out[12..16].copy_from_slice(&self.last_x.to_le_bytes());
        out[16..20].copy_from_slice(&self.last_y.to_le_bytes());
        out[20..24].copy_from_slice(&self.extra_information.to_le_bytes());
        out
    }

    fn from_bytes(raw: &[u8]) -> Self {
        Self {
            unit_id: u16_at(raw, 0),
            flags: u16_at(raw, 2),
            button_flags: u16_at(raw, 4),
            button_data: u16_at(raw, 6),
            raw_buttons: u32_at(raw, 8),
            last_x: u32_at(raw, 12) as i32,
            last_y: u32_at(raw, 16) as i32,
            extra_information: u32_at(raw, 20),
        }
    }
}

fn malformed(kind: DeviceKind, reason: &'static str) -> InterceptionError {
    InterceptionError::Decode { kind, reason }
}

// Convenience constructors for strokes
impl KeyStroke {
    /// Create a new keyboard stroke
    pub fn new(code: u16, state: KeyState) -> Self {
        Self {
            code,
            state,
            information: 0,
        }
    }

    /// Create a key down stroke
    pub fn down(code: u16) -> Self {
        Self::new(code, KEY_DOWN)
    }

    /// Create a key up stroke
    pub fn up(code: u16) -> Self {
        Self::new(code, KEY_UP)
    }

    pub fn is_down(&self) -> bool {
        self.state & KEY_UP == 0
    }

    pub fn is_escape(&self) -> bool {
        self.code == SCANCODE_ESC
    }

    /// Encodes the stroke as a driver keyboard record.
    pub fn encode(&self) -> [u8; KEY_RECORD_LEN] {
        KeyboardInputData {
            unit_id: 0,
            make_code: self.code,
            flags: self.state,
            reserved: 0,
            extra_information: self.information,
        }
        .to_bytes()
    }

    /// Decodes one driver keyboard record.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        if raw.len() != KEY_RECORD_LEN {
            return Err(malformed(DeviceKind::Keyboard, "record length is not 12 bytes"));
        }
        let data = KeyboardInputData::from_bytes(raw);
        if data.flags & !KEY_STATE_MASK != 0 {
            return Err(malformed(DeviceKind::Keyboard, "undefined key state bits"));
        }
        Ok(Self {
            code: data.make_code,
            state: data.flags,
            information: data.extra_information,
        })
    }
}

impl MouseStroke {
    /// Create an absolute move to driver coordinates
    pub fn move_absolute(x: i32, y: i32) -> Self {
        Self {
            flags: MOUSE_MOVE_ABSOLUTE,
            x,
            y,
            ..Self::default()
        }
    }

    /// Create a relative move by the given deltas
    pub fn move_relative(dx: i32, dy: i32) -> Self {
        Self {
            flags: MOUSE_MOVE_RELATIVE,
            x: dx,
            y: dy,
            ..Self::default()
        }
    }

    /// Create a button transition that does not move the cursor
    pub fn button(state: MouseState) -> Self {
        Self {
            state,
            ..Self::default()
        }
    }

    /// Create a mouse wheel stroke
    pub fn wheel(delta: i16) -> Self {
        Self {
            state: MOUSE_WHEEL,
            rolling: delta,
            ..Self::default()
        }
    }

    /// Encodes the stroke as a driver mouse record.
    pub fn encode(&self) -> [u8; MOUSE_RECORD_LEN] {
        MouseInputData {
            unit_id: 0,
            flags: self.flags,
            button_flags: self.state,
            button_data: self.rolling as u16,
            raw_buttons: 0,
            last_x: self.x,
            last_y: self.y,
            extra_information: self.information,
        }
        .to_bytes()
    }

    /// Decodes one driver mouse record.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        if raw.len() != MOUSE_RECORD_LEN {
            return Err(malformed(DeviceKind::Mouse, "record length is not 24 bytes"));
        }
        let data = MouseInputData::from_bytes(raw);
        if data.button_flags & !MOUSE_STATE_MASK != 0 {
            return Err(malformed(DeviceKind::Mouse, "undefined button state bits"));
        }
        if data.flags & !MOUSE_FLAG_MASK != 0 {
            return Err(malformed(DeviceKind::Mouse, "undefined movement flag bits"));
        }
        Ok(Self {
            state: data.button_flags,
            flags: data.flags,
            rolling: data.button_data as i16,
            x: data.last_x,
            y: data.last_y,
            information: data.extra_information,
        })
    }
}

impl Stroke {
    pub fn kind(&self) -> DeviceKind {
        match self {
            Stroke::Key(_) => DeviceKind::Keyboard,
            Stroke::Mouse(_) => DeviceKind::Mouse,
        }
    }

    pub fn as_key(&self) -> Option<&KeyStroke> {
        match self {
            Stroke::Key(key) => Some(key),
            Stroke::Mouse(_) => None,
        }
    }

    pub fn as_mouse(&self) -> Option<&MouseStroke> {
        match self {
            Stroke::Mouse(mouse) => Some(mouse),
            Stroke::Key(_) => None,
        }
    }

    /// Appends this stroke's wire record to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Stroke::Key(key) => out.extend_from_slice(&key.encode()),
            Stroke::Mouse(mouse) => out.extend_from_slice(&mouse.encode()),
        }
    }

    /// Decodes one record, choosing the shape from the originating slot kind.
    pub fn decode(kind: DeviceKind, raw: &[u8]) -> Result<Self> {
        match kind {
            DeviceKind::Keyboard => KeyStroke::decode(raw).map(Stroke::Key),
            DeviceKind::Mouse => MouseStroke::decode(raw).map(Stroke::Mouse),
        }
    }
}

impl From<KeyStroke> for Stroke {
    fn from(key: KeyStroke) -> Self {
        Stroke::Key(key)
    }
}

impl From<MouseStroke> for Stroke {
    fn from(mouse: MouseStroke) -> Self {
        Stroke::Mouse(mouse)
    }
}

/// Encodes a batch of strokes that must all be of `kind`.
///
/// Returns the offending stroke's index on a kind mismatch.
pub fn encode_batch(kind: DeviceKind, strokes: &[Stroke]) -> std::result::Result<Vec<u8>, usize> {
    let mut out = Vec::with_capacity(strokes.len() * record_len(kind));
    for (index, stroke) in strokes.iter().enumerate() {
        if stroke.kind() != kind {
            return Err(index);
        }
        stroke.encode_into(&mut out);
    }
    Ok(out)
}

/// Decodes a buffer of back-to-back records read from a slot of `kind`.
pub fn decode_batch(kind: DeviceKind, raw: &[u8]) -> Result<Vec<Stroke>> {
    let len = record_len(kind);
    if raw.len() % len != 0 {
        return Err(malformed(kind, "buffer holds a partial record"));
    }
    raw.chunks_exact(len)
        .map(|record| Stroke::decode(kind, record))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stroke_creation() {
        let key_stroke = KeyStroke::down(0x1E);
        assert_eq!(key_stroke.code, 0x1E);
        assert_eq!(key_stroke.state, KEY_DOWN);
        assert!(key_stroke.is_down());
        assert!(!KeyStroke::up(0x1E).is_down());

        let mouse_stroke = MouseStroke::move_absolute(100, 200);
        assert_eq!(mouse_stroke.x, 100);
        assert_eq!(mouse_stroke.y, 200);
        assert_eq!(mouse_stroke.flags, MOUSE_MOVE_ABSOLUTE);

        let wheel_stroke = MouseStroke::wheel(WHEEL_DELTA);
        assert_eq!(wheel_stroke.rolling, 120);
        assert_eq!(wheel_stroke.state, MOUSE_WHEEL);
    }

    #[test]
    fn test_flag_combinations() {
        let combined_key_state = KEY_UP | KEY_E0;
        assert_eq!(combined_key_state, 0x01 | 0x02);
        assert!(combined_key_state & KEY_UP != 0);
        assert!(combined_key_state & KEY_E0 != 0);
        assert!(combined_key_state & KEY_E1 == 0);

        let combined_mouse_state = MOUSE_LEFT_BUTTON_DOWN | MOUSE_WHEEL;
        assert_eq!(combined_mouse_state, 0x001 | 0x400);
        assert!(combined_mouse_state & MOUSE_RIGHT_BUTTON_DOWN == 0);
    }

    #[test]
    fn keyboard_record_layout() {
        let stroke = KeyStroke {
            code: 0x1E,
            state: KEY_UP | KEY_E0,
            information: 0xDEAD_BEEF,
        };
        let raw = stroke.encode();
        assert_eq!(
            raw,
            [0, 0, 0x1E, 0, 0x03, 0, 0, 0, 0xEF, 0xBE, 0xAD, 0xDE]
        );
        assert_eq!(KeyStroke::decode(&raw).unwrap(), stroke);
    }

    #[test]
    fn mouse_record_layout() {
        let stroke = MouseStroke {
            state: MOUSE_WHEEL,
            flags: MOUSE_MOVE_ABSOLUTE,
            rolling: -120,
            x: 65535,
            y: -2,
            information: 7,
        };
        let raw = stroke.encode();
        assert_eq!(raw.len(), 24);
        assert_eq!(&raw[2..4], &[0x01, 0x00]);
        assert_eq!(&raw[4..6], &[0x00, 0x04]);
        assert_eq!(&raw[6..8], &(-120i16).to_le_bytes());
        assert_eq!(&raw[8..12], &[0, 0, 0, 0]);
        assert_eq!(&raw[12..16], &65535i32.to_le_bytes());
        assert_eq!(&raw[16..20], &(-2i32).to_le_bytes());
        assert_eq!(MouseStroke::decode(&raw).unwrap(), stroke);
    }

    #[test]
    fn decode_is_chosen_by_slot_kind() {
        let key = Stroke::Key(KeyStroke::down(0x10));
        let mut raw = Vec::new();
        key.encode_into(&mut raw);
        assert_eq!(Stroke::decode(DeviceKind::Keyboard, &raw).unwrap(), key);
        assert!(matches!(
            Stroke::decode(DeviceKind::Mouse, &raw),
            Err(InterceptionError::Decode {
                kind: DeviceKind::Mouse,
                ..
            })
        ));
    }

    #[test]
    fn garbled_records_fail_to_decode() {
        let mut raw = KeyStroke::down(0x1E).encode();
        raw[4] = 0x80;
        assert!(KeyStroke::decode(&raw).is_err());


        let mut raw = MouseStroke::button(MOUSE_LEFT_BUTTON_DOWN).encode();
        raw[5] = 0x10;
        assert!(MouseStroke::decode(&raw).is_err());

        let mut raw = MouseStroke::default().encode();
        raw[2] = 0x40;
        assert!(MouseStroke::decode(&raw).is_err());

        assert!(decode_batch(DeviceKind::Keyboard, &[0u8; 13]).is_err());
    }

    #[test]
    fn scancodes_outside_the_key_table_still_decode() {
        for code in [0x00, 0x80, 0xF1, 0xF2, 0xFF, 0xE01D] {
            let stroke = KeyStroke::down(code);
            assert_eq!(KeyStroke::decode(&stroke.encode()).unwrap(), stroke);
        }
    }

    #[test]
    fn every_scancode_survives_the_wire() {
        for code in 0x01..=0x7Fu16 {
            for state in [KEY_DOWN, KEY_UP, KEY_DOWN | KEY_E0, KEY_UP | KEY_E0] {
                let stroke = KeyStroke::new(code, state);
                assert_eq!(KeyStroke::decode(&stroke.encode()).unwrap(), stroke);
            }
        }
    }

    #[test]
    fn batches() {
        let strokes = [
            Stroke::Key(KeyStroke::down(0x1E)),
            Stroke::Key(KeyStroke::up(0x1E)),
        ];
        let raw = encode_batch(DeviceKind::Keyboard, &strokes).unwrap();
        assert_eq!(raw.len(), 2 * KEY_RECORD_LEN);
        assert_eq!(decode_batch(DeviceKind::Keyboard, &raw).unwrap(), strokes);

        let mixed = [strokes[0], Stroke::Mouse(MouseStroke::wheel(1))];
        assert_eq!(encode_batch(DeviceKind::Keyboard, &mixed), Err(1));
    }
}
