//! Key event synthesis
//!
//! Turns decoded input units into the down/up key-event record pairs the
//! console input queue consumes. Character-to-key resolution goes through a
//! [`KeyboardLayout`] so the portable pipeline stays testable; the live
//! console backend supplies a layout backed by the real keyboard APIs.

use bitflags::bitflags;

use super::decoder::{Decoded, NavKey};

bitflags! {
    /// Modifier keys a layout needs held to produce a character.
    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const CTRL = 0b0010;
        const ALT = 0b0100;
    }
}

/// Control-key-state bits carried by injected records.
pub const SHIFT_PRESSED: u32 = 0x0010;
pub const LEFT_CTRL_PRESSED: u32 = 0x0008;
pub const RIGHT_ALT_PRESSED: u32 = 0x0001;

impl Modifiers {
    /// Control-key-state word for an injected record. ALT maps to the right
    /// Alt key so AltGr-produced characters resolve on European layouts.
    pub fn control_key_state(self) -> u32 {
        let mut state = 0;
        if self.contains(Modifiers::SHIFT) {
            state |= SHIFT_PRESSED;
        }
        if self.contains(Modifiers::CTRL) {
            state |= LEFT_CTRL_PRESSED;
        }
        if self.contains(Modifiers::ALT) {
            state |= RIGHT_ALT_PRESSED;
        }
        state
    }
}

// Virtual key codes used by the synthesized records.
pub const VK_BACK: u16 = 0x08;
pub const VK_TAB: u16 = 0x09;
pub const VK_RETURN: u16 = 0x0D;
pub const VK_ESCAPE: u16 = 0x1B;
pub const VK_SPACE: u16 = 0x20;
pub const VK_END: u16 = 0x23;
pub const VK_HOME: u16 = 0x24;
pub const VK_LEFT: u16 = 0x25;
pub const VK_UP: u16 = 0x26;
pub const VK_RIGHT: u16 = 0x27;
pub const VK_DOWN: u16 = 0x28;
pub const VK_OEM_1: u16 = 0xBA;
pub const VK_OEM_PLUS: u16 = 0xBB;
pub const VK_OEM_COMMA: u16 = 0xBC;
pub const VK_OEM_MINUS: u16 = 0xBD;
pub const VK_OEM_PERIOD: u16 = 0xBE;
pub const VK_OEM_2: u16 = 0xBF;
pub const VK_OEM_3: u16 = 0xC0;
pub const VK_OEM_4: u16 = 0xDB;
pub const VK_OEM_5: u16 = 0xDC;
pub const VK_OEM_6: u16 = 0xDD;
pub const VK_OEM_7: u16 = 0xDE;

/// One synthesized key event record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyEvent {
    /// Key-down when true, key-up when false.
    pub down: bool,
    /// Repeat count, always 1 for bridged input.
    pub repeat: u16,
    pub virtual_key: u16,
    pub scan_code: u16,
    /// Character payload; `None` for pure navigation keys.
    pub ch: Option<char>,
    pub modifiers: Modifiers,
}

/// A virtual key plus the modifiers needed to produce a character with it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyCombo {
    pub virtual_key: u16,
    pub modifiers: Modifiers,
}

impl KeyCombo {
    fn plain(virtual_key: u16) -> Self {
        Self {
            virtual_key,
            modifiers: Modifiers::empty(),
        }
    }

    fn with(virtual_key: u16, modifiers: Modifiers) -> Self {
        Self {
            virtual_key,
            modifiers,
        }
    }
}

/// Active keyboard layout.
///
/// Resolves characters to the key combination that types them and virtual
/// keys to hardware scan codes.
pub trait KeyboardLayout {
    /// Key combination producing `ch`, if the layout has one.
    fn combo_for_char(&self, ch: char) -> Option<KeyCombo>;

    /// Hardware scan code for a virtual key, 0 when unknown.
    fn scan_code(&self, virtual_key: u16) -> u16;
}

/// The standard US keyboard layout, resolved from fixed tables.
pub struct UsKeyboard;

impl KeyboardLayout for UsKeyboard {
    fn combo_for_char(&self, ch: char) -> Option<KeyCombo> {
        let combo = match ch {
            'a'..='z' => KeyCombo::plain(ch.to_ascii_uppercase() as u16),
            'A'..='Z' => KeyCombo::with(ch as u16, Modifiers::SHIFT),
            '0'..='9' => KeyCombo::plain(ch as u16),
            ' ' => KeyCombo::plain(VK_SPACE),
            '\x08' => KeyCombo::plain(VK_BACK),
            '\t' => KeyCombo::plain(VK_TAB),
            '\r' => KeyCombo::plain(VK_RETURN),
            '\x1b' => KeyCombo::plain(VK_ESCAPE),
            // Remaining C0 controls type as Ctrl plus a base key.
            '\x01'..='\x1a' => {
                KeyCombo::with(b'A' as u16 + ch as u16 - 1, Modifiers::CTRL)
            }
            '\x1c' => KeyCombo::with(VK_OEM_5, Modifiers::CTRL),
            '\x1d' => KeyCombo::with(VK_OEM_6, Modifiers::CTRL),
            '\x1e' => KeyCombo::with(b'6' as u16, Modifiers::CTRL | Modifiers::SHIFT),
            '\x1f' => KeyCombo::with(VK_OEM_MINUS, Modifiers::CTRL | Modifiers::SHIFT),
            '!' => shifted_digit(b'1'),
            '@' => shifted_digit(b'2'),
            '#' => shifted_digit(b'3'),
            '$' => shifted_digit(b'4'),
            '%' => shifted_digit(b'5'),
            '^' => shifted_digit(b'6'),
            '&' => shifted_digit(b'7'),
            '*' => shifted_digit(b'8'),
            '(' => shifted_digit(b'9'),
            ')' => shifted_digit(b'0'),
            ';' => KeyCombo::plain(VK_OEM_1),
            ':' => KeyCombo::with(VK_OEM_1, Modifiers::SHIFT),
            '=' => KeyCombo::plain(VK_OEM_PLUS),
            '+' => KeyCombo::with(VK_OEM_PLUS, Modifiers::SHIFT),
            ',' => KeyCombo::plain(VK_OEM_COMMA),
            '<' => KeyCombo::with(VK_OEM_COMMA, Modifiers::SHIFT),
            '-' => KeyCombo::plain(VK_OEM_MINUS),
            '_' => KeyCombo::with(VK_OEM_MINUS, Modifiers::SHIFT),
            '.' => KeyCombo::plain(VK_OEM_PERIOD),
            '>' => KeyCombo::with(VK_OEM_PERIOD, Modifiers::SHIFT),
            '/' => KeyCombo::plain(VK_OEM_2),
            '?' => KeyCombo::with(VK_OEM_2, Modifiers::SHIFT),
            '`' => KeyCombo::plain(VK_OEM_3),
            '~' => KeyCombo::with(VK_OEM_3, Modifiers::SHIFT),
            '[' => KeyCombo::plain(VK_OEM_4),
            '{' => KeyCombo::with(VK_OEM_4, Modifiers::SHIFT),
            '\\' => KeyCombo::plain(VK_OEM_5),
            '|' => KeyCombo::with(VK_OEM_5, Modifiers::SHIFT),
            ']' => KeyCombo::plain(VK_OEM_6),
            '}' => KeyCombo::with(VK_OEM_6, Modifiers::SHIFT),
            '\'' => KeyCombo::plain(VK_OEM_7),
            '"' => KeyCombo::with(VK_OEM_7, Modifiers::SHIFT),
            _ => return None,
        };
        Some(combo)
    }

    fn scan_code(&self, virtual_key: u16) -> u16 {
        match virtual_key {
            // Letter rows of the PC scan code set 1.
            0x51 => 0x10, // Q
            0x57 => 0x11, // W
            0x45 => 0x12, // E
            0x52 => 0x13, // R
            0x54 => 0x14, // T
            0x59 => 0x15, // Y
            0x55 => 0x16, // U
            0x49 => 0x17, // I
            0x4F => 0x18, // O
            0x50 => 0x19, // P
            0x41 => 0x1E, // A
            0x53 => 0x1F, // S
            0x44 => 0x20, // D
            0x46 => 0x21, // F
            0x47 => 0x22, // G
            0x48 => 0x23, // H
            0x4A => 0x24, // J
            0x4B => 0x25, // K
            0x4C => 0x26, // L
            0x5A => 0x2C, // Z
            0x58 => 0x2D, // X
            0x43 => 0x2E, // C
            0x56 => 0x2F, // V
            0x42 => 0x30, // B
            0x4E => 0x31, // N
            0x4D => 0x32, // M
            0x31..=0x39 => virtual_key - 0x31 + 0x02, // digits 1..9
            0x30 => 0x0B,                             // digit 0
            VK_BACK => 0x0E,
            VK_TAB => 0x0F,
            VK_RETURN => 0x1C,
            VK_ESCAPE => 0x01,
            VK_SPACE => 0x39,
            VK_OEM_1 => 0x27,
            VK_OEM_PLUS => 0x0D,
            VK_OEM_COMMA => 0x33,
            VK_OEM_MINUS => 0x0C,
            VK_OEM_PERIOD => 0x34,
            VK_OEM_2 => 0x35,
            VK_OEM_3 => 0x29,
            VK_OEM_4 => 0x1A,
            VK_OEM_5 => 0x2B,
            VK_OEM_6 => 0x1B,
            VK_OEM_7 => 0x28,
            VK_HOME => 0x47,
            VK_UP => 0x48,
            VK_LEFT => 0x4B,
            VK_RIGHT => 0x4D,
            VK_END => 0x4F,
            VK_DOWN => 0x50,
            _ => 0,
        }
    }
}

fn shifted_digit(digit: u8) -> KeyCombo {
    KeyCombo::with(digit as u16, Modifiers::SHIFT)
}

/// Reassembles UTF-8 sequences that arrive one byte at a time.
#[derive(Default)]
pub struct Utf8Assembler {
    buf: [u8; 4],
    len: usize,
    need: usize,
}

impl Utf8Assembler {
    /// Push one byte, returning a character once a sequence completes.
    ///
    /// Malformed bytes drop any partial sequence and are reconsidered as the
    /// possible start of a new one.
    pub fn push(&mut self, byte: u8) -> Option<char> {
        if self.need == 0 {
            if byte < 0x80 {
                return Some(byte as char);
            }
            self.need = match byte {
                b if b & 0xE0 == 0xC0 => 2,
                b if b & 0xF0 == 0xE0 => 3,
                b if b & 0xF8 == 0xF0 => 4,
                _ => return None, // stray continuation byte
            };
            self.buf[0] = byte;
            self.len = 1;
            return None;
        }

        if byte & 0xC0 != 0x80 {
            self.need = 0;
            self.len = 0;
            return self.push(byte);
        }

        self.buf[self.len] = byte;
        self.len += 1;
        if self.len < self.need {
            return None;
        }

        let decoded = std::str::from_utf8(&self.buf[..self.len])
            .ok()
            .and_then(|s| s.chars().next());
        self.need = 0;
        self.len = 0;
        decoded
    }
}

/// Builds down/up record pairs from decoded input units.
pub struct KeyEncoder {
    layout: Box<dyn KeyboardLayout>,
    pending: Utf8Assembler,
}

impl KeyEncoder {
    pub fn new(layout: Box<dyn KeyboardLayout>) -> Self {
        Self {
            layout,
            pending: Utf8Assembler::default(),
        }
    }

    /// Encode one input unit.
    ///
    /// Character bytes that only extend a multi-byte sequence produce
    /// nothing; every completed character or navigation key produces exactly
    /// one down/up pair.
    pub fn encode(&mut self, unit: Decoded) -> Option<[KeyEvent; 2]> {
        match unit {
            Decoded::Char(byte) => {
                let ch = self.pending.push(byte)?;
                Some(self.char_pair(ch))
            }
            Decoded::Nav(key) => Some(self.nav_pair(key)),
        }
    }

    fn char_pair(&self, ch: char) -> [KeyEvent; 2] {
        // Characters the layout cannot type still go through with the
        // character payload intact; the reader only needs the code unit.
        let combo = self
            .layout
            .combo_for_char(ch)
            .unwrap_or(KeyCombo {
                virtual_key: 0,
                modifiers: Modifiers::empty(),
            });
        let scan = self.layout.scan_code(combo.virtual_key);
        pair(combo.virtual_key, scan, Some(ch), combo.modifiers)
    }

    fn nav_pair(&self, key: NavKey) -> [KeyEvent; 2] {
        let vk = nav_virtual_key(key);
        pair(vk, self.layout.scan_code(vk), None, Modifiers::empty())
    }
}

pub fn nav_virtual_key(key: NavKey) -> u16 {
    match key {
        NavKey::Up => VK_UP,
        NavKey::Down => VK_DOWN,
        NavKey::Right => VK_RIGHT,
        NavKey::Left => VK_LEFT,
        NavKey::End => VK_END,
        NavKey::Home => VK_HOME,
    }
}

fn pair(virtual_key: u16, scan_code: u16, ch: Option<char>, modifiers: Modifiers) -> [KeyEvent; 2] {
    let down = KeyEvent {
        down: true,
        repeat: 1,
        virtual_key,
        scan_code,
        ch,
        modifiers,
    };
    [down, KeyEvent { down: false, ..down }]
}
