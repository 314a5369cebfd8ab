//! Keystroke stream decoder
//!
//! Splits the raw byte stream read from the controlling terminal into
//! input units: plain characters and the navigation keys hidden inside
//! CSI escape sequences.

/// One decoded input unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    /// A character byte, already normalized (LF becomes CR, DEL becomes BS).
    Char(u8),
    /// A navigation key recognized from a CSI sequence.
    Nav(NavKey),
}

/// Navigation keys produced by `ESC [ <final>` sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavKey {
    Up,
    Down,
    Right,
    Left,
    End,
    Home,
}

#[derive(Clone, Copy, Default, PartialEq)]
enum DecoderState {
    #[default]
    Start,
    SawEscape,
    SawCsi,
}

/// Keystroke decoder state machine
pub struct InputDecoder {
    state: DecoderState,
}

impl Default for InputDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl InputDecoder {
    pub fn new() -> Self {
        Self {
            state: DecoderState::Start,
        }
    }

    /// Feed a single keystroke byte
    ///
    /// Returns a unit once one is complete. Bytes that form the interior of
    /// an escape sequence yield nothing, and unrecognized sequences are
    /// swallowed whole.
    pub fn feed(&mut self, byte: u8) -> Option<Decoded> {
        match self.state {
            DecoderState::Start => self.feed_start(byte),
            DecoderState::SawEscape => self.feed_escape(byte),
            DecoderState::SawCsi => self.feed_csi(byte),
        }
    }

    fn feed_start(&mut self, byte: u8) -> Option<Decoded> {
        match byte {
            0x1B => {
                self.state = DecoderState::SawEscape;
                None
            }
            // Terminals send LF for Enter and DEL for Backspace; the
            // console side expects CR and BS.
            b'\n' => Some(Decoded::Char(b'\r')),
            0x7F => Some(Decoded::Char(0x08)),
            other => Some(Decoded::Char(other)),
        }
    }

    fn feed_escape(&mut self, byte: u8) -> Option<Decoded> {
        self.state = if byte == b'[' {
            DecoderState::SawCsi
        } else {
            DecoderState::Start
        };
        None
    }

    fn feed_csi(&mut self, byte: u8) -> Option<Decoded> {
        self.state = DecoderState::Start;
        let key = match byte {
            b'A' => NavKey::Up,
            b'B' => NavKey::Down,
            b'C' => NavKey::Right,
            b'D' => NavKey::Left,
            b'F' => NavKey::End,
            b'H' => NavKey::Home,
            other => {
                tracing::debug!("discarding CSI sequence with final 0x{:02x}", other);
                return None;
            }
        };
        Some(Decoded::Nav(key))
    }
}
