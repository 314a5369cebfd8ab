//! Host console input queue
//!
//! The bridge's output side. Synthesized key events are posted to the
//! console's shared input buffer, where the child reads them as if they were
//! typed on a native console window. The queue is a trait so the pipeline
//! can run against a recording stand-in under test.

use std::io;

use bitflags::bitflags;

use crate::core::keys::KeyEvent;

#[cfg(any(windows, target_os = "cygwin"))]
pub mod win32;

#[cfg(any(windows, target_os = "cygwin"))]
pub use win32::{NativeKeyboard, Win32Console};

bitflags! {
    /// Console input mode flags, as reported by the host console.
    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    pub struct ConsoleMode: u32 {
        const PROCESSED_INPUT = 0x0001;
        const LINE_INPUT = 0x0002;
        const ECHO_INPUT = 0x0004;
    }
}

impl ConsoleMode {
    /// True when the current reader asked for processed, line-buffered,
    /// echoed input. That is the signature of a program reading whole lines.
    pub fn line_buffered(self) -> bool {
        self.contains(Self::PROCESSED_INPUT | Self::LINE_INPUT | Self::ECHO_INPUT)
    }
}

/// Writable view of a console input-event queue.
pub trait ConsoleQueue {
    /// Post a batch of key events as one write.
    ///
    /// Callers hand over every record belonging to one logical input unit
    /// (or one completed line) so readers never observe a partial unit.
    fn post(&mut self, events: &[KeyEvent]) -> io::Result<()>;

    /// Input mode flags currently in effect on the console.
    fn input_mode(&self) -> io::Result<ConsoleMode>;

    /// Switch the console's input and output text encoding.
    fn set_codepage(&mut self, codepage: u32) -> io::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_buffered_requires_all_three_flags() {
        let all = ConsoleMode::PROCESSED_INPUT | ConsoleMode::LINE_INPUT | ConsoleMode::ECHO_INPUT;
        assert!(all.line_buffered());
        assert!(!(ConsoleMode::PROCESSED_INPUT | ConsoleMode::LINE_INPUT).line_buffered());
        assert!(!ConsoleMode::empty().line_buffered());
    }

    #[test]
    fn test_extra_flags_do_not_disturb_detection() {
        let mode = ConsoleMode::from_bits_retain(0x01F7);
        assert!(mode.line_buffered());
    }
}
