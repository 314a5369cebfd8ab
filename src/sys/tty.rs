//! Terminal discipline
//!
//! The bridge keeps two attribute sets for its controlling terminal: the
//! set it was started with, and a raw set that delivers keystrokes byte by
//! byte without echo. Raw is in effect while bridging; the saved set comes
//! back for local line editing and, exactly once, on the way out.

use std::io;

use nix::sys::termios::{
    self, ControlFlags, InputFlags, LocalFlags, OutputFlags, SetArg, SpecialCharacterIndices,
    Termios,
};
use nix::unistd::isatty;

/// Saved and raw attribute sets for the controlling terminal.
pub struct TtyModes {
    saved: Option<Termios>,
    raw: Termios,
}

impl TtyModes {
    /// Capture the current attributes and derive the raw set from them.
    ///
    /// `None` when stdin is not a terminal; the bridge then runs without
    /// touching any discipline.
    pub fn open() -> io::Result<Option<Self>> {
        let stdin = io::stdin();
        if !isatty(&stdin).unwrap_or(false) {
            return Ok(None);
        }
        let saved = termios::tcgetattr(&stdin)?;
        let raw = raw_attributes(&saved);
        Ok(Some(Self {
            saved: Some(saved),
            raw,
        }))
    }

    /// Enter the raw discipline.
    pub fn enter_raw(&self) -> io::Result<()> {
        termios::tcsetattr(io::stdin(), SetArg::TCSANOW, &self.raw)?;
        Ok(())
    }

    /// Return to the saved discipline for local line editing.
    pub fn enter_saved(&self) -> io::Result<()> {
        if let Some(saved) = &self.saved {
            termios::tcsetattr(io::stdin(), SetArg::TCSANOW, saved)?;
        }
        Ok(())
    }

    /// Restore the saved attributes. Only the first call acts; dropping
    /// the value without an explicit restore does the same.
    pub fn restore(&mut self) {
        if let Some(saved) = self.saved.take() {
            let _ = termios::tcsetattr(io::stdin(), SetArg::TCSANOW, &saved);
        }
    }
}

impl Drop for TtyModes {
    fn drop(&mut self) {
        self.restore();
    }
}

fn raw_attributes(saved: &Termios) -> Termios {
    let mut raw = saved.clone();
    raw.input_flags.remove(
        InputFlags::IGNBRK
            | InputFlags::BRKINT
            | InputFlags::PARMRK
            | InputFlags::ISTRIP
            | InputFlags::INLCR
            | InputFlags::IGNCR
            | InputFlags::ICRNL
            | InputFlags::IXON,
    );
    raw.output_flags.remove(OutputFlags::OPOST);
    raw.local_flags.remove(
        LocalFlags::ECHO
            | LocalFlags::ECHONL
            | LocalFlags::ICANON
            | LocalFlags::ISIG
            | LocalFlags::IEXTEN,
    );
    raw.control_flags
        .remove(ControlFlags::CSIZE | ControlFlags::PARENB);
    raw.control_flags.insert(ControlFlags::CS8);
    raw.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
    raw.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
    raw
}
