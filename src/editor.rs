//! Line editing for the bridge's line-buffered mode
//!
//! While the child reads whole lines, keystrokes are run through this
//! editor instead of being bridged one by one. The editor collects the
//! line locally (the terminal is cooked, so the user sees their own
//! typing) and hands back completed lines and end-of-input.

/// Maximum number of history entries
const HISTORY_LIMIT: usize = 1000;

/// Outcome of feeding input to the editor.
#[derive(Debug, Clone, PartialEq)]
pub enum EditEvent {
    /// The user finished a line. Empty lines are reported too.
    Line(String),
    /// End of input on an empty line.
    Eof,
}

/// In-memory line history, newest last.
pub struct History {
    entries: Vec<String>,
    max_entries: usize,
}

impl History {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_entries,
        }
    }

    /// Add a completed line to history
    pub fn add(&mut self, line: &str) {
        if line.is_empty() {
            return;
        }

        // Skip if same as last line (dedup consecutive)
        if self.entries.last().map(String::as_str) == Some(line) {
            return;
        }

        self.entries.push(line.to_string());

        // Trim if exceeding limit
        while self.entries.len() > self.max_entries {
            self.entries.remove(0);
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}

#[derive(Clone, Copy, Default, PartialEq)]
enum SkipState {
    #[default]
    None,
    SawEscape,
    SawCsi,
}

/// Collects a line of input under a prompt the child already printed.
pub struct LineEditor {
    prompt: String,
    buffer: Vec<u8>,
    history: History,
    skip: SkipState,
}

impl LineEditor {
    pub fn new(history_limit: usize) -> Self {
        Self {
            prompt: String::new(),
            buffer: Vec::new(),
            history: History::new(if history_limit == 0 {
                HISTORY_LIMIT
            } else {
                history_limit
            }),
            skip: SkipState::None,
        }
    }

    /// Begin editing a fresh line.
    ///
    /// `prompt` is the text the child has already written to the screen;
    /// the editor records it as displayed and never re-echoes it.
    pub fn activate(&mut self, prompt: &str) {
        self.prompt.clear();
        self.prompt.push_str(prompt);
        self.buffer.clear();
        self.skip = SkipState::None;
    }

    /// Feed one input byte.
    ///
    /// Editing keys are handled internally; a completed line or an
    /// end-of-input on an empty line is reported to the caller.
    pub fn feed(&mut self, byte: u8) -> Option<EditEvent> {
        // Escape sequences (arrow keys and friends) are consumed, never
        // inserted into the line.
        match self.skip {
            SkipState::SawEscape => {
                self.skip = if byte == b'[' {
                    SkipState::SawCsi
                } else {
                    SkipState::None
                };
                return None;
            }
            SkipState::SawCsi => {
                if (0x40..=0x7E).contains(&byte) {
                    self.skip = SkipState::None;
                }
                return None;
            }
            SkipState::None => {}
        }

        match byte {
            0x1B => {
                self.skip = SkipState::SawEscape;
                None
            }
            b'\r' | b'\n' => {
                let line = String::from_utf8_lossy(&self.buffer).into_owned();
                self.buffer.clear();
                self.history.add(&line);
                Some(EditEvent::Line(line))
            }
            0x04 => {
                if self.buffer.is_empty() {
                    Some(EditEvent::Eof)
                } else {
                    None
                }
            }
            0x08 | 0x7F => {
                self.rub_out_char();
                None
            }
            // ^U discards the line, ^W the trailing word.
            0x15 => {
                self.buffer.clear();
                None
            }
            0x17 => {
                self.rub_out_word();
                None
            }
            // Tab is part of the line; the rest of the control range is
            // not.
            b'\t' => {
                self.buffer.push(byte);
                None
            }
            b if b < 0x20 => None,
            other => {
                self.buffer.push(other);
                None
            }
        }
    }

    /// The input stream ended. Any partial line is discarded.
    pub fn end_of_input(&mut self) -> EditEvent {
        self.buffer.clear();
        EditEvent::Eof
    }

    fn rub_out_char(&mut self) {
        // Drop trailing continuation bytes along with the lead byte.
        while let Some(byte) = self.buffer.pop() {
            if byte & 0xC0 != 0x80 {
                break;
            }
        }
    }

    fn rub_out_word(&mut self) {
        while self.buffer.last().is_some_and(|b| *b == b' ') {
            self.buffer.pop();
        }
        while self.buffer.last().is_some_and(|b| *b != b' ') {
            self.buffer.pop();
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn history(&self) -> &History {
        &self.history
    }
}
