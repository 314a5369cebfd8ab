//! Bridge session
//!
//! Owns the input pipeline of one bridged child: the escape decoder, the
//! key-event encoder, the line editor and the prompt snapshot, plus the
//! mode controller that decides which of them sees each keystroke.

use std::io;

use tracing::debug;

use super::decoder::{Decoded, InputDecoder};
use super::keys::KeyEncoder;
use super::prompt::PromptBuffer;
use crate::charset;
use crate::console::ConsoleQueue;
use crate::editor::{EditEvent, LineEditor};

/// Input servicing states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Keystrokes are bridged to the console one by one.
    Raw,
    /// Keystrokes build a line locally; only completed lines are bridged.
    LineEditing,
}

/// A running bridge session.
pub struct Session {
    console: Box<dyn ConsoleQueue>,
    mode: InputMode,
    prompt: PromptBuffer,
    decoder: InputDecoder,
    encoder: KeyEncoder,
    editor: LineEditor,
}

impl Session {
    pub fn new(console: Box<dyn ConsoleQueue>, encoder: KeyEncoder, editor: LineEditor) -> Self {
        Self {
            console,
            mode: InputMode::Raw,
            prompt: PromptBuffer::new(),
            decoder: InputDecoder::new(),
            encoder,
            editor,
        }
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    /// Note a chunk of child output that was just relayed to the terminal.
    pub fn note_output(&mut self, chunk: &[u8]) {
        self.prompt.absorb(chunk);
    }

    /// Negotiate the console codepage for a locale codeset name.
    ///
    /// Names without a known codepage leave the console untouched, and a
    /// console that rejects a mapped page is not an error either.
    pub fn negotiate_codepage(&mut self, codeset: &str) {
        match charset::codepage_for(codeset) {
            Some(codepage) => {
                debug!("codeset {:?} maps to codepage {}", codeset, codepage);
                if let Err(e) = self.console.set_codepage(codepage) {
                    debug!("console rejected codepage {}: {}", codepage, e);
                }
            }
            None => debug!("no codepage known for codeset {:?}", codeset),
        }
    }

    /// Service one keystroke byte.
    ///
    /// Returns the new mode when this byte caused a transition, so the
    /// caller can move the terminal discipline along with it.
    pub fn service_keystroke(&mut self, byte: u8) -> io::Result<Option<InputMode>> {
        let mut changed = None;
        if self.mode == InputMode::Raw && self.console.input_mode()?.line_buffered() {
            self.enter_line_editing();
            changed = Some(InputMode::LineEditing);
        }

        match self.mode {
            InputMode::Raw => self.bridge_byte(byte)?,
            InputMode::LineEditing => {
                if let Some(event) = self.editor.feed(byte) {
                    self.finish_editing(event)?;
                    changed = Some(InputMode::Raw);
                }
            }
        }
        Ok(changed)
    }

    /// The keystroke stream reported end of input.
    ///
    /// In line-editing mode that is the editor's end-of-input; in raw mode
    /// there is nothing to conclude and the caller just stops reading.
    pub fn end_of_input(&mut self) -> io::Result<Option<InputMode>> {
        if self.mode != InputMode::LineEditing {
            return Ok(None);
        }
        let event = self.editor.end_of_input();
        self.finish_editing(event)?;
        Ok(Some(InputMode::Raw))
    }

    fn enter_line_editing(&mut self) {
        debug!("reader wants lines, editing locally");
        self.editor.activate(&self.prompt.text());
        self.mode = InputMode::LineEditing;
    }

    fn finish_editing(&mut self, event: EditEvent) -> io::Result<()> {
        match event {
            EditEvent::Line(text) => {
                self.submit_line(&text)?;
                self.prompt.clear();
            }
            EditEvent::Eof => self.submit_end_of_input()?,
        }
        self.mode = InputMode::Raw;
        Ok(())
    }

    fn bridge_byte(&mut self, byte: u8) -> io::Result<()> {
        if let Some(unit) = self.decoder.feed(byte) {
            if let Some(pair) = self.encoder.encode(unit) {
                self.console.post(&pair)?;
            }
        }
        Ok(())
    }

    /// Replay a completed line, with its carriage return, through the same
    /// path a directly typed character takes, posted as one batch.
    fn submit_line(&mut self, text: &str) -> io::Result<()> {
        let mut events = Vec::with_capacity((text.len() + 1) * 2);
        for byte in text.bytes().chain(std::iter::once(b'\r')) {
            if let Some(unit) = self.decoder.feed(byte) {
                if let Some(pair) = self.encoder.encode(unit) {
                    events.extend_from_slice(&pair);
                }
            }
        }
        self.console.post(&events)
    }

    /// End of input becomes the console's substitute character (Ctrl+Z).
    fn submit_end_of_input(&mut self) -> io::Result<()> {
        if let Some(pair) = self.encoder.encode(Decoded::Char(0x1A)) {
            self.console.post(&pair)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::ConsoleMode;
    use crate::core::keys::{KeyEncoder, KeyEvent, Modifiers, UsKeyboard, VK_RETURN, VK_UP};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    type Posts = Rc<RefCell<Vec<Vec<KeyEvent>>>>;

    struct FakeConsole {
        posts: Posts,
        mode: Rc<Cell<ConsoleMode>>,
        codepages: Rc<RefCell<Vec<u32>>>,
    }

    impl ConsoleQueue for FakeConsole {
        fn post(&mut self, events: &[KeyEvent]) -> io::Result<()> {
            self.posts.borrow_mut().push(events.to_vec());
            Ok(())
        }

        fn input_mode(&self) -> io::Result<ConsoleMode> {
            Ok(self.mode.get())
        }

        fn set_codepage(&mut self, codepage: u32) -> io::Result<()> {
            self.codepages.borrow_mut().push(codepage);
            Ok(())
        }
    }

    struct Setup {
        session: Session,
        posts: Posts,
        mode: Rc<Cell<ConsoleMode>>,
        codepages: Rc<RefCell<Vec<u32>>>,
    }

    fn setup() -> Setup {
        let posts = Posts::default();
        let mode = Rc::new(Cell::new(ConsoleMode::empty()));
        let codepages = Rc::new(RefCell::new(Vec::new()));
        let console = FakeConsole {
            posts: posts.clone(),
            mode: mode.clone(),
            codepages: codepages.clone(),
        };
        let session = Session::new(
            Box::new(console),
            KeyEncoder::new(Box::new(UsKeyboard)),
            LineEditor::new(100),
        );
        Setup {
            session,
            posts,
            mode,
            codepages,
        }
    }

    fn line_buffered() -> ConsoleMode {
        ConsoleMode::PROCESSED_INPUT | ConsoleMode::LINE_INPUT | ConsoleMode::ECHO_INPUT
    }

    fn feed(session: &mut Session, bytes: &[u8]) {
        for byte in bytes {
            session.service_keystroke(*byte).unwrap();
        }
    }

    #[test]
    fn test_raw_byte_posts_one_pair() {
        let mut s = setup();
        feed(&mut s.session, b"a");
        let posts = s.posts.borrow();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].len(), 2);
        assert!(posts[0][0].down);
        assert!(!posts[0][1].down);
        assert_eq!(posts[0][0].ch, Some('a'));
    }

    #[test]
    fn test_arrow_sequence_posts_single_nav_pair() {
        let mut s = setup();
        feed(&mut s.session, b"\x1b[A");
        let posts = s.posts.borrow();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].len(), 2);
        assert_eq!(posts[0][0].virtual_key, VK_UP);
        assert_eq!(posts[0][0].ch, None);
    }

    #[test]
    fn test_unrecognized_sequence_posts_nothing() {
        let mut s = setup();
        feed(&mut s.session, b"\x1b[Z");
        assert!(s.posts.borrow().is_empty());
        feed(&mut s.session, b"x");
        assert_eq!(s.posts.borrow().len(), 1);
    }

    #[test]
    fn test_line_mode_collects_without_posting() {
        let mut s = setup();
        s.mode.set(line_buffered());
        let change = s.session.service_keystroke(b'h').unwrap();
        assert_eq!(change, Some(InputMode::LineEditing));
        assert_eq!(s.session.service_keystroke(b'i').unwrap(), None);
        assert!(s.posts.borrow().is_empty());
        assert_eq!(s.session.mode(), InputMode::LineEditing);
    }

    #[test]
    fn test_completed_line_posts_once() {
        let mut s = setup();
        s.mode.set(line_buffered());
        feed(&mut s.session, b"hi");
        let change = s.session.service_keystroke(b'\r').unwrap();
        assert_eq!(change, Some(InputMode::Raw));

        let posts = s.posts.borrow();
        assert_eq!(posts.len(), 1);
        // Three characters bridged: 'h', 'i' and the carriage return.
        assert_eq!(posts[0].len(), 6);
        assert_eq!(posts[0][0].ch, Some('h'));
        assert_eq!(posts[0][2].ch, Some('i'));
        assert_eq!(posts[0][4].virtual_key, VK_RETURN);
        assert_eq!(s.session.editor.history().entries(), ["hi"]);
        assert_eq!(s.session.mode(), InputMode::Raw);
    }

    #[test]
    fn test_empty_line_posts_only_carriage_return() {
        let mut s = setup();
        s.mode.set(line_buffered());
        let change = s.session.service_keystroke(b'\r').unwrap();
        assert_eq!(change, Some(InputMode::Raw));
        let posts = s.posts.borrow();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].len(), 2);
        assert_eq!(posts[0][0].virtual_key, VK_RETURN);
        assert!(s.session.editor.history().entries().is_empty());
    }

    #[test]
    fn test_entry_uses_prompt_snapshot() {
        let mut s = setup();
        s.session.note_output(b"ready\n$ ");
        s.mode.set(line_buffered());
        feed(&mut s.session, b"x");
        assert_eq!(s.session.editor.prompt(), "$ ");
    }

    #[test]
    fn test_prompt_cleared_after_line() {
        let mut s = setup();
        s.session.note_output(b"$ ");
        s.mode.set(line_buffered());
        feed(&mut s.session, b"x\r");
        assert!(s.session.prompt.is_empty());
    }

    #[test]
    fn test_entry_is_idempotent() {
        let mut s = setup();
        s.mode.set(line_buffered());
        assert_eq!(
            s.session.service_keystroke(b'a').unwrap(),
            Some(InputMode::LineEditing)
        );
        // Still line-buffered on the console: no second transition, the
        // editor keeps collecting.
        assert_eq!(s.session.service_keystroke(b'b').unwrap(), None);
        s.session.service_keystroke(b'\r').unwrap();
        assert_eq!(s.session.editor.history().entries(), ["ab"]);
    }

    #[test]
    fn test_editor_eof_posts_substitute_pair() {
        let mut s = setup();
        s.mode.set(line_buffered());
        let change = s.session.service_keystroke(0x04).unwrap();
        assert_eq!(change, Some(InputMode::Raw));
        let posts = s.posts.borrow();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].len(), 2);
        assert_eq!(posts[0][0].ch, Some('\x1a'));
        assert_eq!(posts[0][0].virtual_key, b'Z' as u16);
        assert_eq!(posts[0][0].modifiers, Modifiers::CTRL);
        assert!(s.session.editor.history().entries().is_empty());
    }

    #[test]
    fn test_stream_end_during_editing() {
        let mut s = setup();
        s.mode.set(line_buffered());
        feed(&mut s.session, b"partial");
        let change = s.session.end_of_input().unwrap();
        assert_eq!(change, Some(InputMode::Raw));
        let posts = s.posts.borrow();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0][0].ch, Some('\x1a'));
        assert!(s.session.editor.history().entries().is_empty());
    }

    #[test]
    fn test_stream_end_in_raw_mode_is_quiet() {
        let mut s = setup();
        assert_eq!(s.session.end_of_input().unwrap(), None);
        assert!(s.posts.borrow().is_empty());
    }

    #[test]
    fn test_multibyte_line_bridges_whole_characters() {
        let mut s = setup();
        s.mode.set(line_buffered());
        feed(&mut s.session, "\u{e9}".as_bytes());
        s.session.service_keystroke(b'\r').unwrap();
        let posts = s.posts.borrow();
        assert_eq!(posts.len(), 1);
        // One pair for the character, one for the carriage return.
        assert_eq!(posts[0].len(), 4);
        assert_eq!(posts[0][0].ch, Some('\u{e9}'));
    }

    #[test]
    fn test_codepage_negotiation() {
        let mut s = setup();
        s.session.negotiate_codepage("UTF-8");
        assert_eq!(*s.codepages.borrow(), [65001]);
        s.session.negotiate_codepage("NO-SUCH-CODESET");
        assert_eq!(s.codepages.borrow().len(), 1);
    }
}
