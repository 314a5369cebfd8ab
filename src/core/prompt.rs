//! Prompt capture
//!
//! Watches the byte stream the child writes to its console and keeps the
//! text printed since the last line terminator. When the bridge switches to
//! line editing, that text becomes the prompt the editor treats as already
//! displayed.

use std::borrow::Cow;

/// Longest prompt retained, in bytes.
pub const PROMPT_CAPACITY: usize = 256;

/// Rolling copy of the child's current output line.
#[derive(Default)]
pub struct PromptBuffer {
    bytes: Vec<u8>,
}

impl PromptBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb a relayed output chunk.
    ///
    /// A chunk containing a newline replaces the buffer with whatever
    /// follows the last one; a chunk without extends it. Either way the
    /// buffer never grows past [`PROMPT_CAPACITY`], excess bytes are
    /// dropped.
    pub fn absorb(&mut self, chunk: &[u8]) {
        match chunk.iter().rposition(|&b| b == b'\n') {
            Some(pos) => {
                self.bytes.clear();
                self.extend_capped(&chunk[pos + 1..]);
            }
            None => self.extend_capped(chunk),
        }
    }

    fn extend_capped(&mut self, bytes: &[u8]) {
        let room = PROMPT_CAPACITY - self.bytes.len();
        let take = bytes.len().min(room);
        self.bytes.extend_from_slice(&bytes[..take]);
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    /// Prompt text, with invalid UTF-8 replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_without_newline_appends() {
        let mut prompt = PromptBuffer::new();
        prompt.absorb(b"$ ");
        assert_eq!(prompt.text(), "$ ");
        prompt.absorb(b"more");
        assert_eq!(prompt.text(), "$ more");
    }

    #[test]
    fn test_newline_keeps_trailing_text() {
        let mut prompt = PromptBuffer::new();
        prompt.absorb(b"foo\nbar");
        assert_eq!(prompt.text(), "bar");
    }

    #[test]
    fn test_chunk_ending_in_newline_clears() {
        let mut prompt = PromptBuffer::new();
        prompt.absorb(b"output line\n");
        assert!(prompt.is_empty());
    }

    #[test]
    fn test_append_after_replace() {
        let mut prompt = PromptBuffer::new();
        prompt.absorb(b"foo\nbar");
        prompt.absorb(b"baz");
        assert_eq!(prompt.text(), "barbaz");
    }

    #[test]
    fn test_append_saturates_at_capacity() {
        let mut prompt = PromptBuffer::new();
        prompt.absorb(&[b'x'; PROMPT_CAPACITY - 4]);
        prompt.absorb(b"abcdefgh");
        let text = prompt.text().into_owned();
        assert_eq!(text.len(), PROMPT_CAPACITY);
        assert!(text.ends_with("xabcd"));
    }

    #[test]
    fn test_replacement_longer_than_capacity_is_truncated() {
        let mut prompt = PromptBuffer::new();
        let mut chunk = b"ignored\n".to_vec();
        chunk.extend(std::iter::repeat(b'y').take(PROMPT_CAPACITY + 50));
        prompt.absorb(&chunk);
        assert_eq!(prompt.text().len(), PROMPT_CAPACITY);
    }

    #[test]
    fn test_clear() {
        let mut prompt = PromptBuffer::new();
        prompt.absorb(b"> ");
        prompt.clear();
        assert!(prompt.is_empty());
    }
}
