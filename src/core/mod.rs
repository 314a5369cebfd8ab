//! Core input pipeline.
//!
//! The portable heart of the bridge, shared by every platform backend:
//!
//! - **decoder**: splits the keystroke stream into characters and
//!   navigation keys
//! - **keys**: resolves decoded units into down/up key-event pairs
//! - **prompt**: tracks the child's unterminated output line
//! - **session**: the per-keystroke mode controller tying them together
//!
//! # Pipeline
//!
//! ```text
//! keystroke bytes
//! └── InputDecoder ── Decoded units
//!     └── KeyEncoder ── KeyEvent pairs
//!         └── ConsoleQueue (bulk posts)
//! ```
//!
//! In line-editing mode the decoder/encoder stage is bypassed per
//! keystroke and replayed wholesale when the editor completes a line.

pub mod decoder;
pub mod keys;
pub mod prompt;
pub mod session;
