//! POSIX plumbing.
//!
//! Everything that touches the operating system on the terminal side:
//!
//! - **tty**: raw/saved terminal discipline with restore-once semantics
//! - **child**: child spawn with merged output pipe and console input
//! - **signals**: forwarding handlers and child-exit notification
//! - **supervisor**: the blocking event loop driving the whole bridge

pub mod child;
pub mod signals;
pub mod supervisor;
pub mod tty;

pub use supervisor::Supervisor;
