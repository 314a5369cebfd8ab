//! Bridge supervisor
//!
//! Ties the pieces together for one child: acquires the console queue,
//! negotiates the codepage, spawns the child onto the output pipe, then
//! runs the event loop that relays output and services keystrokes until
//! the child dies. The bridge's own exit mirrors the child's.

use std::io;
use std::os::fd::{AsFd, OwnedFd};
use std::process;

use nix::errno::Errno;
use nix::poll::{ppoll, PollFd, PollFlags};
use nix::sys::signal::{raise, SigSet};
use nix::sys::wait::WaitStatus;
use nix::unistd::{read, write};
use thiserror::Error;
use tracing::{debug, error, info};

use super::child::{self, ChildProcess};
use super::signals;
use super::tty::TtyModes;
use crate::charset;
use crate::config::Config;
use crate::console::ConsoleQueue;
use crate::core::keys::{KeyEncoder, KeyboardLayout};
use crate::core::session::{InputMode, Session};
use crate::editor::LineEditor;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Failed to open console input buffer: {0}")]
    Console(#[source] io::Error),

    #[error("Failed to create pipes: {0}")]
    Pipes(#[source] io::Error),

    #[error("Failed to create child process: {0}")]
    Spawn(#[source] io::Error),

    #[error("Failed to set terminal attributes: {0}")]
    Terminal(#[source] io::Error),

    #[error("Failed to install signal handlers: {0}")]
    Signals(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, SetupError>;

const RELAY_BUF_SIZE: usize = 4096;

/// A bridge wired up and ready to run its event loop.
pub struct Supervisor {
    session: Session,
    tty: Option<TtyModes>,
    #[allow(dead_code)]
    child: ChildProcess,
    output: Option<OwnedFd>,
    stdin_open: bool,
    wait_mask: SigSet,
}

impl Supervisor {
    /// Acquire the console, spawn the child and enter raw discipline.
    ///
    /// Signal handlers are installed before the spawn; a child that dies
    /// immediately must still be noticed.
    pub fn start(config: &Config, command: &str, args: &[String]) -> Result<Self> {
        let console = open_console().map_err(SetupError::Console)?;
        let mut session = Session::new(
            console,
            KeyEncoder::new(native_layout()),
            LineEditor::new(config.history_limit),
        );

        let codeset = config.codeset.clone().or_else(charset::locale_codeset);
        if let Some(codeset) = codeset {
            session.negotiate_codepage(&codeset);
        }

        let (pipe_read, pipe_write) = child::output_pipe().map_err(SetupError::Pipes)?;
        signals::install().map_err(SetupError::Signals)?;
        let child = child::spawn(command, args, &config.console_input, pipe_write)
            .map_err(SetupError::Spawn)?;
        signals::set_child(child.pid());
        // Blocked only after the spawn, so the child's own mask stays
        // clean; a death in between still sets the flag for the loop's
        // first check.
        let wait_mask = signals::block_sigchld().map_err(SetupError::Signals)?;
        info!("bridging {} (pid {})", command, child.pid());

        let tty = TtyModes::open().map_err(SetupError::Terminal)?;
        if let Some(tty) = &tty {
            tty.enter_raw().map_err(SetupError::Terminal)?;
        }

        Ok(Self {
            session,
            tty,
            child,
            output: Some(pipe_read),
            stdin_open: true,
            wait_mask,
        })
    }

    /// Run the event loop. Returns only on a loop I/O failure; the normal
    /// way out is the child's death, which exits the process.
    pub fn run(mut self) -> io::Result<()> {
        loop {
            if let Some(status) = signals::reap() {
                self.conclude(status);
            }

            let mut output_ready = false;
            let mut stdin_ready = false;
            {
                let stdin = io::stdin();
                let mut fds = Vec::with_capacity(2);
                let mut output_at = None;
                let mut stdin_at = None;
                if let Some(output) = &self.output {
                    output_at = Some(fds.len());
                    fds.push(PollFd::new(output.as_fd(), PollFlags::POLLIN));
                }
                if self.stdin_open {
                    stdin_at = Some(fds.len());
                    fds.push(PollFd::new(stdin.as_fd(), PollFlags::POLLIN));
                }

                // No timeout. SIGCHLD is blocked everywhere except inside
                // this wait, so a death cannot land between the reap check
                // above and here: it is either already flagged, or it
                // interrupts the wait.
                match ppoll(&mut fds, None, Some(self.wait_mask)) {
                    Ok(_) => {}
                    Err(Errno::EINTR) => continue,
                    Err(e) => return Err(e.into()),
                }

                let wants_service = PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR;
                if let Some(i) = output_at {
                    output_ready = fds[i]
                        .revents()
                        .unwrap_or(PollFlags::empty())
                        .intersects(wants_service);
                }
                if let Some(i) = stdin_at {
                    stdin_ready = fds[i]
                        .revents()
                        .unwrap_or(PollFlags::empty())
                        .intersects(wants_service);
                }
            }

            // Output first, so a prompt printed just before a mode switch
            // is in the buffer by the time the keystroke is serviced.
            if output_ready {
                self.service_output()?;
            }
            if stdin_ready {
                self.service_stdin()?;
            }
        }
    }

    /// Relay one chunk of child output to the terminal.
    fn service_output(&mut self) -> io::Result<()> {
        let Some(output) = &self.output else {
            return Ok(());
        };
        let mut buf = [0u8; RELAY_BUF_SIZE];
        let n = match read(output.as_fd(), &mut buf) {
            Ok(n) => n,
            Err(Errno::EINTR) => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        if n == 0 {
            debug!("child output pipe closed");
            self.output = None;
            return Ok(());
        }
        // One write, no short-write retry.
        let _ = write(io::stdout(), &buf[..n]);
        self.session.note_output(&buf[..n]);
        Ok(())
    }

    /// Service one keystroke from the terminal.
    fn service_stdin(&mut self) -> io::Result<()> {
        let mut buf = [0u8; 1];
        let n = match read(io::stdin().as_fd(), &mut buf) {
            Ok(n) => n,
            Err(Errno::EINTR) => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        if n == 0 {
            // End of input. During line editing that is the editor's EOF
            // and servicing continues; in raw mode stdin is done for good.
            match self.session.end_of_input()? {
                Some(mode) => self.apply_discipline(mode)?,
                None => {
                    debug!("keystroke stream closed");
                    self.stdin_open = false;
                }
            }
            return Ok(());
        }
        if let Some(mode) = self.session.service_keystroke(buf[0])? {
            self.apply_discipline(mode)?;
        }
        Ok(())
    }

    fn apply_discipline(&self, mode: InputMode) -> io::Result<()> {
        let Some(tty) = &self.tty else {
            return Ok(());
        };
        match mode {
            InputMode::Raw => tty.enter_raw(),
            InputMode::LineEditing => tty.enter_saved(),
        }
    }

    /// Mirror the child's death: restore the terminal, then exit with the
    /// child's status or die by the child's signal.
    fn conclude(&mut self, status: WaitStatus) -> ! {
        if let Some(tty) = &mut self.tty {
            tty.restore();
        }
        match status {
            WaitStatus::Exited(_, code) => {
                info!("child exited with status {}", code);
                process::exit(code);
            }
            WaitStatus::Signaled(_, signal, _) => {
                info!("child killed by {:?}", signal);
                signals::reset_dispositions();
                let _ = raise(signal);
                process::exit(128 + signal as i32);
            }
            other => {
                error!("unexpected wait status {:?}", other);
                process::exit(1);
            }
        }
    }
}

fn open_console() -> io::Result<Box<dyn ConsoleQueue>> {
    #[cfg(any(windows, target_os = "cygwin"))]
    {
        Ok(Box::new(crate::console::Win32Console::open()?))
    }
    #[cfg(not(any(windows, target_os = "cygwin")))]
    {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "this build has no console input backend",
        ))
    }
}

fn native_layout() -> Box<dyn KeyboardLayout> {
    #[cfg(any(windows, target_os = "cygwin"))]
    {
        Box::new(crate::console::NativeKeyboard)
    }
    #[cfg(not(any(windows, target_os = "cygwin")))]
    {
        Box::new(crate::core::keys::UsKeyboard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_exit_code_mapping() {
        use nix::sys::signal::Signal;
        assert_eq!(128 + Signal::SIGTERM as i32, 143);
        assert_eq!(128 + Signal::SIGINT as i32, 130);
        assert_eq!(128 + Signal::SIGQUIT as i32, 131);
    }

    #[test]
    fn test_setup_error_names_the_failing_step() {
        let err = SetupError::Console(io::Error::new(io::ErrorKind::Unsupported, "no console"));
        assert_eq!(
            err.to_string(),
            "Failed to open console input buffer: no console"
        );
        let err = SetupError::Spawn(io::Error::new(io::ErrorKind::NotFound, "missing"));
        assert_eq!(err.to_string(), "Failed to create child process: missing");
    }
}
