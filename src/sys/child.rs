//! Child process setup
//!
//! The child runs with its output and error streams merged onto one pipe
//! back to the bridge, while its input comes straight from the host
//! console's input queue via the console input device. The bridge never
//! sits between the child and its input; it only feeds the queue.

use std::ffi::CString;
use std::io;
use std::os::fd::OwnedFd;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};

use nix::unistd::pipe;

/// A spawned child and the read side of its merged output pipe.
pub struct ChildProcess {
    child: Child,
}

impl ChildProcess {
    pub fn pid(&self) -> i32 {
        self.child.id() as i32
    }
}

/// Create the pipe carrying the child's stdout and stderr.
pub fn output_pipe() -> io::Result<(OwnedFd, OwnedFd)> {
    let (read_end, write_end) = pipe()?;
    Ok((read_end, write_end))
}

/// Spawn the child with both output streams on `pipe_write` and its input
/// reopened from the console input device.
pub fn spawn(
    command: &str,
    args: &[String],
    console_input: &str,
    pipe_write: OwnedFd,
) -> io::Result<ChildProcess> {
    let device = CString::new(console_input)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "console input path"))?;
    let stderr_end = pipe_write.try_clone()?;

    let child = unsafe {
        Command::new(command)
            .args(args)
            .stdout(Stdio::from(pipe_write))
            .stderr(Stdio::from(stderr_end))
            .pre_exec(move || {
                if libc::setsid() == -1 {
                    return Err(io::Error::last_os_error());
                }
                attach_console();
                // Reopen fd 0 from the console input device so the child
                // reads the queue the bridge writes to.
                libc::close(0);
                if libc::open(device.as_ptr(), libc::O_RDONLY) != 0 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            })
            .spawn()?
    };

    Ok(ChildProcess { child })
}

/// Join the console of the bridge's own parent, which the inherited input
/// buffer handle belongs to.
#[cfg(target_os = "cygwin")]
fn attach_console() {
    use windows::Win32::System::Console::{AttachConsole, ATTACH_PARENT_PROCESS};
    let _ = unsafe { AttachConsole(ATTACH_PARENT_PROCESS) };
}

#[cfg(not(target_os = "cygwin"))]
fn attach_console() {}
