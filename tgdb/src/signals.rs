/// Signal-handler to event-loop bridge: a classic self-pipe plus atomic
/// flags, since nothing in `tgdb` may allocate or take locks from
/// signal-handler context.
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::unistd::{close, pipe, read, write};

use crate::error::CoreError;

static CONTROL_C: AtomicBool = AtomicBool::new(false);
static HAS_SIGCHLD: AtomicBool = AtomicBool::new(false);
static HAS_SIGTERM: AtomicBool = AtomicBool::new(false);
static HAS_SIGQUIT: AtomicBool = AtomicBool::new(false);
static SELF_PIPE_WRITE: AtomicI32 = AtomicI32::new(-1);

extern "C" fn on_sigint(_: nix::libc::c_int) {
    CONTROL_C.store(true, Ordering::SeqCst);
    wake_self_pipe();
}

extern "C" fn on_sigchld(_: nix::libc::c_int) {
    HAS_SIGCHLD.store(true, Ordering::SeqCst);
    wake_self_pipe();
}

extern "C" fn on_sigterm(_: nix::libc::c_int) {
    HAS_SIGTERM.store(true, Ordering::SeqCst);
    wake_self_pipe();
}

extern "C" fn on_sigquit(_: nix::libc::c_int) {
    HAS_SIGQUIT.store(true, Ordering::SeqCst);
    wake_self_pipe();
}

fn wake_self_pipe() {
    let fd = SELF_PIPE_WRITE.load(Ordering::SeqCst);
    if fd >= 0 {
        let _ = write(fd, &[0u8]);
    }
}

/// Holds the read end of the self-pipe the event loop polls alongside
/// the gdb and inferior fds.
pub struct SignalPipe {
    read_fd: RawFd,
    write_fd: RawFd,
}

impl SignalPipe {
    /// Installs `SIGINT`/`SIGCHLD`/`SIGTERM`/`SIGQUIT` handlers process-wide
    /// and opens the self-pipe. Only one `SignalPipe` should exist per
    /// process; tests construct a fresh `Core` but share the global
    /// handlers, since the flags they set are atomics rather than
    /// per-instance state.
    pub fn install() -> Result<Self, CoreError> {
        let (read_fd, write_fd) = pipe().map_err(CoreError::Signal)?;
        SELF_PIPE_WRITE.store(write_fd, Ordering::SeqCst);

        let flags = SaFlags::SA_RESTART;
        unsafe {
            signal::sigaction(
                Signal::SIGINT,
                &SigAction::new(SigHandler::Handler(on_sigint), flags, SigSet::empty()),
            )
            .map_err(CoreError::Signal)?;
            signal::sigaction(
                Signal::SIGCHLD,
                &SigAction::new(SigHandler::Handler(on_sigchld), flags, SigSet::empty()),
            )
            .map_err(CoreError::Signal)?;
            signal::sigaction(
                Signal::SIGTERM,
                &SigAction::new(SigHandler::Handler(on_sigterm), flags, SigSet::empty()),
            )
            .map_err(CoreError::Signal)?;
            signal::sigaction(
                Signal::SIGQUIT,
                &SigAction::new(SigHandler::Handler(on_sigquit), flags, SigSet::empty()),
            )
            .map_err(CoreError::Signal)?;
        }

        Ok(Self { read_fd, write_fd })
    }

    pub fn read_fd(&self) -> RawFd {
        self.read_fd
    }

    /// Drains every byte currently queued in the self-pipe. Called once
    /// the event loop observes the pipe is readable.
    pub fn drain(&self) {
        let mut buf = [0u8; 64];
        loop {
            match read(self.read_fd, &mut buf) {
                Ok(n) if n > 0 => continue,
                _ => break,
            }
        }
    }

    pub fn take_control_c(&self) -> bool {
        CONTROL_C.swap(false, Ordering::SeqCst)
    }

    pub fn take_sigchld(&self) -> bool {
        HAS_SIGCHLD.swap(false, Ordering::SeqCst)
    }

    pub fn take_sigterm(&self) -> bool {
        HAS_SIGTERM.swap(false, Ordering::SeqCst)
    }

    pub fn take_sigquit(&self) -> bool {
        HAS_SIGQUIT.swap(false, Ordering::SeqCst)
    }
}

impl Drop for SignalPipe {
    fn drop(&mut self) {
        SELF_PIPE_WRITE.store(-1, Ordering::SeqCst);
        let _ = close(self.read_fd);
        let _ = close(self.write_fd);
    }
}
