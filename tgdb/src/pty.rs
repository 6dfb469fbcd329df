/// PTY process supervision for the gdb child, plus the inferior's
/// separate tty. The child's stdin/stdout/stderr are all the *same* pty
/// slave fd (gdb is run without `--interpreter=mi`, so its console output
/// and MI replies to `server interpreter-exec mi "..."` commands share one
/// stream) -- something `std::process::Command`'s separate-pipe stdio
/// plumbing cannot express, which is why this module forks directly.
use std::ffi::CString;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;

use nix::fcntl::{open, OFlag};
use nix::libc::TIOCSCTTY;
use nix::pty::{grantpt, posix_openpt, ptsname_r, unlockpt, PtyMaster};
use nix::sys::stat::Mode;
use nix::sys::termios::{self, LocalFlags, SetArg};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{close, dup2, execvp, fork, pipe, read, setsid, write, ForkResult, Pid};

use crate::error::PtyError;

/// Opens a fresh master/slave pty pair and returns the master plus the
/// slave's device path, the way `Master::open`/`grant_slave_access`/
/// `unlock_slave`/`get_slave_name` do in the ptyprocess reference.
fn open_pty_pair() -> Result<(PtyMaster, String), PtyError> {
    let master = posix_openpt(OFlag::O_RDWR | OFlag::O_NOCTTY)?;
    grantpt(&master)?;
    unlockpt(&master)?;
    let slave_name = ptsname_r(&master)?;
    Ok((master, slave_name))
}

/// Child-side setup run after `fork`: make the pty slave this process's
/// controlling terminal, wire it to fd 0/1/2, disable echo, and drop the
/// session so `setsid()` detaches from any inherited controlling tty
/// first.
fn child_attach_to_slave(slave_name: &str) -> nix::Result<()> {
    setsid()?;

    let slave_fd = open(slave_name, OFlag::O_RDWR, Mode::empty())?;

    unsafe {
        if nix::libc::ioctl(slave_fd, TIOCSCTTY as u64, 0) != 0 {
            return Err(nix::Error::last());
        }
    }

    let mut attrs = termios::tcgetattr(slave_fd)?;
    attrs.local_flags &= !LocalFlags::ECHO;
    termios::tcsetattr(slave_fd, SetArg::TCSANOW, &attrs)?;

    dup2(slave_fd, 0)?;
    dup2(slave_fd, 1)?;
    dup2(slave_fd, 2)?;
    if slave_fd > 2 {
        close(slave_fd)?;
    }

    Ok(())
}

fn to_cstrings(args: &[String]) -> Vec<CString> {
    args.iter()
        .map(|s| CString::new(s.as_str()).unwrap_or_else(|_| CString::new("").unwrap()))
        .collect()
}

/// A gdb child process attached to its own pty, plus bookkeeping for
/// `pid`, `stdin_fd`/`stdout_fd` being the same master fd, and an
/// inferior tty slot.
pub struct GdbProcess {
    master: PtyMaster,
    child_pid: Pid,
    reaped: bool,
}

impl GdbProcess {
    /// Writes the init file, opens a pty pair, forks, and execs
    /// `<debugger_path> --nw --annotate=2 -x <init-file> <argv...>` in
    /// the child with the slave as its controlling tty.
    pub fn create(debugger_path: &str, argv: &[String], config_dir: &Path) -> Result<Self, PtyError> {
        let init_file = crate::config::write_init_file(config_dir).map_err(PtyError::Io)?;
        let (master, slave_name) = open_pty_pair()?;

        let mut full_args = vec![
            debugger_path.to_string(),
            "--nw".to_string(),
            "--annotate=2".to_string(),
            "-x".to_string(),
            init_file.to_string_lossy().into_owned(),
        ];
        full_args.extend(argv.iter().cloned());
        let exec_path = CString::new(debugger_path).map_err(|_| {
            PtyError::SpawnFailed(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "debugger path contains a NUL byte",
            ))
        })?;
        let exec_args = to_cstrings(&full_args);

        let (err_read, err_write) = pipe().map_err(PtyError::ForkFailed)?;

        // SAFETY: the child performs only async-signal-safe operations
        // (setsid, open, ioctl, dup2, close, execvp) or terminates via
        // process::exit before returning to any Rust-level unwind path.
        match unsafe { fork() }.map_err(PtyError::ForkFailed)? {
            ForkResult::Child => {
                let _ = close(err_read);
                drop(master);

                let result = child_attach_to_slave(&slave_name)
                    .and_then(|()| execvp(&exec_path, &exec_args).map(|_| ()));

                let errno = match result {
                    Ok(()) => 0,
                    Err(e) => e as i32,
                };
                let _ = write(err_write, &errno.to_be_bytes());
                let _ = close(err_write);
                std::process::exit(127);
            }
            ForkResult::Parent { child } => {
                let _ = close(err_write);
                let mut buf = [0u8; 4];
                let n = read(err_read, &mut buf).unwrap_or(0);
                let _ = close(err_read);

                if n == 4 {
                    let errno = i32::from_be_bytes(buf);
                    if errno != 0 {
                        let _ = waitpid(child, None);
                        return Err(PtyError::SpawnFailed(std::io::Error::from_raw_os_error(errno)));
                    }
                }

                Ok(Self {
                    master,
                    child_pid: child,
                    reaped: false,
                })
            }
        }
    }

    pub fn pid(&self) -> Pid {
        self.child_pid
    }

    /// gdb's stdin and stdout are the same pty master fd.
    pub fn stdin_fd(&self) -> RawFd {
        self.master.as_raw_fd()
    }

    pub fn stdout_fd(&self) -> RawFd {
        self.master.as_raw_fd()
    }

    /// Writes raw bytes to gdb's stdin via the pty master.
    pub fn write_all(&self, mut bytes: &[u8]) -> std::io::Result<()> {
        while !bytes.is_empty() {
            let n = write(self.master.as_raw_fd(), bytes)
                .map_err(|e| std::io::Error::from_raw_os_error(e as i32))?;
            bytes = &bytes[n..];
        }
        Ok(())
    }

    /// Reads whatever is currently available from gdb's stdout via the
    /// pty master. Returns `Ok(0)` on EOF.
    pub fn read(&self, buf: &mut [u8]) -> std::io::Result<usize> {
        read(self.master.as_raw_fd(), buf).map_err(|e| std::io::Error::from_raw_os_error(e as i32))
    }

    /// The terminal's interrupt character (normally `^C`), used to
    /// forward SIGINT by writing VINTR to gdb's stdin rather than
    /// signalling the process directly.
    pub fn intr_char(&self) -> u8 {
        termios::tcgetattr(self.master.as_raw_fd())
            .map(|attrs| attrs.control_chars[termios::SpecialCharacterIndices::VINTR as usize])
            .unwrap_or(0x03)
    }

    /// Non-blocking reap of the child: `Some(exit_status)` once the
    /// child has exited, `None` while still running.
    pub fn try_reap(&mut self) -> Option<i32> {
        if self.reaped {
            return None;
        }
        match waitpid(self.child_pid, Some(nix::sys::wait::WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::Exited(_, status)) => {
                self.reaped = true;
                Some(status)
            }
            Ok(WaitStatus::Signaled(_, signal, _)) => {
                self.reaped = true;
                Some(128 + signal as i32)
            }
            _ => None,
        }
    }
}

impl Drop for GdbProcess {
    /// Closes fds and awaits the child on destruction. The master fd
    /// closes when `PtyMaster` drops; the child is awaited with a
    /// blocking `waitpid` unless SIGCHLD handling already reaped it.
    fn drop(&mut self) {
        if !self.reaped {
            let _ = waitpid(self.child_pid, None);
        }
    }
}

/// The inferior's own pty: keeps the debugged program's I/O off the
/// gdb-annotation stream entirely. Carries no child of its own -- gdb
/// itself opens the slave once `-inferior-tty-set` runs.
pub struct InferiorTty {
    master: PtyMaster,
    slave_name: String,
}

impl InferiorTty {
    pub fn new() -> Result<Self, PtyError> {
        let (master, slave_name) = open_pty_pair()?;
        Ok(Self { master, slave_name })
    }

    /// The slave device path to hand gdb via `-inferior-tty-set`.
    pub fn slave_name(&self) -> &str {
        &self.slave_name
    }

    pub fn master_fd(&self) -> RawFd {
        self.master.as_raw_fd()
    }

    /// A byte typed by the user destined for the debugged program's
    /// stdin.
    pub fn send_char(&self, byte: u8) -> std::io::Result<()> {
        write(self.master.as_raw_fd(), &[byte])
            .map(|_| ())
            .map_err(|e| std::io::Error::from_raw_os_error(e as i32))
    }

    pub fn read(&self, buf: &mut [u8]) -> std::io::Result<usize> {
        read(self.master.as_raw_fd(), buf).map_err(|e| std::io::Error::from_raw_os_error(e as i32))
    }
}
