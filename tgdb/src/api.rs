/// Request/Response API and event-loop glue. `Core` is the single context
/// object that owns the scheduler, the correlator, the gdb process, the
/// inferior tty, and the signal pipe, and is the only thing every entry
/// point takes `&mut self` on. The event loop is driven synchronously with
/// `nix::poll` rather than async/await, since the state machine it drives
/// has no cooperative yield points of its own.
use std::os::unix::io::RawFd;
use std::path::PathBuf;

use nix::poll::{PollFd, PollFlags, PollTimeout};

use crate::annotation::AnnotationScanner;
use crate::correlator::Correlator;
use crate::error::CoreError;
use crate::logger::FileLogger;
use crate::pty::{GdbProcess, InferiorTty};
use crate::request::{BreakpointAction, DisassembleMode, InternalQuery, Location, Request};
use crate::response::Response;
use crate::scheduler::{CommandOrigin, ScheduledCommand, Scheduler};
use crate::signals::SignalPipe;

/// The four UI-facing callbacks, modeled as a struct-of-closures. A trait
/// object would work equally well; closures are used here since `tgdb-cli`
/// has no need for dynamic swapping of UI implementations at runtime.
pub struct UiCallbacks {
    pub console_output: Box<dyn FnMut(&str)>,
    pub console_ready: Box<dyn FnMut()>,
    pub request_sent: Box<dyn FnMut(&Request, &str)>,
    pub command_response: Box<dyn FnMut(Response)>,
}

impl UiCallbacks {
    pub fn new() -> Self {
        Self {
            console_output: Box::new(|_| {}),
            console_ready: Box::new(|| {}),
            request_sent: Box::new(|_, _| {}),
            command_response: Box::new(|_| {}),
        }
    }
}

impl Default for UiCallbacks {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a `Request` participates in the `console_ready()` firing rule:
/// it only fires after requests that affect the console (ConsoleCommand,
/// Complete, DebuggerCommand).
fn affects_console(req: &Request) -> bool {
    matches!(
        req,
        Request::ConsoleCommand { .. } | Request::Complete { .. } | Request::DebuggerCommand { .. }
    )
}

/// Renders a `Request` to the exact bytes written to gdb's stdin. Every
/// variant except `ConsoleCommand` is prefixed with `server ` so it never
/// enters gdb's command history.
fn render_request(req: &Request, disassemble_supports_s: bool) -> (String, Option<InternalQuery>) {
    match req {
        Request::ConsoleCommand { text, .. } => (format!("{text}\n"), None),
        Request::DebuggerCommand { kind } => (format!("{}\n", kind.console_text()), None),
        Request::ModifyBreakpoint { location, action } => {
            let verb = match action {
                BreakpointAction::Add => "break",
                BreakpointAction::TBreak => "tbreak",
                BreakpointAction::Delete => "clear",
            };
            let target = match location {
                Location::File { file, line } => format!("\"{file}\":{line}"),
                Location::Address(addr) => format!("*{addr}"),
            };
            (format!("{verb} {target}\n"), None)
        }
        Request::InfoSources => (
            "server interpreter-exec mi \"-file-list-exec-source-files\"\n".to_string(),
            Some(InternalQuery::InfoSources),
        ),
        Request::CurrentLocation => (
            "server interpreter-exec mi \"-stack-info-frame\"\n".to_string(),
            Some(InternalQuery::InfoFrame),
        ),
        Request::Complete { line } => (
            format!("server interpreter-exec mi \"complete {line}\"\n"),
            Some(InternalQuery::Complete),
        ),
        Request::DisassemblePC { lines } => (
            format!("server interpreter-exec mi \"x/{lines}i $pc\"\n"),
            Some(InternalQuery::DisassemblePc),
        ),
        Request::DisassembleFunc { mode } => {
            let flag = match mode {
                DisassembleMode::Raw => "/r",
                DisassembleMode::Plain => "",
                DisassembleMode::Source => {
                    if disassemble_supports_s {
                        "/s"
                    } else {
                        ""
                    }
                }
            };
            let cmd = if flag.is_empty() {
                "disassemble".to_string()
            } else {
                format!("disassemble {flag}")
            };
            (
                format!("server interpreter-exec mi \"{cmd}\"\n"),
                Some(InternalQuery::DisassembleFunc),
            )
        }
    }
}

fn render_internal_query(query: InternalQuery, inferior_tty_slave: &str) -> String {
    match query {
        InternalQuery::InfoBreakpoints => "server interpreter-exec mi \"-break-info\"\n".to_string(),
        InternalQuery::InfoSources => {
            "server interpreter-exec mi \"-file-list-exec-source-files\"\n".to_string()
        }
        InternalQuery::InfoSource => {
            "server interpreter-exec mi \"-file-list-exec-source-file\"\n".to_string()
        }
        InternalQuery::InfoFrame => "server interpreter-exec mi \"-stack-info-frame\"\n".to_string(),
        InternalQuery::Complete => "server interpreter-exec mi \"complete\"\n".to_string(),
        InternalQuery::DisassemblePc => "server interpreter-exec mi \"x/1i $pc\"\n".to_string(),
        InternalQuery::DisassembleFunc => "server interpreter-exec mi \"disassemble\"\n".to_string(),
        InternalQuery::DisassembleModeProbe => {
            "server interpreter-exec mi \"-data-disassemble -s 0 -e 0 -- 4\"\n".to_string()
        }
        InternalQuery::InferiorTtySet => {
            format!("server interpreter-exec mi \"-inferior-tty-set {inferior_tty_slave}\"\n")
        }
    }
}

const READ_CHUNK: usize = 4096;

/// The debugger-control core. Owns the gdb child, its scheduler and
/// correlator, the inferior tty, the signal bridge, and the UI callbacks;
/// every public method takes `&mut self`, so tests construct a fresh
/// context per test.
pub struct Core {
    gdb: GdbProcess,
    scanner: AnnotationScanner,
    correlator: Correlator,
    scheduler: Scheduler,
    signals: SignalPipe,
    inferior_tty: Option<InferiorTty>,
    callbacks: UiCallbacks,
    read_buf: [u8; READ_CHUNK],
    gdb_alive: bool,
    pending_console_ready: bool,
}

impl Core {
    /// Spawns gdb under a pty with the required init file, installs the
    /// signal bridge, and wires up the given callbacks.
    pub fn create(
        debugger_path: &str,
        argv: &[String],
        config_dir: PathBuf,
        callbacks: UiCallbacks,
    ) -> Result<Self, CoreError> {
        std::fs::create_dir_all(&config_dir).map_err(CoreError::Io)?;
        log::info!("starting gdb child: {debugger_path} {argv:?}");
        let gdb = GdbProcess::create(debugger_path, argv, &config_dir)?;
        let signals = SignalPipe::install()?;
        let mut core = Self {
            gdb,
            scanner: AnnotationScanner::new(),
            correlator: Correlator::new(),
            scheduler: Scheduler::new(),
            signals,
            inferior_tty: None,
            callbacks,
            read_buf: [0u8; READ_CHUNK],
            gdb_alive: true,
            pending_console_ready: false,
        };
        // Probe once, up front, whether this gdb's `-data-disassemble`
        // supports `/s` mode, so the first `DisassembleFunc{Source}`
        // request already knows whether to fall back to plain
        // `disassemble` (spec.md §4.3/§8 S6; SPEC_FULL §C.6 caches this
        // for the session rather than re-probing per request).
        core.dispatch_internal_query(InternalQuery::DisassembleModeProbe);
        Ok(core)
    }

    /// Allocates a fresh inferior pty and enqueues the `-inferior-tty-set`
    /// MI command as a priority request so gdb attaches to it before the
    /// next user command runs.
    pub fn tty_new(&mut self) -> Result<(), CoreError> {
        let tty = InferiorTty::new().map_err(CoreError::Pty)?;
        log::debug!("allocated inferior tty: {}", tty.slave_name());
        self.inferior_tty = Some(tty);
        self.dispatch_internal_query(InternalQuery::InferiorTtySet);
        Ok(())
    }

    pub fn inferior_tty_fd(&self) -> Option<RawFd> {
        self.inferior_tty.as_ref().map(InferiorTty::master_fd)
    }

    /// Writes a single byte to the inferior's stdin.
    pub fn send_inferior_char(&self, byte: u8) -> std::io::Result<()> {
        match &self.inferior_tty {
            Some(tty) => tty.send_char(byte),
            None => Ok(()),
        }
    }

    /// Submits a request, delivering it synchronously when the scheduler
    /// is idle or enqueuing it otherwise.
    pub fn submit(&mut self, req: Request) {
        let queued_flag = matches!(&req, Request::ConsoleCommand { queued: true, .. });
        let (rendered, query) = render_request(&req, self.correlator.disassemble_supports_s());
        let priority = matches!(req, Request::Complete { .. });
        let console_affecting = affects_console(&req);
        let cmd = ScheduledCommand {
            rendered,
            origin: CommandOrigin::UserConsole,
            query,
            source_request: Some(req),
            console_affecting,
        };

        if queued_flag {
            self.scheduler.enqueue(cmd, priority);
            return;
        }

        if let Some(ready_cmd) = self.scheduler.submit(cmd, priority) {
            self.deliver(ready_cmd);
        }
    }

    fn dispatch_internal_query(&mut self, query: InternalQuery) {
        let slave = self
            .inferior_tty
            .as_ref()
            .map(InferiorTty::slave_name)
            .unwrap_or("")
            .to_string();
        let rendered = render_internal_query(query, &slave);
        let cmd = ScheduledCommand {
            rendered,
            origin: CommandOrigin::Internal,
            query: Some(query),
            source_request: None,
            console_affecting: false,
        };
        if let Some(ready_cmd) = self.scheduler.submit(cmd, true) {
            self.deliver(ready_cmd);
        }
    }

    /// Delivers `cmd`, whether it arrived here synchronously from `submit`/
    /// `dispatch_internal_query` or was just popped off a FIFO by
    /// `try_dispatch_queued` -- either way `cmd` carries its own `query`/
    /// `source_request`/`console_affecting`, so both paths set correlator
    /// state and fire callbacks identically (spec §4.5).
    fn deliver(&mut self, cmd: ScheduledCommand) {
        if self.correlator.misc_prompt_active() && self.scheduler.discard_if_internal_at_misc_prompt(&cmd) {
            log::debug!("discarding internal command at misc prompt: {}", cmd.rendered.trim_end());
            return;
        }

        if let Err(e) = self.gdb.write_all(cmd.rendered.as_bytes()) {
            log::error!("failed writing to gdb stdin: {e}");
            return;
        }
        self.scheduler.note_delivered();
        self.correlator.begin_command(cmd.origin, cmd.query);

        if let Some(req) = &cmd.source_request {
            (self.callbacks.request_sent)(req, &cmd.rendered);
        }
        if !matches!(cmd.source_request, Some(Request::ConsoleCommand { .. })) {
            let user_initiated = matches!(cmd.origin, CommandOrigin::UserConsole);
            (self.callbacks.command_response)(Response::DebuggerCommandDelivered {
                text: cmd.rendered.clone(),
                user_initiated,
            });
        }

        self.pending_console_ready = cmd.console_affecting;
    }

    /// Delivers a self-pipe-notified `signum`: SIGINT forwards VINTR and
    /// clears queues, SIGTERM/SIGQUIT forward directly to the child,
    /// SIGCHLD triggers a reap attempt.
    pub fn signal_notification(&mut self, signum: nix::sys::signal::Signal) {
        use nix::sys::signal::Signal;
        match signum {
            Signal::SIGINT => self.handle_sigint(),
            Signal::SIGCHLD => self.handle_sigchld(),
            Signal::SIGTERM | Signal::SIGQUIT => {
                let _ = nix::sys::signal::kill(self.gdb.pid(), signum);
            }
            _ => {}
        }
    }

    fn handle_sigint(&mut self) {
        self.scheduler.clear_on_interrupt();
        let intr = self.gdb.intr_char();
        if let Err(e) = self.gdb.write_all(&[intr]) {
            log::error!("failed forwarding SIGINT to gdb: {e}");
        }
    }

    fn handle_sigchld(&mut self) {
        if let Some(status) = self.gdb.try_reap() {
            self.gdb_alive = false;
            (self.callbacks.command_response)(Response::Quit {
                exit_status: status,
                return_value: 0,
            });
        }
    }

    /// Reads one chunk from gdb's pty master and feeds it through the
    /// scanner/correlator, then drains every pending effect. Returns
    /// `false` once gdb's fd has hit EOF.
    pub fn pump_gdb(&mut self) -> bool {
        let n = match self.gdb.read(&mut self.read_buf) {
            Ok(0) => {
                log::warn!("gdb pty eof");
                self.gdb_alive = false;
                (self.callbacks.command_response)(Response::Quit {
                    exit_status: -1,
                    return_value: 0,
                });
                return false;
            }
            Ok(n) => n,
            Err(e) => {
                log::error!("error reading gdb pty: {e}");
                self.gdb_alive = false;
                (self.callbacks.command_response)(Response::Quit {
                    exit_status: -1,
                    return_value: 0,
                });
                return false;
            }
        };

        let chunk = self.read_buf[..n].to_vec();
        self.scanner.feed(&chunk, &mut self.correlator);
        self.drain_correlator();
        true
    }

    fn drain_correlator(&mut self) {
        let console = self.correlator.take_console();
        if !console.is_empty() {
            (self.callbacks.console_output)(&String::from_utf8_lossy(&console));
        }
        for response in self.correlator.take_responses() {
            (self.callbacks.command_response)(response);
        }
        for query in self.correlator.take_queries() {
            self.dispatch_internal_query(query);
        }
        let writes = self.correlator.take_writes();
        if !writes.is_empty() {
            if let Err(e) = self.gdb.write_all(&writes) {
                log::error!("failed writing misc-prompt auto-answer: {e}");
            }
        }
        if self.correlator.take_ready() {
            self.scheduler.mark_ready();
            self.try_dispatch_queued();
            let queues_empty = self.scheduler.normal_len() == 0 && self.scheduler.priority_len() == 0;
            if self.pending_console_ready && self.scheduler.is_ready() && queues_empty {
                (self.callbacks.console_ready)();
                self.pending_console_ready = false;
            }
        }
    }

    fn try_dispatch_queued(&mut self) {
        while let Some(cmd) = self.scheduler.try_dispatch() {
            self.deliver(cmd);
            if !self.scheduler.is_ready() {
                break;
            }
        }
    }

    pub fn gdb_fd(&self) -> RawFd {
        self.gdb.stdout_fd()
    }

    pub fn signal_fd(&self) -> RawFd {
        self.signals.read_fd()
    }

    pub fn is_alive(&self) -> bool {
        self.gdb_alive
    }

    /// Blocks on `nix::poll` over the gdb pty, the inferior pty (if
    /// allocated), the signal self-pipe, and any caller-supplied
    /// `extra_fds` -- `tgdb` owns the first three of those itself and lets
    /// the embedder plug in the rest (e.g. user input, readline) -- then
    /// services whichever single fd became readable. Returns which
    /// `extra_fds` index (if any) was the one that woke the loop, so the
    /// caller can read it itself -- `tgdb` does not know how to interpret
    /// bytes on a caller-owned fd.
    pub fn poll_once(&mut self, extra_fds: &[RawFd]) -> Result<Option<usize>, CoreError> {
        if !self.gdb_alive {
            return Ok(None);
        }

        let gdb_fd = self.gdb_fd();
        let sig_fd = self.signal_fd();
        let inferior_fd = self.inferior_tty_fd();

        let mut fds = vec![
            PollFd::new(unsafe { std::os::fd::BorrowedFd::borrow_raw(gdb_fd) }, PollFlags::POLLIN),
            PollFd::new(unsafe { std::os::fd::BorrowedFd::borrow_raw(sig_fd) }, PollFlags::POLLIN),
        ];
        let inferior_idx = inferior_fd.map(|fd| {
            fds.push(PollFd::new(unsafe { std::os::fd::BorrowedFd::borrow_raw(fd) }, PollFlags::POLLIN));
            fds.len() - 1
        });
        let extra_base = fds.len();
        for &fd in extra_fds {
            fds.push(PollFd::new(unsafe { std::os::fd::BorrowedFd::borrow_raw(fd) }, PollFlags::POLLIN));
        }

        let n = nix::poll::poll(&mut fds, PollTimeout::NONE).map_err(CoreError::Signal)?;
        if n <= 0 {
            return Ok(None);
        }

        if fds[1].revents().unwrap_or_else(PollFlags::empty).contains(PollFlags::POLLIN) {
            self.signals.drain();
            if self.signals.take_control_c() {
                use nix::sys::signal::Signal;
                self.signal_notification(Signal::SIGINT);
            }
            if self.signals.take_sigchld() {
                use nix::sys::signal::Signal;
                self.signal_notification(Signal::SIGCHLD);
            }
            if self.signals.take_sigterm() {
                use nix::sys::signal::Signal;
                self.signal_notification(Signal::SIGTERM);
            }
            if self.signals.take_sigquit() {
                use nix::sys::signal::Signal;
                self.signal_notification(Signal::SIGQUIT);
            }
            return Ok(None);
        }

        if fds[0].revents().unwrap_or_else(PollFlags::empty).contains(PollFlags::POLLIN) {
            self.pump_gdb();
            return Ok(None);
        }

        if let Some(idx) = inferior_idx {
            if fds[idx].revents().unwrap_or_else(PollFlags::empty).contains(PollFlags::POLLIN) {
                // Inferior output bypasses the annotation scanner entirely:
                // the UI reads it directly via `inferior_tty_fd()`, the
                // core only drives the poll loop far enough to notice
                // readiness.
                return Ok(None);
            }
        }

        for (i, pfd) in fds[extra_base..].iter().enumerate() {
            if pfd.revents().unwrap_or_else(PollFlags::empty).contains(PollFlags::POLLIN) {
                return Ok(Some(i));
            }
        }

        Ok(None)
    }

    /// Blocks on the gdb/inferior/signal fds only, servicing whichever
    /// one became readable. Returns `false` once gdb has exited and
    /// there is nothing further to service.
    pub fn run_once(&mut self) -> Result<bool, CoreError> {
        if !self.gdb_alive {
            return Ok(false);
        }
        self.poll_once(&[])?;
        Ok(self.gdb_alive)
    }

    /// Runs `run_once` until gdb exits.
    pub fn run_forever(&mut self) -> Result<(), CoreError> {
        while self.run_once()? {}
        Ok(())
    }
}

/// Installs the process-wide logger, writing file:line-tagged messages to
/// `<config_dir>/tgdb.log` at the given level.
pub fn install_logger(log_path: &std::path::Path, level: log::LevelFilter) -> Result<(), CoreError> {
    let logger = FileLogger::open(log_path, level).map_err(CoreError::Io)?;
    logger.install().map_err(|e| CoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))
}
