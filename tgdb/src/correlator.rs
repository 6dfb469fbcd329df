/// Tracks which internally-issued MI query is in flight, drives the gdb
/// prompt-phase state machine, and turns completed MI records into typed
/// `Response`s.
///
/// This module owns no fds: it is driven purely by `AnnotationScanner`
/// callbacks and produces side effects as drainable queues (`take_*`)
/// so `Core` can apply them to the scheduler and pty without the
/// correlator needing to know about either, which keeps it unit
/// testable with plain byte strings.
use crate::annotation::DataSink;
use crate::mi::{self, extract, types::*};
use crate::request::InternalQuery;
use crate::response::{DisassembleResult, Response};
use crate::scheduler::CommandOrigin;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalState {
    Void,
    AtPrompt,
    UserAtPrompt,
    PostPrompt,
    UserCommand,
    GuiCommand,
    InternalCommand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    Void,
    InfoBreakpoints,
    InfoSources,
    InfoSource,
    InfoFrame,
    Complete,
    DisassemblePc,
    DisassembleFunc,
    DataDisassembleModeQuery,
}

impl CommandState {
    fn from_query(query: InternalQuery) -> Self {
        match query {
            InternalQuery::InfoBreakpoints => CommandState::InfoBreakpoints,
            InternalQuery::InfoSources => CommandState::InfoSources,
            InternalQuery::InfoSource => CommandState::InfoSource,
            InternalQuery::InfoFrame => CommandState::InfoFrame,
            InternalQuery::Complete => CommandState::Complete,
            InternalQuery::DisassemblePc => CommandState::DisassemblePc,
            InternalQuery::DisassembleFunc => CommandState::DisassembleFunc,
            InternalQuery::DisassembleModeProbe => CommandState::DataDisassembleModeQuery,
            // `-inferior-tty-set` expects a bare `^done` with no body;
            // it needs no extraction, so it is tracked as Void.
            InternalQuery::InferiorTtySet => CommandState::Void,
        }
    }
}

/// Annotation names that mark the three-phase sequence around a
/// "miscellaneous" gdb sub-prompt (query, overload-choice, instance-choice,
/// commands, prompt-for-continue).
const MISC_PRE: &[&str] = &[
    "pre-commands",
    "pre-overload-choice",
    "pre-instance-choice",
    "pre-query",
    "pre-prompt-for-continue",
];
const MISC_PLAIN: &[&str] = &[
    "commands",
    "overload-choice",
    "instance-choice",
    "query",
    "prompt-for-continue",
];
const MISC_POST: &[&str] = &[
    "post-commands",
    "post-overload-choice",
    "post-instance-choice",
    "post-query",
    "post-prompt-for-continue",
];

pub struct Correlator {
    internal_state: InternalState,
    command_state: CommandState,
    current_origin: CommandOrigin,

    prompt_last: Option<String>,
    prompt_buf: Vec<u8>,

    mi_line_buf: Vec<u8>,
    error_buf: Vec<u8>,
    collecting_error: bool,

    misc_prompt: bool,
    request_source_location: bool,
    request_breakpoints: bool,

    disasm_acc: Option<extract::DisassemblyAccumulator>,
    disassemble_supports_s: bool,

    pending_console: Vec<u8>,
    pending_responses: Vec<Response>,
    pending_queries: Vec<InternalQuery>,
    pending_writes: Vec<u8>,
    ready_to_mark: bool,
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

impl Correlator {
    pub fn new() -> Self {
        Self {
            internal_state: InternalState::Void,
            command_state: CommandState::Void,
            current_origin: CommandOrigin::UserConsole,
            prompt_last: None,
            prompt_buf: Vec::new(),
            mi_line_buf: Vec::new(),
            error_buf: Vec::new(),
            collecting_error: false,
            misc_prompt: false,
            request_source_location: false,
            request_breakpoints: false,
            disasm_acc: None,
            disassemble_supports_s: false,
            pending_console: Vec::new(),
            pending_responses: Vec::new(),
            pending_queries: Vec::new(),
            pending_writes: Vec::new(),
            ready_to_mark: false,
        }
    }

    pub fn internal_state(&self) -> InternalState {
        self.internal_state
    }

    pub fn command_state(&self) -> CommandState {
        self.command_state
    }

    pub fn disassemble_supports_s(&self) -> bool {
        self.disassemble_supports_s
    }

    /// Whether the correlator currently sits at a miscellaneous sub-prompt:
    /// set at the plain `query`/`overload-choice`/etc. annotation, cleared
    /// at the matching `post-*` annotation.
    pub fn misc_prompt_active(&self) -> bool {
        self.misc_prompt
    }

    /// Called by `Core` exactly when bytes have actually been written to
    /// gdb's stdin for a delivered command: sets `CommandState` to the
    /// class of that command and `InternalState` to `internal_command`.
    /// Plain console/debugger/breakpoint commands carry no MI query
    /// (`query: None`): their bytes still read as ordinary console prose,
    /// so `InternalState` becomes `user_command` or `gui_command` rather
    /// than `internal_command`, and `CommandState` stays `void` since
    /// none of the tracked command classes apply to them.
    pub fn begin_command(&mut self, origin: CommandOrigin, query: Option<InternalQuery>) {
        self.current_origin = origin;
        self.command_state = query.map(CommandState::from_query).unwrap_or(CommandState::Void);
        self.internal_state = match (origin, query) {
            (CommandOrigin::Internal, Some(_)) => InternalState::InternalCommand,
            (CommandOrigin::Internal, None) => InternalState::GuiCommand,
            (CommandOrigin::UserConsole, _) => InternalState::UserCommand,
        };
        self.mi_line_buf.clear();
        self.disasm_acc = match query {
            Some(InternalQuery::DisassemblePc) | Some(InternalQuery::DisassembleFunc) => {
                Some(extract::DisassemblyAccumulator::default())
            }
            _ => None,
        };
    }

    pub fn take_console(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.pending_console)
    }

    pub fn take_responses(&mut self) -> Vec<Response> {
        std::mem::take(&mut self.pending_responses)
    }

    /// Priority MI queries the correlator wants enqueued (the
    /// pre-prompt `-break-info`/`-stack-info-frame` triggers, and the
    /// `-file-list-exec-source-file` fallback), drained by `Core` and
    /// submitted to the scheduler with `priority = true`.
    pub fn take_queries(&mut self) -> Vec<InternalQuery> {
        std::mem::take(&mut self.pending_queries)
    }

    /// Raw bytes the correlator wants written directly to gdb's stdin
    /// (the misc-prompt bare-newline auto-answer), bypassing the
    /// scheduler entirely since it is not a queued command.
    pub fn take_writes(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.pending_writes)
    }

    /// Whether a `prompt` or plain misc-prompt annotation was seen since
    /// the last drain; `Core` calls `Scheduler::mark_ready` when true.
    pub fn take_ready(&mut self) -> bool {
        std::mem::replace(&mut self.ready_to_mark, false)
    }

    fn route(&self) -> Route {
        if self.collecting_error {
            return Route::Error;
        }
        match self.internal_state {
            InternalState::AtPrompt => Route::Prompt,
            InternalState::InternalCommand => Route::Mi,
            _ => Route::Console,
        }
    }

    fn flush_error(&mut self) {
        if !self.error_buf.is_empty() {
            self.pending_console.append(&mut self.error_buf);
        }
    }

    fn handle_mi_line(&mut self) {
        let line = String::from_utf8_lossy(&self.mi_line_buf).into_owned();
        self.mi_line_buf.clear();
        if line.trim().is_empty() {
            return;
        }
        match mi::parse_line(&line) {
            Ok(Record::Result(result)) => self.handle_result(result),
            Ok(Record::Stream(stream)) if stream.stream_type == StreamType::Console => {
                if self.disasm_acc.is_some() {
                    if let Some(acc) = self.disasm_acc.as_mut() {
                        acc.push_line(&stream.content);
                    }
                }
            }
            Ok(Record::Stream(_)) | Ok(Record::Async(_)) | Ok(Record::Prompt) => {
                // Target/log streams and async exec/status/notify records
                // carry nothing this core's UI surface needs.
                log::trace!("ignored mid-command MI record: {line}");
            }
            Err(e) => {
                log::debug!("MI parse error on '{line}': {e}");
            }
        }
    }

    fn handle_result(&mut self, result: ResultRecord) {
        let is_error = result.class == ResultClass::Error;
        match self.command_state {
            CommandState::InfoBreakpoints => {
                if !is_error {
                    if let Some(body) = result
                        .results
                        .get("BreakpointTable")
                        .and_then(Value::as_tuple)
                        .and_then(|t| t.get("body"))
                    {
                        let bps = extract::breakpoints_from_table(body);
                        self.pending_responses.push(Response::UpdateBreakpoints(bps));
                    }
                }
            }
            CommandState::InfoSources => {
                if !is_error {
                    if let Some(list) = result.results.get("files") {
                        let files = extract::source_files_from_list(list);
                        self.pending_responses.push(Response::UpdateSourceFiles(files));
                    }
                }
            }
            CommandState::InfoSource => {
                if !is_error {
                    let pos = extract::file_position_from_source_file(&result.results);
                    self.pending_responses.push(Response::UpdateFilePosition(pos));
                }
            }
            CommandState::InfoFrame => {
                if is_error {
                    self.pending_queries.push(InternalQuery::InfoSource);
                } else if let Some(frame) = result.results.get("frame").and_then(Value::as_tuple) {
                    let pos = extract::file_position_from_frame(frame);
                    if pos.path.is_none() {
                        // fall back to -file-list-exec-source-file when the
                        // frame result lacks source info.
                        self.pending_queries.push(InternalQuery::InfoSource);
                    } else {
                        self.pending_responses.push(Response::UpdateFilePosition(pos));
                    }
                }
            }
            CommandState::Complete => {
                if !is_error {
                    if let Some(list) = result.results.get("matches") {
                        let completions = extract::completions_from_list(list);
                        self.pending_responses.push(Response::UpdateCompletions(completions));
                    }
                }
            }
            CommandState::DisassemblePc | CommandState::DisassembleFunc => {
                let acc = self.disasm_acc.take().unwrap_or_default();
                let result_value = DisassembleResult {
                    start_addr: acc.min_addr.unwrap_or(0),
                    end_addr: acc.max_addr.unwrap_or(0),
                    error: is_error,
                    lines: acc.lines,
                };
                let response = if self.command_state == CommandState::DisassemblePc {
                    Response::DisassemblePC(result_value)
                } else {
                    Response::DisassembleFunc(result_value)
                };
                self.pending_responses.push(response);
            }
            CommandState::DataDisassembleModeQuery => {
                // a `^done` (even an empty `asm_insns=[]`) means `/s` mode
                // is supported; an `^error` leaves the cached flag false.
                // No UI-facing response either way.
                self.disassemble_supports_s = !is_error;
            }
            CommandState::Void => {}
        }
        // The result record ends this command's MI routing; the
        // correlator stops feeding the MI parser even though the
        // CommandState (and the scheduler's ready flag) only clear at
        // the following `prompt` annotation.
        self.internal_state = InternalState::Void;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Console,
    Prompt,
    Mi,
    Error,
}

impl DataSink for Correlator {
    fn on_data_byte(&mut self, byte: u8) {
        match self.route() {
            Route::Console => self.pending_console.push(byte),
            Route::Prompt => self.prompt_buf.push(byte),
            Route::Error => self.error_buf.push(byte),
            Route::Mi => {
                self.mi_line_buf.push(byte);
                if byte == b'\n' {
                    self.handle_mi_line();
                }
            }
        }
    }

    fn on_annotation(&mut self, name: &str) {
        if MISC_PRE.contains(&name) {
            if self.current_origin == CommandOrigin::Internal {
                self.pending_writes.push(b'\n');
            } else {
                self.internal_state = InternalState::UserAtPrompt;
            }
            return;
        }
        if MISC_PLAIN.contains(&name) {
            self.misc_prompt = true;
            self.ready_to_mark = true;
            return;
        }
        if MISC_POST.contains(&name) {
            self.misc_prompt = false;
            self.internal_state = InternalState::Void;
            return;
        }

        match name {
            "source" | "frame-end" | "frames-invalid" => {
                self.request_source_location = true;
            }
            "breakpoints-invalid" => {
                self.request_breakpoints = true;
            }
            "pre-prompt" => {
                if self.request_breakpoints {
                    self.pending_queries.push(InternalQuery::InfoBreakpoints);
                    self.request_breakpoints = false;
                }
                if self.request_source_location {
                    self.pending_queries.push(InternalQuery::InfoFrame);
                    self.request_source_location = false;
                }
                self.internal_state = InternalState::AtPrompt;
                self.prompt_buf.clear();
            }
            "prompt" => {
                self.internal_state = InternalState::UserAtPrompt;
                self.ready_to_mark = true;
                self.command_state = CommandState::Void;
                let text = String::from_utf8_lossy(&self.prompt_buf).into_owned();
                self.prompt_buf.clear();
                if self.prompt_last.as_deref() != Some(text.as_str()) {
                    self.pending_responses.push(Response::UpdateConsolePrompt(text.clone()));
                    self.prompt_last = Some(text);
                }
            }
            "post-prompt" => {
                self.internal_state = InternalState::Void;
            }
            "error-begin" => {
                self.internal_state = InternalState::Void;
                self.collecting_error = true;
                self.error_buf.clear();
            }
            "error" => {
                self.flush_error();
                self.collecting_error = false;
            }
            "quit" => {
                self.flush_error();
                self.collecting_error = false;
                self.internal_state = InternalState::Void;
            }
            other if other.starts_with("exited") => {
                let status = other
                    .strip_prefix("exited")
                    .map(str::trim)
                    .and_then(|s| s.parse::<i32>().ok())
                    .unwrap_or(0);
                self.pending_responses.push(Response::InferiorExited { status });
            }
            other => {
                log::debug!("unhandled annotation: {other}");
            }
        }
    }
}
