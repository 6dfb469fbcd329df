/// Response data model, delivered to the UI via
/// `UiCallbacks::command_response`.
use crate::request::{Breakpoint, FilePosition};

#[derive(Debug, Clone, PartialEq)]
pub struct DisassembleResult {
    pub start_addr: u64,
    pub end_addr: u64,
    pub error: bool,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    UpdateBreakpoints(Vec<Breakpoint>),
    UpdateFilePosition(FilePosition),
    UpdateSourceFiles(Vec<String>),
    UpdateCompletions(Vec<String>),
    DisassembleFunc(DisassembleResult),
    DisassemblePC(DisassembleResult),
    UpdateConsolePrompt(String),
    DebuggerCommandDelivered { text: String, user_initiated: bool },
    InferiorExited { status: i32 },
    Quit { exit_status: i32, return_value: i32 },
}
