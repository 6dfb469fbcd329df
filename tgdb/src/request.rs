/// Request data model: the tagged requests a UI submits to the core, and
/// the breakpoint/file-position types they carry.
use serde::{Deserialize, Serialize};

/// A location given either as a `file:line` pair or a raw address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    File { file: String, line: u32 },
    Address(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakpointAction {
    Add,
    TBreak,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebuggerCommandKind {
    Continue,
    Next,
    Step,
    Finish,
    Start,
    Run,
    Kill,
    Until,
    Up,
    Down,
}

impl DebuggerCommandKind {
    /// The bare gdb console command this maps to.
    pub fn console_text(self) -> &'static str {
        match self {
            DebuggerCommandKind::Continue => "continue",
            DebuggerCommandKind::Next => "next",
            DebuggerCommandKind::Step => "step",
            DebuggerCommandKind::Finish => "finish",
            DebuggerCommandKind::Start => "start",
            DebuggerCommandKind::Run => "run",
            DebuggerCommandKind::Kill => "kill",
            DebuggerCommandKind::Until => "until",
            DebuggerCommandKind::Up => "up",
            DebuggerCommandKind::Down => "down",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisassembleMode {
    Plain,
    Source,
    Raw,
}

/// Tagged request submitted by the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    ConsoleCommand { text: String, queued: bool },
    InfoSources,
    CurrentLocation,
    DebuggerCommand { kind: DebuggerCommandKind },
    ModifyBreakpoint { location: Location, action: BreakpointAction },
    Complete { line: String },
    DisassemblePC { lines: u32 },
    DisassembleFunc { mode: DisassembleMode },
}

/// An internally-issued MI query, never exposed on the UI submission
/// surface but scheduled the same way a `Request` is, with out-of-band
/// priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalQuery {
    InfoBreakpoints,
    InfoSources,
    InfoSource,
    InfoFrame,
    Complete,
    DisassemblePc,
    DisassembleFunc,
    DisassembleModeProbe,
    InferiorTtySet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Delete,
    DeleteNextStop,
    Disable,
    Keep,
    Unknown,
}

/// A gdb breakpoint. Multi-location parent/child links are represented
/// as breakpoint-number back-references rather than raw indices or
/// `Rc`/`RefCell` pointers, which keeps the type `Send`+serializable for
/// delivery across the response callback boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breakpoint {
    pub number: String,
    pub breakpoint_type: Option<String>,
    pub catch_type: Option<String>,
    pub disposition: Disposition,
    pub enabled: bool,
    pub address: Option<String>,
    pub func_name: Option<String>,
    pub file: Option<String>,
    pub fullname: Option<String>,
    pub line: Option<u32>,
    pub hit_count: u32,
    pub original_location: Option<String>,
    pub multi: bool,
    pub from_multi: bool,
    pub children: Vec<String>,
    pub parent: Option<String>,
}

impl serde::Serialize for Disposition {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let name = match self {
            Disposition::Delete => "delete",
            Disposition::DeleteNextStop => "delete_next_stop",
            Disposition::Disable => "disable",
            Disposition::Keep => "keep",
            Disposition::Unknown => "unknown",
        };
        s.serialize_str(name)
    }
}

impl<'de> serde::Deserialize<'de> for Disposition {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Ok(match s.as_str() {
            "delete" => Disposition::Delete,
            "delete_next_stop" => Disposition::DeleteNextStop,
            "disable" => Disposition::Disable,
            "keep" => Disposition::Keep,
            _ => Disposition::Unknown,
        })
    }
}

/// A source/address location. Exactly one of `path`/`address` is
/// meaningful in practice, but both fields are always present (address
/// `0` and empty path both read as "unknown") to avoid an `Option`-typed
/// address that every caller would have to re-justify.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilePosition {
    pub path: Option<String>,
    pub line: u32,
    pub address: u64,
    pub from_shared_library: Option<String>,
    pub func: Option<String>,
}
