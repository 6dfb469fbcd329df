/// GDB/MI value and record types, trimmed to the record shapes this core
/// actually consumes rather than a full parser for every record type.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One line of MI output, classified by leading sigil.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Result(ResultRecord),
    Async(AsyncRecord),
    Stream(StreamRecord),
    /// `(gdb)` / `(gdb) ` with no other content.
    Prompt,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    /// The leading decimal token, when the line correlates to a
    /// core-issued command.
    pub token: Option<u32>,
    pub class: ResultClass,
    pub results: HashMap<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultClass {
    Done,
    Running,
    Connected,
    Error,
    Exit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AsyncRecord {
    pub token: Option<u32>,
    pub kind: AsyncKind,
    pub class: String,
    pub results: HashMap<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncKind {
    /// `*` — exec state changes (running/stopped).
    Exec,
    /// `+` — status (progress) records.
    Status,
    /// `=` — notify records (breakpoint/thread/library changes).
    Notify,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamRecord {
    pub stream_type: StreamType,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamType {
    /// `~` console stream: this is the user-visible text the UI renders.
    Console,
    /// `@` target stream: output of the program being debugged, emitted
    /// over MI rather than the inferior tty (rare with `-inferior-tty-set`
    /// in effect, but still valid framing).
    Target,
    /// `&` log stream: echo of what was sent plus internal gdb chatter.
    Log,
}

/// GDB/MI value grammar: cstring | tuple | list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Tuple(HashMap<String, Value>),
    List(Vec<Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Tuple(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<Value>> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// MI often represents a heterogeneous list as either `List` (plain
    /// `[v, v]`) or a single bare `Tuple`/`String` when gdb would
    /// otherwise emit a one-element list without brackets. Callers that
    /// expect a list of tuples should go through this helper.
    pub fn as_items(&self) -> Vec<&Value> {
        match self {
            Value::List(l) => l.iter().collect(),
            other => vec![other],
        }
    }
}
