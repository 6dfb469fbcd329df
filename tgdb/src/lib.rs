//! Debugger-control core for a curses gdb front-end: a pty-attached
//! `gdb --annotate=2` child, demultiplexed into console text, annotations,
//! and GDB/MI records, scheduled through a priority-aware queue and
//! surfaced to a UI as typed requests/responses.

pub mod annotation;
pub mod api;
pub mod buffer;
pub mod config;
pub mod correlator;
pub mod error;
pub mod logger;
pub mod mi;
pub mod pty;
pub mod request;
pub mod response;
pub mod scheduler;
pub mod signals;

pub use api::{install_logger, Core, UiCallbacks};
pub use error::{CoreError, MiError, PtyError, Result};
pub use request::{
    Breakpoint, BreakpointAction, DebuggerCommandKind, DisassembleMode, Disposition, FilePosition,
    Location, Request,
};
pub use response::{DisassembleResult, Response};
