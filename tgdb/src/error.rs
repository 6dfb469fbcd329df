//! Error types for each layer of the core, one variant family per module.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PtyError {
    #[error("failed to open pty: {0}")]
    OpenFailed(#[source] std::io::Error),
    #[error("failed to spawn gdb: {0}")]
    SpawnFailed(#[source] std::io::Error),
    #[error("fork failed: {0}")]
    ForkFailed(#[source] nix::Error),
    #[error("child setup failed: {0}")]
    ChildSetupFailed(#[source] nix::Error),
    #[error("pty io error: {0}")]
    Io(#[source] std::io::Error),
    #[error("pty syscall failed: {0}")]
    Nix(#[from] nix::Error),
}

#[derive(Error, Debug)]
pub enum MiError {
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unterminated {0}")]
    UnterminatedCompound(&'static str),
    #[error("expected '=' after key '{0}'")]
    ExpectedEquals(String),
    #[error("empty identifier")]
    EmptyIdentifier,
    #[error("unrecognized result class '{0}'")]
    UnknownResultClass(String),
    #[error("unrecognized async class '{0}'")]
    UnknownAsyncClass(String),
    #[error("line did not match any known record shape: {0:?}")]
    Unrecognized(String),
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Pty(#[from] PtyError),
    #[error("the gdb child has already terminated")]
    ChildGone,
    #[error("i/o error communicating with gdb: {0}")]
    Io(#[from] std::io::Error),
    #[error("signal setup failed: {0}")]
    Signal(#[source] nix::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
