//! Error types for the roster engine
//!
//! Library code returns these typed errors; the CLI layer wraps them in
//! `anyhow` with command-specific context.

use std::time::Duration;

use thiserror::Error;

use crate::api::models::RecordId;

/// Failure to turn spreadsheet bytes into records
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The bytes are not a workbook container the decoder recognizes
    #[error("not a recognizable spreadsheet: {0}")]
    UnrecognizedContainer(String),

    /// The workbook decoded but holds no sheets at all
    #[error("workbook contains no sheets")]
    NoSheets,

    /// The first sheet exists but could not be read
    #[error("failed to read sheet '{sheet}': {message}")]
    Sheet { sheet: String, message: String },

    /// The first sheet has zero rows, so there is no header
    #[error("sheet '{0}' has no header row")]
    MissingHeader(String),
}

/// Failure of a single call against the remote roster store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// Connection, DNS, TLS or body streaming failure
    #[error("request failed: {0}")]
    Transport(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Non-2xx response
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    /// 2xx response whose body does not have the expected shape
    #[error("invalid response payload: {0}")]
    InvalidPayload(String),
}

impl RemoteError {
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            RemoteError::Timeout(timeout)
        } else {
            RemoteError::Transport(err.to_string())
        }
    }

    /// HTTP status code, if the server answered at all
    pub fn status_code(&self) -> Option<u16> {
        match self {
            RemoteError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Any failure surfaced by the roster engine
#[derive(Debug, Error)]
pub enum RosterError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("no record is open for editing")]
    NoOpenRecord,

    #[error("record '{id}' has no editable field '{field}'")]
    UnknownField { id: RecordId, field: String },

    #[error("record '{0}' is not in the current roster")]
    UnknownRecord(RecordId),

    #[error("no records selected")]
    EmptySelection,

    #[error("roster cache worker has stopped")]
    CacheClosed,
}

pub type Result<T, E = RosterError> = std::result::Result<T, E>;
