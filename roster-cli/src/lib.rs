//! Roster synchronization engine and CLI
//!
//! Imports spreadsheet rows into a remote roster store, edits and deletes
//! records, and keeps a cached snapshot in sync by refetching after every
//! settled mutation.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod roster;

pub use error::{ParseError, RemoteError, Result, RosterError};
