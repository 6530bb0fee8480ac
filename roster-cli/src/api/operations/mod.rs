//! Roster store operations
//!
//! Describes the four calls the engine can make against the remote store,
//! independent of the transport that executes them.

pub mod operation;

pub use operation::Operation;
