//! Text command surface
//!
//! Parsing of prefixed chat messages and their execution against the lobby
//! manager.

pub mod dispatcher;
pub mod parser;

pub use dispatcher::{CommandContext, CommandDispatcher, DispatcherSettings};
pub use parser::{parse, Command};
