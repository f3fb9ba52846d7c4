//! Command-line interface.

mod args;
mod handlers;

pub use args::{CallbackCommand, Cli, Commands, LogLevel, RunCommand};
pub use handlers::dispatch_command;
