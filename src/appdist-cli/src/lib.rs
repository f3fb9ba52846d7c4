//! Appdist CLI library.
//!
//! Hosts one update controller per process:
//! - `cli/` - argument parsing and command dispatch
//! - `host` - console collaborators (browser, prompt, installer)
//! - `logging` - tracing subscriber setup

pub mod cli;
pub mod host;
pub mod logging;
