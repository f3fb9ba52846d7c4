//! CLI argument structures and parsing.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Log verbosity level for CLI output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    /// Only show errors
    Error,
    /// Show warnings and errors (default)
    #[default]
    Warn,
    /// Show informational messages, warnings, and errors
    Info,
    /// Show workflow progress
    Debug,
    /// Show everything
    Trace,
}

impl LogLevel {
    /// Convert to tracing filter string.
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Check, download and install updates for an appdist-distributed application.
#[derive(Debug, Parser)]
#[command(name = "appdist", version, about)]
pub struct Cli {
    /// Path to the update configuration file
    #[arg(long, global = true, env = "APPDIST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding persisted update state
    #[arg(long, global = true, env = "APPDIST_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Log verbosity (overridden by RUST_LOG)
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::default())]
    pub log_level: LogLevel,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run one update cycle in the foreground
    Run(RunCommand),
    /// Deliver the login callback returned by the browser
    Callback(CallbackCommand),
    /// Forget the cached authorization and abandon the current cycle
    Reset,
    /// Show the persisted update state
    Status,
    /// Print the effective configuration
    Config,
}

#[derive(Debug, Clone, Default, Args)]
pub struct RunCommand {
    /// Accept the update without prompting
    #[arg(short, long)]
    pub yes: bool,

    /// Give up waiting after this many seconds
    #[arg(long, default_value_t = 600)]
    pub timeout: u64,
}

#[derive(Debug, Clone, Args)]
pub struct CallbackCommand {
    /// Deep link or query string carrying update_token and request_id
    pub link: String,

    #[command(flatten)]
    pub run: RunCommand,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::try_parse_from([
            "appdist",
            "status",
            "--state-dir",
            "/tmp/appdist",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Status));
        assert_eq!(cli.state_dir, Some(PathBuf::from("/tmp/appdist")));
        assert_eq!(cli.log_level, LogLevel::Debug);
    }

    #[test]
    fn test_parse_callback() {
        let cli = Cli::try_parse_from([
            "appdist",
            "callback",
            "appdist://updates?update_token=t&request_id=r",
            "--yes",
        ])
        .unwrap();
        let Commands::Callback(cmd) = cli.command else {
            panic!("expected callback");
        };
        assert!(cmd.run.yes);
        assert_eq!(cmd.run.timeout, 600);
    }
}
