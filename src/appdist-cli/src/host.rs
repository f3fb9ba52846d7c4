//! Console implementation of the update host.
//!
//! Decisions are forwarded to the command loop, which prompts on stdin;
//! everything else happens in place.

use std::path::Path;
use std::process::{Command, Stdio};

use appdist_update::{ArtifactRef, DecisionRequest, UpdateError, UpdateHost, UpdateResult};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

/// Placeholder replaced by the package path in the install command.
pub const PACKAGE_PLACEHOLDER: &str = "{}";

pub struct ConsoleHost {
    decisions: mpsc::UnboundedSender<DecisionRequest>,
    install_command: Option<String>,
}

impl ConsoleHost {
    pub fn new(decisions: mpsc::UnboundedSender<DecisionRequest>, install_command: Option<String>) -> Self {
        Self {
            decisions,
            install_command,
        }
    }
}

impl UpdateHost for ConsoleHost {
    fn open_login(&self, url: &Url) -> UpdateResult<()> {
        eprintln!("Sign in to enable updates: {url}");
        open_with_system(url.as_str()).map_err(|e| UpdateError::BrowserUnavailable {
            message: e.to_string(),
        })
    }

    fn present_decision(&self, request: &DecisionRequest) {
        if self.decisions.send(request.clone()).is_err() {
            debug!(ticket = %request.ticket, "Nobody is answering decisions");
        }
    }

    fn begin_install(&self, artifact: &ArtifactRef) -> UpdateResult<()> {
        let path = artifact.to_file_path().ok_or_else(|| UpdateError::InstallFailed {
            message: format!("{artifact} is not a local file"),
        })?;
        info!(path = %path.display(), "Installing update");

        match &self.install_command {
            Some(template) => run_install_command(template, &path),
            None => open_with_system(&path.to_string_lossy()).map_err(|e| UpdateError::InstallFailed {
                message: e.to_string(),
            }),
        }
    }

    fn present_deferred_notification(&self, artifact: &ArtifactRef) {
        eprintln!("Update downloaded to {artifact}; it will be installed on the next run.");
    }
}

/// Split `template` on whitespace and substitute the package path.
pub fn install_argv(template: &str, package: &Path) -> Vec<String> {
    let package = package.to_string_lossy();
    let mut argv: Vec<String> = template
        .split_whitespace()
        .map(|arg| arg.replace(PACKAGE_PLACEHOLDER, &package))
        .collect();
    if !template.contains(PACKAGE_PLACEHOLDER) {
        argv.push(package.into_owned());
    }
    argv
}

/// Start the installer without waiting for it; its exit status is logged
/// from a reaper thread.
fn run_install_command(template: &str, package: &Path) -> UpdateResult<()> {
    let argv = install_argv(template, package);
    let Some((program, args)) = argv.split_first() else {
        return Err(UpdateError::InstallFailed {
            message: "install command is empty".to_string(),
        });
    };

    let mut child = Command::new(program)
        .args(args)
        .spawn()
        .map_err(|e| UpdateError::InstallFailed {
            message: format!("failed to run {program}: {e}"),
        })?;
    debug!(program = %program, pid = child.id(), "Installer started");

    let name = program.clone();
    std::thread::Builder::new()
        .name("appdist-installer".to_string())
        .spawn(move || match child.wait() {
            Ok(status) if status.success() => info!(program = %name, "Installer finished"),
            Ok(status) => warn!(program = %name, %status, "Installer exited with failure"),
            Err(e) => warn!(program = %name, error = %e, "Lost track of installer"),
        })
        .map_err(|e| UpdateError::InstallFailed {
            message: format!("failed to watch {program}: {e}"),
        })?;
    Ok(())
}

/// Open a URL or file with the platform's default handler.
fn open_with_system(target: &str) -> std::io::Result<()> {
    #[cfg(target_os = "macos")]
    let mut command = {
        let mut command = Command::new("open");
        command.arg("--").arg(target);
        command
    };

    #[cfg(target_os = "windows")]
    let mut command = {
        let mut command = Command::new("cmd");
        command.args(["/C", "start", "", target]);
        command
    };

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let mut command = {
        let mut command = Command::new("xdg-open");
        command.arg(target);
        command
    };

    command
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
}
