//! Command dispatch and handlers.

use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use appdist_login::AuthorizationCallback;
use appdist_storage::{AppdistPaths, FileStore};
use appdist_update::{
    Collaborators, DecisionRequest, DownloadMarker, HttpDownloadEngine, HttpReleaseChecker,
    ReleaseDetails, STATE_SCOPE, UpdateConfig, UpdateController, WorkflowPhase,
};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::args::{Cli, Commands, RunCommand};
use crate::host::ConsoleHost;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Dispatch the parsed command.
pub async fn dispatch_command(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let paths = resolve_paths(&cli)?;

    match cli.command {
        Commands::Run(cmd) => run_cycle(&config, &paths, &cmd, None).await,
        Commands::Callback(cmd) => {
            let callback = AuthorizationCallback::parse(&cmd.link)
                .context("Callback link must carry update_token and request_id")?;
            run_cycle(&config, &paths, &cmd.run, Some(callback)).await
        }
        Commands::Reset => {
            let session = Session::open(&config, &paths)?;
            session.controller.reset();
            session.controller.drain_removals().await;
            session.controller.shutdown();
            println!("Update state cleared.");
            Ok(())
        }
        Commands::Status => {
            let session = Session::open(&config, &paths)?;
            print_status(&session.controller, &paths);
            Ok(())
        }
        Commands::Config => {
            let mut shown = config.clone();
            if !shown.app_secret.is_empty() {
                shown.app_secret = "********".to_string();
            }
            println!("{}", serde_json::to_string_pretty(&shown)?);
            Ok(())
        }
    }
}

fn load_config(cli: &Cli) -> Result<UpdateConfig> {
    let config = match &cli.config {
        Some(path) => UpdateConfig::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => UpdateConfig::load(),
    };
    Ok(config.with_env_overrides())
}

fn resolve_paths(cli: &Cli) -> Result<AppdistPaths> {
    let paths = match &cli.state_dir {
        Some(dir) => AppdistPaths::from_root(dir.clone()),
        None => AppdistPaths::new().context("Cannot determine the appdist data directory")?,
    };
    paths.ensure_dirs()?;
    Ok(paths)
}

/// A controller wired to the console, file store and HTTP collaborators.
struct Session {
    controller: UpdateController,
    decisions: mpsc::UnboundedReceiver<DecisionRequest>,
}

impl Session {
    fn open(config: &UpdateConfig, paths: &AppdistPaths) -> Result<Self> {
        let store = Arc::new(FileStore::open(paths.state_file(STATE_SCOPE))?);

        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let download_dir = config
            .download_dir
            .clone()
            .unwrap_or_else(|| paths.downloads_dir.clone());
        let engine = Arc::new(HttpDownloadEngine::new(&download_dir, completions_tx)?);

        let checker = Arc::new(HttpReleaseChecker::new(config)?);

        let (decisions_tx, decisions) = mpsc::unbounded_channel();
        let host = Arc::new(ConsoleHost::new(decisions_tx, config.install_command.clone()));

        let controller = UpdateController::new(
            config.clone(),
            Collaborators {
                store,
                checker,
                engine,
                host,
            },
        )?;
        controller.forward_completions(completions_rx);

        Ok(Self {
            controller,
            decisions,
        })
    }
}

async fn run_cycle(
    config: &UpdateConfig,
    paths: &AppdistPaths,
    cmd: &RunCommand,
    callback: Option<AuthorizationCallback>,
) -> Result<()> {
    config.validate()?;
    let mut session = Session::open(config, paths)?;
    let controller = session.controller.clone();

    reconcile_download(&controller).await;

    if let Some(callback) = callback {
        controller.authorization_callback(callback);
    }
    controller.launcher_restarted();
    controller.start();
    controller.enter_foreground();

    let deadline = tokio::time::sleep(Duration::from_secs(cmd.timeout));
    tokio::pin!(deadline);
    let mut ticker = tokio::time::interval(POLL_INTERVAL);

    loop {
        tokio::select! {
            Some(request) = session.decisions.recv() => answer(&controller, request, cmd.yes).await?,
            _ = ticker.tick() => match controller.phase() {
                WorkflowPhase::Completed => {
                    println!("Update cycle completed.");
                    break;
                }
                WorkflowPhase::AuthorizationPending => {
                    println!("Finish signing in, then run `appdist callback <link>` with the link you are redirected to.");
                    break;
                }
                WorkflowPhase::Idle => {
                    println!("Nothing to do: the update service is disabled or the browser could not be opened.");
                    break;
                }
                phase => debug!(%phase, "Waiting"),
            },
            _ = &mut deadline => {
                warn!(timeout_secs = cmd.timeout, "Gave up waiting for the update cycle");
                break;
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    controller.drain_removals().await;
    controller.shutdown();
    Ok(())
}

/// Downloads run inside the process that scheduled them. A download still
/// marked in flight belongs to an earlier process and is reported finished
/// so the controller inspects, and discards, it.
async fn reconcile_download(controller: &UpdateController) {
    let snapshot = controller.snapshot();
    let (DownloadMarker::InFlight, Some(id)) = (snapshot.download_marker, snapshot.download_id) else {
        return;
    };
    debug!(download_id = %id, "Reconciling download left by a previous run");
    controller.download_completed(id);
    for _ in 0..25 {
        if controller.phase() != WorkflowPhase::DownloadInFlight {
            break;
        }
        tokio::time::sleep(POLL_INTERVAL / 4).await;
    }
}

async fn answer(controller: &UpdateController, request: DecisionRequest, yes: bool) -> Result<()> {
    let accepted = if yes {
        true
    } else {
        let release = request.release.clone();
        tokio::task::spawn_blocking(move || prompt(&release))
            .await
            .context("Prompt task failed")??
    };

    if accepted {
        println!("Downloading {}...", request.release.display_version());
        controller.accept(request.ticket);
    } else {
        controller.decline(request.ticket);
    }
    Ok(())
}

fn prompt(release: &ReleaseDetails) -> Result<bool> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "Update available: {}", release.display_version())?;
    if let Some(notes) = &release.release_notes {
        writeln!(stdout, "\n{notes}\n")?;
    }
    write!(stdout, "Download and install now? [y/N] ")?;
    stdout.flush()?;

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn print_status(controller: &UpdateController, paths: &AppdistPaths) {
    let snapshot = controller.snapshot();
    println!("State file:       {}", paths.state_file(STATE_SCOPE).display());
    println!("Phase:            {}", snapshot.phase);
    println!("Enabled:          {}", snapshot.enabled);
    println!("Authorized:       {}", snapshot.has_update_token);
    println!("Login pending:    {}", snapshot.pending_request_id);
    match snapshot.download_id {
        Some(id) => println!("Download id:      {id}"),
        None => println!("Download id:      none"),
    }
    let download = match &snapshot.download_marker {
        DownloadMarker::NoDownload => "none".to_string(),
        DownloadMarker::InFlight => "in progress".to_string(),
        DownloadMarker::ReadyAt(location) => format!("ready at {location}"),
    };
    println!("Download:         {download}");
}
