//! Watch mode: discover, assign and tail files until the run ends.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;

use logsend_core::{load_config_file, RunSettings, SenderRegistry};

use crate::assign::{assign_files, discover_files};
use crate::completion::{CompletionCoordinator, CompletionOutcome};
use crate::error::{io_err, TailError};
use crate::tail::{Completion, TaskOrigin};
use crate::watcher::{watch_dirs, DirectoryWatcher};

/// How long queued records may take to reach their senders at the end of a run.
pub const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub paths: Vec<PathBuf>,
    pub config: PathBuf,
    pub settings: RunSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchReport {
    pub files: usize,
    pub tasks: usize,
    pub outcome: CompletionOutcome,
    /// Senders whose queues were not drained within [`FLUSH_TIMEOUT`].
    pub unflushed: Vec<String>,
}

/// Build the multi-threaded runtime, optionally capping its worker count.
pub fn build_runtime(worker_threads: Option<usize>) -> Result<tokio::runtime::Runtime, TailError> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    if let Some(workers) = worker_threads.filter(|n| *n > 0) {
        builder.worker_threads(workers);
    }
    builder.enable_all().build().map_err(|e| io_err("tokio-runtime", e))
}

/// Resolves on ctrl-c. If the handler cannot be installed it never resolves.
pub async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received ctrl-c, shutting down"),
        Err(err) => {
            tracing::error!(error = %err, "ctrl-c handler failed");
            std::future::pending::<()>().await;
        }
    }
}

/// [`run_watch_until`] with ctrl-c as the shutdown signal.
pub async fn run_watch(
    options: WatchOptions,
    registry: SenderRegistry,
) -> Result<WatchReport, TailError> {
    run_watch_until(options, registry, shutdown_signal()).await
}

/// Load the configuration, tail every assigned file, and wait for the
/// completion coordinator. Queued records are flushed before returning.
pub async fn run_watch_until<F>(
    options: WatchOptions,
    mut registry: SenderRegistry,
    shutdown: F,
) -> Result<WatchReport, TailError>
where
    F: Future<Output = ()>,
{
    let settings = options.settings;
    let table = load_config_file(&options.config, &mut registry, &settings)?;
    let groups = table.into_groups();
    let mode = settings.read_mode();

    let files = discover_files(&options.paths)?;
    let tasks = assign_files(&files, &groups, mode, TaskOrigin::Initial).await?;
    tracing::info!(
        files = files.len(),
        tasks = tasks.len(),
        mode = %mode,
        dry_run = settings.dry_run,
        "files assigned",
    );

    let (done_tx, done_rx) = mpsc::unbounded_channel::<Completion>();
    let coordinator = CompletionCoordinator::new(tasks.len(), settings.read_once, done_rx);

    let mut watchers = Vec::new();
    if settings.continue_watch {
        for dir in watch_dirs(&options.paths)? {
            watchers.push(DirectoryWatcher::install(&dir)?);
        }
    }
    let watcher_handles: Vec<_> = watchers
        .into_iter()
        .map(|watcher| watcher.spawn(groups.clone(), mode, done_tx.clone()))
        .collect();

    let task_count = tasks.len();
    for task in tasks {
        task.spawn(done_tx.clone());
    }
    drop(done_tx);

    let outcome = coordinator.wait(shutdown).await;
    for handle in &watcher_handles {
        handle.abort();
    }
    tracing::info!(?outcome, "tailing finished");

    let unflushed = registry.flush(FLUSH_TIMEOUT).await;
    Ok(WatchReport {
        files: files.len(),
        tasks: task_count,
        outcome,
        unflushed,
    })
}
