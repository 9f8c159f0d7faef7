//! Directory watcher: starts tail tasks for files created after startup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use logsend_core::{Group, ReadMode};

use crate::assign::{absolute, assign_files};
use crate::error::TailError;
use crate::tail::{Completion, TaskOrigin};

/// The directories among `roots` (file roots are not watched).
pub fn watch_dirs(roots: &[PathBuf]) -> Result<Vec<PathBuf>, TailError> {
    let mut dirs = Vec::new();
    for root in roots {
        let root = absolute(root)?;
        if root.is_dir() && !dirs.contains(&root) {
            dirs.push(root);
        }
    }
    Ok(dirs)
}

/// A non-recursive watch on one directory.
pub struct DirectoryWatcher {
    dir: PathBuf,
    _watcher: RecommendedWatcher,
    events: mpsc::UnboundedReceiver<notify::Result<Event>>,
}

impl DirectoryWatcher {
    /// Install the watch. Failure here is a startup error.
    pub fn install(dir: &Path) -> Result<Self, TailError> {
        let (event_tx, events) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let mut watcher = recommended_watcher(move |event| {
            let _ = event_tx.send(event);
        })?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        tracing::info!(path = %dir.display(), "watching directory for new files");
        Ok(Self {
            dir: dir.to_path_buf(),
            _watcher: watcher,
            events,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Handle create events until the watch is dropped. Each new regular
    /// file is assigned against `groups` and tailed with origin
    /// [`TaskOrigin::Watcher`], in the mode given by [`new_file_mode`].
    /// Other event kinds (modify, remove, access) are ignored.
    pub async fn run(
        mut self,
        groups: Vec<Arc<Group>>,
        mode: ReadMode,
        done: mpsc::UnboundedSender<Completion>,
    ) {
        let mode = new_file_mode(mode);
        while let Some(event) = self.events.recv().await {
            let event = match event {
                Ok(event) => event,
                Err(err) => {
                    tracing::warn!(dir = %self.dir.display(), error = %err, "watcher event error");
                    continue;
                }
            };
            if !matches!(event.kind, EventKind::Create(_)) {
                continue;
            }
            for path in event.paths {
                let path = if path.is_absolute() {
                    path
                } else {
                    self.dir.join(path)
                };
                match tokio::fs::metadata(&path).await {
                    Ok(meta) if meta.is_file() => {}
                    Ok(_) => continue,
                    Err(err) => {
                        tracing::debug!(path = %path.display(), error = %err, "created path not readable");
                        continue;
                    }
                }
                start_tasks(path, &groups, mode, &done).await;
            }
        }
    }

    pub fn spawn(
        self,
        groups: Vec<Arc<Group>>,
        mode: ReadMode,
        done: mpsc::UnboundedSender<Completion>,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(groups, mode, done))
    }
}

/// Read mode for a file that appeared after startup.
///
/// Everything in such a file was written after the run began, so
/// following from the end becomes following from the start; otherwise the
/// lines written between creation and open would be lost.
pub fn new_file_mode(mode: ReadMode) -> ReadMode {
    match mode {
        ReadMode::FollowFromEnd => ReadMode::WholeFollow,
        other => other,
    }
}

async fn start_tasks(
    path: PathBuf,
    groups: &[Arc<Group>],
    mode: ReadMode,
    done: &mpsc::UnboundedSender<Completion>,
) {
    match assign_files(std::slice::from_ref(&path), groups, mode, TaskOrigin::Watcher).await {
        Ok(tasks) if tasks.is_empty() => {
            tracing::debug!(path = %path.display(), "new file matches no group");
        }
        Ok(tasks) => {
            tracing::info!(path = %path.display(), tasks = tasks.len(), "new file detected");
            for task in tasks {
                task.spawn(done.clone());
            }
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "cannot tail new file");
        }
    }
}
