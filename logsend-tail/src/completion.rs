//! Decides when a read-once run may end.

use std::future::Future;

use tokio::sync::mpsc;

use crate::tail::{Completion, TaskOrigin};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// Read-once mode and every initial task has finished.
    AllFinished,
    /// Every sender of the completion channel is gone.
    ChannelClosed,
    /// The shutdown signal fired first.
    Interrupted,
}

/// Counts down the tasks of the initial discovery pass.
///
/// Tasks started by the directory watcher report on the same channel but
/// are never counted, so they cannot hold the run open.
pub struct CompletionCoordinator {
    remaining: usize,
    read_once: bool,
    rx: mpsc::UnboundedReceiver<Completion>,
}

impl CompletionCoordinator {
    pub fn new(initial: usize, read_once: bool, rx: mpsc::UnboundedReceiver<Completion>) -> Self {
        Self {
            remaining: initial,
            read_once,
            rx,
        }
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Wait for the run to end: all initial tasks done (read-once only),
    /// the channel closing, or `shutdown` resolving.
    pub async fn wait<F>(mut self, shutdown: F) -> CompletionOutcome
    where
        F: Future<Output = ()>,
    {
        if self.read_once && self.remaining == 0 {
            tracing::info!("no files to read");
            return CompletionOutcome::AllFinished;
        }
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => return CompletionOutcome::Interrupted,
                msg = self.rx.recv() => {
                    let Some(done) = msg else {
                        return CompletionOutcome::ChannelClosed;
                    };
                    if done.origin == TaskOrigin::Watcher {
                        tracing::debug!(path = %done.path.display(), "watched file finished");
                        continue;
                    }
                    self.remaining = self.remaining.saturating_sub(1);
                    tracing::debug!(
                        path = %done.path.display(),
                        remaining = self.remaining,
                        "initial file finished",
                    );
                    if self.remaining == 0 && self.read_once {
                        tracing::info!(path = %done.path.display(), "finished reading all files");
                        return CompletionOutcome::AllFinished;
                    }
                }
            }
        }
    }
}
