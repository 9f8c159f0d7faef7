//! Per-file tailing.
//!
//! A [`TailSource`] yields the lines of one file in order. In follow mode it
//! polls for growth every [`POLL_INTERVAL`], keeps an unterminated trailing
//! line until its newline arrives, and reopens the path from offset 0 when
//! the file is replaced (inode change) or truncated below the read offset.
//!
//! A [`TailTask`] drives one source through the rules of one group and
//! reports a [`Completion`] when the source ends.

use std::collections::VecDeque;
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use logsend_core::{route_line, Group, ReadMode};

pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

const READ_CHUNK: usize = 8 * 1024;

/// Whether a task came from the initial discovery pass or from the watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOrigin {
    Initial,
    Watcher,
}

/// Sent by a tail task when its source has ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub path: PathBuf,
    pub origin: TaskOrigin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileId {
    dev: u64,
    ino: u64,
}

#[cfg(unix)]
fn file_id(meta: &std::fs::Metadata) -> Option<FileId> {
    use std::os::unix::fs::MetadataExt;
    Some(FileId {
        dev: meta.dev(),
        ino: meta.ino(),
    })
}

#[cfg(not(unix))]
fn file_id(_meta: &std::fs::Metadata) -> Option<FileId> {
    None
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

// ---------------------------------------------------------------------------
// TailSource
// ---------------------------------------------------------------------------

pub struct TailSource {
    path: PathBuf,
    file: File,
    mode: ReadMode,
    offset: u64,
    id: Option<FileId>,
    chunk: Vec<u8>,
    partial: Vec<u8>,
    ready: VecDeque<String>,
    poll: Duration,
    missing: bool,
}

impl TailSource {
    /// Open `path`, positioned at its current end for
    /// [`ReadMode::FollowFromEnd`] and at offset 0 otherwise.
    pub async fn open(path: &Path, mode: ReadMode) -> io::Result<Self> {
        let mut file = File::open(path).await?;
        let meta = file.metadata().await?;
        let offset = if mode.starts_at_end() {
            file.seek(SeekFrom::End(0)).await?
        } else {
            0
        };
        Ok(Self {
            path: path.to_path_buf(),
            file,
            mode,
            offset,
            id: file_id(&meta),
            chunk: vec![0; READ_CHUNK],
            partial: Vec::new(),
            ready: VecDeque::new(),
            poll: POLL_INTERVAL,
            missing: false,
        })
    }

    pub fn with_poll_interval(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> ReadMode {
        self.mode
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// The next line without its terminator.
    ///
    /// In follow mode this waits for more data indefinitely. In
    /// [`ReadMode::WholeOnce`] it returns `Ok(None)` at end of file, after
    /// yielding an unterminated last line if there is one.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        loop {
            if let Some(line) = self.ready.pop_front() {
                return Ok(Some(line));
            }
            let n = self.file.read(&mut self.chunk).await?;
            if n > 0 {
                self.offset += n as u64;
                self.split_lines(n);
                continue;
            }
            if !self.mode.follows() {
                return Ok(self.take_partial());
            }
            if !self.reopen_if_rotated().await? {
                tokio::time::sleep(self.poll).await;
            }
        }
    }

    fn split_lines(&mut self, n: usize) {
        let chunk = &self.chunk[..n];
        let mut start = 0;
        for (idx, byte) in chunk.iter().enumerate() {
            if *byte == b'\n' {
                self.partial.extend_from_slice(&chunk[start..idx]);
                self.ready.push_back(decode_line(&self.partial));
                self.partial.clear();
                start = idx + 1;
            }
        }
        self.partial.extend_from_slice(&chunk[start..]);
    }

    fn take_partial(&mut self) -> Option<String> {
        if self.partial.is_empty() {
            return None;
        }
        let line = decode_line(&self.partial);
        self.partial.clear();
        Some(line)
    }

    /// Reopen the path from offset 0 if it now names a different file or
    /// has been truncated. A missing path is waited for.
    async fn reopen_if_rotated(&mut self) -> io::Result<bool> {
        let meta = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                if !self.missing {
                    tracing::info!(path = %self.path.display(), "file is gone; waiting for it to reappear");
                    self.missing = true;
                }
                return Ok(false);
            }
            Err(err) => return Err(err),
        };
        self.missing = false;

        let replaced = matches!((self.id, file_id(&meta)), (Some(old), Some(new)) if old != new);
        let truncated = meta.len() < self.offset;
        if !replaced && !truncated {
            return Ok(false);
        }

        let file = match File::open(&self.path).await {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(err),
        };
        let meta = file.metadata().await?;
        if let Some(line) = self.take_partial() {
            self.ready.push_back(line);
        }
        self.file = file;
        self.offset = 0;
        self.id = file_id(&meta);
        tracing::info!(
            path = %self.path.display(),
            replaced,
            truncated,
            "file rotated; reading from the start",
        );
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// TailTask
// ---------------------------------------------------------------------------

/// Line and match counts of one finished task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TailSummary {
    pub lines: u64,
    pub matched: u64,
}

/// One (file, group) assignment.
pub struct TailTask {
    source: TailSource,
    group: Arc<Group>,
    origin: TaskOrigin,
}

impl TailTask {
    pub fn new(source: TailSource, group: Arc<Group>, origin: TaskOrigin) -> Self {
        Self {
            source,
            group,
            origin,
        }
    }

    pub fn path(&self) -> &Path {
        self.source.path()
    }

    pub fn mode(&self) -> ReadMode {
        self.source.mode()
    }

    pub fn origin(&self) -> TaskOrigin {
        self.origin
    }

    pub fn group(&self) -> &Arc<Group> {
        &self.group
    }

    /// Route every line of the source until it ends, then report on `done`.
    pub async fn run(mut self, done: mpsc::UnboundedSender<Completion>) -> TailSummary {
        let path = self.source.path().to_path_buf();
        tracing::info!(
            path = %path.display(),
            mask = %self.group.mask(),
            mode = %self.source.mode(),
            "start tailing",
        );

        let mut summary = TailSummary::default();
        loop {
            match self.source.next_line().await {
                Ok(Some(line)) => {
                    summary.lines += 1;
                    summary.matched += route_line(&line, self.group.rules()) as u64;
                }
                Ok(None) => break,
                Err(err) => {
                    tracing::error!(path = %path.display(), error = %err, "read failed; tailing stopped");
                    break;
                }
            }
        }

        tracing::info!(
            path = %path.display(),
            lines = summary.lines,
            matched = summary.matched,
            "finished reading file",
        );
        let _ = done.send(Completion {
            path,
            origin: self.origin,
        });
        summary
    }

    pub fn spawn(self, done: mpsc::UnboundedSender<Completion>) -> JoinHandle<TailSummary> {
        tokio::spawn(self.run(done))
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
