//! File discovery and mask-based assignment of files to groups.

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use logsend_core::{Group, ReadMode};

use crate::error::{io_err, TailError};
use crate::tail::{TailSource, TailTask, TaskOrigin};

/// Make `path` absolute against the current directory.
pub fn absolute(path: &Path) -> Result<PathBuf, TailError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|e| io_err(path, e))?;
    Ok(cwd.join(path))
}

/// Every regular file under each root, as absolute paths.
///
/// A root that is a file is taken as-is. Directories are walked
/// breadth-first. A root that cannot be read is an error; a subdirectory
/// that disappears during the walk is skipped. A file reachable from
/// several roots is listed once, at its first position.
pub fn discover_files(roots: &[PathBuf]) -> Result<Vec<PathBuf>, TailError> {
    let mut files = Vec::new();
    for root in roots {
        let root = absolute(root)?;
        let meta = fs::metadata(&root).map_err(|e| io_err(&root, e))?;
        if meta.is_file() {
            files.push(root);
            continue;
        }
        let mut found = collect_files(&root)?;
        tracing::debug!(root = %root.display(), files = found.len(), "walked log directory");
        files.append(&mut found);
    }
    let mut seen = HashSet::new();
    files.retain(|path| seen.insert(path.clone()));
    Ok(files)
}

fn collect_files(root: &Path) -> Result<Vec<PathBuf>, TailError> {
    let mut dirs = vec![root.to_path_buf()];
    let mut files = Vec::new();
    let mut cursor = 0;
    while cursor < dirs.len() {
        let current = dirs[cursor].clone();
        cursor += 1;
        let entries = match fs::read_dir(&current) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound && current != root => continue,
            Err(err) => return Err(io_err(&current, err)),
        };
        for entry in entries {
            let entry = entry.map_err(|e| io_err(&current, e))?;
            let path = entry.path();
            let ty = entry.file_type().map_err(|e| io_err(&path, e))?;
            if ty.is_dir() {
                dirs.push(path);
            } else if ty.is_file() || (ty.is_symlink() && path.is_file()) {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Open one tail task per (path, group) pair whose mask matches the base
/// name, group by group in order.
///
/// A file that vanished before it could be opened is skipped; any other
/// open failure aborts the assignment.
pub async fn assign_files(
    paths: &[PathBuf],
    groups: &[Arc<Group>],
    mode: ReadMode,
    origin: TaskOrigin,
) -> Result<Vec<TailTask>, TailError> {
    let mut tasks = Vec::new();
    for group in groups {
        for path in paths.iter().filter(|path| group.selects(path)) {
            match TailSource::open(path, mode).await {
                Ok(source) => tasks.push(TailTask::new(source, group.clone(), origin)),
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    tracing::warn!(path = %path.display(), "file disappeared before opening; skipped");
                }
                Err(err) => return Err(io_err(path, err)),
            }
        }
    }
    tracing::debug!(files = paths.len(), tasks = tasks.len(), ?origin, "files assigned");
    Ok(tasks)
}
