//! File tailing, directory watching and the watch/pipe runtimes.

pub mod assign;
pub mod completion;
mod error;
pub mod logging;
pub mod runtime;
pub mod stdin;
pub mod tail;
pub mod watcher;

pub use assign::{assign_files, discover_files};
pub use completion::{CompletionCoordinator, CompletionOutcome};
pub use error::TailError;
pub use logging::{init_tracing, LogFormat};
pub use runtime::{build_runtime, run_watch, run_watch_until, WatchOptions, WatchReport, FLUSH_TIMEOUT};
pub use stdin::{flat_config, parse_param, run_pipe, PipeSource, PipeSummary};
pub use tail::{Completion, TailSource, TailSummary, TailTask, TaskOrigin, POLL_INTERVAL};
pub use watcher::{new_file_mode, DirectoryWatcher};
