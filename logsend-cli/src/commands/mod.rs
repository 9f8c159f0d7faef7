pub mod check;
pub mod pipe;
pub mod watch;

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};

use logsend_tail::build_runtime;

/// Flags shared by every subcommand.
#[derive(Debug, Clone, Copy)]
pub struct GlobalArgs {
    pub debug: bool,
    pub max_procs: Option<usize>,
}

/// Run `fut` to completion on a fresh runtime, then shut the runtime down
/// without waiting on tasks that are still following files.
pub fn block_on<F, T>(global: &GlobalArgs, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let runtime = build_runtime(global.max_procs).context("failed to start async runtime")?;
    let result = runtime.block_on(fut);
    runtime.shutdown_timeout(Duration::from_millis(500));
    result
}
