//! Built-in senders for logsend.
//!
//! Every sender follows the same shape: activation opens the shared resource
//! and starts one consumer that owns it; each rule binding renders its own
//! [`RecordTemplate`] and pushes the result onto the consumer's queue.
//!
//! | Sender   | Activation          | Binding                      |
//! |----------|---------------------|------------------------------|
//! | `stdout` | `{}`                | `{"template": "..."}`        |
//! | `file`   | `{"path": "..."}`   | `{"template": "..."}`        |
//! | `sqlite` | `{"path": "..."}`   | `{"query": "..." \| [...]}`  |

pub mod error;
pub mod file;
pub mod sqlite;
pub mod stdout;
pub mod template;

mod line;
mod queue;

pub use error::TemplateError;
pub use file::{FileSender, FILE_SENDER};
pub use sqlite::{execute_script, SqliteSender, SQLITE_SENDER};
pub use stdout::{StdoutSender, STDOUT_SENDER};
pub use template::{normalize_placeholders, RecordTemplate};

use logsend_core::{RegistryError, SenderRegistry};

/// A registry holding `file`, `sqlite` and `stdout`, none activated.
pub fn with_builtin_senders() -> Result<SenderRegistry, RegistryError> {
    let mut registry = SenderRegistry::new();
    registry.register(FileSender)?;
    registry.register(SqliteSender)?;
    registry.register(StdoutSender)?;
    Ok(registry)
}
