//! Line-oriented bindings shared by the `stdout` and `file` senders.

use serde_json::Value;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};

use logsend_core::{Match, Sender, SenderError, SenderHandle};

use crate::queue::{Envelope, Queue};
use crate::template::{compile_template, RecordTemplate};

/// Handle created by activation: the queue into the single writer task.
pub(crate) struct LineHandle {
    pub(crate) queue: Queue<String>,
}

impl SenderHandle for LineHandle {
    fn bind(&self) -> Box<dyn Sender> {
        Box::new(LineBinding {
            queue: self.queue.clone(),
            template: None,
        })
    }

    fn flush(&self) -> oneshot::Receiver<()> {
        self.queue.flush()
    }
}

/// One rule's binding: an optional `template`; without one the full matched
/// text is written.
pub(crate) struct LineBinding {
    queue: Queue<String>,
    template: Option<RecordTemplate>,
}

impl Sender for LineBinding {
    fn name(&self) -> &str {
        self.queue.sender_name()
    }

    fn set_config(&mut self, raw: &Value) -> Result<(), SenderError> {
        self.template = compile_template(self.queue.sender_name(), raw, "template")?;
        Ok(())
    }

    fn send(&self, record: &Match) {
        let line = match &self.template {
            Some(template) => match template.render(record) {
                Ok(line) => line,
                Err(err) => {
                    tracing::warn!(
                        sender = self.queue.sender_name(),
                        error = %err.describe(),
                        "template error; record dropped",
                    );
                    return;
                }
            },
            None => record.text().to_string(),
        };
        self.queue.push(line);
    }
}

/// Drain `rx`, writing one line per record to `writer`.
pub(crate) async fn write_lines<W>(
    sender: &'static str,
    mut rx: mpsc::UnboundedReceiver<Envelope<String>>,
    mut writer: W,
    dry_run: bool,
) where
    W: AsyncWrite + Unpin,
{
    tracing::debug!(sender, "writer queue started");
    while let Some(envelope) = rx.recv().await {
        match envelope {
            Envelope::Record(line) => {
                if dry_run {
                    tracing::debug!(sender, line = %line, "dry run; not written");
                    continue;
                }
                if let Err(err) = write_line(&mut writer, &line).await {
                    tracing::warn!(sender, error = %err, "write failed; record dropped");
                }
            }
            Envelope::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    tracing::debug!(sender, "writer queue stopped");
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

/// Spawn the writer task on the current tokio runtime.
pub(crate) fn spawn_writer<W>(
    sender: &'static str,
    writer: W,
    dry_run: bool,
) -> Result<LineHandle, SenderError>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let runtime = tokio::runtime::Handle::try_current()
        .map_err(|err| SenderError::invalid(sender, format!("no async runtime: {err}")))?;
    let (queue, rx) = Queue::channel(sender);
    runtime.spawn(write_lines(sender, rx, writer, dry_run));
    Ok(LineHandle { queue })
}
