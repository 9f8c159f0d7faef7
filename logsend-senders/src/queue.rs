//! Single-consumer work queue shared by every binding of one sender type.

use tokio::sync::{mpsc, oneshot};

pub(crate) enum Envelope<T> {
    Record(T),
    /// Answered once every record queued ahead of it has been handled.
    Flush(oneshot::Sender<()>),
}

pub(crate) struct Queue<T> {
    sender: &'static str,
    tx: mpsc::UnboundedSender<Envelope<T>>,
}

impl<T> Clone for Queue<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender,
            tx: self.tx.clone(),
        }
    }
}

impl<T> Queue<T> {
    pub(crate) fn channel(sender: &'static str) -> (Self, mpsc::UnboundedReceiver<Envelope<T>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { sender, tx }, rx)
    }

    pub(crate) fn sender_name(&self) -> &'static str {
        self.sender
    }

    /// Enqueue without waiting. A closed queue drops the record.
    pub(crate) fn push(&self, item: T) {
        if self.tx.send(Envelope::Record(item)).is_err() {
            tracing::warn!(sender = self.sender, "sender queue closed; record dropped");
        }
    }

    pub(crate) fn flush(&self) -> oneshot::Receiver<()> {
        let (done_tx, done_rx) = oneshot::channel();
        // If the consumer is gone `done_tx` is dropped and the receiver resolves at once.
        let _ = self.tx.send(Envelope::Flush(done_tx));
        done_rx
    }
}
