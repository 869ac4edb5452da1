use std::sync::Mutex;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// Fan-out of one value stream to every attached listener.
///
/// Each listener owns an unbounded queue, so a slow reader never loses
/// values sent after it subscribed. Nothing is replayed to late listeners.
/// Queues whose receiver was dropped are pruned on the next send.
pub(crate) struct Listeners<T> {
    senders: Mutex<Vec<UnboundedSender<T>>>,
}

impl<T: Clone> Listeners<T> {
    pub(crate) fn new() -> Self {
        Self {
            senders: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn subscribe(&self) -> UnboundedReceiver<T> {
        let (tx, rx) = unbounded_channel();
        self.lock().push(tx);
        rx
    }

    /// Delivers `value` to every live listener and returns how many got it.
    pub(crate) fn send(&self, value: T) -> usize {
        let mut senders = self.lock();
        senders.retain(|tx| tx.send(value.clone()).is_ok());
        senders.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<UnboundedSender<T>>> {
        self.senders.lock().unwrap_or_else(|e| e.into_inner())
    }
}
