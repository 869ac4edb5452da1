use fitrack_core::error::Result;
use futures::StreamExt;
use futures::stream::BoxStream;
use std::future::Future;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A live store subscription driven by a background task.
///
/// The task pulls items from the store stream and hands each one to the
/// listener in emission order. Cancelling stops the task and drops the
/// stream, which ends the subscription on the store side.
pub(crate) struct StoreSubscription {
    collection: String,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl StoreSubscription {
    pub(crate) fn spawn<T, F, Fut>(
        collection: &str,
        mut stream: BoxStream<'static, Result<T>>,
        mut on_item: F,
    ) -> Self
    where
        T: Send + 'static,
        F: FnMut(Result<T>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let name = collection.to_string();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => {
                        tracing::debug!(target: "training", "[Subscription] '{}' cancelled", name);
                        break;
                    }
                    item = stream.next() => match item {
                        Some(item) => on_item(item).await,
                        None => {
                            tracing::debug!(target: "training", "[Subscription] '{}' stream ended", name);
                            break;
                        }
                    }
                }
            }
        });

        Self {
            collection: collection.to_string(),
            token,
            handle,
        }
    }

    pub(crate) fn collection(&self) -> &str {
        &self.collection
    }

    pub(crate) fn is_active(&self) -> bool {
        !self.token.is_cancelled() && !self.handle.is_finished()
    }

    pub(crate) fn cancel(&self) {
        self.token.cancel();
    }
}
