use super::result::JobResult;
use std::sync::Arc;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::{
    sync::{mpsc, Mutex},
    time::Duration,
};
use tokio_util::sync::CancellationToken;


/// Read side of a pool's result queue.
///
/// Clones share the same queue; each result is handed to exactly one reader.
/// Drain until [`recv`](Results::recv) returns `None`: workers block on a full
/// queue, so an abandoned reader stalls the pool.
pub struct Results<V, E> {
    receiver: Arc<Mutex<mpsc::Receiver<JobResult<V, E>>>>,
}

impl<V, E> Clone for Results<V, E> {
    fn clone(&self) -> Self {
        Self {
            receiver: Arc::clone(&self.receiver),
        }
    }
}

impl<V, E> Results<V, E>
where
    V: Send + 'static,
    E: Send + 'static,
{
    pub(crate) fn new(receiver: mpsc::Receiver<JobResult<V, E>>) -> Self {
        Self {
            receiver: Arc::new(Mutex::new(receiver)),
        }
    }

    /// Next result in completion order; `None` once the pool closed the queue
    /// and everything produced before that has been read.
    #[inline]
    pub async fn recv(&self) -> Option<JobResult<V, E>> {
        self.receiver.lock().await.recv().await
    }

    pub async fn collect(self) -> Vec<JobResult<V, E>> {
        let mut results = Vec::new();
        while let Some(result) = self.recv().await {
            results.push(result);
        }
        results
    }

    /// Boxed, hence `Unpin`: `stream.next().await` works without pinning.
    pub fn into_stream(self) -> BoxStream<'static, JobResult<V, E>> {
        stream::unfold(self, |results| async move {
            results.recv().await.map(|result| (result, results))
        })
        .boxed()
    }
}


/// Closed exactly once, after every worker exited and the result queue closed.
#[derive(Debug, Clone)]
pub struct DoneSignal {
    token: CancellationToken,
}

impl DoneSignal {
    pub(crate) fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    #[inline(always)]
    pub async fn wait(&self) {
        self.token.cancelled().await
    }

    /// `false` if the pool is still running after `timeout`.
    pub async fn wait_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait()).await.is_ok()
    }
}
