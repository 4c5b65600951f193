//! Cancellation context shared by the pool, its workers and the job callbacks.
//!
//! A [`Context`] is done once it is cancelled explicitly, once its deadline
//! passes, or once any ancestor is done. [`Context::err`] reports which of the
//! first two happened; children report their ancestor's cause.

use super::errors::ContextError;
use std::sync::{Arc, OnceLock};
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;


#[derive(Debug)]
struct Inner {
    token: CancellationToken,
    cause: OnceLock<ContextError>,
    deadline: Option<Instant>,
    parent: Option<Context>,
}


/// Cheap to clone; all clones observe the same cancellation.
#[derive(Debug, Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl Context {
    fn build(token: CancellationToken, deadline: Option<Instant>, parent: Option<Context>) -> Self {
        Self {
            inner: Arc::new(Inner {
                token,
                cause: OnceLock::new(),
                deadline,
                parent,
            }),
        }
    }

    /// Root context without a deadline. Done only after [`cancel`](Self::cancel).
    pub fn background() -> Self {
        Self::build(CancellationToken::new(), None, None)
    }

    /// A timeout too large to represent as an instant means no deadline.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::build(CancellationToken::new(), deadline_after(timeout), None)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self::build(CancellationToken::new(), Some(deadline), None)
    }

    /// Child that is done when `self` is, and can be cancelled on its own.
    pub fn child(&self) -> Self {
        Self::build(self.inner.token.child_token(), None, Some(self.clone()))
    }

    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        Self::build(
            self.inner.token.child_token(),
            deadline_after(timeout),
            Some(self.clone()),
        )
    }

    /// Cancels this context and its children. No-op if already done.
    pub fn cancel(&self) {
        self.close(ContextError::Canceled);
    }

    fn close(&self, cause: ContextError) {
        if self.err().is_some() {
            return;
        }
        let _ = self.inner.cause.set(cause);
        self.inner.token.cancel();
    }

    /// Earliest deadline of this context and its ancestors.
    pub fn deadline(&self) -> Option<Instant> {
        let inherited = self.inner.parent.as_ref().and_then(Context::deadline);
        match (self.inner.deadline, inherited) {
            (Some(own), Some(parent)) => Some(own.min(parent)),
            (own, parent) => own.or(parent),
        }
    }

    /// `None` while the context is live.
    pub fn err(&self) -> Option<ContextError> {
        if let Some(cause) = self.inner.cause.get() {
            return Some(*cause);
        }
        if let Some(cause) = self.inner.parent.as_ref().and_then(Context::err) {
            return Some(cause);
        }
        match self.inner.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                let cause = *self.inner.cause.get_or_init(|| ContextError::DeadlineExceeded);
                self.inner.token.cancel();
                Some(cause)
            }
            _ => None,
        }
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Resolves once the context is done. Cancel safe.
    pub async fn done(&self) {
        match self.deadline() {
            Some(deadline) => {
                tokio::select! {
                    _ = self.inner.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {
                        // records DeadlineExceeded on whichever context owns the deadline
                        let _ = self.err();
                    }
                }
            }
            None => self.inner.token.cancelled().await,
        }
    }
}

#[inline]
fn deadline_after(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}
