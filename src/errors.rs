use thiserror::Error;


/// Why a [`Context`](crate::context::Context) is done.
#[derive(Error, Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum ContextError {
    #[error("context canceled")]
    Canceled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}


/// Error half of a [`JobResult`](crate::result::JobResult).
///
/// `Failed` carries whatever the job callback returned, `Context` is emitted by
/// workers that observed cancellation while idle, `Panic` is a callback that
/// unwound instead of returning.
#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum JobError<E> {
    #[error("{0}")]
    Failed(E),
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("job panicked: {0}")]
    Panic(String),
}

impl<E> JobError<E> {
    #[inline]
    pub fn context_error(&self) -> Option<ContextError> {
        match self {
            JobError::Context(err) => Some(*err),
            _ => None,
        }
    }

    #[inline]
    pub fn as_failed(&self) -> Option<&E> {
        match self {
            JobError::Failed(err) => Some(err),
            _ => None,
        }
    }

    #[inline]
    pub fn is_panic(&self) -> bool {
        matches!(self, JobError::Panic(_))
    }
}


#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum PoolError {
    #[error("worker count must be positive, got {0}")]
    InvalidWorkerCount(usize),
}
