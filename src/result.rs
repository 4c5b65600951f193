use super::{
    errors::{ContextError, JobError},
    model::JobDescriptor,
};


/// Outcome of one job, or of one worker noticing cancellation.
#[derive(Debug, Clone, PartialEq)]
pub struct JobResult<V, E> {
    pub descriptor: JobDescriptor,
    pub outcome: Result<V, JobError<E>>,
}

impl<V, E> JobResult<V, E> {
    pub fn new(descriptor: JobDescriptor, outcome: Result<V, JobError<E>>) -> Self {
        Self { descriptor, outcome }
    }

    /// Result a worker emits when it leaves its loop because the context is done.
    /// There is no originating job, so the descriptor is the zero value.
    pub fn cancelled(err: ContextError) -> Self {
        Self {
            descriptor: JobDescriptor::default(),
            outcome: Err(JobError::Context(err)),
        }
    }

    #[inline]
    pub fn value(&self) -> Option<&V> {
        self.outcome.as_ref().ok()
    }

    #[inline]
    pub fn err(&self) -> Option<&JobError<E>> {
        self.outcome.as_ref().err()
    }

    #[inline]
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Empty descriptor plus a context error: emitted by a worker, not a job.
    #[inline]
    pub fn is_cancellation(&self) -> bool {
        self.descriptor.is_empty()
            && self.err().and_then(JobError::context_error).is_some()
    }

    pub fn into_value(self) -> Option<V> {
        self.outcome.ok()
    }
}
