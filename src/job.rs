use super::{
    context::Context,
    errors::JobError,
    model::JobDescriptor,
    result::JobResult,
};
use std::{
    any::Any,
    fmt,
    future::Future,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};
use futures::{
    future::BoxFuture,
    FutureExt,
};


/// The caller-supplied computation behind a [`Job`].
///
/// Implemented for every `Fn(Context, A) -> impl Future<Output = Result<V, E>>`,
/// so plain `async fn`s and closures returning `async` blocks work as-is. It is
/// invoked concurrently from several workers and must not rely on shared state
/// the pool does not know about.
pub trait ExecutionFn<A, V, E>: Send + Sync + 'static {
    fn call(&self, ctx: Context, args: A) -> BoxFuture<'static, Result<V, E>>;
}

impl<F, Fut, A, V, E> ExecutionFn<A, V, E> for F
where
    F: Fn(Context, A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
{
    #[inline]
    fn call(&self, ctx: Context, args: A) -> BoxFuture<'static, Result<V, E>> {
        Box::pin(self(ctx, args))
    }
}

/// Shared callback, for batches where every job runs the same computation.
pub type ExecFn<A, V, E> = Arc<dyn ExecutionFn<A, V, E>>;


/// One unit of work. Consumed by [`execute`](Job::execute), so it runs at most once.
pub struct Job<A, V, E> {
    descriptor: JobDescriptor,
    exec_fn: ExecFn<A, V, E>,
    args: A,
}

impl<A, V, E> fmt::Debug for Job<A, V, E>
where
    A: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("descriptor", &self.descriptor)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

impl<A, V, E> Job<A, V, E>
where
    A: Send + 'static,
    V: Send + 'static,
    E: Send + 'static,
{
    pub fn new<F>(descriptor: JobDescriptor, exec_fn: F, args: A) -> Self
    where
        F: ExecutionFn<A, V, E>,
    {
        Self::shared(descriptor, Arc::new(exec_fn), args)
    }

    pub fn shared(descriptor: JobDescriptor, exec_fn: ExecFn<A, V, E>, args: A) -> Self {
        Self {
            descriptor,
            exec_fn,
            args,
        }
    }

    /// Задача с синхронным callback, выполняется в blocking-пуле tokio.
    /// Для CPU-bound работы, которая не должна занимать потоки рантайма.
    pub fn blocking<F>(descriptor: JobDescriptor, f: F, args: A) -> Self
    where
        F: Fn(&Context, A) -> Result<V, E> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let exec_fn = move |ctx: Context, args: A| {
            let f = Arc::clone(&f);
            async move {
                match tokio::task::spawn_blocking(move || f(&ctx, args)).await {
                    Ok(outcome) => outcome,
                    Err(join_err) => match join_err.try_into_panic() {
                        Ok(payload) => panic::resume_unwind(payload),
                        Err(join_err) => panic::resume_unwind(Box::new(join_err.to_string())),
                    },
                }
            }
        };
        Self::new(descriptor, exec_fn, args)
    }

    #[inline]
    pub fn descriptor(&self) -> &JobDescriptor {
        &self.descriptor
    }

    #[inline]
    pub fn args(&self) -> &A {
        &self.args
    }

    /// Runs the callback to completion and captures its outcome.
    ///
    /// Never fails outside the returned [`JobResult`]: errors become
    /// [`JobError::Failed`] and a panicking callback becomes [`JobError::Panic`],
    /// both tagged with this job's descriptor.
    pub async fn execute(self, ctx: &Context) -> JobResult<V, E> {
        let Job { descriptor, exec_fn, args } = self;
        tracing::trace!(job_id = %descriptor.id, job_type = %descriptor.job_type, "executing job");

        let fut = match panic::catch_unwind(AssertUnwindSafe(|| exec_fn.call(ctx.clone(), args))) {
            Ok(fut) => fut,
            Err(payload) => return panicked(descriptor, payload),
        };

        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(value)) => JobResult::new(descriptor, Ok(value)),
            Ok(Err(err)) => JobResult::new(descriptor, Err(JobError::Failed(err))),
            Err(payload) => panicked(descriptor, payload),
        }
    }
}

fn panicked<V, E>(descriptor: JobDescriptor, payload: Box<dyn Any + Send>) -> JobResult<V, E> {
    let message = panic_message(payload.as_ref());
    tracing::warn!(job_id = %descriptor.id, panic = %message, "job panicked");
    JobResult::new(descriptor, Err(JobError::Panic(message)))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        format!("{:?}", payload)
    }
}
