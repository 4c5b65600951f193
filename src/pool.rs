use super::{
    context::Context,
    errors::{ContextError, PoolError},
    handle::{DoneSignal, Results},
    job::Job,
    result::JobResult,
};
use std::sync::Arc;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio_util::{sync::CancellationToken, task::TaskTracker};


/// Конфигурация пула: по умолчанию один воркер на логическое ядро
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Parallelism, and the capacity of both the job and the result queue.
    pub num_workers: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            num_workers: num_cpus::get(),
        }
    }
}

impl PoolConfig {
    pub fn new(num_workers: usize) -> Self {
        Self { num_workers }
    }

    pub fn cpu_bound() -> Self {
        Self::default()
    }

    pub fn io_bound() -> Self {
        Self {
            num_workers: num_cpus::get() * 2,
        }
    }

    pub fn validate(&self) -> Result<(), PoolError> {
        if self.num_workers == 0 {
            return Err(PoolError::InvalidWorkerCount(self.num_workers));
        }
        Ok(())
    }
}


type Intake<A, V, E> = Arc<AsyncMutex<mpsc::Receiver<Job<A, V, E>>>>;

/// Пул фиксированного размера: задачи расходятся по `num_workers` воркерам,
/// результаты собираются в одну очередь.
///
/// Жизненный цикл одного батча:
/// - [`generate_from`](Self::generate_from) отправляет весь батч и закрывает входную очередь;
/// - [`run`](Self::run) запускает воркеров и, когда все они завершились, закрывает
///   очередь результатов, а затем сигнал [`done`](Self::done);
/// - [`results`](Self::results) вычитывается вызывающим параллельно.
///
/// `generate_from` и `run` вызываются не более одного раза; повторный вызов паникует.
/// Результаты приходят в порядке завершения, а не отправки.
///
/// При отмене каждый простаивающий воркер отправляет свой результат с ошибкой
/// контекста, поэтому отменённый батч даёт от одного до `num_workers` таких
/// результатов. Уже начатая задача всегда доводится до конца.
pub struct WorkerPool<A, V, E> {
    num_workers: usize,
    intake: Mutex<Option<mpsc::Sender<Job<A, V, E>>>>,
    jobs: Intake<A, V, E>,
    results_tx: Mutex<Option<mpsc::Sender<JobResult<V, E>>>>,
    results: Results<V, E>,
    done: CancellationToken,
}

impl<A, V, E> WorkerPool<A, V, E>
where
    A: Send + 'static,
    V: Send + 'static,
    E: Send + 'static,
{
    /// # Panics
    ///
    /// If `num_workers` is zero.
    pub fn new(num_workers: usize) -> Self {
        match Self::with_config(PoolConfig::new(num_workers)) {
            Ok(pool) => pool,
            Err(err) => panic!("{err}"),
        }
    }

    pub fn with_config(config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;
        let num_workers = config.num_workers;

        let (jobs_tx, jobs_rx) = mpsc::channel(num_workers);
        let (results_tx, results_rx) = mpsc::channel(num_workers);

        Ok(Self {
            num_workers,
            intake: Mutex::new(Some(jobs_tx)),
            jobs: Arc::new(AsyncMutex::new(jobs_rx)),
            results_tx: Mutex::new(Some(results_tx)),
            results: Results::new(results_rx),
            done: CancellationToken::new(),
        })
    }

    #[inline]
    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    #[inline]
    pub fn results(&self) -> Results<V, E> {
        self.results.clone()
    }

    #[inline]
    pub fn done(&self) -> DoneSignal {
        DoneSignal::new(self.done.clone())
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.done.is_cancelled()
    }

    /// Submits the batch in order, waiting whenever `num_workers` jobs are
    /// already queued, then closes intake for good.
    ///
    /// If the pool closes while jobs are still pending (the run was cancelled),
    /// the rest of the batch is dropped instead of waiting forever.
    ///
    /// # Panics
    ///
    /// If jobs were already submitted to this pool, including by a concurrent call.
    pub async fn generate_from<I>(&self, jobs: I)
    where
        I: IntoIterator<Item = Job<A, V, E>>,
    {
        let intake = self.intake.lock().take();
        let Some(intake) = intake else {
            panic!("jobs already submitted to this worker pool");
        };

        let mut submitted = 0usize;
        let mut jobs = jobs.into_iter();
        while let Some(job) = jobs.next() {
            tokio::select! {
                sent = intake.send(job) => {
                    // the pool owns the receiver, so this only fails if it was torn down
                    if sent.is_err() {
                        let dropped = 1 + jobs.count();
                        tracing::warn!(submitted, dropped, "job intake closed before the batch was submitted");
                        return;
                    }
                    submitted += 1;
                }
                _ = self.done.cancelled() => {
                    let dropped = 1 + jobs.count();
                    tracing::warn!(submitted, dropped, "worker pool closed before intake drained");
                    return;
                }
            }
        }
        tracing::debug!(submitted, "intake closed");
    }

    /// Spawns the workers and waits for all of them to exit, then closes the
    /// result queue and the done signal, in that order.
    ///
    /// # Panics
    ///
    /// If the pool was already run.
    pub async fn run(&self, ctx: &Context) {
        let results_tx = self.results_tx.lock().take();
        let Some(results_tx) = results_tx else {
            panic!("worker pool already run");
        };

        let tracker = TaskTracker::new();
        tracing::debug!(workers = self.num_workers, "starting workers");
        for worker_id in 0..self.num_workers {
            tracker.spawn(worker_loop(
                worker_id,
                ctx.clone(),
                Arc::clone(&self.jobs),
                results_tx.clone(),
            ));
        }
        tracker.close();
        tracker.wait().await;

        drop(results_tx);
        self.done.cancel();
        tracing::debug!("all workers exited, worker pool closed");
    }

    /// Submits `jobs`, runs the pool and drains it; returns every result in
    /// completion order.
    pub async fn process<I>(&self, ctx: &Context, jobs: I) -> Vec<JobResult<V, E>>
    where
        I: IntoIterator<Item = Job<A, V, E>>,
    {
        let (_, _, results) = tokio::join!(
            self.generate_from(jobs),
            self.run(ctx),
            self.results().collect(),
        );
        results
    }
}


async fn worker_loop<A, V, E>(
    worker_id: usize,
    ctx: Context,
    jobs: Intake<A, V, E>,
    results: mpsc::Sender<JobResult<V, E>>,
)
where
    A: Send + 'static,
    V: Send + 'static,
    E: Send + 'static,
{
    tracing::debug!(worker_id, "worker started");
    loop {
        tokio::select! {
            job = next_job(&jobs) => {
                let Some(job) = job else {
                    tracing::debug!(worker_id, "intake drained, worker exiting");
                    return;
                };
                let result = job.execute(&ctx).await;
                if results.send(result).await.is_err() {
                    return;
                }
            }
            _ = ctx.done() => {
                let err = ctx.err().unwrap_or(ContextError::Canceled);
                tracing::debug!(worker_id, error = %err, "worker cancelled");
                let _ = results.send(JobResult::cancelled(err)).await;
                return;
            }
        }
    }
}

#[inline]
async fn next_job<A, V, E>(jobs: &Intake<A, V, E>) -> Option<Job<A, V, E>> {
    jobs.lock().await.recv().await
}
