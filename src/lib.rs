//! Async пул воркеров фиксированного размера с кооперативной отменой
//!
//! # Features
//! - Fan-out батча задач на N воркеров, fan-in результатов в одну очередь
//! - Backpressure: обе очереди ограничены числом воркеров
//! - Детерминированное завершение: сначала закрываются результаты, затем сигнал done
//! - [`Context`] в стиле Go: явная отмена и дедлайны
//! - Ошибки и паники задач возвращаются как данные, а не пробрасываются

pub mod context;
pub mod errors;
pub mod handle;
pub mod job;
pub mod model;
pub mod pool;
pub mod result;

pub use context::Context;
pub use errors::{ContextError, JobError, PoolError};
pub use handle::{DoneSignal, Results};
pub use job::{ExecFn, ExecutionFn, Job};
pub use model::{JobDescriptor, JobId, JobType, Metadata};
pub use pool::{PoolConfig, WorkerPool};
pub use result::JobResult;
