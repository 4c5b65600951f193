use async_workerpool::{Context, Job, JobDescriptor, WorkerPool};
use std::time::Instant;
use tokio::{runtime::Builder, time::Duration};
use tracing_subscriber::EnvFilter;


#[derive(Debug, thiserror::Error)]
#[error("negative input: {0}")]
struct NegativeInput(i64);

async fn slow_double(_ctx: Context, x: i64) -> Result<i64, NegativeInput> {
    if x < 0 {
        return Err(NegativeInput(x));
    }
    tokio::time::sleep(Duration::from_millis(10 * x.unsigned_abs())).await;
    Ok(x * 2)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let rt = match Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("failed to start runtime: {err}");
            std::process::exit(1);
        }
    };

    rt.block_on(async {
        let now = Instant::now();
        let pool = WorkerPool::new(4);
        let ctx = Context::with_timeout(Duration::from_millis(250));

        let jobs = (-2..20).map(|i| {
            Job::new(
                JobDescriptor::new(i.to_string(), "double").with_metadata("input", i),
                slow_double,
                i,
            )
        });

        for result in pool.process(&ctx, jobs).await {
            match (&result.outcome, result.is_cancellation()) {
                (Ok(value), _) => println!("job {}: {}", result.descriptor.id, value),
                (Err(err), true) => println!("worker stopped: {err}"),
                (Err(err), false) => println!("job {} failed: {err}", result.descriptor.id),
            }
        }
        println!("elapsed: {:?}", now.elapsed());
    });
}
