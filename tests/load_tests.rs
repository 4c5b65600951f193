#[cfg(test)]
mod tests {
    use async_workerpool::{
        Context,
        ContextError,
        ExecFn,
        Job,
        JobDescriptor,
        JobError,
        JobResult,
        PoolConfig,
        PoolError,
        WorkerPool,
    };
    use futures::StreamExt;
    use std::{
        collections::HashSet,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::{Duration, Instant},
    };

    const JOBS_COUNT: i64 = 10;
    const WORKER_COUNT: usize = 2;

    #[derive(Debug, Clone, PartialEq, thiserror::Error)]
    #[error("negative argument: {0}")]
    struct Negative(i64);

    async fn double(_ctx: Context, x: i64) -> Result<i64, Negative> {
        if x < 0 {
            return Err(Negative(x));
        }
        Ok(x * 2)
    }

    type Pool = WorkerPool<i64, i64, Negative>;

    fn test_jobs(count: i64) -> Vec<Job<i64, i64, Negative>> {
        let exec: ExecFn<i64, i64, Negative> = Arc::new(double);
        (0..count)
            .map(|i| Job::shared(JobDescriptor::new(i.to_string(), "anyType"), Arc::clone(&exec), i))
            .collect()
    }

    fn assert_cancellation(result: &JobResult<i64, Negative>, expected: ContextError) {
        assert!(result.descriptor.is_empty(), "cancellation result must not carry a descriptor");
        assert_eq!(result.err(), Some(&JobError::Context(expected)));
        assert!(result.is_cancellation());
    }

    #[tokio::test]
    async fn test_worker_pool() {
        let pool = Arc::new(Pool::new(WORKER_COUNT));
        let ctx = Context::background();

        let generator = tokio::spawn({
            let pool = Arc::clone(&pool);
            async move { pool.generate_from(test_jobs(JOBS_COUNT)).await }
        });
        let runner = tokio::spawn({
            let pool = Arc::clone(&pool);
            let ctx = ctx.clone();
            async move { pool.run(&ctx).await }
        });

        let results = pool.results();
        let mut ids = HashSet::new();
        let mut values = Vec::new();
        while let Some(result) = results.recv().await {
            let id: i64 = result.descriptor.id.as_str().parse().unwrap();
            let value = *result.value().unwrap();
            assert_eq!(value, id * 2, "value must match its descriptor");
            assert!(ids.insert(id), "duplicate result for job {id}");
            values.push(value);
        }

        pool.done().wait().await;
        assert!(pool.is_closed());
        generator.await.unwrap();
        runner.await.unwrap();

        assert_eq!(ids, (0..JOBS_COUNT).collect::<HashSet<_>>());
        values.sort_unstable();
        assert_eq!(values, (0..JOBS_COUNT).map(|x| x * 2).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_intake_backpressure() {
        let pool = Arc::new(Pool::new(WORKER_COUNT));
        let pulled = Arc::new(AtomicUsize::new(0));

        // no workers yet: the producer may only fill the intake queue
        let generator = tokio::spawn({
            let pool = Arc::clone(&pool);
            let pulled = Arc::clone(&pulled);
            async move {
                let jobs = test_jobs(JOBS_COUNT).into_iter().inspect(move |_| {
                    pulled.fetch_add(1, Ordering::SeqCst);
                });
                pool.generate_from(jobs).await
            }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!generator.is_finished(), "producer must wait for free capacity");
        assert!(pulled.load(Ordering::SeqCst) <= WORKER_COUNT + 1);

        let ctx = Context::background();
        let (_, results) = tokio::join!(pool.run(&ctx), pool.results().collect());
        generator.await.unwrap();

        assert_eq!(pulled.load(Ordering::SeqCst), JOBS_COUNT as usize);
        assert_eq!(results.len(), JOBS_COUNT as usize);
        assert!(results.iter().all(JobResult::is_ok));
    }

    #[tokio::test]
    async fn test_failed_job_keeps_descriptor() {
        let pool = Pool::new(WORKER_COUNT);
        let jobs = vec![
            Job::new(JobDescriptor::new("ok", "t"), double, 3),
            Job::new(JobDescriptor::new("bad", "t").with_metadata("why", "negative"), double, -3),
        ];

        let results = pool.process(&Context::background(), jobs).await;
        assert_eq!(results.len(), 2);
        for result in results {
            match result.descriptor.id.as_str() {
                "ok" => assert_eq!(result.outcome, Ok(6)),
                "bad" => {
                    assert_eq!(result.outcome, Err(JobError::Failed(Negative(-3))));
                    assert_eq!(result.descriptor.metadata["why"], "negative");
                }
                other => panic!("unexpected descriptor {other}"),
            }
        }
    }

    #[tokio::test]
    async fn test_panicking_job_does_not_stop_pool() {
        let pool = WorkerPool::new(1);
        let exec = |_ctx: Context, x: i64| async move {
            if x == 2 {
                panic!("job two exploded");
            }
            Ok::<_, Negative>(x)
        };
        let jobs = (0..5).map(|i| Job::new(JobDescriptor::new(i.to_string(), "t"), exec, i));

        let results = pool.process(&Context::background(), jobs).await;
        assert_eq!(results.len(), 5);
        let panicked: Vec<_> = results.iter().filter(|r| r.err().is_some_and(JobError::is_panic)).collect();
        assert_eq!(panicked.len(), 1);
        assert_eq!(panicked[0].descriptor.id.as_str(), "2");
    }

    #[tokio::test]
    async fn test_zero_jobs() {
        let pool = Pool::new(WORKER_COUNT);
        let ctx = Context::background();

        let results = tokio::time::timeout(Duration::from_secs(1), pool.process(&ctx, Vec::new()))
            .await
            .expect("empty batch must not hang");
        assert!(results.is_empty());
        assert!(pool.done().is_closed());
        assert!(pool.results().recv().await.is_none());
    }

    #[tokio::test]
    async fn test_worker_pool_timeout() {
        let pool = Arc::new(Pool::new(WORKER_COUNT));
        let ctx = Context::with_timeout(Duration::from_nanos(10));

        // nothing is ever submitted: only the deadline can stop the workers
        let runner = tokio::spawn({
            let pool = Arc::clone(&pool);
            async move { pool.run(&ctx).await }
        });

        let results = pool.results().collect().await;
        assert!(pool.done().wait_timeout(Duration::from_secs(1)).await);
        runner.await.unwrap();

        assert!(!results.is_empty() && results.len() <= WORKER_COUNT);
        for result in &results {
            assert_cancellation(result, ContextError::DeadlineExceeded);
        }
    }

    #[tokio::test]
    async fn test_worker_pool_cancel() {
        let pool = Arc::new(Pool::new(WORKER_COUNT));
        let ctx = Context::background();

        let runner = tokio::spawn({
            let pool = Arc::clone(&pool);
            let ctx = ctx.clone();
            async move { pool.run(&ctx).await }
        });
        ctx.cancel();

        let mut cancellations = 0;
        let mut stream = pool.results().into_stream();
        while let Some(result) = stream.next().await {
            assert_cancellation(&result, ContextError::Canceled);
            cancellations += 1;
        }
        assert!((1..=WORKER_COUNT).contains(&cancellations));

        assert!(pool.done().wait_timeout(Duration::from_secs(1)).await);
        runner.await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_before_run_stops_producer() {
        let pool = Pool::new(WORKER_COUNT);
        let ctx = Context::background();
        ctx.cancel();

        let results = tokio::time::timeout(Duration::from_secs(1), pool.process(&ctx, test_jobs(100)))
            .await
            .expect("cancelled pool must not leave the producer blocked");

        assert!(pool.is_closed());
        let cancellations = results.iter().filter(|r| r.is_cancellation()).count();
        assert!((1..=WORKER_COUNT).contains(&cancellations));
        for result in results.iter().filter(|r| !r.is_cancellation()) {
            let id: i64 = result.descriptor.id.as_str().parse().unwrap();
            assert_eq!(result.outcome, Ok(id * 2));
        }
    }

    #[tokio::test]
    async fn test_in_flight_job_is_not_preempted() {
        let pool = WorkerPool::new(1);
        let ctx = Context::background();

        let job = Job::new(
            JobDescriptor::new("slow", "sleep"),
            |_ctx: Context, ms: u64| async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok::<_, Negative>(ms)
            },
            100,
        );

        let canceller = {
            let ctx = ctx.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                ctx.cancel();
            }
        };
        let (results, _) = tokio::join!(pool.process(&ctx, vec![job]), canceller);

        let finished: Vec<_> = results.iter().filter(|r| !r.is_cancellation()).collect();
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].descriptor.id.as_str(), "slow");
        assert_eq!(finished[0].outcome, Ok(100));
        for result in results.iter().filter(|r| r.is_cancellation()) {
            assert_eq!(result.err(), Some(&JobError::Context(ContextError::Canceled)));
        }
    }

    #[tokio::test]
    #[should_panic(expected = "jobs already submitted")]
    async fn test_generate_from_twice_panics() {
        let pool = Pool::new(WORKER_COUNT);
        pool.generate_from(Vec::new()).await;
        pool.generate_from(test_jobs(1)).await;
    }

    #[tokio::test]
    #[should_panic(expected = "already run")]
    async fn test_run_twice_panics() {
        let pool = Pool::new(WORKER_COUNT);
        pool.generate_from(Vec::new()).await;
        pool.run(&Context::background()).await;
        pool.run(&Context::background()).await;
    }

    #[test]
    fn test_config() {
        assert_eq!(PoolConfig::default().num_workers, num_cpus::get());
        assert_eq!(PoolConfig::io_bound().num_workers, num_cpus::get() * 2);
        assert!(PoolConfig::cpu_bound().validate().is_ok());
        assert_eq!(
            Pool::with_config(PoolConfig::new(0)).err(),
            Some(PoolError::InvalidWorkerCount(0))
        );

        let pool = Pool::with_config(PoolConfig::new(3)).unwrap();
        assert_eq!(pool.num_workers(), 3);
        assert!(!pool.is_closed());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn load_test_parallel_batch() {
        println!("\n=== LOAD TEST: 1k jobs @ 1ms on 8 workers ===");
        let pool = WorkerPool::new(8);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let exec: ExecFn<usize, usize, Negative> = {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            Arc::new(move |_ctx: Context, i: usize| {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, Negative>(i)
                }
            })
        };
        let jobs = (0..1_000).map(|i| Job::shared(JobDescriptor::new(i.to_string(), "load"), Arc::clone(&exec), i));

        let start = Instant::now();
        let results = pool.process(&Context::background(), jobs).await;
        println!("  elapsed: {:?}, peak concurrency: {}", start.elapsed(), peak.load(Ordering::SeqCst));

        assert_eq!(results.len(), 1_000);
        let ids: HashSet<_> = results.iter().map(|r| r.descriptor.id.clone()).collect();
        assert_eq!(ids.len(), 1_000);
        assert!(results.iter().all(|r| r.value().map(|v| v.to_string()) == Some(r.descriptor.id.to_string())));
        assert!(peak.load(Ordering::SeqCst) <= 8);
        assert!(peak.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn load_test_timeout_mid_batch() {
        println!("\n=== LOAD TEST: deadline hits a 500-job batch ===");
        let pool = WorkerPool::new(4);
        let ctx = Context::with_timeout(Duration::from_millis(30));
        let jobs = (0..500u64).map(|i| {
            Job::new(
                JobDescriptor::new(i.to_string(), "sleep"),
                |_ctx: Context, i: u64| async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Ok::<_, Negative>(i)
                },
                i,
            )
        });

        let results = tokio::time::timeout(Duration::from_secs(5), pool.process(&ctx, jobs))
            .await
            .expect("timed out batch must still close");

        let cancellations = results.iter().filter(|r| r.is_cancellation()).count();
        println!("  finished: {}, cancellation results: {}", results.len() - cancellations, cancellations);
        assert!((1..=4).contains(&cancellations));
        assert!(results.len() - cancellations < 500);
        for result in results.iter().filter(|r| r.is_cancellation()) {
            assert_eq!(result.err().and_then(JobError::context_error), Some(ContextError::DeadlineExceeded));
        }
    }
}
