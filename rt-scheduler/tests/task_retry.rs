//! Exercises the retry-then-success and retry-then-error paths against a
//! real Postgres instance. Ignored by default; run with
//! `DATABASE_URL=postgres://... cargo test -p rt-scheduler --test task_retry -- --ignored`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rt_db::DbPool;
use rt_rpc::{MethodRegistry, RpcMethod};
use rt_scheduler::{NewTask, SchedulerError, TaskManager};
use serde_json::json;

async fn connected_pool() -> Option<Arc<DbPool>> {
    let dsn = std::env::var("DATABASE_URL").ok()?;
    let pool = Arc::new(DbPool::new(dsn, 4));
    rt_core::Component::prepare(pool.as_ref()).await.ok()?;
    rt_scheduler::create_database_objects(&pool.pool().ok()?).await.ok()?;
    Some(pool)
}

#[tokio::test]
#[ignore]
async fn task_succeeds_after_two_retries() {
    let Some(pool) = connected_pool().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };

    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts_for_handler = Arc::clone(&attempts);

    let mut registry = MethodRegistry::new();
    registry.register(RpcMethod::new(
        "flaky",
        Arc::new(move |_args| {
            let attempts = Arc::clone(&attempts_for_handler);
            async move {
                let count = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                if count < 3 {
                    Err(rt_scheduler::retry(format!("attempt {count} failed")))
                } else {
                    Ok(rt_rpc::RpcValue::String("done".to_string()))
                }
            }
        }),
    ));

    let manager = Arc::new(TaskManager::new(pool, Arc::new(registry)).with_poll_interval(Duration::from_millis(50)));
    manager
        .schedule(NewTask::new("flaky", json!({})).with_retries(5, 0))
        .await
        .unwrap();

    let run_handle = tokio::spawn(Arc::clone(&manager).run(Duration::from_secs(1)));
    tokio::time::sleep(Duration::from_secs(2)).await;
    manager.request_stop();
    run_handle.await.unwrap();

    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
#[ignore]
async fn task_exhausts_retries_and_archives_as_error() {
    let Some(pool) = connected_pool().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };

    let mut registry = MethodRegistry::new();
    registry.register(RpcMethod::new(
        "always_fails",
        Arc::new(|_args| async move { Err(rt_scheduler::retry("never works")) }),
    ));

    let manager = Arc::new(TaskManager::new(pool, Arc::new(registry)).with_poll_interval(Duration::from_millis(50)));
    let task_id = manager
        .schedule(NewTask::new("always_fails", json!({})).with_retries(1, 0))
        .await
        .unwrap();

    let run_handle = tokio::spawn(Arc::clone(&manager).run(Duration::from_secs(1)));
    tokio::time::sleep(Duration::from_secs(2)).await;
    manager.request_stop();
    run_handle.await.unwrap();

    let err = manager.cancel(task_id).await.unwrap_err();
    assert!(matches!(err, SchedulerError::NotFound(_)));
}
