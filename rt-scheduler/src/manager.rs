use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rt_db::DbPool;
use rt_rpc::MethodRegistry;
use serde_json::Value as Json;
use tokio::sync::{Mutex, Notify};
use tracing::{error, info, warn};

use crate::crontab::CrontabEntry;
use crate::error::SchedulerError;
use crate::model::{ArchivedStatus, NewTask, TaskRow};

/// Row-level advisory lock ids for tasks are derived from the task id
/// directly: task ids are already unique 64-bit integers, so no hashing is
/// needed (contrast [`rt_lock`]'s relational backend, which hashes arbitrary
/// string keys into the same lock id space).
fn lock_id_for_task(task_id: i64) -> i64 {
    task_id
}

pub struct TaskManager {
    pool: Arc<DbPool>,
    registry: Arc<MethodRegistry>,
    poll_interval: Duration,
    lock_timeout: Duration,
    crontab: Mutex<Vec<CrontabEntry>>,
    crontab_last_poll: Mutex<Option<DateTime<Utc>>>,
    shutdown: Arc<Notify>,
    stopping: AtomicBool,
    in_flight: Arc<tokio::sync::Semaphore>,
}

impl std::fmt::Debug for TaskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskManager").field("poll_interval", &self.poll_interval).finish()
    }
}

impl TaskManager {
    pub fn new(pool: Arc<DbPool>, registry: Arc<MethodRegistry>) -> Self {
        TaskManager {
            pool,
            registry,
            poll_interval: Duration::from_millis(500),
            lock_timeout: Duration::from_secs(5),
            crontab: Mutex::new(Vec::new()),
            crontab_last_poll: Mutex::new(None),
            shutdown: Arc::new(Notify::new()),
            stopping: AtomicBool::new(false),
            in_flight: Arc::new(tokio::sync::Semaphore::new(32)),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub async fn add_crontab(&self, entry: CrontabEntry) {
        self.crontab.lock().await.push(entry);
    }

    pub async fn schedule(&self, mut task: NewTask) -> Result<i64, SchedulerError> {
        if task.trace_id.is_none() {
            if let Some(span) = rt_core::context::current_span() {
                task.trace_id = Some(span.trace_id().to_string());
                task.trace_span_id = Some(span.id().to_string());
            }
        }

        let pool = self.pool.pool().map_err(|_| SchedulerError::Db(sqlx::Error::PoolClosed))?;
        let row: (i64,) = sqlx::query_as(
            "INSERT INTO task (name, params, eta, status, max_retries, retry_delay_seconds, reference, trace_id, trace_span_id)
             VALUES ($1, $2, $3, 'pending', $4, $5, $6, $7, $8)
             RETURNING id",
        )
        .bind(&task.name)
        .bind(&task.params)
        .bind(task.eta)
        .bind(task.max_retries)
        .bind(task.retry_delay_seconds)
        .bind(&task.reference)
        .bind(&task.trace_id)
        .bind(&task.trace_span_id)
        .fetch_one(&pool)
        .await?;
        Ok(row.0)
    }

    /// Cancels a pending or in-progress task: the row is removed from `task`
    /// and archived into `task_arch` with status `canceled`, atomically.
    pub async fn cancel(&self, task_id: i64) -> Result<(), SchedulerError> {
        let pool = self.pool.pool().map_err(|_| SchedulerError::Db(sqlx::Error::PoolClosed))?;
        let mut tx = pool.begin().await?;
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM task WHERE id = $1 FOR UPDATE")
            .bind(task_id)
            .fetch_optional(&mut *tx)
            .await?;
        let row = row.ok_or(SchedulerError::NotFound(task_id))?;
        insert_archive(&mut tx, &row, ArchivedStatus::Canceled).await?;
        sqlx::query("DELETE FROM task WHERE id = $1").bind(task_id).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    pub fn request_stop(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        self.shutdown.notify_waiters();
    }

    /// Runs the dispatch loop until [`TaskManager::request_stop`] is called,
    /// then waits up to `grace` for in-flight task executions to finish.
    pub async fn run(self: Arc<Self>, grace: Duration) {
        info!("scheduler dispatch loop starting");
        while !self.stopping.load(Ordering::SeqCst) {
            if let Err(err) = self.poll_crontab().await {
                warn!(error = %err, "crontab poll failed");
            }
            if let Err(err) = self.poll_due_tasks().await {
                warn!(error = %err, "task poll failed");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = self.shutdown.notified() => break,
            }
        }

        info!("scheduler dispatch loop stopping, waiting up to {:?} for in-flight tasks", grace);
        let drain = self.in_flight.acquire_many(32);
        let _ = tokio::time::timeout(grace, drain).await;
    }

    async fn poll_crontab(&self) -> Result<(), SchedulerError> {
        let now = Utc::now();
        let mut last_poll = self.crontab_last_poll.lock().await;
        let since = last_poll.unwrap_or(now);
        *last_poll = Some(now);
        drop(last_poll);

        let mut entries = self.crontab.lock().await;
        for entry in entries.iter_mut() {
            for fire_time in entry.due_fires(since, now) {
                let task = entry.build_task(fire_time);
                match self.schedule(task).await {
                    Ok(id) => info!(task_id = id, crontab = %entry.name, "crontab fired"),
                    Err(err) => warn!(error = %err, crontab = %entry.name, "crontab enqueue failed"),
                }
            }
        }
        Ok(())
    }

    async fn poll_due_tasks(self: &Arc<Self>) -> Result<(), SchedulerError> {
        let pool = self.pool.pool().map_err(|_| SchedulerError::Db(sqlx::Error::PoolClosed))?;
        let due: Vec<TaskRow> = sqlx::query_as(
            "SELECT * FROM task WHERE status IN ('pending', 'retry') AND eta <= now() ORDER BY eta LIMIT 32",
        )
        .fetch_all(&pool)
        .await?;

        for row in due {
            let this = Arc::clone(self);
            let Ok(permit) = Arc::clone(&self.in_flight).try_acquire_owned() else {
                break;
            };
            tokio::spawn(async move {
                let _permit = permit;
                if let Err(err) = this.run_one(row).await {
                    error!(error = %err, "task execution bookkeeping failed");
                }
            });
        }
        Ok(())
    }

    async fn run_one(&self, row: TaskRow) -> Result<(), SchedulerError> {
        let pool = self.pool.pool().map_err(|_| SchedulerError::Db(sqlx::Error::PoolClosed))?;
        let guard = match self.pool.advisory_lock(lock_id_for_task(row.id), self.lock_timeout).await {
            Ok(guard) => guard,
            Err(_) => return Ok(()), // another instance is already running this task
        };

        let claimed = sqlx::query(
            "UPDATE task SET status = 'in_progress', last_stamp = now() WHERE id = $1 AND status IN ('pending', 'retry')",
        )
        .bind(row.id)
        .execute(&pool)
        .await?;
        if claimed.rows_affected() == 0 {
            drop(guard);
            return Ok(());
        }

        let started = Utc::now();

        let trace = match rehydrate_trace(&row) {
            Ok(trace) => trace,
            Err(err) => {
                drop(guard);
                let finished = Utc::now();
                let mut tx = pool.begin().await?;
                log_attempt(&mut tx, row.id, row.eta, started, finished, None, Some(&err.to_string()), None).await?;
                sqlx::query("DELETE FROM task WHERE id = $1").bind(row.id).execute(&mut *tx).await?;
                insert_archive(&mut tx, &row, ArchivedStatus::Error).await?;
                tx.commit().await?;
                return Ok(());
            }
        };
        let _span_scope = trace.as_ref().map(|span| span.clone().enter());
        let _span_guard = trace.map(rt_core::context::set_span);

        let named = row.params.as_object().cloned().unwrap_or_default();
        let outcome = self.registry.exec(&row.name, rt_rpc::CallArgs::Named(named)).await;
        let finished = Utc::now();
        drop(guard);

        match outcome {
            Ok(result) => {
                let mut tx = pool.begin().await?;
                log_attempt(&mut tx, row.id, row.eta, started, finished, Some(&result), None, None).await?;
                sqlx::query("DELETE FROM task WHERE id = $1").bind(row.id).execute(&mut *tx).await?;
                insert_archive(&mut tx, &row, ArchivedStatus::Successful).await?;
                tx.commit().await?;
            }
            Err(err) => {
                let traceback = std::backtrace::Backtrace::force_capture().to_string();
                let mut tx = pool.begin().await?;
                log_attempt(
                    &mut tx,
                    row.id,
                    row.eta,
                    started,
                    finished,
                    None,
                    Some(&err.to_string()),
                    Some(&traceback),
                )
                .await?;

                if let Some(retry) = crate::error::as_retry(&err) {
                    if row.retries + 1 > row.max_retries {
                        sqlx::query("DELETE FROM task WHERE id = $1").bind(row.id).execute(&mut *tx).await?;
                        insert_archive(&mut tx, &row, ArchivedStatus::Error).await?;
                    } else {
                        let next_eta = finished + chrono::Duration::seconds(row.retry_delay_seconds);
                        sqlx::query(
                            "UPDATE task SET status = 'retry', retries = retries + 1, eta = $2 WHERE id = $1",
                        )
                        .bind(row.id)
                        .bind(next_eta)
                        .execute(&mut *tx)
                        .await?;
                        warn!(task_id = row.id, cause = %retry.0, "task requested retry");
                    }
                } else {
                    sqlx::query("DELETE FROM task WHERE id = $1").bind(row.id).execute(&mut *tx).await?;
                    insert_archive(&mut tx, &row, ArchivedStatus::Error).await?;
                }
                tx.commit().await?;
            }
        }

        Ok(())
    }
}

/// Reconstructs the span the row's persisted trace/parent id should resume,
/// so the task's execution span joins the caller's trace instead of starting
/// a disconnected one. `None` trace columns mean the task was never captured
/// under a trace (nothing to rehydrate, not an error). A pair where only one
/// of the two ids is present, or either fails to parse, is treated as
/// unrecoverable corruption rather than silently dropped into a fresh trace.
fn rehydrate_trace(row: &TaskRow) -> Result<Option<rt_trace::Span>, SchedulerError> {
    let (trace_id, parent_id) = match (&row.trace_id, &row.trace_span_id) {
        (None, None) => return Ok(None),
        (Some(trace_id), Some(parent_id)) => (trace_id, parent_id),
        _ => return Err(SchedulerError::TracePropagationUnsupported),
    };
    let trace_id: rt_trace::TraceId = trace_id.parse().map_err(|_| SchedulerError::TracePropagationUnsupported)?;
    let parent_id: rt_trace::SpanId = parent_id.parse().map_err(|_| SchedulerError::TracePropagationUnsupported)?;

    let Some(logger) = rt_core::context::current_logger() else {
        return Ok(None);
    };
    Ok(Some(rt_trace::Span::with_remote_parent(
        trace_id,
        Some(parent_id),
        "task.execute",
        rt_trace::SpanKind::Server,
        logger.as_emitter(),
    )))
}

#[allow(clippy::too_many_arguments)]
async fn log_attempt(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    task_id: i64,
    eta: DateTime<Utc>,
    started: DateTime<Utc>,
    finished: DateTime<Utc>,
    result: Option<&Json>,
    error: Option<&str>,
    traceback: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO task_log (task_id, eta, started, finished, result, error, traceback)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(task_id)
    .bind(eta)
    .bind(started)
    .bind(finished)
    .bind(result)
    .bind(error)
    .bind(traceback)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn insert_archive(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    row: &TaskRow,
    status: ArchivedStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO task_arch (id, name, params, eta, last_stamp, status, retries, max_retries, retry_delay_seconds, reference, trace_id, trace_span_id)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
    )
    .bind(row.id)
    .bind(&row.name)
    .bind(&row.params)
    .bind(row.eta)
    .bind(row.last_stamp)
    .bind(status.as_str())
    .bind(row.retries)
    .bind(row.max_retries)
    .bind(row.retry_delay_seconds)
    .bind(&row.reference)
    .bind(&row.trace_id)
    .bind(&row.trace_span_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[async_trait]
impl rt_core::Component for TaskManager {
    async fn health(&self) -> Result<(), anyhow::Error> {
        self.pool.health().await
    }

    async fn stop(&self) {
        self.request_stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rt_trace::{SpanId, TraceId};
    use serde_json::json;

    fn row_with_trace(trace_id: Option<String>, trace_span_id: Option<String>) -> TaskRow {
        TaskRow {
            id: 1,
            name: "noop".to_string(),
            params: json!({}),
            eta: Utc::now(),
            last_stamp: None,
            status: "pending".to_string(),
            retries: 0,
            max_retries: 0,
            retry_delay_seconds: 60,
            reference: None,
            trace_id,
            trace_span_id,
        }
    }

    #[test]
    fn rehydrate_trace_is_a_noop_when_neither_column_is_set() {
        let row = row_with_trace(None, None);
        assert!(rehydrate_trace(&row).unwrap().is_none());
    }

    #[test]
    fn rehydrate_trace_fails_explicitly_on_a_partial_pair() {
        let row = row_with_trace(Some(TraceId::random().to_string()), None);
        assert!(matches!(rehydrate_trace(&row), Err(SchedulerError::TracePropagationUnsupported)));
    }

    #[test]
    fn rehydrate_trace_fails_explicitly_on_unparseable_ids() {
        let row = row_with_trace(Some("not-hex".to_string()), Some(SpanId::random().to_string()));
        assert!(matches!(rehydrate_trace(&row), Err(SchedulerError::TracePropagationUnsupported)));
    }

    #[tokio::test]
    async fn rehydrate_trace_resumes_the_persisted_lineage_when_a_logger_is_bound() {
        let app = Arc::new(rt_core::Application::new());
        let trace_id = TraceId::random();
        let parent_id = SpanId::random();
        let row = row_with_trace(Some(trace_id.to_string()), Some(parent_id.to_string()));

        rt_core::context::scope(async {
            let _app_guard = rt_core::context::set_app(app);
            let span = rehydrate_trace(&row).unwrap().expect("a logger is bound, so a span is rehydrated");
            assert_eq!(span.trace_id(), trace_id);
            assert_eq!(span.parent_id(), Some(parent_id));
        })
        .await;
    }
}
