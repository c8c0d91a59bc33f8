use chrono::{DateTime, Utc};
use serde_json::Value as Json;

/// The `task.status` column is plain `text`, not a native Postgres enum, so
/// transitions are expressed as `&'static str` literals rather than a
/// driver-mapped type, mirroring the table's actual shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    InProgress,
    Retry,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Retry => "retry",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchivedStatus {
    Successful,
    Error,
    Canceled,
}

impl ArchivedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchivedStatus::Successful => "successful",
            ArchivedStatus::Error => "error",
            ArchivedStatus::Canceled => "canceled",
        }
    }
}

/// A row of the `task` table: pending or in-progress work.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TaskRow {
    pub id: i64,
    pub name: String,
    pub params: Json,
    pub eta: DateTime<Utc>,
    pub last_stamp: Option<DateTime<Utc>>,
    pub status: String,
    pub retries: i32,
    pub max_retries: i32,
    pub retry_delay_seconds: i64,
    pub reference: Option<String>,
    pub trace_id: Option<String>,
    pub trace_span_id: Option<String>,
}

/// A new task awaiting a row id, as passed to [`crate::TaskManager::schedule`].
#[derive(Debug, Clone)]
pub struct NewTask {
    pub name: String,
    pub params: Json,
    pub eta: DateTime<Utc>,
    pub max_retries: i32,
    pub retry_delay_seconds: i64,
    pub reference: Option<String>,
    pub trace_id: Option<String>,
    pub trace_span_id: Option<String>,
}

impl NewTask {
    pub fn new(name: impl Into<String>, params: Json) -> Self {
        NewTask {
            name: name.into(),
            params,
            eta: Utc::now(),
            max_retries: 0,
            retry_delay_seconds: 60,
            reference: None,
            trace_id: None,
            trace_span_id: None,
        }
    }

    pub fn with_eta(mut self, eta: DateTime<Utc>) -> Self {
        self.eta = eta;
        self
    }

    pub fn with_retries(mut self, max_retries: i32, retry_delay_seconds: i64) -> Self {
        self.max_retries = max_retries;
        self.retry_delay_seconds = retry_delay_seconds;
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Explicitly pins the trace this task should join, overriding whatever
    /// [`crate::TaskManager::schedule`] would otherwise capture from the
    /// caller's ambient span.
    pub fn with_trace(mut self, trace_id: impl Into<String>, span_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self.trace_span_id = Some(span_id.into());
        self
    }
}
