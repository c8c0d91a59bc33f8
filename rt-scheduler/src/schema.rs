//! Idempotent DDL for the `task`/`task_arch`/`task_log` schema, applied on
//! startup when `create_database_objects` is enabled.

use sqlx::PgPool;

const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS task (
    id BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
    name TEXT NOT NULL,
    params JSONB NOT NULL DEFAULT '{}'::jsonb,
    eta TIMESTAMPTZ NOT NULL,
    last_stamp TIMESTAMPTZ,
    status TEXT NOT NULL,
    retries INT NOT NULL DEFAULT 0,
    max_retries INT NOT NULL DEFAULT 0,
    retry_delay_seconds BIGINT NOT NULL DEFAULT 60,
    reference TEXT,
    trace_id TEXT,
    trace_span_id TEXT
);

CREATE TABLE IF NOT EXISTS task_arch (
    id BIGINT PRIMARY KEY,
    name TEXT NOT NULL,
    params JSONB NOT NULL DEFAULT '{}'::jsonb,
    eta TIMESTAMPTZ NOT NULL,
    last_stamp TIMESTAMPTZ,
    status TEXT NOT NULL,
    retries INT NOT NULL DEFAULT 0,
    max_retries INT NOT NULL DEFAULT 0,
    retry_delay_seconds BIGINT NOT NULL DEFAULT 60,
    reference TEXT,
    trace_id TEXT,
    trace_span_id TEXT
);

CREATE TABLE IF NOT EXISTS task_log (
    id BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
    task_id BIGINT NOT NULL,
    eta TIMESTAMPTZ NOT NULL,
    started TIMESTAMPTZ NOT NULL,
    finished TIMESTAMPTZ,
    result JSONB,
    error TEXT,
    traceback TEXT
);

CREATE INDEX IF NOT EXISTS task_pending_eta_idx ON task (eta) WHERE status IN ('pending', 'retry');

CREATE OR REPLACE VIEW task_pending AS
    SELECT * FROM task WHERE status IN ('pending', 'retry') ORDER BY eta;
"#;

pub async fn create_database_objects(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(DDL).execute(pool).await?;
    Ok(())
}
