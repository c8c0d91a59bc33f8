//! Cron-driven task scheduling: a crontab entry is a recurring [`NewTask`]
//! template plus a schedule. On each fire, the manager enqueues one row.

use chrono::{DateTime, Utc};
use cron::Schedule;
use serde_json::Value as Json;
use std::str::FromStr;

/// Whether a missed fire (crontab registered while the process was down, or
/// overtaken by a later fire before it ran) is enqueued on recovery, or
/// silently skipped in favor of the next upcoming fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoNotMiss {
    Skip,
    CatchUp,
}

#[derive(Debug, Clone)]
pub struct CrontabEntry {
    pub name: String,
    pub expression: String,
    schedule: Schedule,
    pub params: Json,
    pub do_not_miss: DoNotMiss,
    /// When set, the fire time is injected into `params` under this key
    /// before the task row is created.
    pub date_attr: Option<String>,
    pub max_retries: i32,
    pub retry_delay_seconds: i64,
    last_fired: Option<DateTime<Utc>>,
}

impl CrontabEntry {
    pub fn new(name: impl Into<String>, expression: impl Into<String>) -> Result<Self, cron::error::Error> {
        let expression = expression.into();
        let schedule = Schedule::from_str(&expression)?;
        Ok(CrontabEntry {
            name: name.into(),
            expression,
            schedule,
            params: Json::Object(Default::default()),
            do_not_miss: DoNotMiss::Skip,
            date_attr: None,
            max_retries: 0,
            retry_delay_seconds: 60,
            last_fired: None,
        })
    }

    pub fn with_params(mut self, params: Json) -> Self {
        self.params = params;
        self
    }

    pub fn with_do_not_miss(mut self, mode: DoNotMiss) -> Self {
        self.do_not_miss = mode;
        self
    }

    pub fn with_date_attr(mut self, attr: impl Into<String>) -> Self {
        self.date_attr = Some(attr.into());
        self
    }

    pub fn with_retries(mut self, max_retries: i32, retry_delay_seconds: i64) -> Self {
        self.max_retries = max_retries;
        self.retry_delay_seconds = retry_delay_seconds;
        self
    }

    /// Returns every fire time in `(since, now]` that should be enqueued,
    /// given the entry's `do_not_miss` policy, and advances `last_fired`.
    ///
    /// With `DoNotMiss::Skip`, at most the most recent fire is returned, so a
    /// process that was down for several periods enqueues one catch-up run
    /// rather than none. With `DoNotMiss::CatchUp`, every missed fire is
    /// returned in order.
    pub fn due_fires(&mut self, since: DateTime<Utc>, now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        let lower_bound = self.last_fired.map(|t| t.max(since)).unwrap_or(since);
        let mut fires: Vec<DateTime<Utc>> = self
            .schedule
            .after(&lower_bound)
            .take_while(|fire| *fire <= now)
            .collect();

        if fires.is_empty() {
            return fires;
        }

        self.last_fired = fires.last().copied();

        if self.do_not_miss == DoNotMiss::Skip && fires.len() > 1 {
            let last = fires.pop().expect("checked non-empty above");
            fires.clear();
            fires.push(last);
        }

        fires
    }

    pub fn build_task(&self, fire_time: DateTime<Utc>) -> crate::model::NewTask {
        let mut params = self.params.clone();
        if let Some(attr) = &self.date_attr {
            if let Json::Object(map) = &mut params {
                map.insert(attr.clone(), Json::String(fire_time.to_rfc3339()));
            }
        }
        crate::model::NewTask::new(self.name.clone(), params)
            .with_eta(fire_time)
            .with_retries(self.max_retries, self.retry_delay_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn skip_policy_collapses_missed_fires_into_one() {
        let mut entry = CrontabEntry::new("heartbeat", "0 * * * * * *").unwrap();
        let since = t("2026-01-01T00:00:00Z");
        let now = t("2026-01-01T00:05:30Z");
        let fires = entry.due_fires(since, now);
        assert_eq!(fires.len(), 1);
        assert_eq!(fires[0], t("2026-01-01T00:05:00Z"));
    }

    #[test]
    fn catch_up_policy_returns_every_missed_fire() {
        let mut entry = CrontabEntry::new("heartbeat", "0 * * * * * *")
            .unwrap()
            .with_do_not_miss(DoNotMiss::CatchUp);
        let since = t("2026-01-01T00:00:00Z");
        let now = t("2026-01-01T00:03:00Z");
        let fires = entry.due_fires(since, now);
        assert_eq!(fires.len(), 3);
    }

    #[test]
    fn date_attr_is_injected_into_params() {
        let entry = CrontabEntry::new("report", "0 0 * * * * *")
            .unwrap()
            .with_date_attr("fired_at");
        let fire_time = t("2026-01-01T00:00:00Z");
        let task = entry.build_task(fire_time);
        assert_eq!(task.params["fired_at"], Json::String(fire_time.to_rfc3339()));
    }

    #[test]
    fn no_fires_between_consecutive_polls_returns_empty() {
        let mut entry = CrontabEntry::new("daily", "0 0 0 * * * *").unwrap();
        let since = t("2026-01-01T00:00:01Z");
        let now = t("2026-01-01T00:00:02Z");
        assert!(entry.due_fires(since, now).is_empty());
    }
}
