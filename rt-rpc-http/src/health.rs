//! `GET`/`HEAD /health`: `{is_sick, checks, version?, build_time?,
//! start_time?, up_time?}`, HTTP 500 when any component reports sick.

use std::sync::Arc;
use std::time::SystemTime;

use rt_core::Application;
use serde_json::{json, Value as Json};

pub struct HealthReport {
    pub status: u16,
    pub body: Json,
}

pub async fn build_health_report(app: &Arc<Application>) -> HealthReport {
    let health = app.health().await;
    let is_sick = health.values().any(Option::is_some);
    let checks: serde_json::Map<String, Json> = health
        .into_iter()
        .map(|(name, err)| (name, Json::String(err.unwrap_or_else(|| "ok".to_string()))))
        .collect();

    let up_time = app.start_stamp().and_then(|stamp| SystemTime::now().duration_since(stamp).ok()).map(|d| d.as_secs());

    HealthReport {
        status: if is_sick { 500 } else { 200 },
        body: json!({
            "is_sick": is_sick,
            "checks": checks,
            "up_time": up_time,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn healthy_app_with_no_components_reports_200() {
        let app = Arc::new(Application::new());
        let report = build_health_report(&app).await;
        assert_eq!(report.status, 200);
        assert_eq!(report.body["is_sick"], json!(false));
    }
}
