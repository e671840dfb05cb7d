//! Monitoring service: REST snapshots backing the live dashboard

use serde::Deserialize;
use serde_json::Value;

use crate::error::ClientError;
use crate::http::ApiClient;

/// Page size used by the dashboard for recent items
pub const DEFAULT_RECENT_LIMIT: u32 = 10;

#[derive(Debug, Deserialize)]
struct RecentLogs {
    #[serde(default)]
    logs: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RecentAlerts {
    #[serde(default)]
    alerts: Vec<Value>,
}

pub struct MonitoringService<'a> {
    api: &'a ApiClient,
}

impl<'a> MonitoringService<'a> {
    pub fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    pub async fn get_metrics(&self) -> Result<Value, ClientError> {
        self.api.get("/monitoring/metrics").await
    }

    pub async fn get_recent_logs(&self, limit: u32) -> Result<Vec<Value>, ClientError> {
        let recent: RecentLogs = self
            .api
            .get_with("/monitoring/recent-logs", &[("limit", limit.to_string())])
            .await?;
        Ok(recent.logs)
    }

    pub async fn get_recent_alerts(&self, limit: u32) -> Result<Vec<Value>, ClientError> {
        let recent: RecentAlerts = self
            .api
            .get_with("/monitoring/recent-alerts", &[("limit", limit.to_string())])
            .await?;
        Ok(recent.alerts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_recent_envelopes() {
        let logs: RecentLogs = serde_json::from_value(json!({"logs": [{"id": "l1"}]})).unwrap();
        assert_eq!(logs.logs, vec![json!({"id": "l1"})]);

        let alerts: RecentAlerts = serde_json::from_value(json!({})).unwrap();
        assert!(alerts.alerts.is_empty());
    }
}
