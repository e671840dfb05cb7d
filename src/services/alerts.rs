//! Alerts service

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use super::{path, Query};
use crate::error::ClientError;
use crate::http::ApiClient;

/// Alert triage status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Open,
    Investigating,
    Resolved,
    FalsePositive,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Open => "open",
            AlertStatus::Investigating => "investigating",
            AlertStatus::Resolved => "resolved",
            AlertStatus::FalsePositive => "false_positive",
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "open" => Ok(AlertStatus::Open),
            "investigating" => Ok(AlertStatus::Investigating),
            "resolved" => Ok(AlertStatus::Resolved),
            "false_positive" | "false-positive" => Ok(AlertStatus::FalsePositive),
            other => Err(format!("Unknown alert status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Low => "low",
            AlertSeverity::Medium => "medium",
            AlertSeverity::High => "high",
            AlertSeverity::Critical => "critical",
        }
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(AlertSeverity::Low),
            "medium" => Ok(AlertSeverity::Medium),
            "high" => Ok(AlertSeverity::High),
            "critical" => Ok(AlertSeverity::Critical),
            other => Err(format!("Unknown alert severity: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertCreate {
    pub title: String,
    pub description: String,
    pub severity: AlertSeverity,
    pub alert_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_log_ids: Option<Vec<String>>,
}

/// Partial update; unset fields are left untouched by the backend
#[derive(Debug, Clone, Default, Serialize)]
pub struct AlertUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AlertStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
}

impl AlertUpdate {
    pub fn status(status: AlertStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AlertFilter {
    pub limit: Option<u32>,
    pub skip: Option<u32>,
    pub status: Option<AlertStatus>,
    pub severity: Option<AlertSeverity>,
    pub alert_type: Option<String>,
}

impl AlertFilter {
    fn query(&self) -> Query {
        Query::new()
            .number("limit", self.limit)
            .number("skip", self.skip)
            .text("status", self.status.as_ref().map(AlertStatus::as_str))
            .text("severity", self.severity.as_ref().map(AlertSeverity::as_str))
            .text("alert_type", self.alert_type.as_deref())
    }
}

#[derive(Debug, Clone, Default)]
pub struct AlertStatsFilter {
    pub status: Option<AlertStatus>,
    pub severity: Option<AlertSeverity>,
    pub alert_type: Option<String>,
}

impl AlertStatsFilter {
    fn query(&self) -> Query {
        Query::new()
            .text("status", self.status.as_ref().map(AlertStatus::as_str))
            .text("severity", self.severity.as_ref().map(AlertSeverity::as_str))
            .text("alert_type", self.alert_type.as_deref())
    }
}

pub struct AlertsService<'a> {
    api: &'a ApiClient,
}

impl<'a> AlertsService<'a> {
    pub fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    pub async fn create_alert(&self, alert: &AlertCreate) -> Result<Value, ClientError> {
        self.api.post("/alerts", alert).await
    }

    pub async fn get_alerts(&self, filter: &AlertFilter) -> Result<Vec<Value>, ClientError> {
        self.api.get_with("/alerts", filter.query().pairs()).await
    }

    pub async fn get_alert(&self, alert_id: &str) -> Result<Value, ClientError> {
        self.api.get(&path("/alerts", &[alert_id])?).await
    }

    pub async fn update_alert(&self, alert_id: &str, update: &AlertUpdate) -> Result<Value, ClientError> {
        self.api
            .patch(&path("/alerts", &[alert_id])?, update)
            .await
    }

    pub async fn get_alert_stats(&self, filter: &AlertStatsFilter) -> Result<Value, ClientError> {
        self.api
            .get_with("/alerts/stats/count", filter.query().pairs())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_alert_filter_order() {
        let filter = AlertFilter {
            limit: Some(50),
            skip: None,
            status: Some(AlertStatus::FalsePositive),
            severity: Some(AlertSeverity::High),
            alert_type: Some("intrusion".into()),
        };
        let keys: Vec<_> = filter.query().pairs().iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["limit", "status", "severity", "alert_type"]);
        assert_eq!(filter.query().pairs()[1].1, "false_positive");
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("Open".parse::<AlertStatus>().unwrap(), AlertStatus::Open);
        assert_eq!("false-positive".parse::<AlertStatus>().unwrap(), AlertStatus::FalsePositive);
        assert!("closed".parse::<AlertStatus>().is_err());
    }

    #[test]
    fn test_update_serializes_only_set_fields() {
        let update = AlertUpdate::status(AlertStatus::Resolved);
        assert_eq!(serde_json::to_value(&update).unwrap(), json!({"status": "resolved"}));
    }
}
