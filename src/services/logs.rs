//! Logs service

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use super::{path, Query};
use crate::error::ClientError;
use crate::http::ApiClient;

/// Log entry to ingest
#[derive(Debug, Clone, Serialize)]
pub struct LogCreate {
    pub source: String,
    pub log_type: String,
    /// info, warning, error or critical
    pub severity: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl LogCreate {
    pub fn new(source: &str, log_type: &str, severity: &str, message: &str) -> Self {
        Self {
            source: source.to_string(),
            log_type: log_type.to_string(),
            severity: severity.to_string(),
            message: message.to_string(),
            action: None,
            metadata: None,
            timestamp: None,
            user_id: None,
            target_id: None,
            ip_address: None,
            user_agent: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub limit: Option<u32>,
    pub skip: Option<u32>,
    pub source: Option<String>,
    pub severity: Option<String>,
    pub log_type: Option<String>,
}

impl LogFilter {
    fn query(&self) -> Query {
        Query::new()
            .number("limit", self.limit)
            .number("skip", self.skip)
            .text("source", self.source.as_deref())
            .text("severity", self.severity.as_deref())
            .text("log_type", self.log_type.as_deref())
    }
}

#[derive(Debug, Clone, Default)]
pub struct LogStatsFilter {
    pub source: Option<String>,
    pub severity: Option<String>,
    pub log_type: Option<String>,
}

impl LogStatsFilter {
    fn query(&self) -> Query {
        Query::new()
            .text("source", self.source.as_deref())
            .text("severity", self.severity.as_deref())
            .text("log_type", self.log_type.as_deref())
    }
}

pub struct LogsService<'a> {
    api: &'a ApiClient,
}

impl<'a> LogsService<'a> {
    pub fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    pub async fn create_log(&self, log: &LogCreate) -> Result<Value, ClientError> {
        self.api.post("/logs", log).await
    }

    pub async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Value>, ClientError> {
        self.api.get_with("/logs", filter.query().pairs()).await
    }

    pub async fn get_log(&self, log_id: &str) -> Result<Value, ClientError> {
        self.api.get(&path("/logs", &[log_id])?).await
    }

    pub async fn get_log_stats(&self, filter: &LogStatsFilter) -> Result<Value, ClientError> {
        self.api
            .get_with("/logs/stats/count", filter.query().pairs())
            .await
    }
}
