//! Suricata service: EVE events, rules, configs, reload

use serde::Serialize;
use serde_json::Value;

use super::{path, Query};
use crate::error::ClientError;
use crate::http::ApiClient;

#[derive(Debug, Clone, Serialize)]
pub struct RuleCreate {
    pub name: String,
    pub rule_content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub enabled: bool,
}

impl RuleCreate {
    pub fn new(name: &str, rule_content: &str) -> Self {
        Self {
            name: name.to_string(),
            rule_content: rule_content.to_string(),
            description: None,
            enabled: true,
        }
    }
}

/// Rule changes; sent as query parameters
#[derive(Debug, Clone, Default)]
pub struct RuleUpdate {
    pub enabled: Option<bool>,
    pub rule_content: Option<String>,
}

impl RuleUpdate {
    fn query(&self) -> Query {
        Query::new()
            .boolean("enabled", self.enabled)
            .text("rule_content", self.rule_content.as_deref())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigCreate {
    pub config_name: String,
    pub config_content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SuricataEventFilter {
    pub limit: Option<u32>,
    pub skip: Option<u32>,
    pub event_type: Option<String>,
}

impl SuricataEventFilter {
    fn query(&self) -> Query {
        Query::new()
            .number("limit", self.limit)
            .number("skip", self.skip)
            .text("event_type", self.event_type.as_deref())
    }
}

pub struct SuricataService<'a> {
    api: &'a ApiClient,
}

impl<'a> SuricataService<'a> {
    pub fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    /// Ingest one raw EVE JSON event
    pub async fn ingest_event(&self, event: &Value) -> Result<Value, ClientError> {
        self.api.post("/suricata/events", event).await
    }

    /// Ingest several raw EVE JSON events; the response lists per-index errors
    pub async fn ingest_events_batch(&self, events: &[Value]) -> Result<Value, ClientError> {
        self.api.post("/suricata/events/batch", events).await
    }

    pub async fn get_events(&self, filter: &SuricataEventFilter) -> Result<Vec<Value>, ClientError> {
        self.api
            .get_with("/suricata/events", filter.query().pairs())
            .await
    }

    pub async fn create_rule(&self, rule: &RuleCreate) -> Result<Value, ClientError> {
        self.api.post("/suricata/rules", rule).await
    }

    pub async fn get_rules(&self, enabled_only: bool) -> Result<Vec<Value>, ClientError> {
        let query = Query::new().flag("enabled_only", enabled_only);
        self.api.get_with("/suricata/rules", query.pairs()).await
    }

    pub async fn update_rule(&self, rule_id: &str, update: &RuleUpdate) -> Result<Value, ClientError> {
        self.api
            .request(
                reqwest::Method::PATCH,
                &path("/suricata/rules", &[rule_id])?,
                None,
                update.query().pairs(),
            )
            .await
    }

    pub async fn delete_rule(&self, rule_id: &str) -> Result<Value, ClientError> {
        self.api
            .delete(&path("/suricata/rules", &[rule_id])?)
            .await
    }

    pub async fn create_config(&self, config: &ConfigCreate) -> Result<Value, ClientError> {
        self.api.post("/suricata/configs", config).await
    }

    pub async fn get_configs(&self) -> Result<Vec<Value>, ClientError> {
        self.api.get("/suricata/configs").await
    }

    /// Ask the sensor to reload its rules
    pub async fn reload(&self) -> Result<Value, ClientError> {
        self.api.post_empty("/suricata/reload", &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_update_query() {
        let update = RuleUpdate {
            enabled: Some(false),
            rule_content: Some("alert tcp any any -> any 22 (sid:1;)".into()),
        };
        let query = update.query();
        assert_eq!(query.pairs()[0], ("enabled", "false".to_string()));
        assert_eq!(query.pairs()[1].0, "rule_content");
    }

    #[test]
    fn test_new_rule_enabled_by_default() {
        let rule = RuleCreate::new("ssh", "alert tcp any any -> any 22 (sid:1;)");
        assert!(rule.enabled);
        let body = serde_json::to_value(&rule).unwrap();
        assert!(body.get("description").is_none());
    }

    #[test]
    fn test_event_filter_order() {
        let filter = SuricataEventFilter {
            limit: Some(25),
            skip: Some(5),
            event_type: Some("alert".into()),
        };
        let keys: Vec<_> = filter.query().pairs().iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["limit", "skip", "event_type"]);
    }
}
