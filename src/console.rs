//! Console view layer
//!
//! Terminal counterpart of the dashboard pages: an [`ActivityBoard`] that
//! folds live feed events into view state, and one-line renderers for logs,
//! alerts, rules and feed events.

use serde_json::Value;
use std::collections::VecDeque;

use crate::feed::{FeedMessage, LiveEvent};

/// View state fed by the live feed
///
/// New logs and alerts are kept newest first, capped at `limit` entries each.
#[derive(Debug, Clone)]
pub struct ActivityBoard {
    limit: usize,
    metrics: Option<Value>,
    recent_activity: Option<Value>,
    new_logs: VecDeque<Value>,
    new_alerts: VecDeque<Value>,
    frames: u64,
    unknown_frames: u64,
}

impl ActivityBoard {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            metrics: None,
            recent_activity: None,
            new_logs: VecDeque::new(),
            new_alerts: VecDeque::new(),
            frames: 0,
            unknown_frames: 0,
        }
    }

    /// Fold one parsed frame into the board and return its typed view
    pub fn apply(&mut self, message: &FeedMessage) -> LiveEvent {
        let event = message.event();
        self.frames += 1;

        match &event {
            LiveEvent::Metrics(data) => self.metrics = Some(data.clone()),
            LiveEvent::RecentActivity(data) => self.recent_activity = Some(data.clone()),
            LiveEvent::NewLog(data) => push_bounded(&mut self.new_logs, data.clone(), self.limit),
            LiveEvent::NewAlert(data) => {
                push_bounded(&mut self.new_alerts, data.clone(), self.limit)
            }
            LiveEvent::Unknown(_) => self.unknown_frames += 1,
        }

        event
    }

    /// Latest metrics snapshot
    pub fn metrics(&self) -> Option<&Value> {
        self.metrics.as_ref()
    }

    /// Logs from the latest `recent_activity` snapshot
    pub fn recent_logs(&self) -> &[Value] {
        self.recent_list("logs")
    }

    /// Alerts from the latest `recent_activity` snapshot
    pub fn recent_alerts(&self) -> &[Value] {
        self.recent_list("alerts")
    }

    pub fn new_logs(&self) -> impl Iterator<Item = &Value> {
        self.new_logs.iter()
    }

    pub fn new_alerts(&self) -> impl Iterator<Item = &Value> {
        self.new_alerts.iter()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn unknown_frames(&self) -> u64 {
        self.unknown_frames
    }

    fn recent_list(&self, key: &str) -> &[Value] {
        self.recent_activity
            .as_ref()
            .and_then(|recent| recent.get(key))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

fn push_bounded(buffer: &mut VecDeque<Value>, item: Value, limit: usize) {
    buffer.push_front(item);
    buffer.truncate(limit);
}

fn field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("-")
}

pub fn render_log(log: &Value) -> String {
    format!(
        "{} [{}] {}/{}: {}",
        field(log, "timestamp"),
        field(log, "severity"),
        field(log, "source"),
        field(log, "log_type"),
        field(log, "message")
    )
}

pub fn render_alert(alert: &Value) -> String {
    format!(
        "{} [{}] ({}) {} - {}",
        field(alert, "id"),
        field(alert, "severity"),
        field(alert, "status"),
        field(alert, "alert_type"),
        field(alert, "title")
    )
}

pub fn render_rule(rule: &Value) -> String {
    let enabled = rule.get("enabled").and_then(Value::as_bool).unwrap_or(false);
    format!(
        "{} {} {}",
        field(rule, "id"),
        if enabled { "on " } else { "off" },
        field(rule, "name")
    )
}

/// One line per live event
pub fn render_event(event: &LiveEvent) -> String {
    match event {
        LiveEvent::Metrics(data) => format!("metrics   {}", data),
        LiveEvent::RecentActivity(data) => {
            let count = |key: &str| data.get(key).and_then(Value::as_array).map_or(0, Vec::len);
            format!("activity  {} logs, {} alerts", count("logs"), count("alerts"))
        }
        LiveEvent::NewLog(log) => format!("new log   {}", render_log(log)),
        LiveEvent::NewAlert(alert) => format!("new alert {}", render_alert(alert)),
        LiveEvent::Unknown(raw) => format!("unknown   {}", raw),
    }
}
