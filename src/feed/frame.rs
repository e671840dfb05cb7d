//! Live feed frames
//!
//! Every frame the monitoring socket sends is a JSON object of the form
//! `{"type": "<kind>", "data": <payload>}`. Frames are kept verbatim; the
//! typed view is computed on demand.

use serde_json::Value;

pub const METRICS: &str = "metrics";
pub const RECENT_ACTIVITY: &str = "recent_activity";
pub const NEW_LOG: &str = "new_log";
pub const NEW_ALERT: &str = "new_alert";

/// Typed interpretation of a feed frame
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    /// Periodic metrics snapshot (`data` payload)
    Metrics(Value),
    /// Recent logs and alerts (`data` payload: `{"logs": [...], "alerts": [...]}`)
    RecentActivity(Value),
    /// A log entry was ingested (`data` payload)
    NewLog(Value),
    /// An alert was raised (`data` payload)
    NewAlert(Value),
    /// Unrecognized discriminator; the whole raw frame
    Unknown(Value),
}

impl LiveEvent {
    /// Discriminator name, `unknown` for unrecognized frames
    pub fn kind(&self) -> &'static str {
        match self {
            LiveEvent::Metrics(_) => METRICS,
            LiveEvent::RecentActivity(_) => RECENT_ACTIVITY,
            LiveEvent::NewLog(_) => NEW_LOG,
            LiveEvent::NewAlert(_) => NEW_ALERT,
            LiveEvent::Unknown(_) => "unknown",
        }
    }
}

/// A successfully parsed feed frame, exactly as received
#[derive(Debug, Clone, PartialEq)]
pub struct FeedMessage {
    raw: Value,
}

impl FeedMessage {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn into_raw(self) -> Value {
        self.raw
    }

    /// Declared `type`, if the frame has a string discriminator
    pub fn kind(&self) -> Option<&str> {
        self.raw.get("type").and_then(Value::as_str)
    }

    /// `data` payload, if present
    pub fn data(&self) -> Option<&Value> {
        self.raw.get("data")
    }

    /// Classify the frame by its discriminator
    pub fn event(&self) -> LiveEvent {
        let data = || self.data().cloned().unwrap_or(Value::Null);
        match self.kind() {
            Some(METRICS) => LiveEvent::Metrics(data()),
            Some(RECENT_ACTIVITY) => LiveEvent::RecentActivity(data()),
            Some(NEW_LOG) => LiveEvent::NewLog(data()),
            Some(NEW_ALERT) => LiveEvent::NewAlert(data()),
            _ => LiveEvent::Unknown(self.raw.clone()),
        }
    }
}

/// Parse one text frame
pub fn parse_frame(text: &str) -> Result<FeedMessage, serde_json::Error> {
    serde_json::from_str(text).map(FeedMessage::new)
}
