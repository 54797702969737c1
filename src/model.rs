//! Canonical alarm schema shared by the normalizer, filter, and store.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Closed severity enum. `Unknown` is a legitimate, loggable outcome rather
/// than an error - the upstream vendor occasionally emits severities this
/// pipeline has never seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Critical,
    Major,
    Minor,
    Warning,
    Info,
    Clear,
    Unknown,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Critical => "CRITICAL",
            Severity::Major => "MAJOR",
            Severity::Minor => "MINOR",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
            Severity::Clear => "CLEAR",
            Severity::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Closed event-type enum over the notification kinds the upstream emits.
/// `Unknown` preserves the original string verbatim for logging - the
/// upstream's event-type vocabulary is not guaranteed closed. Serialized as
/// its bare string form (matching the vendor's own `nsp-fault:` suffix) via
/// a hand-written impl, since derive can't mix fixed variants with a
/// catch-all string payload under one representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    AlarmCreate,
    AlarmChange,
    AlarmDelete,
    Unknown(String),
}

impl EventType {
    pub fn from_str(raw: &str) -> Self {
        match raw {
            "alarm-create" => EventType::AlarmCreate,
            "alarm-change" => EventType::AlarmChange,
            "alarm-delete" => EventType::AlarmDelete,
            other => EventType::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventType::AlarmCreate => "alarm-create",
            EventType::AlarmChange => "alarm-change",
            EventType::AlarmDelete => "alarm-delete",
            EventType::Unknown(s) => s.as_str(),
        }
    }
}

impl Serialize for EventType {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(EventType::from_str(&raw))
    }
}

/// Shelf/slot/port identifiers extracted from a compound affected-object
/// string. Any subset of the three may be present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shelf: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
}

/// The record flowing through the pipeline from the normalizer onward, and
/// the exact shape stored as the `alarm` JSONB payload in both
/// `active_alarms` and `alarm_history`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalAlarm {
    pub event_type: EventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_time: Option<String>,

    pub alarm_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alarm_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specific_problem: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probable_cause: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ne_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ne_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(default)]
    pub severity_raw: serde_json::Value,
    pub severity: Severity,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected_object: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected_object_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    #[serde(default)]
    pub object_details: ObjectDetails,

    /// ISO-8601 in the configured local zone. Kept typed (rather than a bare
    /// string) so the filter never re-parses a timestamp this process just
    /// formatted; it still serializes to an ISO-8601 string on the wire and
    /// in storage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_detected: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_detected: Option<DateTime<FixedOffset>>,

    #[serde(default)]
    pub acknowledged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_affecting: Option<bool>,
    #[serde(default)]
    pub implicitly_cleared: bool,
}

/// The subset of a stored alarm's fields the filter needs to evaluate
/// correlation against an active root cause. Deliberately narrower than
/// [`CanonicalAlarm`] - C6 projects active-store rows into this shape so C4
/// stays a pure function of plain data, never reading the store itself.
#[derive(Debug, Clone)]
pub struct RootAlarmContext {
    pub alarm_name: Option<String>,
    pub severity: Severity,
    pub affected_object_name: Option<String>,
    pub first_detected: Option<DateTime<FixedOffset>>,
    pub ne_name: Option<String>,
}

impl RootAlarmContext {
    pub fn from_alarm(alarm: &CanonicalAlarm) -> Self {
        Self {
            alarm_name: alarm.alarm_name.clone(),
            severity: alarm.severity,
            affected_object_name: alarm.affected_object_name.clone(),
            first_detected: alarm.first_detected,
            ne_name: alarm.ne_name.clone(),
        }
    }
}

/// Raw, untyped object-detail map as produced by the object parser before
/// it is folded into [`ObjectDetails`]. Kept as a plain map so the parser
/// stays a simple string-splitting routine independent of the schema.
pub type RawObjectDetails = HashMap<String, String>;

impl From<RawObjectDetails> for ObjectDetails {
    fn from(mut raw: RawObjectDetails) -> Self {
        ObjectDetails {
            shelf: raw.remove("shelf"),
            slot: raw.remove("slot"),
            port: raw.remove("port"),
        }
    }
}
