//! Severity mapper (C1): maps heterogeneous vendor severity shapes to the
//! closed [`Severity`] enum.

use crate::model::Severity;
use serde_json::Value;

/// Map a raw vendor severity value plus the alarm's `specific_problem` to a
/// closed [`Severity`]. `raw` may be a JSON string, an object carrying one of
/// `{value, name, severity, new-value}`, or `Value::Null` if the field was
/// absent.
pub fn map_severity(raw: &Value, specific_problem: Option<&str>) -> Severity {
    // alarm-change CLEAR payloads mark themselves via `new-value`.
    if let Some(new_value) = raw.get("new-value").and_then(Value::as_str) {
        if new_value == "cleared" {
            return Severity::Clear;
        }
    }

    if let Some(problem) = specific_problem {
        if problem.starts_with("SEC_") {
            return Severity::Info;
        }
    }

    let working = match raw {
        Value::Object(_) => raw
            .get("value")
            .or_else(|| raw.get("name"))
            .or_else(|| raw.get("severity"))
            .and_then(Value::as_str),
        Value::String(s) => Some(s.as_str()),
        _ => None,
    };

    let Some(working) = working else {
        return Severity::Unknown;
    };

    match working.trim().to_lowercase().as_str() {
        "info" | "informational" | "indeterminate" | "condition" => Severity::Info,
        "clear" => Severity::Clear,
        "warning" => Severity::Warning,
        "minor" => Severity::Minor,
        "major" => Severity::Major,
        "critical" => Severity::Critical,
        _ => Severity::Unknown,
    }
}
