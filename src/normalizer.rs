//! Normalizer (C3): turns a raw notification envelope into a
//! [`CanonicalAlarm`], then runs it through the filter (C4) before handing it
//! back to the caller.
//!
//! The context sets for C4 are supplied by the caller (normally the bus
//! consumer, after a C6 query) rather than fetched here, so this module has
//! no store dependency of its own.

use crate::filter::{self, Decision};
use crate::model::{CanonicalAlarm, EventType, RootAlarmContext};
use crate::object_parser::parse_affected_object;
use crate::severity::map_severity;
use crate::time::epoch_ms_to_local;
use chrono_tz::Tz;
use serde_json::Value;

fn str_field<'a>(body: &'a Value, key: &str) -> Option<String> {
    body.get(key).and_then(Value::as_str).map(str::to_string)
}

fn bool_field(body: &Value, key: &str) -> Option<bool> {
    body.get(key).and_then(Value::as_bool)
}

/// Locate `data -> "ietf-restconf:notification"`, then the single key within
/// it beginning with `nsp-fault:`. Returns the notification object itself
/// (`eventTime` is a sibling of the alarm body, not a field inside it), the
/// stripped event-type string, and the alarm body object. `None` on any
/// structural mismatch.
fn locate_fault_body(envelope: &Value) -> Option<(&Value, &str, &Value)> {
    let notification = envelope.get("data")?.get("ietf-restconf:notification")?;
    let obj = notification.as_object()?;
    obj.iter().find_map(|(key, value)| {
        let event_type = key.strip_prefix("nsp-fault:")?;
        if value.is_object() {
            Some((notification, event_type, value))
        } else {
            None
        }
    })
}

/// Project a raw vendor envelope into a [`CanonicalAlarm`], then evaluate the
/// filter with the supplied correlation context. Returns `None` if the
/// envelope is structurally invalid or the filter decides to drop it.
pub fn normalize(
    envelope: &Value,
    tz: &Tz,
    active_power_issues: &[RootAlarmContext],
    active_los_roots: &[RootAlarmContext],
) -> Option<CanonicalAlarm> {
    let (notification, event_type_raw, body) = locate_fault_body(envelope)?;

    let specific_problem = str_field(body, "specificProblem");
    let severity_raw = body.get("severity").cloned().unwrap_or(Value::Null);
    let severity = map_severity(&severity_raw, specific_problem.as_deref());

    let affected_object = str_field(body, "affectedObject");
    let object_details = parse_affected_object(affected_object.as_deref());

    let first_detected = body
        .get("firstTimeDetected")
        .and_then(|ts| epoch_ms_to_local(ts, tz));
    let last_detected = body
        .get("lastTimeDetected")
        .and_then(|ts| epoch_ms_to_local(ts, tz));

    let alarm = CanonicalAlarm {
        event_type: EventType::from_str(event_type_raw),
        event_time: str_field(notification, "eventTime"),
        alarm_id: str_field(body, "objectId"),
        alarm_name: str_field(body, "alarmName"),
        specific_problem,
        probable_cause: str_field(body, "probableCause"),
        ne_name: str_field(body, "neName"),
        ne_id: str_field(body, "neId"),
        source: str_field(body, "sourceType"),
        severity_raw,
        severity,
        affected_object,
        affected_object_name: str_field(body, "affectedObjectName"),
        object_type: str_field(body, "affectedObjectType"),
        object_details,
        first_detected,
        last_detected,
        acknowledged: bool_field(body, "acknowledged").unwrap_or(false),
        service_affecting: bool_field(body, "serviceAffecting"),
        implicitly_cleared: bool_field(body, "implicitlyCleared").unwrap_or(false),
    };

    match filter::evaluate(&alarm, active_power_issues, active_los_roots) {
        Decision::Keep => Some(alarm),
        Decision::Drop => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dhaka() -> Tz {
        "Asia/Dhaka".parse().unwrap()
    }

    fn wrap(body: Value) -> Value {
        json!({
            "data": {
                "ietf-restconf:notification": {
                    "eventTime": "2026-01-23T17:05:10+06:00",
                    "nsp-fault:alarm-create": body
                }
            }
        })
    }

    fn sample_body() -> Value {
        json!({
            "objectId": "a-1",
            "alarmName": "Loss of signal - OCH",
            "specificProblem": "LOS",
            "neName": "NE1",
            "neId": "ne-1",
            "sourceType": "NFMT",
            "severity": "critical",
            "affectedObject": "shelf-1:slot-2:port-3",
            "affectedObjectName": "Benapole/OPS-3-7-A3,OCH,RCV",
            "affectedObjectType": "TP",
            "firstTimeDetected": 1_700_000_000_000i64,
            "lastTimeDetected": 1_700_000_000_000i64,
        })
    }

    #[test]
    fn missing_notification_body_yields_none() {
        assert!(normalize(&json!({}), &dhaka(), &[], &[]).is_none());
    }

    #[test]
    fn missing_fault_key_yields_none() {
        let envelope = json!({"data": {"ietf-restconf:notification": {"some-other-key": {}}}});
        assert!(normalize(&envelope, &dhaka(), &[], &[]).is_none());
    }

    #[test]
    fn valid_envelope_is_normalized_and_kept() {
        let envelope = wrap(sample_body());
        let alarm = normalize(&envelope, &dhaka(), &[], &[]).expect("should be kept");
        assert_eq!(alarm.alarm_id.as_deref(), Some("a-1"));
        assert_eq!(alarm.alarm_name.as_deref(), Some("Loss of signal - OCH"));
        assert_eq!(alarm.source.as_deref(), Some("NFMT"));
        assert_eq!(alarm.object_type.as_deref(), Some("TP"));
        assert_eq!(alarm.event_time.as_deref(), Some("2026-01-23T17:05:10+06:00"));
        assert_eq!(alarm.severity, crate::model::Severity::Critical);
        assert_eq!(alarm.object_details.shelf.as_deref(), Some("shelf-1"));
        assert!(alarm.first_detected.is_some());
        matches!(alarm.event_type, EventType::AlarmCreate);
    }

    #[test]
    fn event_time_is_read_from_the_notification_not_the_alarm_body() {
        let mut envelope = wrap(sample_body());
        envelope["data"]["ietf-restconf:notification"]["eventTime"] = json!("2026-02-01T00:00:00Z");
        let alarm = normalize(&envelope, &dhaka(), &[], &[]).expect("should be kept");
        assert_eq!(alarm.event_time.as_deref(), Some("2026-02-01T00:00:00Z"));
    }

    #[test]
    fn unparseable_timestamp_is_not_fatal() {
        let mut body = sample_body();
        body["firstTimeDetected"] = json!("garbage");
        let envelope = wrap(body);
        let alarm = normalize(&envelope, &dhaka(), &[], &[]).expect("should still normalize");
        assert!(alarm.first_detected.is_none());
    }

    #[test]
    fn static_noise_is_dropped_by_the_filter_step() {
        let mut body = sample_body();
        body["alarmName"] = json!("BASELINE");
        let envelope = wrap(body);
        assert!(normalize(&envelope, &dhaka(), &[], &[]).is_none());
    }

    #[test]
    fn power_child_is_suppressed_given_matching_context() {
        let mut body = sample_body();
        body["alarmName"] = json!("Power Adjustment Required");
        body["affectedObjectType"] = json!("TP");
        body["affectedObjectName"] = json!("Benapole/OPS-3-7-B1,OCH");
        let envelope = wrap(body);

        let root = RootAlarmContext {
            alarm_name: Some("Power Issue".into()),
            severity: crate::model::Severity::Major,
            affected_object_name: Some("Benapole/OPS-3-7-A3,OCH,RCV".into()),
            first_detected: epoch_ms_to_local(&json!(1_700_000_000_000i64), &dhaka()),
            ne_name: Some("NE1".into()),
        };

        assert!(normalize(&envelope, &dhaka(), &[root], &[]).is_none());
    }

    #[test]
    fn clear_event_always_survives_the_filter() {
        let mut body = sample_body();
        body["alarmName"] = json!("BASELINE");
        body["severity"] = json!({"new-value": "cleared"});
        let envelope = wrap(body);
        assert!(normalize(&envelope, &dhaka(), &[], &[]).is_some());
    }
}
