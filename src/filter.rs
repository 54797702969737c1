//! Filter / correlation engine (C4).
//!
//! A pure function of the candidate alarm plus two context snapshots
//! (`active_power_issues`, `active_los_roots`) read from the active store by
//! the context provider (C6) before filtering. No field of this module ever
//! reads the store directly - that separation is what keeps the filter a
//! function of its arguments, and thus trivially unit-testable.

use crate::model::{CanonicalAlarm, RootAlarmContext, Severity};
use chrono::Duration;

const POWER_CHILD_WINDOW: Duration = Duration::minutes(10);
const LOS_CHILD_WINDOW: Duration = Duration::seconds(30);

const POWER_CHILD_NAMES: &[&str] = &["Power Adjustment Required", "Power Adjustment Failure"];
const LOS_CHILD_NAMES: &[&str] = &["Transport Failure", "OPS Protection Loss of Redundancy"];
const STATIC_NOISE_ALARM_NAMES: &[&str] =
    &["SR_RESTORED", "SR_MANUAL_SWITCH", "BASELINE", "Adjacency Not Found"];
const STATIC_NOISE_PROBABLE_CAUSES: &[&str] = &["OPR", "PWRSUSP", "MAINT2-ALLOWED-REMOTE"];

/// Decision returned by [`evaluate`]. `Drop` carries the rule that matched,
/// purely to make logging at the call site informative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Keep,
    Drop,
}

impl Decision {
    pub fn is_keep(self) -> bool {
        matches!(self, Decision::Keep)
    }
}

/// Extract the OPS-span token (`OPS-<shelf>-<slot>`) from a slash-delimited
/// affected-object name. Returns `None` if no segment beginning with `OPS-`
/// is present.
pub fn ops_span(name: &str) -> Option<String> {
    let segment = name.split('/').find(|s| s.starts_with("OPS-"))?;
    let tokens: Vec<&str> = segment.split('-').take(3).collect();
    if tokens.len() < 3 {
        return None;
    }
    Some(tokens.join("-"))
}

fn ops_span_matches(child_name: Option<&str>, root_name: Option<&str>) -> bool {
    let (Some(c), Some(r)) = (child_name, root_name) else {
        return false;
    };
    match (ops_span(c), ops_span(r)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn within_window(child_time: Option<chrono::DateTime<chrono::FixedOffset>>, root_time: Option<chrono::DateTime<chrono::FixedOffset>>, window: Duration) -> bool {
    match (child_time, root_time) {
        (Some(c), Some(r)) => (c - r).abs() <= window,
        _ => false,
    }
}

fn starts_with(field: &Option<String>, prefix: &str) -> bool {
    field.as_deref().is_some_and(|s| s.starts_with(prefix))
}

fn contains(field: &Option<String>, needle: &str) -> bool {
    field.as_deref().is_some_and(|s| s.contains(needle))
}

fn ends_with_any(field: &Option<String>, suffixes: &[&str]) -> bool {
    field
        .as_deref()
        .is_some_and(|s| suffixes.iter().any(|suf| s.ends_with(suf)))
}

fn is_power_child_suppressed(alarm: &CanonicalAlarm, roots: &[RootAlarmContext]) -> bool {
    let is_power_child = alarm
        .alarm_name
        .as_deref()
        .is_some_and(|n| POWER_CHILD_NAMES.contains(&n))
        && alarm.object_type.as_deref() == Some("TP");
    if !is_power_child {
        return false;
    }

    roots.iter().any(|root| {
        within_window(alarm.first_detected, root.first_detected, POWER_CHILD_WINDOW)
            && ops_span_matches(
                alarm.affected_object_name.as_deref(),
                root.affected_object_name.as_deref(),
            )
    })
}

fn is_los_child_suppressed(alarm: &CanonicalAlarm, roots: &[RootAlarmContext]) -> bool {
    let is_los_child = alarm
        .alarm_name
        .as_deref()
        .is_some_and(|n| LOS_CHILD_NAMES.contains(&n));
    if !is_los_child {
        return false;
    }

    roots.iter().any(|root| {
        root.alarm_name.as_deref() == Some("Loss of signal - OCH")
            && root.severity == Severity::Critical
            && within_window(alarm.first_detected, root.first_detected, LOS_CHILD_WINDOW)
            && (ops_span_matches(
                alarm.affected_object_name.as_deref(),
                root.affected_object_name.as_deref(),
            ) || (alarm.ne_name.is_some() && alarm.ne_name == root.ne_name))
    })
}

fn is_static_noise(alarm: &CanonicalAlarm) -> bool {
    if starts_with(&alarm.object_type, "NE")
        && contains(&alarm.object_type, "CLI")
        && ends_with_any(&alarm.object_type, &["Login", "Logout"])
    {
        return true;
    }
    if starts_with(&alarm.probable_cause, "NE") && ends_with_any(&alarm.probable_cause, &["Login", "Logout"]) {
        return true;
    }
    if starts_with(&alarm.object_type, "Indicates")
        && contains(&alarm.object_type, "Threshold")
        && ends_with_any(&alarm.object_type, &["detection"])
    {
        return true;
    }
    if starts_with(&alarm.object_type, "Power")
        && contains(&alarm.object_type, "management")
        && ends_with_any(&alarm.object_type, &["suspended"])
    {
        return true;
    }
    if alarm
        .alarm_name
        .as_deref()
        .is_some_and(|n| STATIC_NOISE_ALARM_NAMES.contains(&n))
    {
        return true;
    }
    if alarm.specific_problem.as_deref() == Some("SEC_NA") {
        return true;
    }
    if alarm
        .probable_cause
        .as_deref()
        .is_some_and(|c| STATIC_NOISE_PROBABLE_CAUSES.contains(&c))
    {
        return true;
    }
    if starts_with(&alarm.probable_cause, "T-") && ends_with_any(&alarm.probable_cause, &["15-MIN", "1-DAY"]) {
        return true;
    }
    if starts_with(&alarm.alarm_name, "Quality Threshold Crossed") && ends_with_any(&alarm.alarm_name, &["15m", "24h"])
    {
        return true;
    }
    if matches!(alarm.severity, Severity::Warning | Severity::Info) {
        return true;
    }
    false
}

/// Evaluate the filter/correlation decision for `alarm`.
///
/// `active_power_issues` and `active_los_roots` are context snapshots from
/// C6, taken once per incoming message before filtering; both may be empty.
pub fn evaluate(
    alarm: &CanonicalAlarm,
    active_power_issues: &[RootAlarmContext],
    active_los_roots: &[RootAlarmContext],
) -> Decision {
    if alarm.severity == Severity::Clear {
        return Decision::Keep;
    }

    if alarm.alarm_name.as_deref() == Some("Power Issue")
        && alarm.object_type.as_deref() == Some("PHYSICALCONNECTION")
    {
        return Decision::Keep;
    }

    if is_power_child_suppressed(alarm, active_power_issues) {
        return Decision::Drop;
    }

    if is_los_child_suppressed(alarm, active_los_roots) {
        return Decision::Drop;
    }

    if is_static_noise(alarm) {
        return Decision::Drop;
    }

    Decision::Keep
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EventType, ObjectDetails};
    use chrono::{DateTime, FixedOffset};

    fn ts(epoch_millis: i64) -> DateTime<FixedOffset> {
        DateTime::from_timestamp_millis(epoch_millis)
            .unwrap()
            .fixed_offset()
    }

    fn base_alarm() -> CanonicalAlarm {
        CanonicalAlarm {
            event_type: EventType::AlarmCreate,
            event_time: None,
            alarm_id: Some("a1".into()),
            alarm_name: None,
            specific_problem: None,
            probable_cause: None,
            ne_name: Some("NE1".into()),
            ne_id: None,
            source: None,
            severity_raw: serde_json::Value::Null,
            severity: Severity::Major,
            affected_object: None,
            affected_object_name: None,
            object_type: None,
            object_details: ObjectDetails::default(),
            first_detected: Some(ts(1_700_000_000_000)),
            last_detected: None,
            acknowledged: false,
            service_affecting: None,
            implicitly_cleared: false,
        }
    }

    #[test]
    fn ops_span_extracts_first_three_dash_tokens() {
        assert_eq!(ops_span("Benapole/OPS-3-7-A3,OCH,RCV"), Some("OPS-3-7".to_string()));
    }

    #[test]
    fn ops_span_absent_when_no_ops_segment() {
        assert_eq!(ops_span("Benapole/TRAIL-1"), None);
    }

    #[test]
    fn ops_span_extraction_is_idempotent() {
        let name = "Benapole/OPS-3-7-A3,OCH,RCV";
        assert_eq!(ops_span(name), ops_span(name));
    }

    #[test]
    fn clear_is_never_dropped() {
        let mut alarm = base_alarm();
        alarm.severity = Severity::Clear;
        alarm.alarm_name = Some("BASELINE".into()); // would otherwise be static noise
        assert_eq!(evaluate(&alarm, &[], &[]), Decision::Keep);
    }

    #[test]
    fn power_issue_root_is_never_suppressed() {
        let mut alarm = base_alarm();
        alarm.alarm_name = Some("Power Issue".into());
        alarm.object_type = Some("PHYSICALCONNECTION".into());
        assert_eq!(evaluate(&alarm, &[], &[]), Decision::Keep);
    }

    #[test]
    fn s1_static_drop_baseline() {
        let mut alarm = base_alarm();
        alarm.alarm_name = Some("BASELINE".into());
        assert_eq!(evaluate(&alarm, &[], &[]), Decision::Drop);
    }

    #[test]
    fn s3_power_child_suppressed_within_window() {
        let root = RootAlarmContext {
            alarm_name: Some("Power Issue".into()),
            severity: Severity::Major,
            affected_object_name: Some("Benapole/OPS-3-7-A3,OCH,RCV".into()),
            first_detected: Some(ts(1_700_000_000_000)),
            ne_name: Some("NE1".into()),
        };
        let mut child = base_alarm();
        child.alarm_name = Some("Power Adjustment Required".into());
        child.object_type = Some("TP".into());
        child.affected_object_name = Some("Benapole/OPS-3-7-B1,OCH".into());
        child.first_detected = Some(ts(1_700_000_300_000)); // +5 minutes

        assert_eq!(evaluate(&child, &[root], &[]), Decision::Drop);
    }

    #[test]
    fn s4_power_child_outside_window_is_kept() {
        let root = RootAlarmContext {
            alarm_name: Some("Power Issue".into()),
            severity: Severity::Major,
            affected_object_name: Some("Benapole/OPS-3-7-A3,OCH,RCV".into()),
            first_detected: Some(ts(1_700_000_000_000)),
            ne_name: Some("NE1".into()),
        };
        let mut child = base_alarm();
        child.alarm_name = Some("Power Adjustment Required".into());
        child.object_type = Some("TP".into());
        child.affected_object_name = Some("Benapole/OPS-3-7-B1,OCH".into());
        child.first_detected = Some(ts(1_700_001_000_000)); // +16.6 minutes

        assert_eq!(evaluate(&child, &[root], &[]), Decision::Keep);
    }

    #[test]
    fn s5_los_child_ne_fallback_within_30s() {
        let root = RootAlarmContext {
            alarm_name: Some("Loss of signal - OCH".into()),
            severity: Severity::Critical,
            affected_object_name: Some("NE9/TRAIL-1".into()),
            first_detected: Some(ts(1_700_000_000_000)),
            ne_name: Some("NE9".into()),
        };
        let mut child = base_alarm();
        child.alarm_name = Some("Transport Failure".into());
        child.ne_name = Some("NE9".into());
        child.affected_object_name = Some("NE9/SomethingElse".into());
        child.first_detected = Some(ts(1_700_000_020_000)); // +20s

        assert_eq!(evaluate(&child, &[], &[root]), Decision::Drop);
    }

    #[test]
    fn los_child_outside_30s_window_is_kept() {
        let root = RootAlarmContext {
            alarm_name: Some("Loss of signal - OCH".into()),
            severity: Severity::Critical,
            affected_object_name: Some("NE9/TRAIL-1".into()),
            first_detected: Some(ts(1_700_000_000_000)),
            ne_name: Some("NE9".into()),
        };
        let mut child = base_alarm();
        child.alarm_name = Some("Transport Failure".into());
        child.ne_name = Some("NE9".into());
        child.first_detected = Some(ts(1_700_000_040_000)); // +40s

        assert_eq!(evaluate(&child, &[], &[root]), Decision::Keep);
    }

    #[test]
    fn los_root_must_be_critical() {
        let root = RootAlarmContext {
            alarm_name: Some("Loss of signal - OCH".into()),
            severity: Severity::Major, // not CRITICAL
            affected_object_name: None,
            first_detected: Some(ts(1_700_000_000_000)),
            ne_name: Some("NE9".into()),
        };
        let mut child = base_alarm();
        child.alarm_name = Some("Transport Failure".into());
        child.ne_name = Some("NE9".into());
        child.first_detected = Some(ts(1_700_000_010_000));

        assert_eq!(evaluate(&child, &[], &[root]), Decision::Keep);
    }

    #[test]
    fn warning_and_info_severities_are_dropped() {
        let mut alarm = base_alarm();
        alarm.alarm_name = Some("Some Random Alarm".into());
        alarm.severity = Severity::Warning;
        assert_eq!(evaluate(&alarm, &[], &[]), Decision::Drop);

        alarm.severity = Severity::Info;
        assert_eq!(evaluate(&alarm, &[], &[]), Decision::Drop);
    }

    #[test]
    fn quality_threshold_crossed_15m_is_dropped() {
        let mut alarm = base_alarm();
        alarm.alarm_name = Some("Quality Threshold Crossed 15m".into());
        assert_eq!(evaluate(&alarm, &[], &[]), Decision::Drop);
    }

    #[test]
    fn filter_is_pure() {
        let alarm = base_alarm();
        let d1 = evaluate(&alarm, &[], &[]);
        let d2 = evaluate(&alarm, &[], &[]);
        assert_eq!(d1, d2);
    }
}
