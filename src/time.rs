//! Timestamp conversion shared by the normalizer.
//!
//! The upstream emits `firstTimeDetected`/`lastTimeDetected` as epoch
//! milliseconds, but not uniformly: it may be a bare number, a numeric
//! string, or an object carrying `{value, milliseconds, seconds}`. Parsing
//! never fails the surrounding normalization - an unparseable timestamp
//! simply becomes `None`.

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use chrono_tz::Tz;
use serde_json::Value;

/// Pull an epoch-millisecond integer out of any of the shapes the upstream
/// may send.
fn extract_epoch_millis(ts: &Value) -> Option<i64> {
    match ts {
        Value::Null => None,
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            if s.chars().all(|c| c.is_ascii_digit()) && !s.is_empty() {
                s.parse::<i64>().ok()
            } else {
                None
            }
        }
        Value::Object(_) => {
            if let Some(v) = ts.get("value") {
                return extract_epoch_millis(v);
            }
            if let Some(v) = ts.get("milliseconds") {
                return extract_epoch_millis(v);
            }
            if let Some(v) = ts.get("seconds").and_then(Value::as_i64) {
                return Some(v * 1000);
            }
            None
        }
        _ => None,
    }
}

/// Convert an epoch-millisecond timestamp (in any of the upstream's shapes)
/// into an ISO-8601 timestamp in the configured local timezone. Returns
/// `None` on any parse failure rather than propagating an error - timestamp
/// trouble must never fail normalization of an otherwise-valid alarm.
pub fn epoch_ms_to_local(ts: &Value, tz: &Tz) -> Option<DateTime<FixedOffset>> {
    let millis = extract_epoch_millis(ts)?;
    let utc = Utc.timestamp_millis_opt(millis).single()?;
    let local = utc.with_timezone(tz);
    Some(local.fixed_offset())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dhaka() -> Tz {
        "Asia/Dhaka".parse().unwrap()
    }

    #[test]
    fn converts_bare_number() {
        let ts = json!(1700000000000i64);
        let dt = epoch_ms_to_local(&ts, &dhaka()).unwrap();
        assert_eq!(dt.timezone().local_minus_utc(), 6 * 3600);
    }

    #[test]
    fn converts_numeric_string() {
        let ts = json!("1700000000000");
        assert!(epoch_ms_to_local(&ts, &dhaka()).is_some());
    }

    #[test]
    fn converts_object_with_milliseconds() {
        let ts = json!({"milliseconds": 1700000000000i64});
        assert!(epoch_ms_to_local(&ts, &dhaka()).is_some());
    }

    #[test]
    fn converts_object_with_seconds_multiplied_by_1000() {
        let ts = json!({"seconds": 1700000000i64});
        let from_seconds = epoch_ms_to_local(&ts, &dhaka()).unwrap();
        let from_millis = epoch_ms_to_local(&json!(1700000000000i64), &dhaka()).unwrap();
        assert_eq!(from_seconds, from_millis);
    }

    #[test]
    fn non_numeric_string_is_none() {
        assert!(epoch_ms_to_local(&json!("not-a-number"), &dhaka()).is_none());
    }

    #[test]
    fn null_is_none() {
        assert!(epoch_ms_to_local(&Value::Null, &dhaka()).is_none());
    }
}
