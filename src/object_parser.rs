//! Object parser (C2): extracts shelf/slot/port identifiers from a compound
//! affected-object string such as `shelf-1:slot-3:port-7`.

use crate::model::{ObjectDetails, RawObjectDetails};

/// Split `affected_object` on `:` and record each segment beginning with
/// `shelf`, `slot`, or `port` under that key. Later occurrences of the same
/// prefix overwrite earlier ones. Absent input yields an empty result.
pub fn parse_affected_object(affected_object: Option<&str>) -> ObjectDetails {
    let Some(obj) = affected_object else {
        return ObjectDetails::default();
    };
    if obj.is_empty() {
        return ObjectDetails::default();
    }

    let mut parsed: RawObjectDetails = RawObjectDetails::new();
    for segment in obj.split(':') {
        if segment.starts_with("shelf") {
            parsed.insert("shelf".to_string(), segment.to_string());
        } else if segment.starts_with("slot") {
            parsed.insert("slot".to_string(), segment.to_string());
        } else if segment.starts_with("port") {
            parsed.insert("port".to_string(), segment.to_string());
        }
    }
    parsed.into()
}
