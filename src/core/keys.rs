//! Key construction and parsing for the five store key families
//! (spec.md §3). Key strings are part of the store's wire contract; the
//! format is not an implementation detail.

use crate::core::model::{DayType, TimeBucket};

pub const DUR_PREFIX: &str = "dur:";
pub const BASE_PREFIX: &str = "base:";
pub const SPANDUR_PREFIX: &str = "spandur:";
pub const SPANBASE_PREFIX: &str = "spanbase:";
pub const SEEN_PREFIX: &str = "seen:";
pub const DIRTY_SET_KEY: &str = "dirtyKeys";

fn bucketed(prefix: &str, service: &str, leaf: &str, bucket: TimeBucket) -> String {
    format!(
        "{prefix}{service}|{leaf}|{hour}|{day}",
        hour = bucket.hour,
        day = bucket.day_type.as_str()
    )
}

pub fn duration_key(service: &str, endpoint: &str, bucket: TimeBucket) -> String {
    bucketed(DUR_PREFIX, service, endpoint, bucket)
}

pub fn baseline_key(service: &str, endpoint: &str, bucket: TimeBucket) -> String {
    bucketed(BASE_PREFIX, service, endpoint, bucket)
}

pub fn span_duration_key(service: &str, span_name: &str, bucket: TimeBucket) -> String {
    bucketed(SPANDUR_PREFIX, service, span_name, bucket)
}

pub fn span_baseline_key(service: &str, span_name: &str, bucket: TimeBucket) -> String {
    bucketed(SPANBASE_PREFIX, service, span_name, bucket)
}

pub fn seen_key(trace_id: &str) -> String {
    format!("{SEEN_PREFIX}{trace_id}")
}

/// A baseline key's derived duration key, parsed back out for the
/// recomputer (C5) and the introspection/list-available paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedBaselineKey {
    pub service: String,
    pub leaf: String,
    pub bucket: TimeBucket,
    pub is_span: bool,
}

impl ParsedBaselineKey {
    pub fn duration_key(&self) -> String {
        if self.is_span {
            span_duration_key(&self.service, &self.leaf, self.bucket)
        } else {
            duration_key(&self.service, &self.leaf, self.bucket)
        }
    }
}

/// Parses `base:<service>|<endpoint>|<hour>|<dayType>` or
/// `spanbase:<service>|<spanName>|<hour>|<dayType>`. Returns `None` for
/// unknown prefixes or malformed bodies; callers log and discard (spec.md
/// §3 invariant: "unknown prefixes are logged and discarded by the
/// recomputer").
pub fn parse_baseline_key(key: &str) -> Option<ParsedBaselineKey> {
    let (is_span, body) = if let Some(rest) = key.strip_prefix(SPANBASE_PREFIX) {
        (true, rest)
    } else if let Some(rest) = key.strip_prefix(BASE_PREFIX) {
        (false, rest)
    } else {
        return None;
    };

    let mut parts = body.split('|');
    let service = parts.next()?.to_string();
    let leaf = parts.next()?.to_string();
    let hour: u8 = parts.next()?.parse().ok()?;
    let day_type = DayType::parse(parts.next()?)?;
    if parts.next().is_some() || hour > 23 {
        return None;
    }

    Some(ParsedBaselineKey {
        service,
        leaf,
        bucket: TimeBucket { hour, day_type },
        is_span,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(hour: u8, day_type: DayType) -> TimeBucket {
        TimeBucket { hour, day_type }
    }

    #[test]
    fn trace_key_shapes() {
        let b = bucket(16, DayType::Weekday);
        assert_eq!(duration_key("api", "GET /u", b), "dur:api|GET /u|16|weekday");
        assert_eq!(baseline_key("api", "GET /u", b), "base:api|GET /u|16|weekday");
    }

    #[test]
    fn span_key_shapes() {
        let b = bucket(9, DayType::Weekend);
        assert_eq!(
            span_duration_key("api", "handler.exec", b),
            "spandur:api|handler.exec|9|weekend"
        );
        assert_eq!(
            span_baseline_key("api", "handler.exec", b),
            "spanbase:api|handler.exec|9|weekend"
        );
    }

    #[test]
    fn round_trips_through_parse() {
        let key = baseline_key("api", "GET /u", bucket(16, DayType::Weekday));
        let parsed = parse_baseline_key(&key).unwrap();
        assert_eq!(parsed.service, "api");
        assert_eq!(parsed.leaf, "GET /u");
        assert_eq!(parsed.bucket, bucket(16, DayType::Weekday));
        assert!(!parsed.is_span);
        assert_eq!(parsed.duration_key(), "dur:api|GET /u|16|weekday");
    }

    #[test]
    fn rejects_unknown_prefix() {
        assert!(parse_baseline_key("dur:api|GET /u|16|weekday").is_none());
        assert!(parse_baseline_key("dirtyKeys").is_none());
    }

    #[test]
    fn rejects_malformed_body() {
        assert!(parse_baseline_key("base:api|GET /u|25|weekday").is_none());
        assert!(parse_baseline_key("base:api|GET /u|16|someday").is_none());
        assert!(parse_baseline_key("base:api|GET /u|16").is_none());
    }
}
