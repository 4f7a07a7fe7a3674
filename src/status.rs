//! Status line: dataset freshness and counts in one human-readable line.

use chrono::{DateTime, Local, Utc};

use crate::models::StatusSnapshot;
use crate::render::PLACEHOLDER;

/// Shown when the status fetch failed.
pub const UNAVAILABLE: &str = "Estado no disponible";

/// Describe a status snapshot as seen at `now`.
///
/// `None` means the status could not be fetched and yields `UNAVAILABLE`;
/// a snapshot with missing fields still renders, with placeholders.
#[must_use]
pub fn describe(snapshot: Option<&StatusSnapshot>, now: DateTime<Utc>) -> String {
    let Some(snapshot) = snapshot else {
        return UNAVAILABLE.to_string();
    };

    let (stamp, ago) = match snapshot.last_update {
        Some(at) => (
            at.with_timezone(&Local)
                .format("%d/%m/%Y %H:%M:%S")
                .to_string(),
            format_elapsed(now, at),
        ),
        None => (PLACEHOLDER.to_string(), PLACEHOLDER.to_string()),
    };

    format!(
        "Última actualización: {stamp} (hace {ago}) · Hoy: {} · Total: {}",
        count(snapshot.today),
        count(snapshot.total),
    )
}

/// Elapsed time between `then` and `now`: seconds under a minute, minutes
/// under an hour, hours beyond. Future instants read as `0 s`.
#[must_use]
pub fn format_elapsed(now: DateTime<Utc>, then: DateTime<Utc>) -> String {
    let secs = now.signed_duration_since(then).num_seconds().max(0);
    match secs {
        s if s < 60 => format!("{s} s"),
        s if s < 3600 => format!("{} min", s / 60),
        s => format!("{} h", s / 3600),
    }
}

fn count(value: Option<u64>) -> String {
    value.map_or_else(|| PLACEHOLDER.to_string(), |n| n.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_describe_scenario() {
        let snap = StatusSnapshot::from_value(&json!({
            "last_update": 1_700_000_000, "today": 5, "total": 12000
        }))
        .unwrap();

        let line = describe(Some(&snap), at(1_700_000_000 + 125));
        assert!(line.contains("Hoy: 5"), "{line}");
        assert!(line.contains("Total: 12000"), "{line}");
        assert!(line.contains("hace 2 min"), "{line}");
    }

    #[test]
    fn test_elapsed_units() {
        let base = at(1_000_000);
        assert_eq!(format_elapsed(at(1_000_059), base), "59 s");
        assert_eq!(format_elapsed(at(1_000_060), base), "1 min");
        assert_eq!(format_elapsed(at(1_003_599), base), "59 min");
        assert_eq!(format_elapsed(at(1_003_600), base), "1 h");
        assert_eq!(format_elapsed(at(1_000_000 + 26 * 3600), base), "26 h");
        assert_eq!(format_elapsed(at(999_000), base), "0 s");
    }

    #[test]
    fn test_missing_fields_use_placeholder() {
        let line = describe(Some(&StatusSnapshot::default()), at(0));
        assert_eq!(
            line,
            "Última actualización: N/A (hace N/A) · Hoy: N/A · Total: N/A"
        );
    }

    #[test]
    fn test_failure_is_distinct() {
        assert_eq!(describe(None, at(0)), UNAVAILABLE);
        assert_ne!(describe(Some(&StatusSnapshot::default()), at(0)), UNAVAILABLE);
    }
}
