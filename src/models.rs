//! Data models for quake API responses.
//!
//! The API is loosely typed: numbers may arrive as strings and the same field
//! shows up under several spellings. Each entity lists its accepted aliases in
//! priority order and is resolved once here, so the rest of the crate only
//! sees the canonical `EventRecord` and `StatusSnapshot`.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::QuakeError;

/// Accepted keys, highest priority first.
pub mod aliases {
    pub const LATITUDE: &[&str] = &["lat", "latitude", "latitud"];
    pub const LONGITUDE: &[&str] = &["lon", "lng", "longitude", "longitud"];
    pub const MAGNITUDE: &[&str] = &["mag", "magnitude", "magnitud"];
    pub const DEPTH: &[&str] = &["depth", "depth_km", "profundidad"];
    pub const DATE: &[&str] = &["fecha", "date"];
    pub const TIME: &[&str] = &["hora", "time"];
    pub const LOCATION: &[&str] = &["title", "location", "place", "localizacion", "region"];
    pub const MAGNITUDE_TYPE: &[&str] = &["tipo_mag", "mag_type", "magType"];

    pub const LAST_UPDATE: &[&str] = &[
        "last_update",
        "lastUpdate",
        "last_updated",
        "updated_at",
        "updated",
    ];
    pub const TODAY: &[&str] = &["today", "count_today", "today_count", "hoy"];
    pub const TOTAL: &[&str] = &["total", "count_total", "total_count"];
}

/// One earthquake observation in canonical shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventRecord {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub magnitude: Option<f64>,
    pub magnitude_type: Option<String>,
    pub depth_km: Option<f64>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub location: Option<String>,
}

impl EventRecord {
    /// Resolve a raw JSON object into a record. Non-objects yield an empty
    /// record, which the renderer will skip for lack of coordinates.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };

        Self {
            latitude: lookup_f64(obj, aliases::LATITUDE),
            longitude: lookup_f64(obj, aliases::LONGITUDE),
            magnitude: lookup_f64(obj, aliases::MAGNITUDE),
            magnitude_type: lookup_text(obj, aliases::MAGNITUDE_TYPE),
            depth_km: lookup_f64(obj, aliases::DEPTH),
            date: lookup_text(obj, aliases::DATE),
            time: lookup_text(obj, aliases::TIME),
            location: lookup_text(obj, aliases::LOCATION),
        }
    }

    /// Both coordinates, if present and finite.
    #[must_use]
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Some((lat, lon)),
            _ => None,
        }
    }
}

/// Parse a day payload: must be a JSON array of event objects.
///
/// # Errors
///
/// Returns `InvalidResponse` if the payload is not an array.
pub fn parse_day_payload(value: &Value) -> Result<Vec<EventRecord>, QuakeError> {
    let items = value.as_array().ok_or_else(|| {
        QuakeError::InvalidResponse(format!("expected array of events, got {}", kind(value)))
    })?;
    Ok(items.iter().map(EventRecord::from_value).collect())
}

/// Aggregate freshness and count metadata about the dataset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub last_update: Option<DateTime<Utc>>,
    pub today: Option<u64>,
    pub total: Option<u64>,
}

impl StatusSnapshot {
    /// Resolve a status payload.
    ///
    /// # Errors
    ///
    /// Returns `InvalidResponse` if the payload is not a JSON object. An object
    /// with none of the known keys is a valid, empty snapshot.
    pub fn from_value(value: &Value) -> Result<Self, QuakeError> {
        let obj = value.as_object().ok_or_else(|| {
            QuakeError::InvalidResponse(format!("expected status object, got {}", kind(value)))
        })?;

        Ok(Self {
            last_update: lookup(obj, aliases::LAST_UPDATE).and_then(parse_instant),
            today: lookup(obj, aliases::TODAY).and_then(parse_count),
            total: lookup(obj, aliases::TOTAL).and_then(parse_count),
        })
    }
}

/// Parse the `/latest-date` payload: `{ "latest": "DD/MM/YYYY" }`.
///
/// # Errors
///
/// Returns `InvalidResponse` if `latest` is missing or not a day.
pub fn parse_latest_date(value: &Value) -> Result<chrono::NaiveDate, QuakeError> {
    value
        .get("latest")
        .and_then(Value::as_str)
        .and_then(crate::date::parse_day)
        .ok_or_else(|| QuakeError::InvalidResponse(format!("no usable `latest` in {value}")))
}

/// First present, non-null value among `keys`.
fn lookup<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

/// First alias that yields a finite number. A key holding garbage does not
/// shadow a later alias holding a good value.
fn lookup_f64(obj: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().filter_map(|k| obj.get(*k)).find_map(as_f64)
}

fn lookup_text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().filter_map(|k| obj.get(*k)).find_map(|v| match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn as_f64(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn parse_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

/// Epoch seconds (number or numeric string) or an ISO-8601 string.
fn parse_instant(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => from_epoch_secs(n.as_f64()?),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(secs) = s.parse::<f64>() {
                return from_epoch_secs(secs);
            }
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    // ISO without offset; the API reports UTC.
                    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
                        .iter()
                        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                        .map(|naive| naive.and_utc())
                })
        }
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn from_epoch_secs(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    Utc.timestamp_opt(secs.trunc() as i64, 0).single()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_from_canonical_keys() {
        let record = EventRecord::from_value(&json!({
            "lat": 28.31, "lon": -16.52, "mag": 2.4, "tipo_mag": "mbLg",
            "depth": 12, "fecha": "14/11/2023", "hora": "22:13:20",
            "title": "ATLÁNTICO-CANARIAS"
        }));

        assert_eq!(record.coordinates(), Some((28.31, -16.52)));
        assert_eq!(record.magnitude, Some(2.4));
        assert_eq!(record.magnitude_type.as_deref(), Some("mbLg"));
        assert_eq!(record.depth_km, Some(12.0));
        assert_eq!(record.date.as_deref(), Some("14/11/2023"));
        assert_eq!(record.time.as_deref(), Some("22:13:20"));
        assert_eq!(record.location.as_deref(), Some("ATLÁNTICO-CANARIAS"));
    }

    #[test]
    fn test_event_from_alternate_keys_and_strings() {
        let record = EventRecord::from_value(&json!({
            "latitude": "27.9", "longitude": " -15.6 ", "magnitude": "3.1",
            "profundidad": "8.0", "date": "01/02/2024", "time": "10:00:00",
            "place": "Gran Canaria"
        }));

        assert_eq!(record.coordinates(), Some((27.9, -15.6)));
        assert_eq!(record.magnitude, Some(3.1));
        assert_eq!(record.depth_km, Some(8.0));
        assert_eq!(record.location.as_deref(), Some("Gran Canaria"));
    }

    #[test]
    fn test_bad_alias_does_not_shadow_good_one() {
        let record = EventRecord::from_value(&json!({ "lat": "", "latitude": 28.0, "lon": -16.0 }));
        assert_eq!(record.coordinates(), Some((28.0, -16.0)));
    }

    #[test]
    fn test_non_numeric_latitude_has_no_coordinates() {
        let record = EventRecord::from_value(&json!({ "lat": "not a number", "lon": -16.0 }));
        assert_eq!(record.latitude, None);
        assert_eq!(record.coordinates(), None);
    }

    #[test]
    fn test_day_payload_must_be_array() {
        assert!(parse_day_payload(&json!([])).unwrap().is_empty());
        assert_eq!(parse_day_payload(&json!([{}, 3])).unwrap().len(), 2);
        assert!(matches!(
            parse_day_payload(&json!({ "error": "nope" })),
            Err(QuakeError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_status_epoch_seconds() {
        let snap = StatusSnapshot::from_value(&json!({
            "last_update": 1_700_000_000, "today": 5, "total": 12000
        }))
        .unwrap();

        assert_eq!(snap.last_update.map(|t| t.timestamp()), Some(1_700_000_000));
        assert_eq!(snap.today, Some(5));
        assert_eq!(snap.total, Some(12000));
    }

    #[test]
    fn test_status_string_forms() {
        let numeric = StatusSnapshot::from_value(&json!({
            "lastUpdate": "1700000000", "count_today": "7", "total_count": "9"
        }))
        .unwrap();
        assert_eq!(numeric.last_update.map(|t| t.timestamp()), Some(1_700_000_000));
        assert_eq!(numeric.today, Some(7));
        assert_eq!(numeric.total, Some(9));

        let iso = StatusSnapshot::from_value(&json!({ "updated_at": "2023-11-14T22:13:20Z" }))
            .unwrap();
        assert_eq!(iso.last_update.map(|t| t.timestamp()), Some(1_700_000_000));

        let naive = StatusSnapshot::from_value(&json!({ "last_updated": "2023-11-14T22:13:20" }))
            .unwrap();
        assert_eq!(naive.last_update.map(|t| t.timestamp()), Some(1_700_000_000));
    }

    #[test]
    fn test_status_missing_fields_is_empty_not_error() {
        let snap = StatusSnapshot::from_value(&json!({ "unrelated": true })).unwrap();
        assert_eq!(snap, StatusSnapshot::default());

        assert!(StatusSnapshot::from_value(&json!([1, 2])).is_err());
    }

    #[test]
    fn test_latest_date() {
        let latest = parse_latest_date(&json!({ "latest": "03/04/2024" })).unwrap();
        assert_eq!(latest, chrono::NaiveDate::from_ymd_opt(2024, 4, 3).unwrap());
        assert!(parse_latest_date(&json!({})).is_err());
    }
}
