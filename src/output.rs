//! Terminal renderings of the marker layer.
//!
//! Supports human-readable (with colors), JSON, NDJSON and GeoJSON formats.

use std::io::{self, Write};

use serde::Serialize;

use crate::orchestrator::PageView;
use crate::render::{Marker, MarkerLayer, PLACEHOLDER};

// ANSI color codes
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

// Magnitude bands, same thresholds as the map styler
const RED: &str = "\x1b[91m"; // mag >= 4
const ORANGE: &str = "\x1b[38;5;208m"; // mag >= 3
const YELLOW: &str = "\x1b[93m"; // mag >= 2
const PALE: &str = "\x1b[38;5;229m"; // mag >= 1
const WHITE: &str = "\x1b[97m"; // mag < 1
const GREY: &str = "\x1b[90m"; // unknown

const ICON_QUAKE: &str = "🌍";

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Human-readable terminal output (default)
    #[default]
    Human,
    /// JSON array
    Json,
    /// Newline-delimited JSON (one object per line)
    Ndjson,
    /// GeoJSON `FeatureCollection`
    Geojson,
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            "ndjson" => Ok(Self::Ndjson),
            "geojson" => Ok(Self::Geojson),
            _ => Err(format!(
                "unknown format: {s} (expected: human, json, ndjson, geojson)"
            )),
        }
    }
}

/// Flattened marker for JSON output.
#[derive(Debug, Serialize)]
struct OutputMarker<'a> {
    latitude: f64,
    longitude: f64,
    magnitude: Option<f64>,
    magnitude_type: Option<&'a str>,
    depth_km: Option<f64>,
    date: Option<&'a str>,
    time: Option<&'a str>,
    location: Option<&'a str>,
    color: &'a str,
    radius: f64,
}

impl<'a> From<&'a Marker> for OutputMarker<'a> {
    fn from(m: &'a Marker) -> Self {
        Self {
            latitude: m.latitude,
            longitude: m.longitude,
            magnitude: m.magnitude,
            magnitude_type: m.record.magnitude_type.as_deref(),
            depth_km: m.record.depth_km,
            date: m.record.date.as_deref(),
            time: m.record.time.as_deref(),
            location: m.record.location.as_deref(),
            color: m.color,
            radius: m.radius,
        }
    }
}

/// ANSI color for a magnitude.
fn magnitude_color(mag: Option<f64>) -> &'static str {
    match mag {
        Some(m) if m >= 4.0 => RED,
        Some(m) if m >= 3.0 => ORANGE,
        Some(m) if m >= 2.0 => YELLOW,
        Some(m) if m >= 1.0 => PALE,
        Some(m) if m.is_finite() => WHITE,
        _ => GREY,
    }
}

/// Write markers in human-readable format, one line each.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_human<W: Write>(writer: &mut W, layer: &MarkerLayer) -> io::Result<()> {
    for marker in layer.markers() {
        let record = &marker.record;
        let color = magnitude_color(marker.magnitude);
        let mag = marker
            .magnitude
            .map_or_else(|| "?".into(), |m| format!("{m:.1}"));
        let mag_type = record.magnitude_type.as_deref().unwrap_or("");
        let depth = record
            .depth_km
            .map_or_else(|| format!("{PLACEHOLDER:>5}"), |d| format!("{d:>5.1}"));
        let when = format!(
            "{} {}",
            record.date.as_deref().unwrap_or(PLACEHOLDER),
            record.time.as_deref().unwrap_or("")
        );
        let place = record.location.as_deref().unwrap_or("Terremoto");

        writeln!(
            writer,
            "{ICON_QUAKE} {color}{BOLD}M{mag:<4}{RESET} {DIM}{mag_type:<5}{RESET} │ \
             {DIM}{depth}km{RESET} │ \
             {when:<19} │ \
             {:>8.3}, {:>8.3} │ \
             {place}",
            marker.latitude, marker.longitude
        )?;
    }
    Ok(())
}

/// Write markers as a JSON array.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_json<W: Write>(writer: &mut W, layer: &MarkerLayer) -> io::Result<()> {
    let output: Vec<OutputMarker<'_>> = layer.markers().iter().map(OutputMarker::from).collect();
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{json}")
}

/// Write markers as newline-delimited JSON.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_ndjson<W: Write>(writer: &mut W, layer: &MarkerLayer) -> io::Result<()> {
    for marker in layer.markers() {
        let json = serde_json::to_string(&OutputMarker::from(marker))
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writeln!(writer, "{json}")?;
    }
    Ok(())
}

/// Write markers as a GeoJSON feature collection.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_geojson<W: Write>(writer: &mut W, layer: &MarkerLayer) -> io::Result<()> {
    let json = serde_json::to_string_pretty(&layer.to_geojson())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{json}")
}

/// Write markers in the specified format.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_markers<W: Write>(writer: &mut W, layer: &MarkerLayer, format: Format) -> io::Result<()> {
    match format {
        Format::Human => write_human(writer, layer),
        Format::Json => write_json(writer, layer),
        Format::Ndjson => write_ndjson(writer, layer),
        Format::Geojson => write_geojson(writer, layer),
    }
}

/// Write a page view header (date and status line) for `watch`.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_view_header<W: Write>(writer: &mut W, view: &PageView) -> io::Result<()> {
    let loading = if view.loading { " (cargando…)" } else { "" };
    writeln!(
        writer,
        "{BOLD}{}{RESET}{DIM}{loading}{RESET} │ {} marcadores",
        view.date_label, view.marker_count
    )?;
    writeln!(writer, "{DIM}{}{RESET}", view.status_line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventRecord;
    use serde_json::json;

    fn layer() -> MarkerLayer {
        let records = vec![
            EventRecord::from_value(&json!({
                "lat": 28.1, "lon": -16.4, "mag": 4.3, "depth": 10,
                "fecha": "14/11/2023", "hora": "01:02:03", "title": "TENERIFE"
            })),
            EventRecord::from_value(&json!({ "lat": 27.0, "lon": -15.0 })),
        ];
        let mut layer = MarkerLayer::new();
        layer.render(&records, None);
        layer
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("human".parse::<Format>().unwrap(), Format::Human);
        assert_eq!("json".parse::<Format>().unwrap(), Format::Json);
        assert_eq!("NDJSON".parse::<Format>().unwrap(), Format::Ndjson);
        assert_eq!("geojson".parse::<Format>().unwrap(), Format::Geojson);
        assert!("invalid".parse::<Format>().is_err());
    }

    #[test]
    fn test_human_lines() {
        let mut out = Vec::new();
        write_human(&mut out, &layer()).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("TENERIFE"));
        assert!(text.contains(RED));
        assert!(text.contains(GREY));
    }

    #[test]
    fn test_ndjson_one_object_per_marker() {
        let mut out = Vec::new();
        write_ndjson(&mut out, &layer()).unwrap();
        let text = String::from_utf8(out).unwrap();

        let parsed: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0]["location"], "TENERIFE");
        assert!(parsed[1]["magnitude"].is_null());
    }

    #[test]
    fn test_empty_layer_json_is_empty_array() {
        let mut out = Vec::new();
        write_json(&mut out, &MarkerLayer::new()).unwrap();
        assert_eq!(String::from_utf8(out).unwrap().trim(), "[]");
    }
}
