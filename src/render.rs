//! Marker layer: the set of points currently drawn on the map.
//!
//! The layer is always replaced wholesale from a list of records; zoom
//! changes only touch radii.

use serde::Serialize;
use serde_json::{Value, json};

use crate::models::EventRecord;
use crate::style::{color_for_magnitude, radius_for};

/// Shown in place of a missing value.
pub const PLACEHOLDER: &str = "N/A";

/// Popup title when the record has no location label.
const DEFAULT_TITLE: &str = "Terremoto";

/// One drawn point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub latitude: f64,
    pub longitude: f64,
    pub magnitude: Option<f64>,
    pub color: &'static str,
    pub radius: f64,
    pub popup: String,
    /// Source record, kept for terminal and JSON output.
    #[serde(skip)]
    pub record: EventRecord,
}

/// Ordered collection of markers currently on screen.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MarkerLayer {
    markers: Vec<Marker>,
}

impl MarkerLayer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the layer with markers for every plottable record.
    ///
    /// Records without finite coordinates are skipped. Returns the number of
    /// markers drawn.
    pub fn render(&mut self, records: &[EventRecord], zoom: Option<f64>) -> usize {
        self.clear();

        self.markers.extend(records.iter().filter_map(|record| {
            let (latitude, longitude) = record.coordinates()?;
            Some(Marker {
                latitude,
                longitude,
                magnitude: record.magnitude,
                color: color_for_magnitude(record.magnitude),
                radius: radius_for(record.magnitude, zoom),
                popup: popup_html(record, latitude, longitude),
                record: record.clone(),
            })
        }));

        let skipped = records.len() - self.markers.len();
        if skipped > 0 {
            tracing::debug!("skipped {} records without coordinates", skipped);
        }
        self.markers.len()
    }

    /// Recompute radii for a new zoom level. No refetch.
    pub fn rescale(&mut self, zoom: Option<f64>) {
        for marker in &mut self.markers {
            marker.radius = radius_for(marker.magnitude, zoom);
        }
    }

    pub fn clear(&mut self) {
        self.markers.clear();
    }

    #[must_use]
    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// The layer as a GeoJSON `FeatureCollection` of points.
    #[must_use]
    pub fn to_geojson(&self) -> Value {
        let features: Vec<Value> = self
            .markers
            .iter()
            .map(|m| {
                json!({
                    "type": "Feature",
                    "geometry": {
                        "type": "Point",
                        "coordinates": [m.longitude, m.latitude],
                    },
                    "properties": {
                        "magnitude": m.magnitude,
                        "depth_km": m.record.depth_km,
                        "date": m.record.date,
                        "time": m.record.time,
                        "location": m.record.location,
                        "color": m.color,
                        "radius": m.radius,
                    },
                })
            })
            .collect();

        json!({ "type": "FeatureCollection", "features": features })
    }
}

impl From<Vec<Marker>> for MarkerLayer {
    fn from(markers: Vec<Marker>) -> Self {
        Self { markers }
    }
}

/// Popup text for a record: location, date and time, magnitude, depth, and a
/// link to the spot on OpenStreetMap.
fn popup_html(record: &EventRecord, lat: f64, lon: f64) -> String {
    let title = escape(record.location.as_deref().unwrap_or(DEFAULT_TITLE));
    let date = escape(record.date.as_deref().unwrap_or(PLACEHOLDER));
    let time = escape(record.time.as_deref().unwrap_or(""));
    let magnitude = match (record.magnitude, record.magnitude_type.as_deref()) {
        (Some(m), Some(kind)) => format!("{m:.1} ({})", escape(kind)),
        (Some(m), None) => format!("{m:.1}"),
        (None, _) => PLACEHOLDER.to_string(),
    };
    let depth = record
        .depth_km
        .map_or_else(|| PLACEHOLDER.to_string(), |d| format!("{d:.1} km"));

    format!(
        "<b>{title}</b><br>\
         <b>Fecha:</b> {date} {time}<br>\
         <b>Magnitud:</b> {magnitude}<br>\
         <b>Profundidad:</b> {depth}<br>\
         <a target=\"_blank\" href=\"https://www.openstreetmap.org/?mlat={lat}&amp;mlon={lon}&amp;zoom=12\">\
         🌍 Ver en OpenStreetMap</a>"
    )
}

/// Minimal HTML escaping for text placed inside the popup.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
