//! Marker styling by magnitude.

/// Fill colors for magnitude bands, lightest first.
const BANDS: [(f64, &str); 4] = [
    (4.0, "#bd0026"), // >= 4
    (3.0, "#f03b20"), // >= 3
    (2.0, "#fd8d3c"), // >= 2
    (1.0, "#fecc5c"), // >= 1
];

/// Below the first threshold.
const LOWEST_BAND: &str = "#ffffb2";

/// Used when the magnitude is missing or not a number.
pub const FALLBACK_COLOR: &str = "#808080";

/// Pixels per magnitude unit at the reference zoom.
const RADIUS_PER_MAGNITUDE: f64 = 3.5;

pub const MIN_RADIUS: f64 = 3.0;
pub const MAX_RADIUS: f64 = 30.0;

/// Zoom level at which radii are unscaled (the initial map view).
pub const REFERENCE_ZOOM: f64 = 7.0;

/// Radius growth per zoom level.
const ZOOM_GROWTH: f64 = 1.15;

/// Fill color for a magnitude.
#[must_use]
pub fn color_for_magnitude(mag: Option<f64>) -> &'static str {
    let Some(mag) = mag.filter(|m| m.is_finite()) else {
        return FALLBACK_COLOR;
    };

    BANDS
        .iter()
        .find(|(threshold, _)| mag >= *threshold)
        .map_or(LOWEST_BAND, |(_, color)| *color)
}

/// Display radius in pixels, clamped to `[MIN_RADIUS, MAX_RADIUS]`.
///
/// A finite `zoom` scales the radius geometrically around `REFERENCE_ZOOM`.
#[must_use]
pub fn radius_for(mag: Option<f64>, zoom: Option<f64>) -> f64 {
    let Some(mag) = mag.filter(|m| m.is_finite()) else {
        return MIN_RADIUS;
    };

    let mut radius = mag * RADIUS_PER_MAGNITUDE;
    if let Some(zoom) = zoom.filter(|z| z.is_finite()) {
        radius *= ZOOM_GROWTH.powf(zoom - REFERENCE_ZOOM);
    }

    if radius.is_nan() {
        return MIN_RADIUS;
    }
    radius.clamp(MIN_RADIUS, MAX_RADIUS)
}
