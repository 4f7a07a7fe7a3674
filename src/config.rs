//! Pipeline configuration shared by every command.

use std::time::Duration;

use tracing::warn;

/// Default quake API.
pub const DEFAULT_API_BASE: &str = "https://api.quakes.earth";

/// Map data refresh, seconds.
pub const DEFAULT_MAP_INTERVAL_SECS: u64 = 15 * 60;
const MIN_MAP_INTERVAL_SECS: u64 = 30;

/// Status refresh, seconds.
pub const DEFAULT_STATUS_INTERVAL_SECS: u64 = 60;
const MIN_STATUS_INTERVAL_SECS: u64 = 10;

/// Initial zoom of the map (Canary Islands view).
pub const DEFAULT_ZOOM: f64 = 7.0;

/// How the day query carries the date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DayRoute {
    /// `GET /day?date=DD/MM/YYYY`
    #[default]
    Query,
    /// `GET /day/DD/MM/YYYY`
    Segment,
}

impl std::str::FromStr for DayRoute {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "query" => Ok(Self::Query),
            "segment" | "path" => Ok(Self::Segment),
            _ => Err(format!("unknown day route: {s} (expected: query, segment)")),
        }
    }
}

/// Which day is selected when the page loads.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InitialDate {
    /// The current local day.
    #[default]
    Today,
    /// The latest day the API has data for (falls back to today).
    Latest,
    /// A user-given day; malformed text falls back to today.
    Given(String),
}

/// Validated pipeline settings.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub api_base: String,
    pub day_route: DayRoute,
    pub map_interval: Duration,
    pub status_interval: Duration,
    pub initial_date: InitialDate,
    pub zoom: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            day_route: DayRoute::default(),
            map_interval: Duration::from_secs(DEFAULT_MAP_INTERVAL_SECS),
            status_interval: Duration::from_secs(DEFAULT_STATUS_INTERVAL_SECS),
            initial_date: InitialDate::default(),
            zoom: DEFAULT_ZOOM,
        }
    }
}

impl PipelineConfig {
    /// Clamp intervals to their minimums and tidy the base URL.
    #[must_use]
    pub fn validated(mut self) -> Self {
        self.api_base = self.api_base.trim_end_matches('/').to_string();

        let map_secs = self.map_interval.as_secs();
        if map_secs < MIN_MAP_INTERVAL_SECS {
            warn!("map interval clamped to minimum of {MIN_MAP_INTERVAL_SECS} seconds");
            self.map_interval = Duration::from_secs(MIN_MAP_INTERVAL_SECS);
        }

        let status_secs = self.status_interval.as_secs();
        if status_secs < MIN_STATUS_INTERVAL_SECS {
            warn!("status interval clamped to minimum of {MIN_STATUS_INTERVAL_SECS} seconds");
            self.status_interval = Duration::from_secs(MIN_STATUS_INTERVAL_SECS);
        }

        if !self.zoom.is_finite() {
            warn!("zoom {} is not finite, using {DEFAULT_ZOOM}", self.zoom);
            self.zoom = DEFAULT_ZOOM;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_route_parse() {
        assert_eq!("query".parse::<DayRoute>().unwrap(), DayRoute::Query);
        assert_eq!("Segment".parse::<DayRoute>().unwrap(), DayRoute::Segment);
        assert!("bogus".parse::<DayRoute>().is_err());
    }

    #[test]
    fn test_validated_clamps_and_trims() {
        let config = PipelineConfig {
            api_base: "http://localhost:9000/".into(),
            map_interval: Duration::from_secs(1),
            status_interval: Duration::from_secs(2),
            zoom: f64::NAN,
            ..PipelineConfig::default()
        }
        .validated();

        assert_eq!(config.api_base, "http://localhost:9000");
        assert_eq!(config.map_interval, Duration::from_secs(30));
        assert_eq!(config.status_interval, Duration::from_secs(10));
        assert!((config.zoom - DEFAULT_ZOOM).abs() < f64::EPSILON);
    }

    #[test]
    fn test_defaults_survive_validation() {
        let config = PipelineConfig::default().validated();
        assert_eq!(config.map_interval, Duration::from_secs(900));
        assert_eq!(config.status_interval, Duration::from_secs(60));
    }
}
