//! Quake API client.
//!
//! Provides async HTTP access to the day, status and latest-date endpoints.
//! Uses reqwest with rustls for TLS.

use std::future::Future;
use std::time::Duration;

use chrono::NaiveDate;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::config::DayRoute;
use crate::date::api_format;
use crate::errors::QuakeError;
use crate::models::{EventRecord, StatusSnapshot, parse_day_payload, parse_latest_date};

/// Default request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// User agent string for API requests.
const USER_AGENT: &str = concat!("quakemap/", env!("CARGO_PKG_VERSION"));

/// Read operations the orchestrator needs from the quake API.
///
/// `QuakeClient` is the real implementation; tests drive the orchestrator with
/// scripted sources.
pub trait QuakeSource: Send + Sync + 'static {
    /// All events recorded on `date`.
    fn fetch_day(
        &self,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Vec<EventRecord>, QuakeError>> + Send;

    /// Dataset freshness and counts.
    fn fetch_status(&self) -> impl Future<Output = Result<StatusSnapshot, QuakeError>> + Send;

    /// Latest day with data.
    fn fetch_latest_date(&self) -> impl Future<Output = Result<NaiveDate, QuakeError>> + Send;
}

/// Client for the quake API.
#[derive(Debug, Clone)]
pub struct QuakeClient {
    client: Client,
    base_url: String,
    day_route: DayRoute,
}

impl QuakeClient {
    /// Create a new client against `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(base_url: &str, day_route: DayRoute) -> Result<Self, QuakeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            day_route,
        })
    }

    /// Fetch every event for one day.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-success status, non-JSON
    /// body, or a body that is not an array.
    #[instrument(skip(self, date), fields(date = %api_format(date)))]
    pub async fn day(&self, date: NaiveDate) -> Result<Vec<EventRecord>, QuakeError> {
        let api_date = api_format(date);
        let request = match self.day_route {
            DayRoute::Query => self
                .client
                .get(format!("{}/day", self.base_url))
                .query(&[("date", api_date.as_str())]),
            DayRoute::Segment => self
                .client
                .get(format!("{}/day/{}", self.base_url, api_date)),
        };

        let payload = Self::read_json(request).await?;
        let records = parse_day_payload(&payload)?;

        debug!("fetched {} events", records.len());
        Ok(records)
    }

    /// Fetch the status snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-success status, non-JSON
    /// body, or a body that is not an object.
    #[instrument(skip(self))]
    pub async fn status(&self) -> Result<StatusSnapshot, QuakeError> {
        let request = self.client.get(format!("{}/status", self.base_url));
        let payload = Self::read_json(request).await?;
        StatusSnapshot::from_value(&payload)
    }

    /// Fetch the latest day with data.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or `latest` is missing.
    #[instrument(skip(self))]
    pub async fn latest_date(&self) -> Result<NaiveDate, QuakeError> {
        let request = self.client.get(format!("{}/latest-date", self.base_url));
        let payload = Self::read_json(request).await?;
        parse_latest_date(&payload)
    }

    async fn read_json(request: reqwest::RequestBuilder) -> Result<Value, QuakeError> {
        let response = request.send().await?;

        // Check status before parsing
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QuakeError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

impl QuakeSource for QuakeClient {
    fn fetch_day(
        &self,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Vec<EventRecord>, QuakeError>> + Send {
        self.day(date)
    }

    fn fetch_status(&self) -> impl Future<Output = Result<StatusSnapshot, QuakeError>> + Send {
        self.status()
    }

    fn fetch_latest_date(&self) -> impl Future<Output = Result<NaiveDate, QuakeError>> + Send {
        self.latest_date()
    }
}

/// Day query with the recoverable-failure contract: a failure is logged and
/// reads as "no events".
pub async fn day_or_empty<S: QuakeSource>(source: &S, date: NaiveDate) -> Vec<EventRecord> {
    match source.fetch_day(date).await {
        Ok(records) => records,
        Err(e) => {
            warn!("day query for {} failed: {}", api_format(date), e);
            Vec::new()
        }
    }
}

/// Status query with the recoverable-failure contract: `None` means the
/// status is unavailable, as opposed to a snapshot with absent fields.
pub async fn status_or_none<S: QuakeSource>(source: &S) -> Option<StatusSnapshot> {
    match source.fetch_status().await {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            warn!("status query failed: {}", e);
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! In-process stand-in for the quake API.

    use std::collections::HashMap;

    use axum::extract::{Path, Query};
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    pub const BUSY_DAY: &str = "14/11/2023";

    fn events_for(date: &str) -> serde_json::Value {
        if date == BUSY_DAY {
            json!([
                { "lat": 28.1, "lon": -16.4, "mag": 2.5, "depth": 10,
                  "fecha": BUSY_DAY, "hora": "01:02:03", "title": "TENERIFE" },
                { "latitude": "27.8", "longitude": "-15.5", "magnitude": "4.1",
                  "profundidad": "22", "date": BUSY_DAY, "time": "04:05:06",
                  "place": "GRAN CANARIA" },
                { "lat": "not a number", "lon": -15.0, "mag": 1.0 }
            ])
        } else {
            json!([])
        }
    }

    async fn day_by_query(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
        match params.get("date") {
            Some(date) => Json(events_for(date)).into_response(),
            None => (StatusCode::BAD_REQUEST, "missing date").into_response(),
        }
    }

    async fn day_by_segment(
        Path((d, m, y)): Path<(String, String, String)>,
    ) -> Json<serde_json::Value> {
        Json(events_for(&format!("{d}/{m}/{y}")))
    }

    async fn status() -> Json<serde_json::Value> {
        Json(json!({ "last_update": 1_700_000_000, "today": 5, "total": 12000 }))
    }

    async fn latest() -> Json<serde_json::Value> {
        Json(json!({ "latest": BUSY_DAY }))
    }

    /// Serve the mock API on an ephemeral port and return its base URL.
    pub async fn spawn_api() -> String {
        let app = Router::new()
            .route("/day", get(day_by_query))
            .route("/day/{d}/{m}/{y}", get(day_by_segment))
            .route("/status", get(status))
            .route("/latest-date", get(latest));
        spawn(app).await
    }

    /// An API whose every endpoint answers with a server error or garbage.
    pub async fn spawn_broken_api() -> String {
        let app = Router::new()
            .route("/day", get(|| async { "<html>not json</html>" }))
            .route(
                "/status",
                get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }),
            )
            .route("/latest-date", get(|| async { Json(json!({ "nope": 1 })) }));
        spawn(app).await
    }

    async fn spawn(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock api");
        let addr = listener.local_addr().expect("mock api addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}")
    }
}
