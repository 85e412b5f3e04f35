//! HTTP client for the platform API.
//!
//! Thin wrapper over `reqwest` with the per-call timeouts the fleet uses:
//! generous for bootstrap fetches, tight for best-effort state reports.
//! Cheap to clone; every bike task holds one.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use spoke_core::{BikeReport, CityZonePayload, Renter};

use crate::config::SimConfig;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {0} from {1}")]
    Status(StatusCode, String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// One bike as bootstrapped from `GET /bikes`.
#[derive(Debug, Clone, Deserialize)]
pub struct BikeRecord {
    pub id: i64,
    pub city_id: String,
    pub status_id: u8,
    /// `[lng, lat]`.
    pub coords: [f64; 2],
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Arc<str>,
    api_key: Arc<str>,
    report_timeout: Duration,
    rental_timeout: Duration,
    bootstrap_timeout: Duration,
}

impl ApiClient {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.as_str().into(),
            api_key: config.api_key.as_str().into(),
            report_timeout: config.report_timeout,
            rental_timeout: config.rental_timeout,
            bootstrap_timeout: config.bootstrap_timeout,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Bootstrap list of all bikes.
    pub async fn fetch_bikes(&self) -> Result<Vec<BikeRecord>> {
        let url = self.url("/bikes");
        let response = self
            .http
            .get(&url)
            .header("x-api-key", &*self.api_key)
            .timeout(self.bootstrap_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::Status(response.status(), url));
        }
        Ok(response.json().await?)
    }

    /// Zone payload for one bike's city.
    pub async fn fetch_zones(&self, bike_id: i64) -> Result<CityZonePayload> {
        let url = self.url(&format!("/bikes/{bike_id}/zones"));
        let response = self
            .http
            .get(&url)
            .header("x-api-key", &*self.api_key)
            .timeout(self.bootstrap_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::Status(response.status(), url));
        }
        Ok(response.json().await?)
    }

    /// Push one state report. Best-effort: callers log and move on.
    pub async fn report(&self, report: &BikeReport) -> Result<()> {
        let url = self.url(&format!("/bikes/{}", report.id));
        let response = self
            .http
            .put(&url)
            .header("x-api-key", &*self.api_key)
            .json(report)
            .timeout(self.report_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::Status(response.status(), url));
        }
        Ok(())
    }

    /// Start a rental on the renter's behalf.
    ///
    /// `Ok(None)` means the server declined: a non-2xx status, an `errors`
    /// key in the body, or a body without a trip id.
    pub async fn rent(&self, bike_id: i64, renter: &Renter) -> Result<Option<i64>> {
        let url = self.url(&format!("/user/bikes/rent/{bike_id}"));
        let response = self
            .http
            .post(&url)
            .header("x-access-token", &renter.token)
            .header("x-api-key", &*self.api_key)
            .json(&json!({ "userId": renter.id }))
            .timeout(self.rental_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let body: Value = response.json().await?;
        if body.get("errors").is_some() {
            return Ok(None);
        }
        Ok(body.get("trip_id").and_then(Value::as_i64))
    }

    /// Return the bike, closing the rental.
    pub async fn return_trip(&self, trip_id: i64, renter: &Renter) -> Result<()> {
        let url = self.url(&format!("/user/bikes/return/{trip_id}"));
        let response = self
            .http
            .put(&url)
            .header("x-access-token", &renter.token)
            .header("x-api-key", &*self.api_key)
            .json(&json!({ "userId": renter.id }))
            .timeout(self.rental_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::Status(response.status(), url));
        }
        Ok(())
    }

    /// Open the server-pushed instruction stream. A per-bike listener
    /// identifies itself with the `bike_id` header; a fleet-wide listener
    /// omits it. No timeout: the connection is meant to stay open.
    pub async fn open_instruction_stream(&self, bike_id: Option<i64>) -> Result<reqwest::Response> {
        let url = self.url("/bikes/instructions");
        let mut request = self.http.get(&url).header("x-api-key", &*self.api_key);
        if let Some(id) = bike_id {
            request = request.header("bike_id", id.to_string());
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status(), url));
        }
        Ok(response)
    }
}
