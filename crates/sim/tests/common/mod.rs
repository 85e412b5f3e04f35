//! In-process mock of the platform API for integration tests: records
//! reports, rents and returns, and pushes instruction events over SSE.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::{broadcast, oneshot};

use spoke_core::geo::Point;
use spoke_core::{Battery, Bike, BikeStatus, Gps, TripScript};
use spoke_sim::api::ApiClient;
use spoke_sim::config::SimConfig;
use spoke_sim::runner::SimBike;

/// Position all test bikes start from.
pub const START: [f64; 2] = [13.508699207322167, 59.38210003526896];

#[derive(Default)]
pub struct Recorded {
    pub reports: Mutex<Vec<Value>>,
    pub rents: Mutex<Vec<(i64, Value)>>,
    pub returns: Mutex<Vec<(i64, Value)>>,
    rent_responses: Mutex<VecDeque<(u16, Value)>>,
}

#[derive(Clone)]
struct AppState {
    recorded: Arc<Recorded>,
    events: broadcast::Sender<String>,
}

pub struct MockApi {
    pub recorded: Arc<Recorded>,
    pub base_url: String,
    events: broadcast::Sender<String>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl MockApi {
    pub async fn start() -> Self {
        let recorded = Arc::new(Recorded::default());
        let (events, _) = broadcast::channel(64);

        let app = Router::new()
            .route("/bikes/{id}", put(record_report))
            .route("/user/bikes/rent/{id}", post(record_rent))
            .route("/user/bikes/return/{trip_id}", put(record_return))
            .route("/bikes/instructions", get(instructions))
            .with_state(AppState {
                recorded: recorded.clone(),
                events: events.clone(),
            });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = rx.await;
                })
                .await
                .unwrap();
        });

        Self {
            recorded,
            base_url: format!("http://{addr}"),
            events,
            shutdown: Some(tx),
        }
    }

    /// Queue the response for the next rent call. Unqueued calls get a
    /// 200 with `{"trip_id": 1}`.
    pub fn queue_rent_response(&self, status: u16, body: Value) {
        self.recorded
            .rent_responses
            .lock()
            .unwrap()
            .push_back((status, body));
    }

    /// Push one instruction event to every connected listener.
    pub fn send_instruction(&self, event: Value) {
        let _ = self.events.send(event.to_string());
    }

    /// Push raw (possibly malformed) event data.
    pub fn send_raw(&self, data: &str) {
        let _ = self.events.send(data.to_string());
    }

    pub fn reports(&self) -> Vec<Value> {
        self.recorded.reports.lock().unwrap().clone()
    }

    pub fn rents(&self) -> Vec<(i64, Value)> {
        self.recorded.rents.lock().unwrap().clone()
    }

    pub fn returns(&self) -> Vec<(i64, Value)> {
        self.recorded.returns.lock().unwrap().clone()
    }
}

impl Drop for MockApi {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn record_report(
    State(state): State<AppState>,
    Path(_id): Path<i64>,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.recorded.reports.lock().unwrap().push(body);
    Json(json!({"ok": true}))
}

async fn record_rent(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.recorded.rents.lock().unwrap().push((id, body));
    let (status, body) = state
        .recorded
        .rent_responses
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or((200, json!({"trip_id": 1})));
    (StatusCode::from_u16(status).unwrap(), Json(body))
}

async fn record_return(
    State(state): State<AppState>,
    Path(trip_id): Path<i64>,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.recorded.returns.lock().unwrap().push((trip_id, body));
    Json(json!({"ok": true}))
}

async fn instructions(
    State(state): State<AppState>,
) -> Sse<impl futures_util::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events.subscribe();
    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        match rx.recv().await {
            Ok(data) => Some((Ok(Event::default().data(data)), rx)),
            Err(_) => None,
        }
    });
    Sse::new(stream)
}

// ============================================================================
// Fixtures
// ============================================================================

/// Millisecond-scale intervals so the tests run fast.
pub fn test_config(base_url: &str) -> SimConfig {
    let mut config = SimConfig::new(base_url, "test-key");
    config.fast_interval = Duration::from_millis(20);
    config.slow_interval = Duration::from_millis(40);
    config.report_tick = Duration::from_millis(5);
    config.listener_backoff = Duration::from_millis(20);
    config
}

pub fn test_bike(
    config: &SimConfig,
    status: BikeStatus,
    battery: Battery,
    script: Option<TripScript>,
) -> Arc<SimBike> {
    test_bike_with_id(1, config, status, battery, script)
}

pub fn test_bike_with_id(
    id: i64,
    config: &SimConfig,
    status: BikeStatus,
    battery: Battery,
    script: Option<TripScript>,
) -> Arc<SimBike> {
    let client = ApiClient::new(config);
    let bike = Bike::new(
        id,
        "KSD",
        status,
        battery,
        Gps::new(Point::new(START[0], START[1])),
    );
    SimBike::new(bike, script, client, config.clone())
}

/// One-trip script for the given renter.
pub fn script(user_id: i64, waypoints: &[[f64; 2]]) -> TripScript {
    serde_json::from_value(json!({
        "trips": [{ "user": { "id": user_id, "token": "jwt" }, "coords": waypoints }]
    }))
    .unwrap()
}

/// Poll a condition until it holds or the timeout passes.
pub async fn wait_until(mut condition: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
