//! Per-bike runtime handle and the periodic reporting loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use spoke_core::geo::Point;
use spoke_core::{Bike, BikeReport, BikeStatus, CityZone, TripScript};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::config::SimConfig;

/// Shared handle for one simulated bike.
///
/// The core state machine sits behind a plain mutex with short critical
/// sections. The exclusive simulation signal is a single-permit async
/// lock: the trip simulator holds it for the whole script, the reporting
/// loop waits on it before each iteration so the two never push
/// overlapping state.
pub struct SimBike {
    id: i64,
    state: Mutex<Bike>,
    pub(crate) sim_gate: AsyncMutex<()>,
    running: AtomicBool,
    script: Option<TripScript>,
    pub(crate) client: ApiClient,
    pub(crate) config: SimConfig,
}

impl SimBike {
    pub fn new(
        bike: Bike,
        script: Option<TripScript>,
        client: ApiClient,
        config: SimConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: bike.id(),
            state: Mutex::new(bike),
            sim_gate: AsyncMutex::new(()),
            running: AtomicBool::new(false),
            script,
            client,
            config,
        })
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn status(&self) -> BikeStatus {
        self.state.lock().unwrap().status()
    }

    pub fn is_unlocked(&self) -> bool {
        self.state.lock().unwrap().is_unlocked()
    }

    pub fn lock(&self) -> BikeStatus {
        self.state.lock().unwrap().lock()
    }

    pub fn unlock(&self) {
        self.state.lock().unwrap().unlock()
    }

    pub fn set_status(&self, status: BikeStatus) -> BikeStatus {
        self.state.lock().unwrap().set_status(status)
    }

    pub fn set_zones(&self, zones: Option<CityZone>) {
        self.state.lock().unwrap().set_zones(zones)
    }

    pub fn speed_limit(&self) -> u32 {
        self.state.lock().unwrap().speed_limit()
    }

    /// Zero the reported speed, e.g. at the end of a trip.
    pub fn halt(&self) {
        self.state.lock().unwrap().halt()
    }

    pub(crate) fn script(&self) -> Option<&TripScript> {
        self.script.as_ref()
    }

    /// One simulation tick plus the reporting interval the current status
    /// asks for.
    pub(crate) fn tick(&self) -> (BikeReport, Duration) {
        let mut bike = self.state.lock().unwrap();
        let report = bike.tick();
        let interval = if bike.is_unlocked() {
            self.config.fast_interval
        } else {
            self.config.slow_interval
        };
        (report, interval)
    }

    /// Move to a waypoint and tick, as one critical section.
    pub(crate) fn ride_tick(&self, waypoint: Point<f64>, elapsed_seconds: f64) -> BikeReport {
        let mut bike = self.state.lock().unwrap();
        if let Err(e) = bike.move_to(waypoint, elapsed_seconds) {
            warn!(bike_id = self.id, error = %e, "waypoint update rejected");
        }
        bike.tick()
    }

    /// Zero the speed and snapshot, for the final push of an aborted trip.
    pub(crate) fn halt_report(&self) -> BikeReport {
        let mut bike = self.state.lock().unwrap();
        bike.halt();
        bike.report()
    }

    /// Re-fetch this bike's zone set and swap it in wholesale.
    pub async fn recache_zones(&self) {
        match self.client.fetch_zones(self.id).await {
            Ok(payload) => match CityZone::try_from(payload) {
                Ok(city) => {
                    self.set_zones(Some(city));
                    info!(bike_id = self.id, "zone set recached");
                }
                Err(e) => {
                    warn!(bike_id = self.id, error = %e, "discarding invalid zone payload")
                }
            },
            Err(e) => warn!(bike_id = self.id, error = %e, "zone recache fetch failed"),
        }
    }

    /// Ask the reporting loop to exit at its next check. Does not touch a
    /// trip simulation in flight.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The bike's periodic reporting loop.
    ///
    /// Every tick: wait out any active trip simulation, drain the battery
    /// by one tick (escalating the status when it runs low), refresh the
    /// speed limit, and push a report once the accumulated time reaches
    /// the cadence for the current status. Report failures are logged and
    /// skipped; the loop itself only ends through [`SimBike::stop`].
    pub async fn run_reporting_loop(self: Arc<Self>) {
        self.running.store(true, Ordering::SeqCst);
        info!(bike_id = self.id, "reporting loop started");

        let tick = self.config.report_tick;
        let mut since_report = Duration::ZERO;

        while self.running.load(Ordering::SeqCst) {
            // Suspend while a trip script runs; release straight away so a
            // new trip can still claim the signal without queueing on us.
            drop(self.sim_gate.lock().await);

            let (report, interval) = self.tick();
            since_report += tick;
            if since_report >= interval {
                since_report = Duration::ZERO;
                if let Err(e) = self.client.report(&report).await {
                    warn!(bike_id = self.id, error = %e, "state report failed, skipping");
                }
            }

            tokio::time::sleep(tick).await;
        }

        info!(bike_id = self.id, "reporting loop stopped");
    }
}
