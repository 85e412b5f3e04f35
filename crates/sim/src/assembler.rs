//! Fleet assembly: bootstrap records + trip scripts → running bikes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rand::Rng;
use spoke_core::geo::Point;
use spoke_core::{Battery, Bike, BikeStatus, CityZone, Gps, TripScript};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, Result};
use crate::config::SimConfig;
use crate::listener::CommandListener;
use crate::runner::SimBike;

/// Battery drained per simulation tick.
const BATTERY_DRAIN: f64 = 0.001;

/// The assembled fleet: the bike map (read-only after assembly, shared
/// with listeners) plus the handles of the tasks spawned for it.
pub struct Fleet {
    bikes: Arc<HashMap<i64, Arc<SimBike>>>,
    client: ApiClient,
    config: SimConfig,
    tasks: Vec<JoinHandle<()>>,
    shutdowns: Vec<oneshot::Sender<()>>,
}

/// Build every active bike from the server's bootstrap list, with its
/// zone set, trip script and a randomized initial battery level.
///
/// A failed zone fetch leaves that bike without a zone set (limit 0) and
/// is not fatal; neither is a bike id without a script.
pub async fn assemble(
    config: &SimConfig,
    client: &ApiClient,
    mut scripts: HashMap<i64, TripScript>,
    good_routes: &HashSet<i64>,
) -> Result<Fleet> {
    let records = client.fetch_bikes().await?;
    let mut bikes = HashMap::new();

    for record in records {
        if !record.active {
            debug!(bike_id = record.id, "skipping inactive bike");
            continue;
        }

        let status = match BikeStatus::from_id(record.status_id) {
            Ok(status) => status,
            Err(e) => {
                warn!(bike_id = record.id, error = %e, "defaulting to available");
                BikeStatus::Available
            }
        };

        let battery = Battery::new(initial_charge(record.id, good_routes), BATTERY_DRAIN);
        let gps = Gps::new(Point::new(record.coords[0], record.coords[1]));
        let mut bike = Bike::new(record.id, record.city_id.clone(), status, battery, gps);

        match client.fetch_zones(record.id).await {
            Ok(payload) => match CityZone::try_from(payload) {
                Ok(city) => bike.set_zones(Some(city)),
                Err(e) => {
                    warn!(bike_id = record.id, error = %e, "invalid zone payload, no zone set")
                }
            },
            Err(e) => warn!(bike_id = record.id, error = %e, "zone fetch failed, no zone set"),
        }

        let script = scripts.remove(&record.id);
        if script.is_none() {
            debug!(bike_id = record.id, "no trip script for this bike");
        }

        bikes.insert(
            record.id,
            SimBike::new(bike, script, client.clone(), config.clone()),
        );
    }

    info!(bikes = bikes.len(), "fleet assembled");
    Ok(Fleet {
        bikes: Arc::new(bikes),
        client: client.clone(),
        config: config.clone(),
        tasks: Vec::new(),
        shutdowns: Vec::new(),
    })
}

/// Bikes with hand-checked routes start near full so their scripted trips
/// do not get cut short by the battery check.
fn initial_charge(bike_id: i64, good_routes: &HashSet<i64>) -> f64 {
    let mut rng = rand::thread_rng();
    if good_routes.contains(&bike_id) {
        rng.gen_range(0.7..=1.0)
    } else {
        rng.gen_range(0.2..=1.0)
    }
}

impl Fleet {
    pub fn bikes(&self) -> &Arc<HashMap<i64, Arc<SimBike>>> {
        &self.bikes
    }

    pub fn get(&self, bike_id: i64) -> Option<Arc<SimBike>> {
        self.bikes.get(&bike_id).cloned()
    }

    /// Start one reporting loop per bike, plus the command listeners:
    /// one per bike by default, or a single shared fleet-wide stream when
    /// the config asks for it.
    pub fn spawn(&mut self) {
        for bike in self.bikes.values() {
            self.tasks.push(tokio::spawn(bike.clone().run_reporting_loop()));

            if !self.config.shared_listener {
                let (tx, rx) = oneshot::channel();
                self.shutdowns.push(tx);
                self.tasks
                    .push(tokio::spawn(CommandListener::for_bike(bike.clone()).run(rx)));
            }
        }

        if self.config.shared_listener {
            let (tx, rx) = oneshot::channel();
            self.shutdowns.push(tx);
            let listener = CommandListener::for_fleet(
                self.client.clone(),
                self.bikes.clone(),
                self.config.listener_backoff,
            );
            self.tasks.push(tokio::spawn(listener.run(rx)));
        }

        info!(
            bikes = self.bikes.len(),
            shared_listener = self.config.shared_listener,
            "fleet tasks spawned"
        );
    }

    /// Stop reporting loops and listeners, then wait for the tasks to
    /// drain. An in-flight trip simulation finishes on its own.
    pub async fn shutdown(mut self) {
        for bike in self.bikes.values() {
            bike.stop();
        }
        for tx in self.shutdowns.drain(..) {
            let _ = tx.send(());
        }
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
        info!("fleet shut down");
    }
}
