//! Scripted trip runner.
//!
//! Replays a bike's trip script: rent, ride through the waypoints at the
//! fast cadence, return. Holds the bike's exclusive simulation signal for
//! the duration of the whole script so the reporting loop stays quiet; a
//! second invocation while one is running declines instead of queueing.

use std::sync::Arc;

use spoke_core::{BikeStatus, Trip};
use tracing::{debug, info, warn};

use crate::runner::SimBike;

/// Replay every scripted trip for this bike, sequentially.
pub async fn run(bike: Arc<SimBike>) {
    let Some(script) = bike.script() else {
        debug!(bike_id = bike.id(), "no trip script, nothing to simulate");
        return;
    };

    let Ok(_gate) = bike.sim_gate.try_lock() else {
        warn!(bike_id = bike.id(), "trip simulation already running, declining");
        return;
    };

    info!(
        bike_id = bike.id(),
        trips = script.trips.len(),
        "trip simulation started"
    );
    for trip in &script.trips {
        run_trip(&bike, trip).await;
    }
    info!(bike_id = bike.id(), "trip simulation finished");
    // _gate drops here, waking the reporting loop.
}

async fn run_trip(bike: &SimBike, trip: &Trip) {
    let trip_id = match bike.client.rent(bike.id(), &trip.user).await {
        Ok(Some(trip_id)) => trip_id,
        Ok(None) => {
            debug!(
                bike_id = bike.id(),
                renter = trip.user.id,
                "rental declined, skipping trip"
            );
            return;
        }
        Err(e) => {
            warn!(bike_id = bike.id(), error = %e, "rental request failed, skipping trip");
            return;
        }
    };

    bike.set_status(BikeStatus::Rented);
    if traverse(bike, trip).await {
        finish(bike, trip, trip_id).await;
    }
}

/// Ride through the waypoints. Returns false when the bike was locked
/// from the outside mid-trip: that path pushes one final zero-speed
/// report, abandons the remaining waypoints and deliberately skips the
/// return call, leaving the rental open on the server for the operator to
/// resolve.
async fn traverse(bike: &SimBike, trip: &Trip) -> bool {
    let elapsed = bike.config.fast_interval.as_secs_f64();

    for waypoint in trip.waypoints() {
        if !bike.is_unlocked() {
            info!(bike_id = bike.id(), "locked mid-trip, abandoning ride");
            if let Err(e) = bike.client.report(&bike.halt_report()).await {
                warn!(bike_id = bike.id(), error = %e, "final report failed");
            }
            return false;
        }

        let report = bike.ride_tick(waypoint, elapsed);
        if let Err(e) = bike.client.report(&report).await {
            warn!(bike_id = bike.id(), error = %e, "waypoint report failed, skipping");
        }

        tokio::time::sleep(bike.config.fast_interval).await;
    }

    true
}

async fn finish(bike: &SimBike, trip: &Trip, trip_id: i64) {
    bike.halt();
    if let Err(e) = bike.client.return_trip(trip_id, &trip.user).await {
        warn!(bike_id = bike.id(), trip_id, error = %e, "return call failed");
    }
    bike.set_status(BikeStatus::Available);
    debug!(bike_id = bike.id(), trip_id, "trip completed");
}
