//! Trip scripts.
//!
//! A trip script is the replay data for one bike: an ordered list of
//! trips, each a renter identity plus the waypoints to ride through.
//! Scripts are read-only and consumed once per simulated rental.

use geo::Point;
use serde::Deserialize;

/// The renter on whose behalf a scripted trip is ridden.
#[derive(Debug, Clone, Deserialize)]
pub struct Renter {
    pub id: i64,
    pub token: String,
}

/// One scripted rental: a renter and the waypoints of the ride.
///
/// Waypoints are `[lng, lat]` pairs, matching the wire convention of the
/// rest of the platform.
#[derive(Debug, Clone, Deserialize)]
pub struct Trip {
    pub user: Renter,
    pub coords: Vec<[f64; 2]>,
}

impl Trip {
    pub fn waypoints(&self) -> impl Iterator<Item = Point<f64>> + '_ {
        self.coords.iter().map(|c| Point::new(c[0], c[1]))
    }
}

/// All scripted trips for one bike, in replay order.
#[derive(Debug, Clone, Deserialize)]
pub struct TripScript {
    #[serde(default)]
    pub trips: Vec<Trip>,
}
