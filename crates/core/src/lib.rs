//! # spoke-core
//!
//! Runtime-free domain models for the bike fleet simulator.
//!
//! Everything in this crate is plain in-memory state: the simulated
//! battery and GPS, the zone/speed-limit lookup, the bike status machine
//! and the trip script types. Networking, scheduling and concurrency live
//! in the `spoke-sim` crate on top of these models.
//!
//! ## Example
//!
//! ```
//! use spoke_core::prelude::*;
//! use geo::Point;
//!
//! let battery = Battery::new(1.0, 0.001);
//! let gps = Gps::new(Point::new(13.5087, 59.3821));
//! let mut bike = Bike::new(1, "KSD", BikeStatus::Available, battery, gps);
//!
//! let report = bike.tick();
//! assert_eq!(report.status_id, 1);
//! assert_eq!(report.speed, 0);
//! ```

// Re-export so downstream crates use the same geometry types.
pub use geo;

pub mod battery;
pub mod bike;
pub mod gps;
pub mod trip;
pub mod zone;

pub mod prelude {
    pub use crate::battery::Battery;
    pub use crate::bike::{Bike, BikeReport, BikeStatus};
    pub use crate::gps::Gps;
    pub use crate::trip::{Renter, Trip, TripScript};
    pub use crate::zone::{CityZone, CityZonePayload, Zone, ZonePayload};
    pub use crate::{CoreError, Result};
}

pub use prelude::*;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("elapsed time must be positive, got {0}")]
    InvalidElapsed(f64),

    #[error("invalid zone geometry: {0}")]
    InvalidZone(String),

    #[error("unknown status id: {0}")]
    UnknownStatus(u8),
}

pub type Result<T> = std::result::Result<T, CoreError>;
