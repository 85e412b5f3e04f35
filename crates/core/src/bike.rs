//! The bike itself: status machine, owned battery and GPS, zone lookup.
//!
//! Status transitions are policy, not plain assignment. A bike that needs
//! service refuses to go back in service, a rented bike that needs service
//! keeps the fact that someone is riding it, and a bike explicitly taken
//! into maintenance stays there until the workshop says otherwise.

use geo::Point;
use serde::Serialize;
use tracing::debug;

use crate::battery::Battery;
use crate::gps::Gps;
use crate::zone::CityZone;
use crate::{CoreError, Result};

/// Bike status as shared with the rest of the platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BikeStatus {
    Available = 1,
    Rented = 2,
    Maintenance = 3,
    MaintenanceRequired = 4,
    RentedMaintenanceRequired = 5,
}

impl BikeStatus {
    pub fn from_id(id: u8) -> Result<Self> {
        match id {
            1 => Ok(Self::Available),
            2 => Ok(Self::Rented),
            3 => Ok(Self::Maintenance),
            4 => Ok(Self::MaintenanceRequired),
            5 => Ok(Self::RentedMaintenanceRequired),
            other => Err(CoreError::UnknownStatus(other)),
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    /// A bike is unlocked exactly while someone is riding it.
    pub fn is_unlocked(self) -> bool {
        matches!(self, Self::Rented | Self::RentedMaintenanceRequired)
    }
}

/// One state report as pushed to the server.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BikeReport {
    pub id: i64,
    pub city_id: String,
    pub status_id: u8,
    /// Charge as a fraction, rounded to whole percents (0.87 = 87 %).
    pub charge_perc: f64,
    /// `[lng, lat]`, the wire convention for coordinates.
    pub coords: [f64; 2],
    pub speed: u32,
}

pub struct Bike {
    id: i64,
    city_id: String,
    status: BikeStatus,
    battery: Battery,
    gps: Gps,
    city_zone: Option<CityZone>,
    speed_limit: u32,
}

impl Bike {
    pub fn new(
        id: i64,
        city_id: impl Into<String>,
        status: BikeStatus,
        battery: Battery,
        gps: Gps,
    ) -> Self {
        Self {
            id,
            city_id: city_id.into(),
            status,
            battery,
            gps,
            city_zone: None,
            speed_limit: 0,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn city_id(&self) -> &str {
        &self.city_id
    }

    pub fn status(&self) -> BikeStatus {
        self.status
    }

    pub fn position(&self) -> Point<f64> {
        self.gps.position()
    }

    pub fn speed_limit(&self) -> u32 {
        self.speed_limit
    }

    pub fn is_unlocked(&self) -> bool {
        self.status.is_unlocked()
    }

    /// Apply a status change, subject to the transition policy. Returns
    /// the status actually in effect afterwards.
    pub fn set_status(&mut self, status: BikeStatus) -> BikeStatus {
        use BikeStatus::*;

        let next = match (self.status, status) {
            // A bike that needs service cannot be put back in service.
            (MaintenanceRequired | RentedMaintenanceRequired, Available) => MaintenanceRequired,
            // Flagging maintenance on a ridden bike keeps the ride.
            (Rented | RentedMaintenanceRequired, MaintenanceRequired) => {
                RentedMaintenanceRequired
            }
            // Explicit maintenance is never silently escalated.
            (Maintenance, MaintenanceRequired) => Maintenance,
            (_, requested) => requested,
        };

        if next != status {
            debug!(bike_id = self.id, requested = ?status, effective = ?next, "status adjusted");
        }
        self.status = next;
        next
    }

    /// Flag the bike as needing service, with the usual upgrade rules.
    pub fn flag_maintenance(&mut self) -> BikeStatus {
        self.set_status(BikeStatus::MaintenanceRequired)
    }

    /// Lock the bike, forcing it back to available (unless it needs
    /// service, in which case it stays flagged).
    pub fn lock(&mut self) -> BikeStatus {
        self.set_status(BikeStatus::Available)
    }

    /// Unlocking is driven by the server through the rental flow; the
    /// simulated bike has no local state to change here.
    pub fn unlock(&self) {
        debug!(bike_id = self.id, "unlock requested, rental flow owns this transition");
    }

    /// Replace the zone set wholesale. `None` removes all zones, which
    /// also zeroes the speed limit on the next tick.
    pub fn set_zones(&mut self, zones: Option<CityZone>) {
        self.city_zone = zones;
        self.update_speed_limit();
    }

    /// Recompute the speed limit for the current position. No zone set
    /// loaded means no known limit, reported as 0.
    pub fn update_speed_limit(&mut self) {
        self.speed_limit = self
            .city_zone
            .as_ref()
            .map(|city| city.get_speed_limit(self.gps.position()))
            .unwrap_or(0);
    }

    /// Move the bike, deriving speed from the elapsed time.
    pub fn move_to(&mut self, position: Point<f64>, elapsed_seconds: f64) -> Result<()> {
        self.gps.update(position, elapsed_seconds)
    }

    /// Zero the reported speed without moving.
    pub fn halt(&mut self) {
        self.gps.halt();
    }

    /// One simulation tick: drain the battery, escalate to
    /// maintenance-required when it runs low, refresh the speed limit and
    /// produce the report for this instant.
    pub fn tick(&mut self) -> BikeReport {
        let charge = self.battery.level();
        if self.battery.needs_charging() {
            self.flag_maintenance();
        }
        self.update_speed_limit();
        self.report_with_charge(charge)
    }

    /// Report of the current state without draining the battery. Used for
    /// the final push when a trip is cut short.
    pub fn report(&self) -> BikeReport {
        self.report_with_charge(self.battery.charge())
    }

    fn report_with_charge(&self, charge: f64) -> BikeReport {
        let position = self.gps.position();
        BikeReport {
            id: self.id,
            city_id: self.city_id.clone(),
            status_id: self.status.id(),
            charge_perc: (charge * 100.0).round() / 100.0,
            coords: [position.x(), position.y()],
            speed: self.gps.speed_kmh(),
        }
    }
}
