//! Zones and speed limits.
//!
//! A city is described by an outer boundary polygon with a fallback speed
//! limit, plus an ordered list of inner zones with their own limits
//! (parking areas, slow zones, forbidden zones with limit 0, ...). The
//! lookup is hierarchical: outside the city the limit is a hard 0, the
//! first inner zone containing the point wins, and inside the city with no
//! inner match the city fallback applies.
//!
//! Zone sets are read-only reference data. They are only ever replaced
//! wholesale (a "recache"), never mutated in place.

use geo::{Contains, Point, Polygon};
use serde::Deserialize;

use crate::{CoreError, Result};

/// Speed limit used when a zone payload does not carry one.
pub const DEFAULT_SPEED_LIMIT: u32 = 20;

/// A polygon with an associated speed limit.
#[derive(Debug, Clone)]
pub struct Zone {
    polygon: Polygon<f64>,
    speed_limit: u32,
}

impl Zone {
    pub fn new(polygon: Polygon<f64>, speed_limit: u32) -> Self {
        Self {
            polygon,
            speed_limit,
        }
    }

    pub fn speed_limit(&self) -> u32 {
        self.speed_limit
    }

    pub fn contains(&self, point: Point<f64>) -> bool {
        self.polygon.contains(&point)
    }
}

/// The outer city boundary plus its ordered inner zones.
#[derive(Debug, Clone)]
pub struct CityZone {
    city_id: String,
    boundary: Polygon<f64>,
    speed_limit: u32,
    zones: Vec<Zone>,
}

impl CityZone {
    pub fn new(city_id: impl Into<String>, boundary: Polygon<f64>, speed_limit: u32) -> Self {
        Self {
            city_id: city_id.into(),
            boundary,
            speed_limit,
            zones: Vec::new(),
        }
    }

    pub fn city_id(&self) -> &str {
        &self.city_id
    }

    pub fn speed_limit(&self) -> u32 {
        self.speed_limit
    }

    /// Append an inner zone. Order is significant: the first matching zone
    /// wins the speed-limit lookup.
    pub fn add_zone(&mut self, zone: Zone) {
        self.zones.push(zone);
    }

    /// Speed limit at a point.
    ///
    /// Outside the city boundary the limit is a hard 0. Inside, the first
    /// inner zone containing the point decides; with no inner match the
    /// city fallback applies.
    pub fn get_speed_limit(&self, point: Point<f64>) -> u32 {
        if !self.boundary.contains(&point) {
            return 0;
        }

        for zone in &self.zones {
            if zone.contains(point) {
                return zone.speed_limit();
            }
        }

        self.speed_limit
    }
}

// ============================================================================
// Wire payloads
// ============================================================================

/// Body of the per-bike zones endpoint.
#[derive(Debug, Deserialize)]
pub struct CityZonePayload {
    pub city_id: String,
    pub geometry: geojson::Geometry,
    pub speed_limit: Option<u32>,
    #[serde(default)]
    pub zones: Vec<ZonePayload>,
}

#[derive(Debug, Deserialize)]
pub struct ZonePayload {
    pub geometry: geojson::Geometry,
    pub speed_limit: Option<u32>,
}

fn polygon_from_geometry(geometry: geojson::Geometry) -> Result<Polygon<f64>> {
    Polygon::try_from(geometry.value).map_err(|e| CoreError::InvalidZone(e.to_string()))
}

impl TryFrom<CityZonePayload> for CityZone {
    type Error = CoreError;

    fn try_from(payload: CityZonePayload) -> Result<Self> {
        let boundary = polygon_from_geometry(payload.geometry)?;
        let mut city = CityZone::new(
            payload.city_id,
            boundary,
            payload.speed_limit.unwrap_or(DEFAULT_SPEED_LIMIT),
        );

        for zone in payload.zones {
            let polygon = polygon_from_geometry(zone.geometry)?;
            city.add_zone(Zone::new(
                polygon,
                zone.speed_limit.unwrap_or(DEFAULT_SPEED_LIMIT),
            ));
        }

        Ok(city)
    }
}
