//! Simulated GPS unit.
//!
//! Tracks the bike's position and derives its speed from the haversine
//! distance covered since the previous fix.

use geo::{HaversineDistance, Point};

use crate::{CoreError, Result};

#[derive(Debug, Clone)]
pub struct Gps {
    position: Point<f64>,
    speed_kmh: u32,
}

impl Gps {
    pub fn new(position: Point<f64>) -> Self {
        Self {
            position,
            speed_kmh: 0,
        }
    }

    /// Current position (x = longitude, y = latitude).
    pub fn position(&self) -> Point<f64> {
        self.position
    }

    /// Speed derived from the last position update, in km/h. Zero before
    /// the first update.
    pub fn speed_kmh(&self) -> u32 {
        self.speed_kmh
    }

    /// Move to a new position, deriving speed from the great-circle
    /// distance and the elapsed time.
    ///
    /// Returns `Err` for a zero or negative elapsed time.
    pub fn update(&mut self, new_position: Point<f64>, elapsed_seconds: f64) -> Result<()> {
        if elapsed_seconds <= 0.0 {
            return Err(CoreError::InvalidElapsed(elapsed_seconds));
        }

        let meters = self.position.haversine_distance(&new_position);
        let kmh = meters / elapsed_seconds * 3.6;

        self.speed_kmh = kmh.round() as u32;
        self.position = new_position;
        Ok(())
    }

    /// Zero the reported speed without moving, e.g. when a trip ends or
    /// the bike is locked mid-ride.
    pub fn halt(&mut self) {
        self.speed_kmh = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Two points in Karlstad roughly 200 meters apart.
    const START: (f64, f64) = (13.508699207322167, 59.38210003526896);
    const END: (f64, f64) = (13.505173887431198, 59.38216072603788);

    #[test]
    fn test_speed_defaults_to_zero() {
        let gps = Gps::new(Point::new(START.0, START.1));
        assert_eq!(gps.speed_kmh(), 0);
    }

    #[test]
    fn test_200_meters_in_10_seconds_is_72_kmh() {
        let mut gps = Gps::new(Point::new(START.0, START.1));
        gps.update(Point::new(END.0, END.1), 10.0).unwrap();

        assert_eq!(gps.speed_kmh(), 72);
        assert_eq!(gps.position(), Point::new(END.0, END.1));
    }

    #[test]
    fn test_200_meters_in_20_seconds_is_36_kmh() {
        let mut gps = Gps::new(Point::new(START.0, START.1));
        gps.update(Point::new(END.0, END.1), 20.0).unwrap();

        assert_eq!(gps.speed_kmh(), 36);
    }

    #[test]
    fn test_same_position_yields_zero_speed() {
        let mut gps = Gps::new(Point::new(START.0, START.1));
        gps.update(Point::new(END.0, END.1), 10.0).unwrap();
        gps.update(Point::new(END.0, END.1), 10.0).unwrap();

        assert_eq!(gps.speed_kmh(), 0);
    }

    #[test]
    fn test_zero_elapsed_is_an_error() {
        let mut gps = Gps::new(Point::new(START.0, START.1));
        assert!(gps.update(Point::new(END.0, END.1), 0.0).is_err());
        assert!(gps.update(Point::new(END.0, END.1), -3.0).is_err());

        // Failed update leaves the fix untouched.
        assert_eq!(gps.position(), Point::new(START.0, START.1));
        assert_eq!(gps.speed_kmh(), 0);
    }

    #[test]
    fn test_halt_zeroes_speed() {
        let mut gps = Gps::new(Point::new(START.0, START.1));
        gps.update(Point::new(END.0, END.1), 10.0).unwrap();
        gps.halt();

        assert_eq!(gps.speed_kmh(), 0);
        assert_eq!(gps.position(), Point::new(END.0, END.1));
    }
}
