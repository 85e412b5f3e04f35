//! Simulated bike battery.
//!
//! The battery drains a fixed amount per simulation tick. Reading the
//! level through [`Battery::level`] is the tick: it returns the current
//! charge and then applies the drain, so one read per loop iteration
//! models monotonic discharge. A negative drain simulates charging.

/// Charge fraction at or below which the bike needs a service visit.
pub const NEEDS_CHARGING_LEVEL: f64 = 0.15;

/// Charge fraction at or below which the bike is too low to keep renting.
pub const LOW_BATTERY_LEVEL: f64 = 0.03;

#[derive(Debug, Clone)]
pub struct Battery {
    level: f64,
    drain: f64,
}

impl Battery {
    /// Create a battery with a starting charge (clamped to [0, 1]) and a
    /// per-tick drain. A negative drain charges instead.
    pub fn new(level: f64, drain: f64) -> Self {
        Self {
            level: level.clamp(0.0, 1.0),
            drain,
        }
    }

    /// Current charge, then apply one tick of drain.
    ///
    /// This is deliberately a stateful read: the value returned is the
    /// charge before the drain, and the stored level is clamped to [0, 1]
    /// afterwards.
    pub fn level(&mut self) -> f64 {
        let current = self.level;
        self.level = (self.level - self.drain).clamp(0.0, 1.0);
        current
    }

    /// Current charge without draining. Used at assembly time and in tests.
    pub fn charge(&self) -> f64 {
        self.level
    }

    /// True when the battery is low enough to require charging.
    pub fn needs_charging(&self) -> bool {
        self.level <= NEEDS_CHARGING_LEVEL
    }

    /// True when the battery is too low to keep renting the bike out.
    pub fn low_battery(&self) -> bool {
        self.level <= LOW_BATTERY_LEVEL
    }
}
