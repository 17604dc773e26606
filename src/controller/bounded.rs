//! Min/max-threshold residual-energy policy.

use std::time::Duration;

use crate::controller::{Controller, EnergyReport};
use crate::device::DeviceRole;
use crate::sim::time::SimTime;

/// Interpolates the off time between two residual-energy thresholds.
///
/// At or above `max_threshold` the device stays awake; at or below
/// `min_threshold` it sleeps for the full `max_off`; in between the off
/// time falls linearly with the energy fraction. Only end devices sleep
/// under this policy.
pub struct BoundedResidualController {
    min_threshold: f64,
    max_threshold: f64,
    max_off: Duration,
    last_off: Duration,
}

impl BoundedResidualController {
    /// Create a policy from its two cutoff fractions and maximum off time.
    pub fn new(min_threshold: f64, max_threshold: f64, max_off: Duration) -> Self {
        assert!(
            min_threshold < max_threshold,
            "bounded controller thresholds must be ordered"
        );
        Self {
            min_threshold,
            max_threshold,
            max_off,
            last_off: Duration::ZERO,
        }
    }

    /// The off time computed by the most recent round.
    pub fn last_off(&self) -> Duration {
        self.last_off
    }
}

impl Controller for BoundedResidualController {
    fn off_time(&mut self, role: DeviceRole, energy: &EnergyReport, _now: SimTime) -> Duration {
        if role != DeviceRole::EndDevice {
            return Duration::ZERO;
        }
        let fraction = energy.fraction;
        let off = if fraction >= self.max_threshold {
            Duration::ZERO
        } else if fraction <= self.min_threshold {
            self.max_off
        } else {
            let value =
                (fraction - self.min_threshold) / (self.max_threshold - self.min_threshold);
            self.max_off.mul_f64(1.0 - value)
        };
        tracing::debug!(fraction, off_s = off.as_secs_f64(), "bounded off time");
        self.last_off = off;
        off
    }
}
