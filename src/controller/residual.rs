//! Single-threshold residual-energy policy.

use std::time::Duration;

use crate::controller::{Controller, EnergyReport};
use crate::device::DeviceRole;
use crate::sim::time::SimTime;

/// Interpolates the off time from the residual energy fraction with a
/// single low cutoff and an implicit upper bound of 1.0.
///
/// Only end devices sleep under this policy; a coordinator always gets a
/// zero off time.
pub struct ResidualEnergyController {
    threshold: f64,
    max_off: Duration,
    last_off: Duration,
}

impl ResidualEnergyController {
    /// Create a policy with the given cutoff fraction and maximum off time.
    pub fn new(threshold: f64, max_off: Duration) -> Self {
        Self {
            threshold,
            max_off,
            last_off: Duration::ZERO,
        }
    }

    /// The off time computed by the most recent round.
    pub fn last_off(&self) -> Duration {
        self.last_off
    }
}

impl Controller for ResidualEnergyController {
    fn off_time(&mut self, role: DeviceRole, energy: &EnergyReport, _now: SimTime) -> Duration {
        if role != DeviceRole::EndDevice {
            return Duration::ZERO;
        }
        let fraction = energy.fraction;
        let off = if fraction <= self.threshold {
            self.max_off
        } else {
            let value = (fraction - self.threshold) / (1.0 - self.threshold);
            self.max_off.mul_f64(1.0 - value.clamp(0.0, 1.0))
        };
        tracing::debug!(fraction, off_s = off.as_secs_f64(), "residual off time");
        self.last_off = off;
        off
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(fraction: f64) -> EnergyReport {
        EnergyReport {
            fraction,
            total_consumption: 0.0,
            harvesting_power: 0.0,
        }
    }

    #[test]
    fn test_extremes() {
        let mut c = ResidualEnergyController::new(0.3, Duration::from_secs(60));
        assert_eq!(
            c.off_time(DeviceRole::EndDevice, &report(0.1), SimTime::ZERO),
            Duration::from_secs(60)
        );
        assert_eq!(
            c.off_time(DeviceRole::EndDevice, &report(1.0), SimTime::ZERO),
            Duration::ZERO
        );
    }

    #[test]
    fn test_coordinator_never_sleeps() {
        let mut c = ResidualEnergyController::new(0.3, Duration::from_secs(60));
        assert_eq!(
            c.off_time(DeviceRole::Coordinator, &report(0.0), SimTime::ZERO),
            Duration::ZERO
        );
    }

    #[test]
    fn test_midpoint_interpolates() {
        let mut c = ResidualEnergyController::new(0.5, Duration::from_secs(60));
        // fraction 0.75 is halfway between threshold and 1.0
        let off = c.off_time(DeviceRole::EndDevice, &report(0.75), SimTime::ZERO);
        assert_eq!(off, Duration::from_secs(30));
        assert_eq!(c.last_off(), off);
    }
}
