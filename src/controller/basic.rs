//! Fixed-delay policy.

use std::time::Duration;

use crate::controller::{Controller, EnergyReport};
use crate::device::DeviceRole;
use crate::sim::time::SimTime;

/// Returns a constant configured off time, regardless of energy state.
///
/// With a zero delay the device polls continuously, which suits a
/// mains-assisted coordinator.
pub struct BasicController {
    delay: Duration,
}

impl BasicController {
    /// Create a policy returning `delay` every round.
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Controller for BasicController {
    fn off_time(&mut self, _role: DeviceRole, _energy: &EnergyReport, _now: SimTime) -> Duration {
        self.delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_delay() {
        let mut c = BasicController::new(Duration::from_secs(2));
        let report = EnergyReport {
            fraction: 0.01,
            total_consumption: 0.0,
            harvesting_power: 0.0,
        };
        assert_eq!(
            c.off_time(DeviceRole::EndDevice, &report, SimTime::ZERO),
            Duration::from_secs(2)
        );
        assert_eq!(
            c.off_time(DeviceRole::Coordinator, &report, SimTime::ZERO),
            Duration::from_secs(2)
        );
    }
}
