//! Harvesting-aware policy.

use std::time::Duration;

use crate::controller::{Controller, EnergyReport};
use crate::device::DeviceRole;
use crate::sim::time::SimTime;

/// Balances the trailing consumption rate against harvested power.
///
/// Outside the threshold band this degenerates to the bounded policy. In
/// the band the off time scales with `consumption_rate / harvesting_power`,
/// clamped to `[0, max_off]`. When harvested power is zero (or the rate
/// cannot be estimated yet) no ratio is computed and the policy falls back
/// to the full `max_off`.
pub struct HarvestingController {
    min_threshold: f64,
    max_threshold: f64,
    max_off: Duration,
    last_consumption: f64,
    last_harvested: f64,
    last_update: SimTime,
    last_off: Duration,
}

impl HarvestingController {
    /// Create a policy from its threshold band and maximum off time.
    pub fn new(min_threshold: f64, max_threshold: f64, max_off: Duration) -> Self {
        assert!(
            min_threshold < max_threshold,
            "harvesting controller thresholds must be ordered"
        );
        Self {
            min_threshold,
            max_threshold,
            max_off,
            last_consumption: 0.0,
            last_harvested: 0.0,
            last_update: SimTime::ZERO,
            last_off: Duration::ZERO,
        }
    }

    /// The off time computed by the most recent round.
    pub fn last_off(&self) -> Duration {
        self.last_off
    }

    /// Energy harvested over the windows observed so far, in joules.
    pub fn harvested_estimate(&self) -> f64 {
        self.last_harvested
    }
}

impl Controller for HarvestingController {
    fn off_time(&mut self, _role: DeviceRole, energy: &EnergyReport, now: SimTime) -> Duration {
        let fraction = energy.fraction;
        let elapsed = now.as_secs_f64();

        let off = if fraction >= self.max_threshold {
            Duration::ZERO
        } else if fraction <= self.min_threshold {
            self.max_off
        } else if energy.harvesting_power <= 0.0 || elapsed <= 0.0 {
            // cannot estimate the balance; be conservative
            self.max_off
        } else {
            let consumption_rate = energy.total_consumption / elapsed;
            let ratio = (consumption_rate / energy.harvesting_power).clamp(0.0, 1.0);
            self.max_off.mul_f64(ratio)
        };

        self.last_harvested +=
            energy.harvesting_power * (now - self.last_update).as_secs_f64();
        self.last_consumption = energy.total_consumption;
        self.last_update = now;

        tracing::debug!(
            fraction,
            harvesting_w = energy.harvesting_power,
            off_s = off.as_secs_f64(),
            "harvesting off time"
        );
        self.last_off = off;
        off
    }
}
