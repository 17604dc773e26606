//! Duty-cycle controllers.
//!
//! A controller answers one question at the end of every round: how long
//! should this device stay off before its next activity? The answer is
//! always within `[0, max_off]`. Policies are interchangeable and selected
//! at configuration time through the [`DutyCycle`] tagged enum.

pub mod basic;
pub mod bounded;
pub mod harvesting;
pub mod residual;

pub use basic::BasicController;
pub use bounded::BoundedResidualController;
pub use harvesting::HarvestingController;
pub use residual::ResidualEnergyController;

use std::time::Duration;

use crate::config::ControllerConfig;
use crate::device::DeviceRole;
use crate::sim::time::SimTime;

/// Snapshot of a device's energy situation handed to the controller.
///
/// `fraction` is the maximum energy fraction across the device's sources,
/// mirroring the original multi-source scan.
#[derive(Debug, Clone, Copy)]
pub struct EnergyReport {
    /// Remaining energy divided by initial energy, in `[0, 1]`.
    pub fraction: f64,
    /// Total charge consumed by the radio so far, in joules.
    pub total_consumption: f64,
    /// Exogenous harvested power in watts.
    pub harvesting_power: f64,
}

/// A duty-cycle policy.
pub trait Controller {
    /// Off time for the device, called once at the end of each round.
    fn off_time(&mut self, role: DeviceRole, energy: &EnergyReport, now: SimTime) -> Duration;

    /// Hook invoked when the coordinator opens a round.
    fn notify_round_start(&mut self, _now: SimTime) {}
}

/// Tagged dispatch over the available policies.
pub enum DutyCycle {
    /// Fixed delay.
    Basic(BasicController),
    /// Single-threshold residual energy.
    Residual(ResidualEnergyController),
    /// Min/max-threshold residual energy.
    Bounded(BoundedResidualController),
    /// Harvesting-aware.
    Harvesting(HarvestingController),
}

impl DutyCycle {
    /// Build the policy selected by `config`.
    pub fn from_config(config: &ControllerConfig) -> Self {
        match *config {
            ControllerConfig::Basic { delay } => DutyCycle::Basic(BasicController::new(delay)),
            ControllerConfig::Residual { threshold, max_off } => {
                DutyCycle::Residual(ResidualEnergyController::new(threshold, max_off))
            }
            ControllerConfig::Bounded {
                min_threshold,
                max_threshold,
                max_off,
            } => DutyCycle::Bounded(BoundedResidualController::new(
                min_threshold,
                max_threshold,
                max_off,
            )),
            ControllerConfig::Harvesting {
                min_threshold,
                max_threshold,
                max_off,
            } => DutyCycle::Harvesting(HarvestingController::new(
                min_threshold,
                max_threshold,
                max_off,
            )),
        }
    }
}

impl Controller for DutyCycle {
    fn off_time(&mut self, role: DeviceRole, energy: &EnergyReport, now: SimTime) -> Duration {
        match self {
            DutyCycle::Basic(c) => c.off_time(role, energy, now),
            DutyCycle::Residual(c) => c.off_time(role, energy, now),
            DutyCycle::Bounded(c) => c.off_time(role, energy, now),
            DutyCycle::Harvesting(c) => c.off_time(role, energy, now),
        }
    }

    fn notify_round_start(&mut self, now: SimTime) {
        match self {
            DutyCycle::Basic(c) => c.notify_round_start(now),
            DutyCycle::Residual(c) => c.notify_round_start(now),
            DutyCycle::Bounded(c) => c.notify_round_start(now),
            DutyCycle::Harvesting(c) => c.notify_round_start(now),
        }
    }
}
