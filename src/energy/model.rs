//! Per-state current integration for the radio.

use std::time::Duration;

use crate::config::EnergyConfig;
use crate::radio::RadioState;
use crate::sim::time::SimTime;

/// Device energy model fed by radio state changes.
///
/// On every transition it integrates `duration * current(previous state) *
/// supply voltage` into a running consumption total. It also tracks how
/// long the radio spent in each state, which gives the observed duty cycle.
pub struct RadioEnergyModel {
    currents: EnergyConfig,
    supply_voltage: f64,
    state: RadioState,
    last_update: SimTime,
    total_consumption: f64,
    time_in: [Duration; 6],
}

impl RadioEnergyModel {
    /// Create a model starting in the idle state at time zero.
    pub fn new(currents: EnergyConfig, supply_voltage: f64) -> Self {
        Self {
            currents,
            supply_voltage,
            state: RadioState::Idle,
            last_update: SimTime::ZERO,
            total_consumption: 0.0,
            time_in: [Duration::ZERO; 6],
        }
    }

    /// Current draw of the state the radio is in now, in amperes.
    pub fn current_a(&self) -> f64 {
        self.currents.current_a(self.state)
    }

    /// The state the model believes the radio is in.
    pub fn state(&self) -> RadioState {
        self.state
    }

    /// Total charge consumed so far, in joules.
    pub fn total_consumption(&self) -> f64 {
        self.total_consumption
    }

    /// Account the time spent in the previous state and switch to
    /// `new_state`.
    pub fn change_state(&mut self, new_state: RadioState, now: SimTime) {
        assert!(
            now >= self.last_update,
            "energy model saw a negative state duration"
        );
        let duration = now - self.last_update;
        let consumed =
            duration.as_secs_f64() * self.currents.current_a(self.state) * self.supply_voltage;
        self.total_consumption += consumed;
        self.time_in[self.state.index()] += duration;
        tracing::trace!(
            from = %self.state,
            to = %new_state,
            total_j = self.total_consumption,
            "energy state change"
        );
        self.last_update = now;
        self.state = new_state;
    }

    /// Time spent in a given state so far.
    pub fn time_in(&self, state: RadioState) -> Duration {
        self.time_in[state.index()]
    }

    /// Time spent transmitting or receiving.
    pub fn active_time(&self) -> Duration {
        self.time_in(RadioState::Tx) + self.time_in(RadioState::Rx)
    }

    /// Fraction of accounted time spent transmitting or receiving.
    pub fn duty_cycle(&self) -> f64 {
        let total: Duration = self.time_in.iter().sum();
        if total.is_zero() {
            return 0.0;
        }
        self.active_time().as_secs_f64() / total.as_secs_f64()
    }
}
