//! Device and network configuration.
//!
//! Plain typed structs with defaults taken from the reference radio
//! (250 kbps PHY, 192 µs sleep transition, CC2420-class current draw).

use std::time::Duration;

use crate::device::DeviceRole;
use crate::radio::RadioState;

/// MAC-layer parameters.
#[derive(Debug, Clone)]
pub struct MacConfig {
    /// Maximum transmission unit accepted at enqueue, in bytes.
    pub mtu: u16,
    /// Number of slots per frame.
    pub slots: u16,
    /// Guard/processing delay between protocol phases.
    pub max_delay: Duration,
    /// Data packets an end device may offer per round.
    pub packets_per_round: u32,
}

impl Default for MacConfig {
    fn default() -> Self {
        Self {
            mtu: 140,
            slots: 1,
            max_delay: Duration::from_micros(10),
            packets_per_round: 1,
        }
    }
}

/// PHY-layer parameters.
#[derive(Debug, Clone)]
pub struct PhyConfig {
    /// Bit rate in bits per second.
    pub rate_bps: u64,
    /// Settle time of a sleep transition, either direction.
    pub switching_time: Duration,
}

impl Default for PhyConfig {
    fn default() -> Self {
        Self {
            rate_bps: 250_000,
            switching_time: Duration::from_micros(192),
        }
    }
}

/// Radio current draw per state, in amperes.
#[derive(Debug, Clone)]
pub struct EnergyConfig {
    /// Idle listening.
    pub idle_a: f64,
    /// Clear-channel assessment found the medium busy.
    pub cca_busy_a: f64,
    /// Transmitting.
    pub tx_a: f64,
    /// Receiving.
    pub rx_a: f64,
    /// Sleep transition settle window.
    pub switching_a: f64,
    /// Sleeping.
    pub sleep_a: f64,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            idle_a: 273e-3,
            cca_busy_a: 273e-3,
            tx_a: 380e-3,
            rx_a: 313e-3,
            switching_a: 273e-3,
            sleep_a: 33e-3,
        }
    }
}

impl EnergyConfig {
    /// Current draw for a radio state.
    pub fn current_a(&self, state: RadioState) -> f64 {
        match state {
            RadioState::Idle => self.idle_a,
            RadioState::CcaBusy => self.cca_busy_a,
            RadioState::Tx => self.tx_a,
            RadioState::Rx => self.rx_a,
            RadioState::Sleep => self.sleep_a,
            RadioState::Switching => self.switching_a,
        }
    }
}

/// Energy reservoir parameters.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Capacity of the reservoir in joules.
    pub initial_energy_j: f64,
    /// Fraction of the capacity present at start, in `[0, 1]`.
    pub starting_fraction: f64,
    /// Supply voltage in volts.
    pub supply_voltage_v: f64,
    /// Depletion threshold as a fraction of the capacity.
    pub low_threshold: f64,
    /// Recharge threshold as a fraction of the capacity.
    pub high_threshold: f64,
    /// Interval between periodic reservoir updates.
    pub update_interval: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            initial_energy_j: 10.0,
            starting_fraction: 1.0,
            supply_voltage_v: 3.0,
            low_threshold: 0.10,
            high_threshold: 0.15,
            update_interval: Duration::from_secs(1),
        }
    }
}

/// Duty-cycle policy selection.
#[derive(Debug, Clone)]
pub enum ControllerConfig {
    /// Fixed delay between rounds, regardless of energy state.
    Basic {
        /// The constant off time.
        delay: Duration,
    },
    /// Single-threshold residual-energy interpolation.
    Residual {
        /// Below this fraction the device sleeps for `max_off`.
        threshold: f64,
        /// Upper bound on the off time.
        max_off: Duration,
    },
    /// Min/max-threshold residual-energy interpolation.
    Bounded {
        /// At or below this fraction the device sleeps for `max_off`.
        min_threshold: f64,
        /// At or above this fraction the device stays awake.
        max_threshold: f64,
        /// Upper bound on the off time.
        max_off: Duration,
    },
    /// Harvesting-aware policy balancing consumption against harvested
    /// power inside the threshold band.
    Harvesting {
        /// At or below this fraction the device sleeps for `max_off`.
        min_threshold: f64,
        /// At or above this fraction the device stays awake.
        max_threshold: f64,
        /// Upper bound on the off time.
        max_off: Duration,
    },
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig::Bounded {
            min_threshold: 0.3,
            max_threshold: 0.7,
            max_off: Duration::from_secs(60),
        }
    }
}

/// Complete configuration of one device.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Coordinator or end device.
    pub role: DeviceRole,
    /// MAC parameters.
    pub mac: MacConfig,
    /// PHY parameters.
    pub phy: PhyConfig,
    /// Radio current draw table.
    pub energy: EnergyConfig,
    /// Energy reservoir parameters.
    pub source: SourceConfig,
    /// Duty-cycle policy.
    pub controller: ControllerConfig,
    /// Exogenous harvested power in watts, visible to the controller only.
    pub harvesting_power_w: f64,
}

impl DeviceConfig {
    /// Configuration for a mains-assisted coordinator: fixed zero off time.
    pub fn coordinator() -> Self {
        Self {
            role: DeviceRole::Coordinator,
            mac: MacConfig::default(),
            phy: PhyConfig::default(),
            energy: EnergyConfig::default(),
            source: SourceConfig::default(),
            controller: ControllerConfig::Basic {
                delay: Duration::ZERO,
            },
            harvesting_power_w: 0.0,
        }
    }

    /// Configuration for a battery-powered end device with the bounded
    /// residual-energy policy.
    pub fn end_device() -> Self {
        Self {
            role: DeviceRole::EndDevice,
            mac: MacConfig::default(),
            phy: PhyConfig::default(),
            energy: EnergyConfig::default(),
            source: SourceConfig::default(),
            controller: ControllerConfig::default(),
            harvesting_power_w: 0.0,
        }
    }
}
