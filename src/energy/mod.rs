//! Energy accounting and the bounded energy reservoir.
//!
//! The radio reports every state change to [`RadioEnergyModel`], which
//! converts time-in-state into consumed charge and keeps per-state
//! occupancy totals. The charge leaves a [`BoundedEnergySource`], a clamped
//! linear reservoir whose hysteresis thresholds drive link-down/link-up
//! behavior.

pub mod model;
pub mod source;

pub use model::RadioEnergyModel;
pub use source::{BatteryEvent, BoundedEnergySource};
