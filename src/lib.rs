//! Frame-Slotted ALOHA capillary network model in Rust
//!
//! This crate models a low-power wireless capillary access network: one
//! coordinator and a set of battery-powered end devices sharing a single
//! radio channel under a slotted random-access MAC, coupled to an
//! energy-aware duty-cycle controller. Everything runs on a deterministic
//! discrete-event timeline.
//!
//! # Features
//! - FSALOHA MAC with data-collection rounds, per-slot feedback and
//!   frame-by-frame contention retry
//! - Six-state radio model with a two-phase sleep transition
//! - Per-state current accounting into a bounded energy reservoir with
//!   hysteresis thresholds (link down on depletion, link up on recharge)
//! - Four interchangeable duty-cycle policies
//! - Typed observer bus for round lifecycle and delivery events
//! - No unsafe code
//!
//! # Example
//! ```no_run
//! use std::time::Duration;
//!
//! use capillary::app::SensorConfig;
//! use capillary::config::DeviceConfig;
//! use capillary::sim::Simulator;
//!
//! let mut sim = Simulator::new(42);
//! let _coordinator = sim.add_device(&DeviceConfig::coordinator());
//!
//! let mut node = DeviceConfig::end_device();
//! node.mac.slots = 4;
//! let sensor = sim.add_device(&node);
//! sim.attach_sensor(sensor, SensorConfig::reporting(Duration::from_secs(5), 24));
//!
//! sim.run_for(Duration::from_secs(60));
//! println!("residual energy: {:.3}", sim.device(sensor).energy_fraction());
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Sensor traffic generation
pub mod app;

/// Shared broadcast medium
pub mod channel;

/// Device and component configuration
pub mod config;

/// Duty-cycle controller policies
pub mod controller;

/// Per-node component wiring
pub mod device;

/// Energy accounting and the bounded reservoir
pub mod energy;

/// FSALOHA access control and wire formats
pub mod mac;

/// Radio state model
pub mod radio;

/// Discrete-event kernel and simulator
pub mod sim;

/// Observer bus for protocol and energy milestones
pub mod trace;
