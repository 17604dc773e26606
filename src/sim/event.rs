//! Event vocabulary of the simulation.
//!
//! Events are plain data dispatched by the [`Simulator`](super::Simulator);
//! each one names the device it belongs to plus a component-level timer or
//! payload. Components never call each other across devices directly — all
//! cross-device interaction goes through [`Event::Arrival`].

use crate::channel::Transmission;
use crate::sim::DeviceId;

/// MAC-layer timers. Fired events are guarded by the MAC's round status, so
/// a timer belonging to a dead round falls through harmlessly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacTimer {
    /// Wake the device and, on a coordinator, begin a new round after the
    /// radio settles.
    WakeUp,
    /// Begin a data-collection round.
    StartActivePeriod,
    /// Begin a frame (reset slot bookkeeping, arm the first slot).
    StartFrame,
    /// Begin the current slot.
    StartSlot,
    /// Close the current slot and advance.
    StopSlot,
    /// Coordinator: broadcast the feedback packet for the finished frame.
    SendFeedback,
    /// The controller-chosen off time has elapsed.
    NonActiveStopped,
    /// Re-wake the radio ahead of an owned slot or feedback broadcast.
    RadioWake,
}

/// Radio-internal timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioTimer {
    /// The in-flight transmission has been pushed out completely.
    EndTx,
    /// The in-flight reception completes.
    EndRx,
    /// The in-flight reception ends in error after an overriding arrival.
    AbortRx,
    /// The two-phase sleep transition settles on its pending target state.
    SwitchDone,
}

/// A simulation event, tagged with the device it targets.
#[derive(Debug, Clone)]
pub enum Event {
    /// A MAC timer fired.
    Mac(DeviceId, MacTimer),
    /// A radio timer fired.
    Radio(DeviceId, RadioTimer),
    /// A transmission from another device reaches this device's antenna.
    Arrival(DeviceId, Transmission),
    /// Periodic energy-source update.
    EnergyUpdate(DeviceId),
    /// Periodic sensor-application tick.
    AppTick(DeviceId),
}

impl Event {
    /// The device this event targets.
    pub fn device(&self) -> DeviceId {
        match self {
            Event::Mac(id, _)
            | Event::Radio(id, _)
            | Event::Arrival(id, _)
            | Event::EnergyUpdate(id)
            | Event::AppTick(id) => *id,
        }
    }
}
