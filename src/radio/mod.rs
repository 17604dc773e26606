//! Radio state model.
//!
//! The radio is a six-state machine driven by the MAC and the channel.
//! Transitions into or out of [`RadioState::Sleep`] pass through an
//! explicit [`RadioState::Switching`] phase that models wake-up/settle
//! latency; every state change is reported to the energy subsystem.

pub mod ideal;

pub use ideal::IdealRadio;

use core::fmt;
use core::time::Duration;

use crate::mac::packet::Packet;

/// The state of the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioState {
    /// Powered and listening, nothing in flight.
    Idle,
    /// Clear-channel assessment found the medium busy.
    CcaBusy,
    /// Pushing a frame onto the air.
    Tx,
    /// Synchronized on an incoming frame.
    Rx,
    /// Low-power sleep.
    Sleep,
    /// In the settle window between sleep and an active state.
    Switching,
}

impl RadioState {
    /// Whether a transmission may be started from this state. Starting
    /// while receiving aborts the reception first.
    pub fn can_transmit(self) -> bool {
        matches!(self, RadioState::Idle | RadioState::Rx)
    }

    /// Stable index for per-state tables.
    pub(crate) fn index(self) -> usize {
        match self {
            RadioState::Idle => 0,
            RadioState::CcaBusy => 1,
            RadioState::Tx => 2,
            RadioState::Rx => 3,
            RadioState::Sleep => 4,
            RadioState::Switching => 5,
        }
    }
}

impl fmt::Display for RadioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RadioState::Idle => "IDLE",
            RadioState::CcaBusy => "CCA_BUSY",
            RadioState::Tx => "TX",
            RadioState::Rx => "RX",
            RadioState::Sleep => "SLEEP",
            RadioState::Switching => "SWITCHING",
        };
        f.write_str(name)
    }
}

/// Notifications the radio emits toward the rest of its device.
///
/// The device drains these in FIFO order: state changes feed the energy
/// model, transmission and reception edges feed the MAC, and
/// [`RadioEvent::TxStarted`] feeds the shared channel.
#[derive(Debug)]
pub enum RadioEvent {
    /// The radio entered `state`.
    StateChanged {
        /// The state just entered.
        state: RadioState,
    },
    /// A transmission went on the air.
    TxStarted {
        /// The outgoing frame.
        packet: Packet,
        /// Airtime of the frame.
        duration: Duration,
    },
    /// The in-flight transmission completed.
    TxEnded {
        /// The frame whose transmission finished.
        packet: Packet,
    },
    /// The radio synchronized on an incoming frame.
    RxStarted,
    /// A reception completed successfully.
    RxEndedOk {
        /// The received frame.
        packet: Packet,
    },
    /// A reception terminated without a usable frame.
    RxEndedError,
}
