//! Observer bus for protocol and energy milestones.
//!
//! Components receive a `&mut dyn Tracer` by reference and publish typed
//! events instead of writing to a global trace sink, so tests and external
//! analysis can intercept round lifecycles without log parsing.

use crate::mac::header::{FrameType, MacAddress};
use crate::sim::time::SimTime;

/// A milestone published on the observer bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// A device opened a data-collection round.
    RoundStarted {
        /// MAC address of the device.
        addr: MacAddress,
    },
    /// A round ran to completion.
    RoundStopped {
        /// MAC address of the device.
        addr: MacAddress,
        /// Frames the round took.
        frames: u32,
    },
    /// A round was torn down by a protocol anomaly or an overlapping round.
    RoundAborted {
        /// MAC address of the device.
        addr: MacAddress,
        /// Frames completed before the abort.
        frames: u32,
    },
    /// A device started a new frame inside a round.
    FrameStarted {
        /// MAC address of the device.
        addr: MacAddress,
    },
    /// The MAC handed a frame to the radio.
    MacTx {
        /// MAC address of the sender.
        addr: MacAddress,
        /// Frame type of the outgoing packet.
        frame_type: FrameType,
        /// Whether the retry flag was set.
        retry: bool,
    },
    /// A received frame was dropped (failed CRC or malformed payload).
    MacRxDrop {
        /// MAC address of the receiver.
        addr: MacAddress,
    },
    /// A DATA frame passed CRC and was forwarded to the upper layer.
    DataDelivered {
        /// MAC address of the receiver.
        addr: MacAddress,
        /// Source address from the MAC header.
        src: MacAddress,
        /// Destination address from the MAC header.
        dst: MacAddress,
        /// Upper-layer protocol number.
        protocol: u16,
        /// Payload length in bytes.
        bytes: usize,
    },
    /// An outbound payload exceeded the MTU and was rejected at enqueue.
    PacketRejected {
        /// MAC address of the device.
        addr: MacAddress,
        /// Rejected payload length.
        bytes: usize,
    },
    /// The energy source crossed its low threshold (link down).
    SourceDrained {
        /// MAC address of the device.
        addr: MacAddress,
    },
    /// The energy source crossed back over its high threshold (link up).
    SourceRecharged {
        /// MAC address of the device.
        addr: MacAddress,
    },
}

/// Receiver side of the observer bus.
pub trait Tracer {
    /// Called once per published event, in event order.
    fn trace(&mut self, now: SimTime, event: &TraceEvent);
}

/// Tracer that discards everything.
#[derive(Debug, Default)]
pub struct NullTracer;

impl Tracer for NullTracer {
    fn trace(&mut self, _now: SimTime, _event: &TraceEvent) {}
}
