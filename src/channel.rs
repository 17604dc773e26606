//! Shared broadcast medium connecting the device radios.
//!
//! The channel copies every transmission to every other device after a
//! configurable propagation delay. Whether an individual copy is corrupted
//! is decided by an error hook at delivery time, which is how tests inject
//! channel errors; the default channel is perfect. Collisions are not
//! decided here — overlapping arrivals are resolved by the receiving radio
//! itself.

use std::time::Duration;

use crate::mac::packet::Packet;
use crate::sim::event::Event;
use crate::sim::scheduler::EventQueue;
use crate::sim::time::SimTime;
use crate::sim::DeviceId;

/// One frame in flight on the medium.
#[derive(Debug, Clone)]
pub struct Transmission {
    /// The frame on the air.
    pub packet: Packet,
    /// Airtime of the frame.
    pub duration: Duration,
}

/// Per-delivery corruption decision; returns `true` to corrupt the copy
/// arriving at the given device.
pub type ErrorHook = Box<dyn FnMut(DeviceId, &Packet, SimTime) -> bool>;

/// The broadcast channel.
pub struct Channel {
    delay: Duration,
    error_hook: Option<ErrorHook>,
}

impl Channel {
    /// Create a perfect channel with zero propagation delay.
    pub fn new() -> Self {
        Self {
            delay: Duration::ZERO,
            error_hook: None,
        }
    }

    /// Set the propagation delay applied to every delivery.
    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    /// Install a corruption decision hook.
    pub fn set_error_hook(&mut self, hook: ErrorHook) {
        self.error_hook = Some(hook);
    }

    /// Decide whether the copy arriving at `device` is corrupted.
    pub fn corrupts(&mut self, device: DeviceId, packet: &Packet, now: SimTime) -> bool {
        match self.error_hook.as_mut() {
            Some(hook) => hook(device, packet, now),
            None => false,
        }
    }

    /// Deliver `transmission` to every device except the sender.
    pub fn broadcast(
        &mut self,
        sender: DeviceId,
        transmission: Transmission,
        now: SimTime,
        n_devices: usize,
        queue: &mut EventQueue,
    ) {
        for index in 0..n_devices {
            if index == sender.0 {
                continue;
            }
            queue.schedule(
                now,
                self.delay,
                Event::Arrival(DeviceId(index), transmission.clone()),
            );
        }
    }
}

impl Default for Channel {
    fn default() -> Self {
        Self::new()
    }
}
