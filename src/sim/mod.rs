//! Discrete-event simulation kernel and network orchestration.
//!
//! Single-threaded cooperative scheduling: every component suspends itself
//! by scheduling a future event on the shared timeline, exactly one event
//! callback runs at a time, and same-time events run in FIFO order of
//! scheduling.

pub mod event;
pub mod scheduler;
pub mod time;

pub use scheduler::{EventHandle, EventQueue};
pub use time::{DataRate, SimTime};

use std::time::Duration;

use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::app::SensorConfig;
use crate::channel::{Channel, ErrorHook};
use crate::config::DeviceConfig;
use crate::device::{Device, DeviceRole, ForwardUpCallback};
use crate::mac::header::MacAddress;
use crate::sim::event::{Event, MacTimer};
use crate::trace::{NullTracer, Tracer};

/// Index of a device within the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub usize);

/// The capillary network simulator.
///
/// Owns the devices, the broadcast channel and the event queue, and drives
/// everything from a single loop. Device random streams are derived from
/// one central seed, so a run is reproducible.
pub struct Simulator {
    now: SimTime,
    queue: EventQueue,
    channel: Channel,
    devices: Vec<Device>,
    tracer: Box<dyn Tracer>,
    seed: u64,
    next_addr: u64,
}

impl Simulator {
    /// Create a simulator whose per-device random streams derive from
    /// `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            now: SimTime::ZERO,
            queue: EventQueue::new(),
            channel: Channel::new(),
            devices: Vec::new(),
            tracer: Box::new(NullTracer),
            seed,
            next_addr: 1,
        }
    }

    /// Install an observer for round lifecycle and delivery events.
    pub fn set_tracer(&mut self, tracer: Box<dyn Tracer>) {
        self.tracer = tracer;
    }

    /// Install a per-delivery channel corruption hook.
    pub fn set_error_hook(&mut self, hook: ErrorHook) {
        self.channel.set_error_hook(hook);
    }

    /// Set the propagation delay of the shared channel.
    pub fn set_channel_delay(&mut self, delay: Duration) {
        self.channel.set_delay(delay);
    }

    /// Current simulation time.
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Add a device; addresses are allocated sequentially. A coordinator
    /// wakes at the current time and opens its first round after the radio
    /// settle delay.
    pub fn add_device(&mut self, config: &DeviceConfig) -> DeviceId {
        let id = DeviceId(self.devices.len());
        let addr = MacAddress::from_u64(self.next_addr);
        self.next_addr += 1;
        let rng = SmallRng::seed_from_u64(self.seed.wrapping_add(id.0 as u64));
        let device = Device::new(id, addr, config, rng);

        // start the periodic reservoir updates, then the protocol
        self.queue.schedule_at(self.now, Event::EnergyUpdate(id));
        if config.role == DeviceRole::Coordinator {
            self.queue
                .schedule_at(self.now, Event::Mac(id, MacTimer::WakeUp));
        }
        self.devices.push(device);
        id
    }

    /// Borrow a device for inspection.
    pub fn device(&self, id: DeviceId) -> &Device {
        &self.devices[id.0]
    }

    /// Install the upper-layer delivery callback on a device.
    pub fn set_forward_up(&mut self, id: DeviceId, callback: ForwardUpCallback) {
        self.devices[id.0].set_forward_up(callback);
    }

    /// Attach periodic sensor traffic to a device; the first reading fires
    /// one interval from now.
    pub fn attach_sensor(&mut self, id: DeviceId, config: SensorConfig) {
        let interval = config.interval;
        self.devices[id.0].attach_sensor(config);
        self.queue.schedule(self.now, interval, Event::AppTick(id));
    }

    /// Offer a payload to a device's outbound queue right now.
    pub fn enqueue_data(
        &mut self,
        id: DeviceId,
        dst: MacAddress,
        protocol: u16,
        payload: &[u8],
    ) -> bool {
        let now = self.now;
        self.devices[id.0].enqueue_data(dst, protocol, payload, now, &mut *self.tracer)
    }

    /// Run until the queue is exhausted or the timeline reaches `limit`.
    pub fn run_until(&mut self, limit: SimTime) {
        while let Some(next) = self.queue.next_time() {
            if next > limit {
                break;
            }
            let Some((time, event)) = self.queue.pop() else {
                break;
            };
            self.now = time;
            self.dispatch(event);
        }
        self.now = limit;
    }

    /// Run for a span of simulated time.
    pub fn run_for(&mut self, span: Duration) {
        let limit = self.now + span;
        self.run_until(limit);
    }

    fn dispatch(&mut self, event: Event) {
        let id = event.device();
        match event {
            Event::Mac(_, timer) => {
                self.devices[id.0].handle_mac_timer(
                    timer,
                    self.now,
                    &mut self.queue,
                    &mut *self.tracer,
                );
            }
            Event::Radio(_, timer) => {
                self.devices[id.0].handle_radio_timer(
                    timer,
                    self.now,
                    &mut self.queue,
                    &mut *self.tracer,
                );
            }
            Event::Arrival(_, transmission) => {
                let corrupted = self
                    .channel
                    .corrupts(id, &transmission.packet, self.now);
                self.devices[id.0].handle_arrival(
                    transmission,
                    corrupted,
                    self.now,
                    &mut self.queue,
                    &mut *self.tracer,
                );
            }
            Event::EnergyUpdate(_) => {
                self.devices[id.0].handle_energy_update(
                    self.now,
                    &mut self.queue,
                    &mut *self.tracer,
                );
            }
            Event::AppTick(_) => {
                self.devices[id.0].handle_app_tick(
                    self.now,
                    &mut self.queue,
                    &mut *self.tracer,
                );
            }
        }
        // hand whatever went on the air to the channel
        let outgoing = self.devices[id.0].take_outbox();
        let n_devices = self.devices.len();
        for transmission in outgoing {
            self.channel
                .broadcast(id, transmission, self.now, n_devices, &mut self.queue);
        }
    }
}
