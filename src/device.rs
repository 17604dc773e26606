//! One network node: MAC, radio, energy model, reservoir and controller.
//!
//! The device is the deterministic switchboard between its components.
//! Radio notifications and MAC commands go through small FIFO queues
//! drained here, so a callback never re-enters the component it came from;
//! cross-device traffic leaves through the outbox toward the channel.
//!
//! Energy exhaustion is handled structurally: when the reservoir drains the
//! device forces its radio down and suppresses wake-ups until the reservoir
//! recharges. The MAC is told to sleep or wake, never why.

use rand::rngs::SmallRng;

use crate::app::SensorConfig;
use crate::channel::Transmission;
use crate::config::DeviceConfig;
use crate::controller::{DutyCycle, EnergyReport};
use crate::energy::{BatteryEvent, BoundedEnergySource, RadioEnergyModel};
use crate::mac::header::{LlcSnapHeader, MacAddress};
use crate::mac::{DcrStatus, FsalohaMac, MacCommand, MacContext};
use crate::radio::{IdealRadio, RadioEvent, RadioState};
use crate::sim::event::{Event, MacTimer, RadioTimer};
use crate::sim::scheduler::{EventHandle, EventQueue};
use crate::sim::time::{DataRate, SimTime};
use crate::sim::DeviceId;
use crate::trace::{TraceEvent, Tracer};

/// Role of a device, fixed for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceRole {
    /// Opens rounds and collects data.
    Coordinator,
    /// Battery-powered node contending for slots.
    EndDevice,
}

/// Callback invoked on successful DATA delivery:
/// `(payload, llc, src, dst)`.
pub type ForwardUpCallback = Box<dyn FnMut(&[u8], LlcSnapHeader, MacAddress, MacAddress)>;

/// Builds the per-invocation [`MacContext`] from disjoint device fields.
macro_rules! mac_ctx {
    ($dev:expr, $now:expr, $q:expr, $tracer:expr) => {
        MacContext {
            now: $now,
            device: $dev.id,
            queue: &mut *$q,
            tracer: &mut *$tracer,
            controller: &mut $dev.controller,
            energy: EnergyReport {
                fraction: $dev.source.fraction(),
                total_consumption: $dev.energy.total_consumption(),
                harvesting_power: $dev.harvesting_power,
            },
            radio_state: $dev.radio.state(),
            switching_time: $dev.radio.switching_time(),
            rate: $dev.radio.rate(),
        }
    };
}

/// A capillary network node.
pub struct Device {
    id: DeviceId,
    addr: MacAddress,
    role: DeviceRole,
    mac: FsalohaMac,
    radio: IdealRadio,
    energy: RadioEnergyModel,
    source: BoundedEnergySource,
    controller: DutyCycle,
    harvesting_power: f64,
    link_up: bool,
    app: Option<SensorConfig>,
    forward_up: Option<ForwardUpCallback>,
    energy_update: Option<EventHandle>,
    outbox: Vec<Transmission>,
}

impl Device {
    /// Assemble a device from its configuration.
    pub fn new(id: DeviceId, addr: MacAddress, config: &DeviceConfig, rng: SmallRng) -> Self {
        let rate = DataRate::from_bps(config.phy.rate_bps);
        Self {
            id,
            addr,
            role: config.role,
            mac: FsalohaMac::new(config.role, addr, &config.mac, rng),
            radio: IdealRadio::new(id, rate, config.phy.switching_time),
            energy: RadioEnergyModel::new(config.energy.clone(), config.source.supply_voltage_v),
            source: BoundedEnergySource::new(&config.source),
            controller: DutyCycle::from_config(&config.controller),
            harvesting_power: config.harvesting_power_w,
            link_up: true,
            app: None,
            forward_up: None,
            energy_update: None,
            outbox: Vec::new(),
        }
    }

    /// The device's MAC address.
    pub fn address(&self) -> MacAddress {
        self.addr
    }

    /// The device's role.
    pub fn role(&self) -> DeviceRole {
        self.role
    }

    /// Round status as seen by this device.
    pub fn dcr_status(&self) -> DcrStatus {
        self.mac.status()
    }

    /// Frames of the current or last round.
    pub fn frames_in_round(&self) -> u32 {
        self.mac.frames_in_round()
    }

    /// Packets waiting in the outbound data queue.
    pub fn data_queue_len(&self) -> usize {
        self.mac.data_queue_len()
    }

    /// Current radio state.
    pub fn radio_state(&self) -> RadioState {
        self.radio.state()
    }

    /// Remaining reservoir energy in joules.
    pub fn remaining_energy(&self) -> f64 {
        self.source.remaining_energy()
    }

    /// Remaining reservoir energy as a fraction of capacity.
    pub fn energy_fraction(&self) -> f64 {
        self.source.fraction()
    }

    /// Total radio energy consumed so far, in joules.
    pub fn total_consumption(&self) -> f64 {
        self.energy.total_consumption()
    }

    /// Fraction of accounted time the radio spent transmitting or
    /// receiving.
    pub fn duty_cycle(&self) -> f64 {
        self.energy.duty_cycle()
    }

    /// Whether the device considers its link up (energy above the
    /// hysteresis band).
    pub fn is_link_up(&self) -> bool {
        self.link_up
    }

    /// Install the upper-layer delivery callback.
    pub fn set_forward_up(&mut self, callback: ForwardUpCallback) {
        self.forward_up = Some(callback);
    }

    /// Attach periodic sensor traffic. The first reading fires one
    /// interval after attachment.
    pub fn attach_sensor(&mut self, config: SensorConfig) {
        self.app = Some(config);
    }

    /// Offer a payload to the MAC queue.
    pub fn enqueue_data(
        &mut self,
        dst: MacAddress,
        protocol: u16,
        payload: &[u8],
        now: SimTime,
        tracer: &mut dyn Tracer,
    ) -> bool {
        self.mac.data_enqueue(dst, protocol, payload, now, tracer)
    }

    /// Transmissions this device put on the air during the last event.
    pub(crate) fn take_outbox(&mut self) -> Vec<Transmission> {
        std::mem::take(&mut self.outbox)
    }

    /// A MAC timer fired for this device.
    pub(crate) fn handle_mac_timer(
        &mut self,
        timer: MacTimer,
        now: SimTime,
        queue: &mut EventQueue,
        tracer: &mut dyn Tracer,
    ) {
        // Wake-driven timers are suppressed while the link is down; the
        // recharge edge re-issues the wake-up.
        let suppressed = !self.link_up
            && matches!(timer, MacTimer::WakeUp | MacTimer::RadioWake);
        if !suppressed {
            let mut ctx = mac_ctx!(self, now, queue, tracer);
            self.mac.on_timer(timer, &mut ctx);
        }
        self.drain(now, queue, tracer);
    }

    /// A radio timer fired for this device.
    pub(crate) fn handle_radio_timer(
        &mut self,
        timer: RadioTimer,
        now: SimTime,
        queue: &mut EventQueue,
        tracer: &mut dyn Tracer,
    ) {
        match timer {
            RadioTimer::EndTx => self.radio.end_tx(now, queue),
            RadioTimer::EndRx => self.radio.end_rx(now, queue),
            RadioTimer::AbortRx => self.radio.abort_rx(now, queue),
            RadioTimer::SwitchDone => self.radio.switch_done(),
        }
        self.drain(now, queue, tracer);
    }

    /// A transmission reached this device's antenna.
    pub(crate) fn handle_arrival(
        &mut self,
        transmission: Transmission,
        corrupted: bool,
        now: SimTime,
        queue: &mut EventQueue,
        tracer: &mut dyn Tracer,
    ) {
        self.radio.start_receive(
            transmission.packet,
            transmission.duration,
            corrupted,
            now,
            queue,
        );
        self.drain(now, queue, tracer);
    }

    /// Periodic reservoir update.
    pub(crate) fn handle_energy_update(
        &mut self,
        now: SimTime,
        queue: &mut EventQueue,
        tracer: &mut dyn Tracer,
    ) {
        self.refresh_energy(now, queue, tracer);
        self.drain(now, queue, tracer);
    }

    /// Periodic sensor tick: generate one reading and re-arm.
    pub(crate) fn handle_app_tick(
        &mut self,
        now: SimTime,
        queue: &mut EventQueue,
        tracer: &mut dyn Tracer,
    ) {
        if let Some(app) = self.app.clone() {
            let payload = vec![0u8; app.payload];
            self.mac
                .data_enqueue(app.destination, app.protocol, &payload, now, tracer);
            queue.schedule(now, app.interval, Event::AppTick(self.id));
        }
        self.drain(now, queue, tracer);
    }

    /// Update the reservoir against the current radio draw and re-arm the
    /// periodic update; any ad-hoc update resets the period.
    fn refresh_energy(&mut self, now: SimTime, queue: &mut EventQueue, tracer: &mut dyn Tracer) {
        if let Some(handle) = self.energy_update.take() {
            handle.cancel();
        }
        let battery = self.source.update(now, self.energy.current_a());
        self.energy_update = Some(queue.schedule(
            now,
            self.source.update_interval(),
            Event::EnergyUpdate(self.id),
        ));
        if let Some(event) = battery {
            self.on_battery_event(event, now, queue, tracer);
        }
    }

    fn on_battery_event(
        &mut self,
        event: BatteryEvent,
        now: SimTime,
        queue: &mut EventQueue,
        tracer: &mut dyn Tracer,
    ) {
        match event {
            BatteryEvent::Drained => {
                tracing::info!(addr = %self.addr, "energy depleted, link down");
                tracer.trace(now, &TraceEvent::SourceDrained { addr: self.addr });
                self.link_up = false;
                self.radio.force_sleep(now, queue);
            }
            BatteryEvent::Recharged => {
                tracing::info!(addr = %self.addr, "energy recharged, link up");
                tracer.trace(now, &TraceEvent::SourceRecharged { addr: self.addr });
                self.link_up = true;
                let mut ctx = mac_ctx!(self, now, queue, tracer);
                self.mac.wake_up(&mut ctx);
            }
        }
    }

    /// Route radio notifications and MAC commands until both queues are
    /// empty. FIFO order here is what keeps intra-device interactions
    /// deterministic and re-entrancy-free.
    fn drain(&mut self, now: SimTime, queue: &mut EventQueue, tracer: &mut dyn Tracer) {
        loop {
            if let Some(event) = self.radio.pop_event() {
                match event {
                    RadioEvent::StateChanged { state } => {
                        // account the elapsed window at the previous
                        // state's draw before the model switches over
                        if let Some(handle) = self.energy_update.take() {
                            handle.cancel();
                        }
                        let battery = self.source.update(now, self.energy.current_a());
                        self.energy_update = Some(queue.schedule(
                            now,
                            self.source.update_interval(),
                            Event::EnergyUpdate(self.id),
                        ));
                        self.energy.change_state(state, now);
                        if let Some(event) = battery {
                            self.on_battery_event(event, now, queue, tracer);
                        }
                    }
                    RadioEvent::TxStarted { packet, duration } => {
                        self.outbox.push(Transmission { packet, duration });
                    }
                    RadioEvent::TxEnded { packet } => {
                        let mut ctx = mac_ctx!(self, now, queue, tracer);
                        self.mac.notify_transmission_end(&packet, &mut ctx);
                    }
                    RadioEvent::RxStarted => self.mac.notify_reception_start(),
                    RadioEvent::RxEndedOk { packet } => {
                        let mut ctx = mac_ctx!(self, now, queue, tracer);
                        self.mac.notify_reception_end_ok(packet, &mut ctx);
                    }
                    RadioEvent::RxEndedError => {
                        let mut ctx = mac_ctx!(self, now, queue, tracer);
                        self.mac.notify_reception_end_error(&mut ctx);
                    }
                }
                continue;
            }
            if let Some(command) = self.mac.pop_command() {
                match command {
                    MacCommand::StartTx(packet) => {
                        if self.radio.start_transmit(packet, now, queue) {
                            tracing::warn!(addr = %self.addr, "radio refused a staged transmission");
                        }
                    }
                    MacCommand::SleepRadio => self.radio.force_sleep(now, queue),
                    MacCommand::WakeRadio => {
                        if self.link_up {
                            self.radio.wake_up(now, queue);
                        }
                    }
                    MacCommand::ForwardUp(packet) => {
                        tracer.trace(
                            now,
                            &TraceEvent::DataDelivered {
                                addr: self.addr,
                                src: packet.header.src,
                                dst: packet.header.dst,
                                protocol: packet.llc.protocol,
                                bytes: packet.payload.len(),
                            },
                        );
                        if let Some(callback) = self.forward_up.as_mut() {
                            callback(
                                &packet.payload,
                                packet.llc,
                                packet.header.src,
                                packet.header.dst,
                            );
                        }
                    }
                }
                continue;
            }
            break;
        }
    }
}
