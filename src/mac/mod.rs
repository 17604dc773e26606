//! Frame-Slotted ALOHA access control.
//!
//! Airtime is organized into coordinator-initiated data-collection rounds.
//! A round is a sequence of frames; a frame is `n_slots` fixed slots
//! followed by a feedback broadcast reporting the per-slot outcome. End
//! devices contend by picking a uniformly random slot per frame and re-pick
//! (with the retry flag set) whenever the feedback reports their slot in
//! error, so collisions spread out over successive frames until the round
//! converges.
//!
//! The same state machine serves both roles; the device role selects which
//! branches are active, the way the original single-MAC design works.

pub mod feedback;
pub mod header;
pub mod packet;
pub mod trailer;

use std::collections::VecDeque;
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::Rng;

use crate::config::MacConfig;
use crate::controller::{Controller, DutyCycle, EnergyReport};
use crate::device::DeviceRole;
use crate::mac::feedback::{
    deserialize_feedback, feedback_len, serialize_feedback, SlotState,
};
use crate::mac::header::{
    FrameType, LlcSnapHeader, MacAddress, MacHeader, HEADER_SIZE, LLC_SIZE,
};
use crate::mac::packet::{Packet, MAX_PAYLOAD};
use crate::mac::trailer::TRAILER_SIZE;
use crate::radio::RadioState;
use crate::sim::event::{Event, MacTimer};
use crate::sim::scheduler::EventQueue;
use crate::sim::time::{DataRate, SimTime};
use crate::sim::DeviceId;
use crate::trace::{TraceEvent, Tracer};

/// Capacity of the outbound data queue (drop-tail beyond this).
const DATA_QUEUE_CAP: usize = 64;

/// Capacity of the per-round transmission queue.
const TX_QUEUE_CAP: usize = 64;

/// Status of the data-collection round, as seen by one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DcrStatus {
    /// Inside a round.
    ActiveStart,
    /// The last round ran to completion.
    ActiveStop,
    /// The last round was torn down by an anomaly.
    ActiveAbort,
    /// Sleeping (or polling) between rounds.
    NonActiveStart,
    /// The off period ended; waking up.
    NonActiveStop,
}

/// Everything a MAC callback needs from the rest of its device.
///
/// Rebuilt per invocation so the radio snapshot is always current; the MAC
/// itself never holds references into sibling components.
pub struct MacContext<'a> {
    /// Current simulation time.
    pub now: SimTime,
    /// The device this MAC belongs to.
    pub device: DeviceId,
    /// The shared event queue.
    pub queue: &'a mut EventQueue,
    /// The observer bus.
    pub tracer: &'a mut dyn Tracer,
    /// The device's duty-cycle controller.
    pub controller: &'a mut DutyCycle,
    /// Snapshot of the device's energy situation.
    pub energy: EnergyReport,
    /// Radio state at the time of the callback.
    pub radio_state: RadioState,
    /// Radio sleep-transition settle time.
    pub switching_time: Duration,
    /// PHY bit rate.
    pub rate: DataRate,
}

impl<'a> MacContext<'a> {
    fn schedule(&mut self, delay: Duration, timer: MacTimer) {
        self.queue
            .schedule(self.now, delay, Event::Mac(self.device, timer));
    }
}

/// Requests the MAC issues toward its device.
#[derive(Debug)]
pub enum MacCommand {
    /// Hand a sealed frame to the radio.
    StartTx(Packet),
    /// Put the radio to sleep.
    SleepRadio,
    /// Wake the radio.
    WakeRadio,
    /// Deliver a received DATA frame to the upper layer.
    ForwardUp(Packet),
}

/// The FSALOHA MAC state machine of one device.
pub struct FsalohaMac {
    role: DeviceRole,
    addr: MacAddress,
    mtu: u16,
    n_slots: u16,
    max_delay: Duration,
    packets_per_round: u32,

    queue: heapless::Deque<Packet, DATA_QUEUE_CAP>,
    tx_queue: heapless::Deque<Packet, TX_QUEUE_CAP>,
    current: Option<Packet>,

    rng: SmallRng,
    rnd_slot: u16,
    curr_slot: u16,
    sig_seq: u8,
    data_seq: u8,

    status: DcrStatus,
    slot_status: Vec<SlotState>,
    frames_in_round: u32,

    commands: VecDeque<MacCommand>,
}

impl FsalohaMac {
    /// Create a MAC for the given role and address.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is structurally impossible: zero slots,
    /// an MTU beyond the frame buffer, or a slot count whose feedback
    /// payload would not fit in one frame.
    pub fn new(role: DeviceRole, addr: MacAddress, config: &MacConfig, rng: SmallRng) -> Self {
        assert!(config.slots >= 1, "a frame needs at least one slot");
        assert!(
            config.mtu as usize <= MAX_PAYLOAD,
            "MTU exceeds the frame buffer"
        );
        assert!(
            feedback_len(config.slots as usize) <= MAX_PAYLOAD,
            "feedback payload for this slot count does not fit in a frame"
        );
        assert!(
            config.packets_per_round >= 1,
            "a round must allow at least one packet"
        );
        Self {
            role,
            addr,
            mtu: config.mtu,
            n_slots: config.slots,
            max_delay: config.max_delay,
            packets_per_round: config.packets_per_round,
            queue: heapless::Deque::new(),
            tx_queue: heapless::Deque::new(),
            current: None,
            rng,
            rnd_slot: 0,
            curr_slot: 0,
            sig_seq: 0,
            data_seq: 0,
            status: DcrStatus::ActiveStop,
            slot_status: vec![SlotState::Empty; config.slots as usize],
            commands: VecDeque::new(),
            frames_in_round: 0,
        }
    }

    /// The device's MAC address.
    pub fn address(&self) -> MacAddress {
        self.addr
    }

    /// The device role this MAC serves.
    pub fn role(&self) -> DeviceRole {
        self.role
    }

    /// Round status as of the last transition.
    pub fn status(&self) -> DcrStatus {
        self.status
    }

    /// Frames completed (coordinator) or observed (end device) in the
    /// current or last round.
    pub fn frames_in_round(&self) -> u32 {
        self.frames_in_round
    }

    /// Packets waiting in the outbound data queue.
    pub fn data_queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Next pending request toward the device, in issue order.
    pub fn pop_command(&mut self) -> Option<MacCommand> {
        self.commands.pop_front()
    }

    /// Duration of one slot: twice the guard delay plus the airtime of a
    /// maximum-size frame.
    pub fn slot_duration(&self, rate: DataRate) -> Duration {
        let frame_bytes = self.mtu as usize + HEADER_SIZE + LLC_SIZE + TRAILER_SIZE;
        self.max_delay * 2 + rate.transfer_time(frame_bytes)
    }

    /// Dispatch a fired MAC timer.
    pub fn on_timer(&mut self, timer: MacTimer, ctx: &mut MacContext) {
        match timer {
            MacTimer::WakeUp => self.wake_up(ctx),
            MacTimer::StartActivePeriod => self.start_active_period(ctx),
            MacTimer::StartFrame => self.start_frame(ctx),
            MacTimer::StartSlot => self.start_slot(ctx),
            MacTimer::StopSlot => self.stop_slot(ctx),
            MacTimer::SendFeedback => {
                self.send_feedback(ctx);
            }
            MacTimer::NonActiveStopped => self.non_active_stopped(ctx),
            MacTimer::RadioWake => self.commands.push_back(MacCommand::WakeRadio),
        }
    }

    /// Wake the device. A coordinator begins a round once the radio has
    /// settled; an end device goes back to listening for the next RFD.
    pub fn wake_up(&mut self, ctx: &mut MacContext) {
        if ctx.radio_state == RadioState::Sleep {
            self.commands.push_back(MacCommand::WakeRadio);
        }
        if self.role == DeviceRole::Coordinator {
            ctx.schedule(ctx.switching_time, MacTimer::StartActivePeriod);
        }
    }

    /// Queue an outbound payload on an end device. Oversized payloads are
    /// rejected (there is no fragmentation); a full queue drops the tail.
    pub fn data_enqueue(
        &mut self,
        dst: MacAddress,
        protocol: u16,
        payload: &[u8],
        now: SimTime,
        tracer: &mut dyn Tracer,
    ) -> bool {
        match self.role {
            DeviceRole::Coordinator => {
                tracing::error!("DATA transmission is not supported by the coordinator role");
                false
            }
            DeviceRole::EndDevice => {
                if payload.len() > self.mtu as usize {
                    tracing::error!(
                        bytes = payload.len(),
                        mtu = self.mtu,
                        "payload exceeds MTU and fragmentation is not implemented; dropped"
                    );
                    tracer.trace(
                        now,
                        &TraceEvent::PacketRejected {
                            addr: self.addr,
                            bytes: payload.len(),
                        },
                    );
                    return false;
                }
                let mut header = MacHeader::new(FrameType::Data);
                header.seq = self.data_seq;
                self.data_seq = self.data_seq.wrapping_add(1);
                header.src = self.addr;
                header.dst = dst;
                let packet = Packet::new(header, LlcSnapHeader::new(protocol), payload);
                match self.queue.push_back(packet) {
                    Ok(()) => {
                        tracing::debug!(depth = self.queue.len(), "data queued");
                        true
                    }
                    Err(_) => {
                        tracing::debug!("data queue full, packet dropped");
                        false
                    }
                }
            }
        }
    }

    /// Move up to the per-round cap of packets into the transmission queue
    /// and stage the first of them. Returns whether there is anything to
    /// send this round.
    fn transmission_enqueue(&mut self) -> bool {
        for _ in 0..self.packets_per_round {
            if self.tx_queue.len() >= self.packets_per_round as usize {
                break;
            }
            match self.queue.pop_front() {
                Some(packet) => {
                    if self.tx_queue.push_back(packet).is_err() {
                        break;
                    }
                }
                None => break,
            }
        }
        if let Some(packet) = self.tx_queue.pop_front() {
            tracing::debug!(staged = self.tx_queue.len() + 1, "transmission queue ready");
            self.current = Some(packet);
            return true;
        }
        false
    }

    /// The radio finished pushing `packet` onto the air.
    pub fn notify_transmission_end(&mut self, packet: &Packet, ctx: &mut MacContext) {
        match self.role {
            DeviceRole::Coordinator => match packet.header.frame_type() {
                FrameType::Rfd => {
                    tracing::debug!(addr = %self.addr, "RFD sent");
                    ctx.schedule(self.max_delay, MacTimer::StartFrame);
                }
                FrameType::Data => {
                    tracing::debug!(addr = %self.addr, "DATA sent");
                }
                FrameType::Fbp => {
                    tracing::debug!(addr = %self.addr, slots = ?self.slot_status, "FBP sent");
                    self.frames_in_round += 1;
                    if self.round_converged() {
                        self.notify_active_period_stopped(ctx);
                    } else {
                        ctx.schedule(self.max_delay, MacTimer::StartFrame);
                    }
                }
            },
            DeviceRole::EndDevice => {
                tracing::debug!(addr = %self.addr, "packet sent");
            }
        }
    }

    /// Termination rule evaluated after each feedback broadcast: with a
    /// single packet per round the retry loop runs until no slot is in
    /// error; with more, the round also has to stop producing successes.
    fn round_converged(&self) -> bool {
        let any_error = self.slot_status.contains(&SlotState::Error);
        if self.packets_per_round == 1 {
            !any_error
        } else {
            !any_error && !self.slot_status.contains(&SlotState::Ok)
        }
    }

    /// The radio synchronized on an incoming frame.
    pub fn notify_reception_start(&mut self) {
        tracing::trace!(addr = %self.addr, "reception started");
    }

    /// The radio gave up on a reception (collision or channel error).
    pub fn notify_reception_end_error(&mut self, _ctx: &mut MacContext) {
        tracing::debug!(addr = %self.addr, slot = self.curr_slot, "reception error");
        if self.role == DeviceRole::Coordinator && self.status == DcrStatus::ActiveStart {
            let slot = self.curr_slot as usize;
            if let Some(state) = self.slot_status.get_mut(slot) {
                *state = SlotState::Error;
            }
        }
    }

    /// The radio completed a reception.
    pub fn notify_reception_end_ok(&mut self, packet: Packet, ctx: &mut MacContext) {
        if !packet.verify_crc() {
            tracing::debug!(addr = %self.addr, "CRC mismatch, frame dropped");
            ctx.tracer
                .trace(ctx.now, &TraceEvent::MacRxDrop { addr: self.addr });
            return;
        }
        let header = packet.header;
        tracing::trace!(
            addr = %self.addr,
            src = %header.src,
            dst = %header.dst,
            ty = ?header.frame_type(),
            "frame received"
        );
        match self.role {
            DeviceRole::Coordinator => {
                if header.frame_type() == FrameType::Data {
                    if self.status == DcrStatus::ActiveStart {
                        let slot = self.curr_slot as usize;
                        if let Some(state) = self.slot_status.get_mut(slot) {
                            *state = SlotState::Ok;
                        }
                    }
                    self.commands.push_back(MacCommand::ForwardUp(packet));
                }
            }
            DeviceRole::EndDevice => {
                if header.dst != self.addr && !header.dst.is_broadcast() {
                    return;
                }
                match header.frame_type() {
                    FrameType::Data => {
                        self.commands.push_back(MacCommand::ForwardUp(packet));
                    }
                    FrameType::Rfd => {
                        if self.status == DcrStatus::ActiveStart {
                            // A new round opened on top of ours: tear the
                            // old one down, then contend in the new round.
                            tracing::debug!(addr = %self.addr, "aborting overlapped round");
                            self.mark_aborted(ctx);
                        }
                        self.start_active_period(ctx);
                    }
                    FrameType::Fbp => self.handle_feedback(&packet, ctx),
                }
            }
        }
    }

    /// End-device side of the feedback broadcast: decode the slot status
    /// vector and act on the outcome of the one slot this device contended
    /// in.
    fn handle_feedback(&mut self, packet: &Packet, ctx: &mut MacContext) {
        if self.status != DcrStatus::ActiveStart {
            return;
        }
        self.frames_in_round += 1;
        let slots = match deserialize_feedback(&packet.payload, self.n_slots as usize) {
            Ok(slots) => slots,
            Err(_) => {
                tracing::debug!(addr = %self.addr, "malformed feedback payload, dropped");
                ctx.tracer
                    .trace(ctx.now, &TraceEvent::MacRxDrop { addr: self.addr });
                return;
            }
        };
        self.slot_status = slots;
        let own = self.slot_status[self.rnd_slot as usize];
        tracing::debug!(
            addr = %self.addr,
            slot = self.rnd_slot,
            outcome = ?own,
            "feedback decoded"
        );
        if self.current.is_none() {
            return;
        }
        match own {
            SlotState::Ok => {
                self.current = None;
                if let Some(next) = self.tx_queue.pop_front() {
                    self.current = Some(next);
                    self.start_frame(ctx);
                } else {
                    self.notify_active_period_stopped(ctx);
                }
            }
            SlotState::Empty => {
                // The slot we transmitted in was never acted on: protocol
                // anomaly, distinct from a normal stop.
                self.notify_active_period_aborted(ctx);
            }
            SlotState::Error => {
                if let Some(packet) = self.current.as_mut() {
                    packet.header.set_retry(true);
                }
                self.start_frame(ctx);
            }
        }
    }

    /// Open a round (coordinator) or join one (end device).
    fn start_active_period(&mut self, ctx: &mut MacContext) {
        match self.role {
            DeviceRole::Coordinator => {
                tracing::debug!(addr = %self.addr, "starting a new collection round");
                self.status = DcrStatus::ActiveStart;
                ctx.controller.notify_round_start(ctx.now);
                ctx.tracer
                    .trace(ctx.now, &TraceEvent::RoundStarted { addr: self.addr });
                self.frames_in_round = 0;
                self.send_request_for_data(ctx);
            }
            DeviceRole::EndDevice => {
                if self.status == DcrStatus::ActiveStart {
                    self.mark_aborted(ctx);
                }
                if self.transmission_enqueue() {
                    tracing::debug!(addr = %self.addr, "joining collection round");
                    self.status = DcrStatus::ActiveStart;
                    ctx.tracer
                        .trace(ctx.now, &TraceEvent::RoundStarted { addr: self.addr });
                    self.frames_in_round = 0;
                    self.start_frame(ctx);
                } else {
                    // Nothing to offer: skip the round entirely and re-wake
                    // at the next round boundary.
                    self.commands.push_back(MacCommand::SleepRadio);
                    let round = self.slot_duration(ctx.rate) * self.n_slots as u32;
                    ctx.schedule(
                        round.saturating_sub(ctx.switching_time),
                        MacTimer::WakeUp,
                    );
                }
            }
        }
    }

    /// Close the round normally and enter the off period.
    fn notify_active_period_stopped(&mut self, ctx: &mut MacContext) {
        tracing::debug!(addr = %self.addr, frames = self.frames_in_round, "round stopped");
        if self.status == DcrStatus::ActiveStart {
            self.status = DcrStatus::ActiveStop;
            ctx.tracer.trace(
                ctx.now,
                &TraceEvent::RoundStopped {
                    addr: self.addr,
                    frames: self.frames_in_round,
                },
            );
        }
        self.start_non_active_period(ctx);
    }

    /// Tear the round down and enter the off period.
    fn notify_active_period_aborted(&mut self, ctx: &mut MacContext) {
        self.mark_aborted(ctx);
        self.start_non_active_period(ctx);
    }

    fn mark_aborted(&mut self, ctx: &mut MacContext) {
        tracing::debug!(addr = %self.addr, frames = self.frames_in_round, "round aborted");
        if self.status == DcrStatus::ActiveStart {
            self.status = DcrStatus::ActiveAbort;
            ctx.tracer.trace(
                ctx.now,
                &TraceEvent::RoundAborted {
                    addr: self.addr,
                    frames: self.frames_in_round,
                },
            );
        }
    }

    /// Ask the controller for an off time and sleep it out if it is worth
    /// more than the radio's switching overhead.
    fn start_non_active_period(&mut self, ctx: &mut MacContext) {
        self.status = DcrStatus::NonActiveStart;
        let off = ctx.controller.off_time(self.role, &ctx.energy, ctx.now);
        tracing::debug!(addr = %self.addr, off_s = off.as_secs_f64(), "off period");
        if off > ctx.switching_time {
            self.commands.push_back(MacCommand::SleepRadio);
            ctx.schedule(off, MacTimer::NonActiveStopped);
        } else {
            self.non_active_stopped(ctx);
        }
    }

    fn non_active_stopped(&mut self, ctx: &mut MacContext) {
        self.status = DcrStatus::NonActiveStop;
        self.wake_up(ctx);
    }

    /// Reset per-frame bookkeeping; an end device re-randomizes its slot.
    fn reset_frame(&mut self) {
        self.curr_slot = 0;
        if self.role == DeviceRole::EndDevice {
            self.rnd_slot = self.rng.gen_range(0..self.n_slots);
            tracing::debug!(addr = %self.addr, slot = self.rnd_slot, "slot drawn");
        }
        self.slot_status.fill(SlotState::Empty);
    }

    /// Begin a frame. An end device whose slot is far enough away sleeps
    /// through the dead time and re-wakes just before the slot.
    fn start_frame(&mut self, ctx: &mut MacContext) {
        self.reset_frame();
        if self.status != DcrStatus::ActiveStart {
            return;
        }
        ctx.tracer
            .trace(ctx.now, &TraceEvent::FrameStarted { addr: self.addr });
        if self.role == DeviceRole::EndDevice {
            let lead = self.slot_duration(ctx.rate) * self.rnd_slot as u32;
            if lead > ctx.switching_time * 2 {
                self.commands.push_back(MacCommand::SleepRadio);
                ctx.schedule(lead - ctx.switching_time, MacTimer::RadioWake);
            }
        }
        ctx.schedule(self.max_delay, MacTimer::StartSlot);
    }

    fn start_slot(&mut self, ctx: &mut MacContext) {
        if self.status != DcrStatus::ActiveStart {
            return;
        }
        tracing::trace!(addr = %self.addr, slot = self.curr_slot, "slot start");
        if self.role == DeviceRole::EndDevice && self.curr_slot == self.rnd_slot {
            if let Some(packet) = self.current.clone() {
                tracing::debug!(addr = %self.addr, slot = self.curr_slot, "transmitting in slot");
                self.forward_down(packet, ctx);
            }
        }
        ctx.schedule(self.slot_duration(ctx.rate), MacTimer::StopSlot);
    }

    fn stop_slot(&mut self, ctx: &mut MacContext) {
        if self.status != DcrStatus::ActiveStart {
            return;
        }
        if self.role == DeviceRole::EndDevice && self.curr_slot == self.rnd_slot {
            // Sleep through the rest of the frame if the tail is long
            // enough, re-waking just before the feedback broadcast.
            let tail_slots = (self.n_slots - 1 - self.rnd_slot) as u32;
            let tail = self.slot_duration(ctx.rate) * tail_slots;
            if tail > ctx.switching_time * 2 {
                self.commands.push_back(MacCommand::SleepRadio);
                ctx.schedule(tail - ctx.switching_time, MacTimer::RadioWake);
            }
        }
        self.curr_slot += 1;
        if self.curr_slot < self.n_slots {
            self.start_slot(ctx);
        } else {
            self.stop_frame(ctx);
        }
    }

    fn stop_frame(&mut self, ctx: &mut MacContext) {
        if self.status != DcrStatus::ActiveStart {
            return;
        }
        if self.role == DeviceRole::Coordinator {
            ctx.schedule(self.max_delay, MacTimer::SendFeedback);
        }
    }

    /// Broadcast the request-for-data that opens a round. If the radio
    /// refuses, retry the whole wake-up after the switching time.
    fn send_request_for_data(&mut self, ctx: &mut MacContext) -> bool {
        let mut header = MacHeader::new(FrameType::Rfd);
        header.seq = self.sig_seq;
        self.sig_seq = self.sig_seq.wrapping_add(1);
        header.src = self.addr;
        header.dst = MacAddress::BROADCAST;
        let packet = Packet::new(header, LlcSnapHeader::control(), &[]);
        if self.forward_down(packet, ctx) {
            return true;
        }
        ctx.schedule(ctx.switching_time, MacTimer::WakeUp);
        false
    }

    /// Broadcast the feedback packet carrying the slot status vector.
    fn send_feedback(&mut self, ctx: &mut MacContext) -> bool {
        let mut header = MacHeader::new(FrameType::Fbp);
        header.seq = self.sig_seq;
        self.sig_seq = self.sig_seq.wrapping_add(1);
        header.src = self.addr;
        header.dst = MacAddress::BROADCAST;
        let payload = serialize_feedback(&self.slot_status);
        let packet = Packet::new(header, LlcSnapHeader::control(), &payload);
        self.forward_down(packet, ctx)
    }

    /// Seal a frame and hand it to the radio, unless the radio cannot
    /// transmit right now.
    fn forward_down(&mut self, mut packet: Packet, ctx: &mut MacContext) -> bool {
        packet.seal();
        if ctx.radio_state.can_transmit() {
            ctx.tracer.trace(
                ctx.now,
                &TraceEvent::MacTx {
                    addr: self.addr,
                    frame_type: packet.header.frame_type(),
                    retry: packet.header.retry(),
                },
            );
            self.commands.push_back(MacCommand::StartTx(packet));
            true
        } else {
            tracing::debug!(addr = %self.addr, state = %ctx.radio_state, "radio busy, frame not sent");
            false
        }
    }
}
