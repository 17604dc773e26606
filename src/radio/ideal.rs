//! Half-duplex radio with an ideal (error-model-driven) receiver.
//!
//! Reception outcome is decided when the frame ends: a clean, uninterrupted
//! arrival completes through `RxEndedOk`, while corrupted arrivals and
//! overridden receptions complete through `RxEndedError`. A second arrival
//! during an ongoing reception always resynchronizes on top of it, turning
//! the reception into an error that ends after the newer signal.

use std::collections::VecDeque;
use std::time::Duration;

use crate::mac::packet::Packet;
use crate::radio::{RadioEvent, RadioState};
use crate::sim::event::{Event, RadioTimer};
use crate::sim::scheduler::{EventHandle, EventQueue};
use crate::sim::time::{DataRate, SimTime};
use crate::sim::DeviceId;

/// The simulated radio of one device.
pub struct IdealRadio {
    device: DeviceId,
    state: RadioState,
    rate: DataRate,
    switching_time: Duration,
    /// Target of the in-flight two-phase transition, if any.
    pending_target: Option<RadioState>,
    tx_packet: Option<Packet>,
    rx_packet: Option<Packet>,
    rx_corrupted: bool,
    pending_rx: Option<EventHandle>,
    events: VecDeque<RadioEvent>,
}

impl IdealRadio {
    /// Create a radio in the idle state.
    pub fn new(device: DeviceId, rate: DataRate, switching_time: Duration) -> Self {
        Self {
            device,
            state: RadioState::Idle,
            rate,
            switching_time,
            pending_target: None,
            tx_packet: None,
            rx_packet: None,
            rx_corrupted: false,
            pending_rx: None,
            events: VecDeque::new(),
        }
    }

    /// Current radio state.
    pub fn state(&self) -> RadioState {
        self.state
    }

    /// The PHY bit rate.
    pub fn rate(&self) -> DataRate {
        self.rate
    }

    /// Settle time of a sleep transition, either direction.
    pub fn switching_time(&self) -> Duration {
        self.switching_time
    }

    /// Next pending notification, in emission order.
    pub fn pop_event(&mut self) -> Option<RadioEvent> {
        self.events.pop_front()
    }

    /// Start transmitting `packet`. Returns `true` if the radio refuses
    /// (sleeping, switching or already transmitting); an ongoing reception
    /// is aborted and the transmission proceeds.
    pub fn start_transmit(
        &mut self,
        packet: Packet,
        now: SimTime,
        queue: &mut EventQueue,
    ) -> bool {
        match self.state {
            RadioState::Rx => {
                self.abort_rx(now, queue);
                self.begin_transmit(packet, now, queue);
                false
            }
            RadioState::Idle => {
                self.begin_transmit(packet, now, queue);
                false
            }
            _ => {
                tracing::debug!(state = %self.state, "radio refused transmission");
                true
            }
        }
    }

    fn begin_transmit(&mut self, packet: Packet, now: SimTime, queue: &mut EventQueue) {
        let duration = self.rate.transfer_time(packet.serialized_size());
        self.change_state(RadioState::Tx, now, queue);
        self.events.push_back(RadioEvent::TxStarted {
            packet: packet.clone(),
            duration,
        });
        queue.schedule(now, duration, Event::Radio(self.device, RadioTimer::EndTx));
        self.tx_packet = Some(packet);
    }

    /// An incoming signal reaches the antenna. `duration` is the airtime of
    /// the arriving frame and `corrupted` the channel's verdict on it.
    pub fn start_receive(
        &mut self,
        packet: Packet,
        duration: Duration,
        corrupted: bool,
        now: SimTime,
        queue: &mut EventQueue,
    ) {
        match self.state {
            RadioState::Idle => {
                // Preamble detection and synchronization always succeed on
                // an idle radio.
                self.rx_packet = Some(packet);
                self.rx_corrupted = corrupted;
                self.change_state(RadioState::Rx, now, queue);
                self.events.push_back(RadioEvent::RxStarted);
                self.pending_rx = Some(queue.schedule(
                    now,
                    duration,
                    Event::Radio(self.device, RadioTimer::EndRx),
                ));
            }
            RadioState::Rx => {
                // The newer signal overrides the reception in progress; the
                // result is an error that ends with the newer signal.
                if let Some(handle) = self.pending_rx.take() {
                    handle.cancel();
                }
                self.pending_rx = Some(queue.schedule(
                    now,
                    duration,
                    Event::Radio(self.device, RadioTimer::AbortRx),
                ));
            }
            // Transmitting, sleeping or switching radios do not notice the
            // signal.
            _ => {}
        }
    }

    /// The in-flight transmission finished.
    pub fn end_tx(&mut self, now: SimTime, queue: &mut EventQueue) {
        if self.state != RadioState::Tx {
            return;
        }
        if let Some(packet) = self.tx_packet.take() {
            self.events.push_back(RadioEvent::TxEnded { packet });
        }
        self.change_state(RadioState::Idle, now, queue);
    }

    /// The in-flight reception completed; outcome depends on corruption.
    pub fn end_rx(&mut self, now: SimTime, queue: &mut EventQueue) {
        if self.state != RadioState::Rx {
            return;
        }
        self.pending_rx = None;
        match (self.rx_corrupted, self.rx_packet.take()) {
            (false, Some(packet)) => self.events.push_back(RadioEvent::RxEndedOk { packet }),
            _ => self.events.push_back(RadioEvent::RxEndedError),
        }
        self.change_state(RadioState::Idle, now, queue);
    }

    /// The in-flight reception terminates in error.
    pub fn abort_rx(&mut self, now: SimTime, queue: &mut EventQueue) {
        if self.state != RadioState::Rx {
            return;
        }
        if let Some(handle) = self.pending_rx.take() {
            handle.cancel();
        }
        self.rx_packet = None;
        self.change_state(RadioState::Idle, now, queue);
        self.events.push_back(RadioEvent::RxEndedError);
    }

    /// Drop whatever is in flight and go to sleep through the switching
    /// phase.
    pub fn force_sleep(&mut self, now: SimTime, queue: &mut EventQueue) {
        if self.state == RadioState::Sleep {
            return;
        }
        if let Some(handle) = self.pending_rx.take() {
            handle.cancel();
        }
        self.rx_packet = None;
        self.change_state(RadioState::Sleep, now, queue);
    }

    /// Leave sleep through the switching phase.
    pub fn wake_up(&mut self, now: SimTime, queue: &mut EventQueue) {
        if let Some(handle) = self.pending_rx.take() {
            handle.cancel();
        }
        self.change_state(RadioState::Idle, now, queue);
    }

    /// The switching settle window elapsed; land on the pending target.
    pub fn switch_done(&mut self) {
        if self.state != RadioState::Switching {
            return;
        }
        let target = self.pending_target.take().unwrap_or(RadioState::Idle);
        self.state = target;
        tracing::trace!(device = self.device.0, state = %target, "radio settled");
        self.events.push_back(RadioEvent::StateChanged { state: target });
    }

    /// Serialize all state changes; entering or leaving sleep takes the
    /// two-phase path through [`RadioState::Switching`]. A request landing
    /// while a switch is in flight replaces the pending target instead of
    /// scheduling a second switch.
    fn change_state(&mut self, new: RadioState, now: SimTime, queue: &mut EventQueue) {
        if self.state == RadioState::Switching {
            self.pending_target = Some(new);
            return;
        }
        if self.state == RadioState::Sleep || new == RadioState::Sleep {
            tracing::trace!(device = self.device.0, from = %self.state, to = %new, "switching");
            self.state = RadioState::Switching;
            self.pending_target = Some(new);
            queue.schedule(
                now,
                self.switching_time,
                Event::Radio(self.device, RadioTimer::SwitchDone),
            );
            self.events.push_back(RadioEvent::StateChanged {
                state: RadioState::Switching,
            });
        } else {
            tracing::trace!(device = self.device.0, from = %self.state, to = %new, "radio state");
            self.state = new;
            self.events.push_back(RadioEvent::StateChanged { state: new });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mac::header::{FrameType, LlcSnapHeader, MacHeader};

    fn radio() -> (IdealRadio, EventQueue) {
        (
            IdealRadio::new(
                DeviceId(0),
                DataRate::from_bps(250_000),
                Duration::from_micros(192),
            ),
            EventQueue::new(),
        )
    }

    fn packet() -> Packet {
        let mut p = Packet::new(
            MacHeader::new(FrameType::Data),
            LlcSnapHeader::new(0),
            b"x",
        );
        p.seal();
        p
    }

    fn drain_states(r: &mut IdealRadio) -> Vec<RadioState> {
        let mut states = Vec::new();
        while let Some(ev) = r.pop_event() {
            if let RadioEvent::StateChanged { state } = ev {
                states.push(state);
            }
        }
        states
    }

    #[test]
    fn test_sleep_goes_through_switching() {
        let (mut r, mut q) = radio();
        r.force_sleep(SimTime::ZERO, &mut q);
        assert_eq!(r.state(), RadioState::Switching);
        assert_eq!(drain_states(&mut r), vec![RadioState::Switching]);

        // continuation fires after the settle window
        let (t, _) = q.pop().unwrap();
        assert_eq!(t, SimTime::ZERO + Duration::from_micros(192));
        r.switch_done();
        assert_eq!(r.state(), RadioState::Sleep);
    }

    #[test]
    fn test_wake_mid_switch_replaces_pending_target() {
        let (mut r, mut q) = radio();
        r.force_sleep(SimTime::ZERO, &mut q);
        // a wake request arrives before the switch settles
        r.wake_up(SimTime::from_micros(100), &mut q);
        r.switch_done();
        assert_eq!(r.state(), RadioState::Idle);
        // only one continuation was ever scheduled
        assert!(q.pop().is_some());
        assert!(q.pop().is_none());
    }

    #[test]
    fn test_refused_while_sleeping() {
        let (mut r, mut q) = radio();
        r.force_sleep(SimTime::ZERO, &mut q);
        assert!(r.start_transmit(packet(), SimTime::ZERO, &mut q));
    }

    #[test]
    fn test_tx_preempts_rx() {
        let (mut r, mut q) = radio();
        r.start_receive(
            packet(),
            Duration::from_millis(1),
            false,
            SimTime::ZERO,
            &mut q,
        );
        assert_eq!(r.state(), RadioState::Rx);
        while r.pop_event().is_some() {}

        assert!(!r.start_transmit(packet(), SimTime::from_micros(10), &mut q));
        assert_eq!(r.state(), RadioState::Tx);
        // reception was reported as an error before the transmission began
        let mut saw_rx_error = false;
        let mut saw_tx_start = false;
        while let Some(ev) = r.pop_event() {
            match ev {
                RadioEvent::RxEndedError => {
                    assert!(!saw_tx_start);
                    saw_rx_error = true;
                }
                RadioEvent::TxStarted { .. } => saw_tx_start = true,
                _ => {}
            }
        }
        assert!(saw_rx_error && saw_tx_start);
    }

    #[test]
    fn test_overlapping_arrival_ends_in_error() {
        let (mut r, mut q) = radio();
        r.start_receive(
            packet(),
            Duration::from_millis(2),
            false,
            SimTime::ZERO,
            &mut q,
        );
        r.start_receive(
            packet(),
            Duration::from_millis(3),
            false,
            SimTime::from_millis(1),
            &mut q,
        );
        while r.pop_event().is_some() {}

        // the original EndRx is dead; the abort fires at 1ms + 3ms
        let (t, ev) = q.pop().unwrap();
        assert_eq!(t, SimTime::from_millis(4));
        assert!(matches!(ev, Event::Radio(_, RadioTimer::AbortRx)));

        r.abort_rx(t, &mut q);
        let mut saw_error = false;
        while let Some(ev) = r.pop_event() {
            if matches!(ev, RadioEvent::RxEndedError) {
                saw_error = true;
            }
        }
        assert!(saw_error);
        assert_eq!(r.state(), RadioState::Idle);
    }

    #[test]
    fn test_corrupted_arrival_ends_in_error() {
        let (mut r, mut q) = radio();
        r.start_receive(
            packet(),
            Duration::from_millis(1),
            true,
            SimTime::ZERO,
            &mut q,
        );
        while r.pop_event().is_some() {}
        r.end_rx(SimTime::from_millis(1), &mut q);
        let mut saw_error = false;
        while let Some(ev) = r.pop_event() {
            if matches!(ev, RadioEvent::RxEndedError) {
                saw_error = true;
            }
        }
        assert!(saw_error);
    }
}
