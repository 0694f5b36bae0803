//! RA-02 (SX1278) LoRa transceiver as an active object.
//!
//! ```text
//!          INIT / StartupRetry ok
//!   Idle ─────────────────────────► Listening ◄──────────┐
//!    ▲ │ startup failed:                │ TransmitRequest │ TxDone / TxTimeout
//!    │ └ arm retry timer                ▼                 │
//!    └──── receiver restart failed ── Transmitting ───────┘
//! ```
//!
//! The radio is half duplex. While a frame is on air further transmit
//! requests are counted and dropped, and receive notifications are ignored.

use core::sync::atomic::{AtomicU32, Ordering};
use core::time::Duration;

use freeact_active::{ActiveBehavior, ActiveContext, Outcome, TimeEvent};
use freeact_core::{define_events, Port, Signal, TaskContext};
use heapless::Deque;
use log::{debug, info, warn};

use crate::{LoRaRadio, Packet, PacketSink};

/// Priority the radio object runs at
pub const RA02_PRIORITY: u8 = 2;
/// Stack reserved for the radio object's thread
pub const RA02_STACK_SIZE: usize = 512;
/// Time allowed for one transmission to complete
pub const TX_TIMEOUT: Duration = Duration::from_millis(300);
/// Delay between failed start-up attempts, unless configured otherwise
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Receive buffer size; longer frames are truncated
const RX_BUFFER_LEN: usize = 64;
/// Number of recently delivered packets remembered for duplicate suppression
const RECENT_LEN: usize = 8;

/// DIO0 signalled a received frame
pub const SIG_RX_READY: Signal = Signal::user(0);
/// Application asks for a packet to be sent
pub const SIG_TRANSMIT_REQUEST: Signal = Signal::user(1);
/// DIO0 signalled the end of a transmission
pub const SIG_TX_DONE: Signal = Signal::user(2);
/// Transmission did not complete in time
pub const SIG_TX_TIMEOUT: Signal = Signal::user(3);
/// Time to try bringing the radio up again
pub const SIG_STARTUP_RETRY: Signal = Signal::user(4);

define_events! {
    /// Events handled by the radio object
    #[derive(PartialEq)]
    pub enum Ra02Event {
        RxReady = SIG_RX_READY,
        TransmitRequest(Packet) = SIG_TRANSMIT_REQUEST,
        TxDone = SIG_TX_DONE,
        TxTimeout = SIG_TX_TIMEOUT,
        StartupRetry = SIG_STARTUP_RETRY,
    }
}

/// States of the radio object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ra02State {
    /// Transceiver not configured
    Idle,
    /// Continuous receive mode
    Listening,
    /// Frame on air, waiting for TxDone
    Transmitting,
}

/// Counters shared between the radio object and its observers
#[derive(Debug, Default)]
pub struct Ra02Stats {
    rx_packets: AtomicU32,
    rx_duplicates: AtomicU32,
    rx_errors: AtomicU32,
    tx_packets: AtomicU32,
    tx_timeouts: AtomicU32,
    tx_dropped: AtomicU32,
    startup_failures: AtomicU32,
}

/// Point-in-time copy of [`Ra02Stats`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Ra02Counters {
    pub rx_packets: u32,
    pub rx_duplicates: u32,
    pub rx_errors: u32,
    pub tx_packets: u32,
    pub tx_timeouts: u32,
    pub tx_dropped: u32,
    pub startup_failures: u32,
}

impl Ra02Stats {
    pub const fn new() -> Self {
        Self {
            rx_packets: AtomicU32::new(0),
            rx_duplicates: AtomicU32::new(0),
            rx_errors: AtomicU32::new(0),
            tx_packets: AtomicU32::new(0),
            tx_timeouts: AtomicU32::new(0),
            tx_dropped: AtomicU32::new(0),
            startup_failures: AtomicU32::new(0),
        }
    }

    pub fn snapshot(&self) -> Ra02Counters {
        Ra02Counters {
            rx_packets: self.rx_packets.load(Ordering::Relaxed),
            rx_duplicates: self.rx_duplicates.load(Ordering::Relaxed),
            rx_errors: self.rx_errors.load(Ordering::Relaxed),
            tx_packets: self.tx_packets.load(Ordering::Relaxed),
            tx_timeouts: self.tx_timeouts.load(Ordering::Relaxed),
            tx_dropped: self.tx_dropped.load(Ordering::Relaxed),
            startup_failures: self.startup_failures.load(Ordering::Relaxed),
        }
    }
}

fn bump(counter: &AtomicU32) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Behavior of the radio active object.
///
/// The time events must be owned by the active object this behavior is
/// started on, carrying [`Ra02Event::TxTimeout`] and
/// [`Ra02Event::StartupRetry`] respectively.
pub struct Ra02<R, S, P: Port> {
    radio: R,
    sink: S,
    tx_timeout: &'static TimeEvent<Ra02Event, P>,
    retry: &'static TimeEvent<Ra02Event, P>,
    stats: &'static Ra02Stats,
    retry_delay: Duration,
    recent: Deque<(u8, u16), RECENT_LEN>,
}

impl<R: LoRaRadio, S: PacketSink, P: Port> Ra02<R, S, P> {
    pub fn new(
        radio: R,
        sink: S,
        tx_timeout: &'static TimeEvent<Ra02Event, P>,
        retry: &'static TimeEvent<Ra02Event, P>,
        stats: &'static Ra02Stats,
    ) -> Self {
        Self {
            radio,
            sink,
            tx_timeout,
            retry,
            stats,
            retry_delay: DEFAULT_RETRY_DELAY,
            recent: Deque::new(),
        }
    }

    /// Sets the delay between start-up attempts.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn idle(&mut self, event: &Ra02Event) -> Outcome<Ra02State> {
        match event {
            Ra02Event::Init | Ra02Event::StartupRetry => self.bring_up(),
            Ra02Event::TransmitRequest(packet) => {
                self.drop_request(packet, "radio down");
                Outcome::Handled
            }
            _ => Outcome::Ignored,
        }
    }

    fn listening(&mut self, event: &Ra02Event) -> Outcome<Ra02State> {
        match event {
            Ra02Event::RxReady => {
                self.receive();
                Outcome::Handled
            }
            Ra02Event::TransmitRequest(packet) => self.transmit(packet),
            _ => Outcome::Ignored,
        }
    }

    fn transmitting(&mut self, event: &Ra02Event) -> Outcome<Ra02State> {
        match event {
            Ra02Event::TxDone => {
                self.tx_timeout.disarm(&mut TaskContext::new());
                bump(&self.stats.tx_packets);
                self.resume_listening()
            }
            // Expired before the last disarm and delivered after the next arm
            Ra02Event::TxTimeout if self.tx_timeout.is_armed() => {
                debug!("ra02: stale transmit timeout ignored");
                Outcome::Handled
            }
            Ra02Event::TxTimeout => {
                bump(&self.stats.tx_timeouts);
                warn!("ra02: transmission timed out after {:?}", TX_TIMEOUT);
                self.resume_listening()
            }
            Ra02Event::TransmitRequest(packet) => {
                self.drop_request(packet, "transmitter busy");
                Outcome::Handled
            }
            _ => Outcome::Ignored,
        }
    }

    fn bring_up(&mut self) -> Outcome<Ra02State> {
        let started = self
            .radio
            .startup()
            .and_then(|()| self.radio.start_receiving());

        match started {
            Ok(()) => {
                info!("ra02: radio up, listening");
                Outcome::Transition(Ra02State::Listening)
            }
            Err(err) => {
                bump(&self.stats.startup_failures);
                warn!("ra02: start-up failed ({:?}), retry in {:?}", err, self.retry_delay);
                self.retry.arm(self.retry_delay, &mut TaskContext::new());
                Outcome::Handled
            }
        }
    }

    fn resume_listening(&mut self) -> Outcome<Ra02State> {
        match self.radio.start_receiving() {
            Ok(()) => Outcome::Transition(Ra02State::Listening),
            Err(err) => {
                bump(&self.stats.startup_failures);
                warn!("ra02: receiver restart failed ({:?}), resetting radio", err);
                self.retry.arm(self.retry_delay, &mut TaskContext::new());
                Outcome::Transition(Ra02State::Idle)
            }
        }
    }

    fn receive(&mut self) {
        let mut buf = [0u8; RX_BUFFER_LEN];
        let len = match self.radio.receive(&mut buf) {
            Ok(len) => len.min(RX_BUFFER_LEN),
            Err(nb::Error::WouldBlock) => {
                debug!("ra02: RxReady without a frame");
                return;
            }
            Err(nb::Error::Other(err)) => {
                bump(&self.stats.rx_errors);
                warn!("ra02: receive failed ({:?})", err);
                return;
            }
        };

        match Packet::decode(&buf[..len]) {
            Ok(packet) if self.seen_before(&packet) => {
                bump(&self.stats.rx_duplicates);
                debug!("ra02: duplicate msg {} from {}", packet.msg_id, packet.src_id);
            }
            Ok(packet) => {
                bump(&self.stats.rx_packets);
                debug!("ra02: msg {} from {} to {}", packet.msg_id, packet.src_id, packet.dest_id);
                self.sink.deliver(packet);
            }
            Err(err) => {
                bump(&self.stats.rx_errors);
                warn!("ra02: dropped frame: {}", err);
            }
        }
    }

    /// Remember `packet`; true if it was already delivered recently
    fn seen_before(&mut self, packet: &Packet) -> bool {
        let key = (packet.src_id, packet.msg_id);
        if self.recent.iter().any(|seen| *seen == key) {
            return true;
        }
        if self.recent.is_full() {
            self.recent.pop_front();
        }
        // Room was made above.
        let _ = self.recent.push_back(key);
        false
    }

    fn transmit(&mut self, packet: &Packet) -> Outcome<Ra02State> {
        let frame = packet.encode();
        match self.radio.transmit(&frame) {
            Ok(()) => {
                debug!("ra02: sending msg {} to {}", packet.msg_id, packet.dest_id);
                self.tx_timeout.arm(TX_TIMEOUT, &mut TaskContext::new());
                Outcome::Transition(Ra02State::Transmitting)
            }
            Err(nb::Error::WouldBlock) => {
                self.drop_request(packet, "transceiver busy");
                Outcome::Handled
            }
            Err(nb::Error::Other(err)) => {
                warn!("ra02: transmit failed ({:?})", err);
                self.drop_request(packet, "transmit error");
                Outcome::Handled
            }
        }
    }

    fn drop_request(&self, packet: &Packet, reason: &str) {
        bump(&self.stats.tx_dropped);
        warn!("ra02: dropped msg {} to {}: {}", packet.msg_id, packet.dest_id, reason);
    }
}

impl<R: LoRaRadio, S: PacketSink, P: Port> ActiveBehavior for Ra02<R, S, P> {
    type Event = Ra02Event;
    type State = Ra02State;

    fn dispatch(
        &mut self,
        state: Ra02State,
        event: &Ra02Event,
        _ctx: &mut ActiveContext<'_, Ra02Event>,
    ) -> Outcome<Ra02State> {
        match state {
            Ra02State::Idle => self.idle(event),
            Ra02State::Listening => self.listening(event),
            Ra02State::Transmitting => self.transmitting(event),
        }
    }
}
