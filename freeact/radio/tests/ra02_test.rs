//! RA-02 active object tests against a scripted transceiver, hosted on the POSIX port

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use freeact_active::{ActiveObject, TimeEvent};
use freeact_core::TaskContext;
use freeact_posix::{interrupt, start_ticker, Posix};
use freeact_radio::ra02::RA02_PRIORITY;
use freeact_radio::{
    Flags, LoRaRadio, Packet, PacketSink, Ra02, Ra02Event, Ra02State, Ra02Stats, PAYLOAD_LEN,
};

#[derive(Debug)]
struct MockError;

#[derive(Default)]
struct MockState {
    failing_startups: u32,
    startups: u32,
    rx_frames: VecDeque<Vec<u8>>,
    transmitted: Vec<Packet>,
}

#[derive(Clone, Default)]
struct MockRadio {
    state: Arc<Mutex<MockState>>,
}

impl MockRadio {
    fn with<T>(&self, f: impl FnOnce(&mut MockState) -> T) -> T {
        f(&mut self.state.lock().unwrap())
    }
}

impl LoRaRadio for MockRadio {
    type Error = MockError;

    fn startup(&mut self) -> Result<(), MockError> {
        self.with(|s| {
            s.startups += 1;
            if s.failing_startups > 0 {
                s.failing_startups -= 1;
                Err(MockError)
            } else {
                Ok(())
            }
        })
    }

    fn start_receiving(&mut self) -> Result<(), MockError> {
        Ok(())
    }

    fn receive(&mut self, buf: &mut [u8]) -> nb::Result<usize, MockError> {
        let frame = self
            .with(|s| s.rx_frames.pop_front())
            .ok_or(nb::Error::WouldBlock)?;
        buf[..frame.len()].copy_from_slice(&frame);
        Ok(frame.len())
    }

    fn transmit(&mut self, frame: &[u8]) -> nb::Result<(), MockError> {
        let packet = Packet::decode(frame).map_err(|_| nb::Error::Other(MockError))?;
        self.with(|s| s.transmitted.push(packet));
        Ok(())
    }
}

struct ChannelSink(Sender<Packet>);

impl PacketSink for ChannelSink {
    fn deliver(&mut self, packet: Packet) {
        let _ = self.0.send(packet);
    }
}

type Node = ActiveObject<Ra02<MockRadio, ChannelSink, Posix>, Posix, 16>;

macro_rules! radio_node {
    ($node:ident, $tx_timeout:ident, $retry:ident, $stats:ident, $name:literal) => {
        static $node: Node = ActiveObject::new($name, Ra02State::Idle);
        static $tx_timeout: TimeEvent<Ra02Event, Posix> =
            TimeEvent::one_shot(Ra02Event::TxTimeout, &$node);
        static $retry: TimeEvent<Ra02Event, Posix> =
            TimeEvent::one_shot(Ra02Event::StartupRetry, &$node);
        static $stats: Ra02Stats = Ra02Stats::new();
    };
}

fn launch(
    node: &'static Node,
    tx_timeout: &'static TimeEvent<Ra02Event, Posix>,
    retry: &'static TimeEvent<Ra02Event, Posix>,
    stats: &'static Ra02Stats,
    radio: MockRadio,
) -> Receiver<Packet> {
    start_ticker().unwrap();
    let (tx, rx) = mpsc::channel();
    let behavior = Ra02::new(radio, ChannelSink(tx), tx_timeout, retry, stats)
        .with_retry_delay(Duration::from_millis(10));
    let stack = Box::leak(vec![0u8; 4096].into_boxed_slice());
    node.start(behavior, RA02_PRIORITY, stack).unwrap();
    rx
}

fn wait_until(mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(2));
    }
}

fn packet(src_id: u8, msg_id: u16) -> Packet {
    Packet::build(src_id, 200, Flags::default(), 3, msg_id, [msg_id as u8; PAYLOAD_LEN]).unwrap()
}

fn request(node: &Node, packet: Packet) {
    node.post(Ra02Event::TransmitRequest(packet), &mut TaskContext::new())
        .unwrap();
}

fn dio0(node: &Node, event: Ra02Event) {
    interrupt(|isr| node.post(event, isr)).unwrap();
}

#[test]
fn test_startup_retries_until_radio_answers() {
    radio_node!(NODE, TX_TIMEOUT, RETRY, STATS, "ra02-retry");

    let radio = MockRadio::default();
    radio.with(|s| s.failing_startups = 2);
    let _rx = launch(&NODE, &TX_TIMEOUT, &RETRY, &STATS, radio.clone());

    wait_until(|| radio.with(|s| s.startups) == 3);

    // Only a listening radio transmits
    request(&NODE, packet(1, 10));
    wait_until(|| radio.with(|s| s.transmitted.len()) == 1);
    assert_eq!(STATS.snapshot().startup_failures, 2);
}

#[test]
fn test_received_frames_reach_sink_once() {
    radio_node!(NODE, TX_TIMEOUT, RETRY, STATS, "ra02-rx");

    let radio = MockRadio::default();
    let rx = launch(&NODE, &TX_TIMEOUT, &RETRY, &STATS, radio.clone());

    let first = packet(7, 1);
    radio.with(|s| s.rx_frames.push_back(first.encode().to_vec()));
    dio0(&NODE, Ra02Event::RxReady);
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), first);

    let mut damaged = packet(7, 2).encode();
    damaged[8] ^= 0xFF;
    radio.with(|s| {
        s.rx_frames.push_back(first.encode().to_vec());
        s.rx_frames.push_back(damaged.to_vec());
    });
    dio0(&NODE, Ra02Event::RxReady);
    dio0(&NODE, Ra02Event::RxReady);
    // No frame waiting
    dio0(&NODE, Ra02Event::RxReady);

    let second = packet(8, 1);
    radio.with(|s| s.rx_frames.push_back(second.encode().to_vec()));
    dio0(&NODE, Ra02Event::RxReady);
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), second);

    let counters = STATS.snapshot();
    assert_eq!(counters.rx_packets, 2);
    assert_eq!(counters.rx_duplicates, 1);
    assert_eq!(counters.rx_errors, 1);
}

#[test]
fn test_requests_while_transmitting_are_dropped() {
    radio_node!(NODE, TX_TIMEOUT, RETRY, STATS, "ra02-busy");

    let radio = MockRadio::default();
    let _rx = launch(&NODE, &TX_TIMEOUT, &RETRY, &STATS, radio.clone());

    request(&NODE, packet(1, 1));
    request(&NODE, packet(1, 2));
    dio0(&NODE, Ra02Event::TxDone);
    request(&NODE, packet(1, 3));

    wait_until(|| radio.with(|s| s.transmitted.len()) == 2);
    let sent: Vec<u16> = radio.with(|s| s.transmitted.iter().map(|p| p.msg_id).collect());
    assert_eq!(sent, [1, 3]);

    let counters = STATS.snapshot();
    assert_eq!(counters.tx_dropped, 1);
    assert_eq!(counters.tx_packets, 1);
}

#[test]
fn test_missing_tx_done_times_out_back_to_listening() {
    radio_node!(NODE, TX_TIMEOUT, RETRY, STATS, "ra02-timeout");

    let radio = MockRadio::default();
    let _rx = launch(&NODE, &TX_TIMEOUT, &RETRY, &STATS, radio.clone());

    request(&NODE, packet(2, 1));
    wait_until(|| STATS.snapshot().tx_timeouts == 1);
    assert!(!TX_TIMEOUT.is_armed());

    request(&NODE, packet(2, 2));
    wait_until(|| radio.with(|s| s.transmitted.len()) == 2);
    assert_eq!(STATS.snapshot().tx_packets, 0);
}

#[test]
fn test_stale_timeout_does_not_end_current_transmission() {
    radio_node!(NODE, TX_TIMEOUT, RETRY, STATS, "ra02-stale");

    let radio = MockRadio::default();
    let _rx = launch(&NODE, &TX_TIMEOUT, &RETRY, &STATS, radio.clone());

    request(&NODE, packet(3, 1));
    wait_until(|| TX_TIMEOUT.is_armed());

    // Left over from an earlier transmission
    NODE.post(Ra02Event::TxTimeout, &mut TaskContext::new())
        .unwrap();
    request(&NODE, packet(3, 2));

    wait_until(|| STATS.snapshot().tx_dropped == 1);
    assert_eq!(STATS.snapshot().tx_timeouts, 0);
    assert_eq!(radio.with(|s| s.transmitted.len()), 1);

    // The armed timeout still ends the transmission
    wait_until(|| STATS.snapshot().tx_timeouts == 1);
    request(&NODE, packet(3, 3));
    wait_until(|| radio.with(|s| s.transmitted.len()) == 2);
}
