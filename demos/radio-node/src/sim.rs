//! Simulated air channel.
//!
//! Every [`Station`] owns an inbox of frames it has heard. A transmission
//! is carried by a short-lived "air" thread that waits out the air time,
//! drops the frame into each peer's inbox and raises the DIO0 interrupts
//! a real SX1278 would: RxReady at the peers, TxDone at the sender.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use freeact_posix::interrupt;
use freeact_radio::{LoRaRadio, Packet, PacketSink, Ra02Event, PACKET_LEN};
use log::{info, warn};
use thiserror::Error;

use crate::Node;

/// Time one 16-byte frame spends on air
pub const AIR_TIME: Duration = Duration::from_millis(40);

#[derive(Debug, Error)]
pub enum SimError {
    #[error("transceiver not responding")]
    NotResponding,
    #[error("frame of {0} bytes is not a mesh packet")]
    BadFrame(usize),
    #[error("air channel unavailable: {0}")]
    Air(#[from] std::io::Error),
}

/// A node's antenna: the frames it heard and the object its DIO0 line
/// interrupts.
pub struct Station {
    node: &'static Node,
    inbox: Mutex<VecDeque<[u8; PACKET_LEN]>>,
    on_air: AtomicBool,
}

impl Station {
    pub const fn new(node: &'static Node) -> Self {
        Self {
            node,
            inbox: Mutex::new(VecDeque::new()),
            on_air: AtomicBool::new(false),
        }
    }

    fn hear(&self, frame: [u8; PACKET_LEN]) {
        self.inbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(frame);
        self.dio0(Ra02Event::RxReady);
    }

    fn next_frame(&self) -> Option<[u8; PACKET_LEN]> {
        self.inbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    fn dio0(&self, event: Ra02Event) {
        if let Err(lost) = interrupt(|isr| self.node.post(event, isr)) {
            warn!("{}: DIO0 {:?} lost, queue full", self.node.name(), lost.into_inner());
        }
    }
}

/// Transceiver attached to a [`Station`].
pub struct SimRadio {
    station: &'static Station,
    peers: &'static [&'static Station],
    failing_startups: u32,
}

impl SimRadio {
    pub fn new(station: &'static Station, peers: &'static [&'static Station]) -> Self {
        Self {
            station,
            peers,
            failing_startups: 0,
        }
    }

    /// Make the first `count` start-up attempts fail.
    pub fn failing_startups(mut self, count: u32) -> Self {
        self.failing_startups = count;
        self
    }
}

impl LoRaRadio for SimRadio {
    type Error = SimError;

    fn startup(&mut self) -> Result<(), SimError> {
        if self.failing_startups > 0 {
            self.failing_startups -= 1;
            return Err(SimError::NotResponding);
        }
        Ok(())
    }

    fn start_receiving(&mut self) -> Result<(), SimError> {
        Ok(())
    }

    fn receive(&mut self, buf: &mut [u8]) -> nb::Result<usize, SimError> {
        let frame = self.station.next_frame().ok_or(nb::Error::WouldBlock)?;
        let len = frame.len().min(buf.len());
        buf[..len].copy_from_slice(&frame[..len]);
        Ok(len)
    }

    fn transmit(&mut self, frame: &[u8]) -> nb::Result<(), SimError> {
        let frame: [u8; PACKET_LEN] = frame
            .try_into()
            .map_err(|_| nb::Error::Other(SimError::BadFrame(frame.len())))?;
        if self.station.on_air.swap(true, Ordering::AcqRel) {
            return Err(nb::Error::WouldBlock);
        }

        let station = self.station;
        let peers = self.peers;
        let spawned = thread::Builder::new().name("air".into()).spawn(move || {
            thread::sleep(AIR_TIME);
            for peer in peers {
                peer.hear(frame);
            }
            station.on_air.store(false, Ordering::Release);
            station.dio0(Ra02Event::TxDone);
        });
        if let Err(err) = spawned {
            self.station.on_air.store(false, Ordering::Release);
            return Err(nb::Error::Other(SimError::Air(err)));
        }
        Ok(())
    }
}

/// Logs every packet the radio object delivers
pub struct LogSink {
    node: &'static str,
}

impl LogSink {
    pub fn new(node: &'static str) -> Self {
        Self { node }
    }
}

impl PacketSink for LogSink {
    fn deliver(&mut self, packet: Packet) {
        info!(
            "{}: msg {} from node {} ({} hops left): {:02x?}",
            self.node, packet.msg_id, packet.src_id, packet.max_hops, packet.payload
        );
    }
}
