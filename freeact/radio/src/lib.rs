#![cfg_attr(not(any(test, feature = "std")), no_std)]

//! # FreeAct Radio
//!
//! Mesh packet codec and an active object driving an RA-02 (SX1278) LoRa
//! transceiver. The transceiver itself is reached through [`LoRaRadio`], so
//! the same active object runs against real hardware or a simulation.

pub mod packet;
pub mod ra02;
pub mod radio;

pub use packet::{crc16, Flags, Packet, PacketError, BROADCAST_ID, MAX_HOPS, PACKET_LEN, PAYLOAD_LEN};
pub use ra02::{Ra02, Ra02Counters, Ra02Event, Ra02State, Ra02Stats};
pub use radio::{LoRaRadio, PacketSink};
