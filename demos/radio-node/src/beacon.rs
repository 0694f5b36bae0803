//! Application object that asks its radio to send a numbered beacon on
//! every tick of a periodic time event.

use freeact_active::{ActiveBehavior, ActiveContext, Outcome};
use freeact_core::{define_events, Signal, TaskContext};
use freeact_radio::{Flags, Packet, Ra02Event, MAX_HOPS, PAYLOAD_LEN};
use log::{debug, warn};

use crate::Node;

define_events! {
    pub enum BeaconEvent {
        Tick = Signal::user(0),
    }
}

pub struct Beacon {
    src_id: u8,
    dest_id: u8,
    radio: &'static Node,
    next_msg: u16,
}

impl Beacon {
    pub fn new(src_id: u8, dest_id: u8, radio: &'static Node) -> Self {
        Self {
            src_id,
            dest_id,
            radio,
            next_msg: 0,
        }
    }

    fn send(&mut self) {
        let msg_id = self.next_msg;
        self.next_msg = self.next_msg.wrapping_add(1);

        let mut payload = [0u8; PAYLOAD_LEN];
        payload[..2].copy_from_slice(&msg_id.to_be_bytes());
        payload[2..].copy_from_slice(b"PING");

        let packet = match Packet::build(
            self.src_id,
            self.dest_id,
            Flags::default(),
            MAX_HOPS,
            msg_id,
            payload,
        ) {
            Ok(packet) => packet,
            Err(err) => {
                warn!("beacon {}: {}", self.src_id, err);
                return;
            }
        };

        debug!("beacon {}: queueing msg {}", self.src_id, msg_id);
        let request = Ra02Event::TransmitRequest(packet);
        if self.radio.post(request, &mut TaskContext::new()).is_err() {
            warn!("beacon {}: radio queue full, msg {} skipped", self.src_id, msg_id);
        }
    }
}

impl ActiveBehavior for Beacon {
    type Event = BeaconEvent;
    type State = ();

    fn dispatch(
        &mut self,
        _state: (),
        event: &BeaconEvent,
        _ctx: &mut ActiveContext<'_, BeaconEvent>,
    ) -> Outcome<()> {
        match event {
            BeaconEvent::Init => Outcome::Handled,
            BeaconEvent::Tick => {
                self.send();
                Outcome::Handled
            }
        }
    }
}
