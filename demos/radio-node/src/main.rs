//! Two-node LoRa mesh on Linux (POSIX)
//!
//! Each node runs an RA-02 radio active object on a simulated transceiver
//! and a beacon active object that periodically asks the radio to send a
//! packet to the other node. Node B's transceiver fails its first start-up
//! attempts so the retry path is visible in the log.
//!
//! Run with `RUST_LOG=debug` for per-event traces. Stop with Ctrl-C.

mod beacon;
mod sim;

use std::time::Duration;

use env_logger::Builder;
use freeact_active::{ActiveObject, TimeEvent};
use freeact_core::{FaError, TaskContext};
use freeact_posix::{run, Posix, PosixError, RunConfig};
use freeact_radio::ra02::{RA02_PRIORITY, RA02_STACK_SIZE};
use freeact_radio::{Ra02, Ra02Event, Ra02State, Ra02Stats};
use log::{info, LevelFilter};
use thiserror::Error;

use beacon::{Beacon, BeaconEvent};
use sim::{LogSink, SimRadio, Station};

pub type Node = ActiveObject<Ra02<SimRadio, LogSink, Posix>, Posix, 16>;
type BeaconObject = ActiveObject<Beacon, Posix, 4>;

const NODE_A_ID: u8 = 1;
const NODE_B_ID: u8 = 2;

const BEACON_PRIORITY: u8 = 1;
const BEACON_STACK_SIZE: usize = 256;

static NODE_A: Node = ActiveObject::new("ra02-a", Ra02State::Idle);
static TX_TIMEOUT_A: TimeEvent<Ra02Event, Posix> =
    TimeEvent::one_shot(Ra02Event::TxTimeout, &NODE_A);
static RETRY_A: TimeEvent<Ra02Event, Posix> =
    TimeEvent::one_shot(Ra02Event::StartupRetry, &NODE_A);
static STATS_A: Ra02Stats = Ra02Stats::new();

static NODE_B: Node = ActiveObject::new("ra02-b", Ra02State::Idle);
static TX_TIMEOUT_B: TimeEvent<Ra02Event, Posix> =
    TimeEvent::one_shot(Ra02Event::TxTimeout, &NODE_B);
static RETRY_B: TimeEvent<Ra02Event, Posix> =
    TimeEvent::one_shot(Ra02Event::StartupRetry, &NODE_B);
static STATS_B: Ra02Stats = Ra02Stats::new();

static STATION_A: Station = Station::new(&NODE_A);
static STATION_B: Station = Station::new(&NODE_B);
static PEERS_OF_A: [&Station; 1] = [&STATION_B];
static PEERS_OF_B: [&Station; 1] = [&STATION_A];

static BEACON_A: BeaconObject = ActiveObject::new("beacon-a", ());
static BEACON_TICK_A: TimeEvent<BeaconEvent, Posix> =
    TimeEvent::periodic(BeaconEvent::Tick, &BEACON_A);
static BEACON_B: BeaconObject = ActiveObject::new("beacon-b", ());
static BEACON_TICK_B: TimeEvent<BeaconEvent, Posix> =
    TimeEvent::periodic(BeaconEvent::Tick, &BEACON_B);

#[derive(Debug, Error)]
enum DemoError {
    #[error("runtime: {0}")]
    Runtime(#[from] FaError),
    #[error(transparent)]
    Host(#[from] PosixError),
}

fn stack(size: usize) -> &'static mut [u8] {
    Box::leak(vec![0u8; size].into_boxed_slice())
}

fn report() {
    use std::sync::atomic::{AtomicU32, Ordering};
    static IDLE_RUNS: AtomicU32 = AtomicU32::new(0);

    // Every 10 s at the configured idle period
    if IDLE_RUNS.fetch_add(1, Ordering::Relaxed) % 5 == 4 {
        info!("node-a {:?}", STATS_A.snapshot());
        info!("node-b {:?}", STATS_B.snapshot());
    }
}

fn main() -> Result<(), DemoError> {
    Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    info!("FreeAct {} two-node radio demo", freeact_core::VERSION);

    let radio_a = SimRadio::new(&STATION_A, &PEERS_OF_A);
    NODE_A.start(
        Ra02::new(radio_a, LogSink::new("node-a"), &TX_TIMEOUT_A, &RETRY_A, &STATS_A),
        RA02_PRIORITY,
        stack(RA02_STACK_SIZE),
    )?;

    let radio_b = SimRadio::new(&STATION_B, &PEERS_OF_B).failing_startups(2);
    NODE_B.start(
        Ra02::new(radio_b, LogSink::new("node-b"), &TX_TIMEOUT_B, &RETRY_B, &STATS_B)
            .with_retry_delay(Duration::from_millis(500)),
        RA02_PRIORITY,
        stack(RA02_STACK_SIZE),
    )?;

    BEACON_A.start(
        Beacon::new(NODE_A_ID, NODE_B_ID, &NODE_A),
        BEACON_PRIORITY,
        stack(BEACON_STACK_SIZE),
    )?;
    BEACON_B.start(
        Beacon::new(NODE_B_ID, NODE_A_ID, &NODE_B),
        BEACON_PRIORITY,
        stack(BEACON_STACK_SIZE),
    )?;

    let mut task = TaskContext::new();
    BEACON_TICK_A.arm(Duration::from_secs(2), &mut task);
    BEACON_TICK_B.arm(Duration::from_millis(3100), &mut task);

    run(RunConfig::builder()
        .idle_callback(report)
        .idle_period(Duration::from_secs(2))
        .build())?;
    Ok(())
}
