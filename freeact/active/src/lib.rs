#![cfg_attr(not(any(test, feature = "std")), no_std)]

//! # FreeAct Active Objects
//!
//! An active object owns one thread, one event queue and a current state.
//! Producers post events into its queue from threads or interrupt handlers;
//! its thread dispatches them one at a time to the behavior installed at
//! start. Time events turn timer expiry into ordinary posted events.

pub mod active;
pub mod time;

pub use active::{ActiveBehavior, ActiveContext, ActiveObject, Outcome, Recipient};
pub use freeact_queue::{QueueFull, QueueStats};
pub use time::{tick_from_isr, TimeEvent};
