//! Event tests for freeact-core
//! These tests run on x86 host with std for testing, but verify no_std compatible code

use freeact_core::{define_events, Event, Signal};

const SIG_PRESSED: Signal = Signal::user(0);
const SIG_RELEASED: Signal = Signal::user(1);
const SIG_LEVEL: Signal = Signal::user(2);

define_events! {
    /// Events of a button debouncer
    #[derive(PartialEq)]
    pub enum ButtonEvent {
        Pressed = SIG_PRESSED,
        Released = SIG_RELEASED,
        Level(u8) = SIG_LEVEL,
    }
}

#[test]
fn test_init_is_first_variant() {
    let init = ButtonEvent::init();
    assert_eq!(init, ButtonEvent::Init);
    assert_eq!(init.signal(), Signal::INIT);
    assert!(init.is_reserved());
}

#[test]
fn test_user_signals() {
    assert_eq!(ButtonEvent::Pressed.signal(), SIG_PRESSED);
    assert_eq!(ButtonEvent::Released.signal(), SIG_RELEASED);
    assert_eq!(ButtonEvent::Level(3).signal(), SIG_LEVEL);
    assert!(!ButtonEvent::Level(3).is_reserved());
}

#[test]
fn test_signal_equality() {
    assert_eq!(Signal::new(42), Signal::from(42));
    assert_ne!(SIG_PRESSED, SIG_RELEASED);
    assert!(SIG_PRESSED < SIG_LEVEL);
}

#[test]
fn test_events_are_values() {
    let original = ButtonEvent::Level(9);
    let copy = original.clone();
    assert_eq!(original, copy);
}
