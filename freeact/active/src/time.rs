//! Time events.
//!
//! A time event binds an event value and an owning active object to a
//! kernel timer. Expiry runs in the timer service's deferred context and
//! posts a copy of the event through the owner's ordinary task-context
//! post, so application code only ever sees timeouts on its own thread.

use core::fmt;
use core::marker::PhantomData;
use core::time::Duration;

use freeact_core::{
    fa_assert, fa_error, Event, ExecContext, Expiry, IsrContext, Port, Ticks, Timer, TimerKind,
};
use log::{trace, warn};

use crate::Recipient;

/// One-shot or periodic timeout delivered as an event.
pub struct TimeEvent<E: 'static, P: Port> {
    event: E,
    owner: &'static dyn Recipient<E>,
    kind: TimerKind,
    timer: P::Timer,
    _port: PhantomData<fn() -> P>,
}

impl<E, P> TimeEvent<E, P>
where
    E: Event + Clone + Sync,
    P: Port,
{
    /// A time event that fires once per arm
    pub const fn one_shot(event: E, owner: &'static dyn Recipient<E>) -> Self {
        Self::new(event, owner, TimerKind::OneShot)
    }

    /// A time event that fires every period until disarmed
    pub const fn periodic(event: E, owner: &'static dyn Recipient<E>) -> Self {
        Self::new(event, owner, TimerKind::Periodic)
    }

    /// Bind the event and owner to a dormant kernel timer of `kind`
    const fn new(event: E, owner: &'static dyn Recipient<E>, kind: TimerKind) -> Self {
        Self {
            event,
            owner,
            kind,
            timer: match kind {
                TimerKind::OneShot => <P::Timer as Timer>::ONE_SHOT,
                TimerKind::Periodic => <P::Timer as Timer>::PERIODIC,
            },
            _port: PhantomData,
        }
    }

    /// Start (or restart) the timer with `duration` as delay and period.
    ///
    /// Durations shorter than one tick arm for one tick.
    pub fn arm<C: ExecContext>(&'static self, duration: Duration, ctx: &mut C) {
        fa_assert!(P::in_interrupt() == C::IN_ISR);

        let ticks = Ticks::from_duration(duration, P::TICK_RATE_HZ);
        trace!("{}: arming {} for {}", self.owner.name(), self.event.signal(), ticks);
        let started = if C::IN_ISR {
            self.timer
                .start_from_isr(ticks, self)
                .map(|woken| ctx.request_switch(woken))
        } else {
            self.timer.start(ticks, self)
        };
        if started.is_err() {
            fa_error!();
        }
    }

    /// Stop the timer. Disarming an idle time event does nothing.
    pub fn disarm<C: ExecContext>(&self, ctx: &mut C) {
        fa_assert!(P::in_interrupt() == C::IN_ISR);

        let stopped = if C::IN_ISR {
            self.timer.stop_from_isr().map(|woken| ctx.request_switch(woken))
        } else {
            self.timer.stop()
        };
        if stopped.is_err() {
            fa_error!();
        }
    }

    /// True while the timer is counting down
    pub fn is_armed(&self) -> bool {
        self.timer.is_active()
    }

    pub fn kind(&self) -> TimerKind {
        self.kind
    }

    /// The event delivered on expiry
    pub fn event(&self) -> &E {
        &self.event
    }
}

impl<E, P> Expiry for TimeEvent<E, P>
where
    E: Event + Clone + Sync,
    P: Port,
{
    fn expired(&'static self) {
        if self.owner.send(self.event.clone()).is_err() {
            warn!(
                "{}: queue full, {} timeout dropped",
                self.owner.name(),
                self.event.signal()
            );
        }
    }
}

impl<E: Event, P: Port> fmt::Debug for TimeEvent<E, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeEvent")
            .field("signal", &self.event.signal())
            .field("owner", &self.owner.name())
            .field("kind", &self.kind)
            .finish()
    }
}

/// Advance the time base of port `P` by one tick.
///
/// Called from the periodic tick interrupt.
pub fn tick_from_isr<P: Port>(ctx: &mut IsrContext) {
    fa_assert!(P::in_interrupt());
    P::tick_from_isr(ctx);
}
