//! Active object lifecycle and dispatch.
//!
//! An [`ActiveObject`] is constructed in a `static` with only its name and
//! initial state. [`ActiveObject::start`] supplies the behavior, priority
//! and stack, and spawns the thread that runs the event loop: dispatch the
//! reserved INIT event once, then repeatedly drain the queue and sleep on
//! the semaphore until a producer posts again.

use core::fmt;
use core::marker::PhantomData;
use core::sync::atomic::{fence, AtomicBool, AtomicU8, Ordering};

use freeact_core::{
    fa_assert, fa_error, Event, ExecContext, FaResult, Port, Semaphore, TaskContext, ThreadSpec,
    Timeout,
};
use freeact_queue::{EventQueue, QueueFull, QueueStats};
use log::{debug, trace, warn};

/// Result of dispatching one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome<S> {
    /// Event consumed, state unchanged
    Handled,
    /// Event not meaningful in the current state
    Ignored,
    /// Event consumed, make `S` the current state
    Transition(S),
}

/// Application state machine plugged into an active object.
///
/// States form a flat set of identifiers. The current state is owned by the
/// active object's thread and replaced only when `dispatch` returns
/// [`Outcome::Transition`].
pub trait ActiveBehavior: Send + 'static {
    type Event: Event;
    type State: Copy + fmt::Debug + Send + Sync + 'static;

    fn dispatch(
        &mut self,
        state: Self::State,
        event: &Self::Event,
        ctx: &mut ActiveContext<'_, Self::Event>,
    ) -> Outcome<Self::State>;
}

/// Anything events of type `E` can be sent to from a thread.
pub trait Recipient<E>: Sync {
    fn name(&self) -> &'static str;

    /// Post from task context; hands the event back if the queue is full
    fn send(&self, event: E) -> Result<(), QueueFull<E>>;
}

/// Per-dispatch context passed to state handlers.
pub struct ActiveContext<'a, E> {
    name: &'static str,
    priority: u8,
    owner: &'a dyn Recipient<E>,
}

impl<'a, E> ActiveContext<'a, E> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// Queue an event to the active object being dispatched.
    ///
    /// Delivered after the current dispatch returns and after any events
    /// already waiting.
    pub fn post_self(&self, event: E) -> Result<(), QueueFull<E>> {
        self.owner.send(event)
    }

    /// The active object being dispatched, for handing to other components
    pub fn recipient(&self) -> &'a dyn Recipient<E> {
        self.owner
    }
}

/// An active object with a queue of `N` events, hosted by port `P`.
pub struct ActiveObject<B: ActiveBehavior, P: Port, const N: usize> {
    name: &'static str,
    initial: B::State,
    queue: EventQueue<B::Event, N>,
    behavior: spin::Mutex<Option<B>>,
    semaphore: spin::Once<P::Semaphore>,
    thread: spin::Once<P::Thread>,
    priority: AtomicU8,
    started: AtomicBool,
    _port: PhantomData<fn() -> P>,
}

impl<B: ActiveBehavior, P: Port, const N: usize> ActiveObject<B, P, N> {
    /// Bind the initial state. Performs no I/O and no allocation.
    pub const fn new(name: &'static str, initial: B::State) -> Self {
        Self {
            name,
            initial,
            queue: EventQueue::new(),
            behavior: spin::Mutex::new(None),
            semaphore: spin::Once::new(),
            thread: spin::Once::new(),
            priority: AtomicU8::new(0),
            started: AtomicBool::new(false),
            _port: PhantomData,
        }
    }

    /// Spawn the event loop thread on `stack` at `priority`.
    ///
    /// May be called once. Events posted before this call are delivered
    /// after INIT.
    pub fn start(
        &'static self,
        behavior: B,
        priority: u8,
        stack: &'static mut [u8],
    ) -> FaResult<()> {
        fa_assert!(!self.started.swap(true, Ordering::AcqRel));
        fa_assert!(priority > 0);

        *self.behavior.lock() = Some(behavior);
        self.priority.store(priority, Ordering::Release);
        self.semaphore.call_once(P::Semaphore::new);
        // Pairs with the fence in `post`: a producer either sees the
        // semaphore or its event is visible to the first drain.
        fence(Ordering::SeqCst);

        let spec = ThreadSpec {
            name: self.name,
            priority,
            stack,
        };
        debug!("{}: starting at priority {} with queue depth {}", self.name, priority, N);

        let thread = P::spawn(spec, Self::event_loop, self)?;
        self.thread.call_once(|| thread);
        Ok(())
    }

    /// Post an event from a thread or, with an [`IsrContext`](freeact_core::IsrContext),
    /// from an interrupt handler.
    ///
    /// Never blocks. When the queue is full the event is handed back.
    /// From an interrupt, records on `ctx` whether the post readied a
    /// higher-priority thread.
    pub fn post<C: ExecContext>(
        &self,
        event: B::Event,
        ctx: &mut C,
    ) -> Result<(), QueueFull<B::Event>> {
        fa_assert!(P::in_interrupt() == C::IN_ISR);

        self.queue.enqueue(event)?;
        fence(Ordering::SeqCst);
        if let Some(semaphore) = self.semaphore.get() {
            if C::IN_ISR {
                ctx.request_switch(semaphore.give_from_isr());
            } else {
                semaphore.give();
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Priority given at start, 0 before that
    pub fn priority(&self) -> u8 {
        self.priority.load(Ordering::Acquire)
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Kernel handle of the event loop thread, once started
    pub fn thread(&self) -> Option<&P::Thread> {
        self.thread.get()
    }

    /// Occupancy statistics of the event queue
    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }

    fn event_loop(this: &'static Self) -> ! {
        let Some(mut behavior) = this.behavior.lock().take() else {
            fa_error!()
        };
        let Some(mut rx) = this.queue.consumer() else {
            fa_error!()
        };
        let Some(semaphore) = this.semaphore.get() else {
            fa_error!()
        };

        let mut ctx = ActiveContext {
            name: this.name,
            priority: this.priority(),
            owner: this,
        };
        let mut state = this.initial;

        this.dispatch(&mut behavior, &mut state, &B::Event::init(), &mut ctx);
        loop {
            while let Some(event) = rx.dequeue() {
                this.dispatch(&mut behavior, &mut state, &event, &mut ctx);
            }
            semaphore.take(Timeout::Forever);
        }
    }

    fn dispatch(
        &self,
        behavior: &mut B,
        state: &mut B::State,
        event: &B::Event,
        ctx: &mut ActiveContext<'_, B::Event>,
    ) {
        trace!("{}: {} in {:?}", self.name, event.signal(), state);

        match behavior.dispatch(*state, event, ctx) {
            Outcome::Handled => {}
            Outcome::Ignored => warn!("{}: {} ignored in {:?}", self.name, event.signal(), state),
            Outcome::Transition(next) => {
                debug!("{}: {:?} -> {:?}", self.name, state, next);
                *state = next;
            }
        }
    }
}

impl<B: ActiveBehavior, P: Port, const N: usize> Recipient<B::Event> for ActiveObject<B, P, N> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn send(&self, event: B::Event) -> Result<(), QueueFull<B::Event>> {
        self.post(event, &mut TaskContext::new())
    }
}

impl<B: ActiveBehavior, P: Port, const N: usize> fmt::Debug for ActiveObject<B, P, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveObject")
            .field("name", &self.name)
            .field("priority", &self.priority())
            .field("started", &self.is_started())
            .field("queue", &self.queue)
            .finish()
    }
}
