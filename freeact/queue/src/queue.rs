//! Intrusive multi-producer single-consumer queue over a fixed node pool

use core::cell::UnsafeCell;
use core::fmt;
use core::mem::MaybeUninit;
use core::ptr;
use core::sync::atomic::{AtomicBool, AtomicU16, Ordering};

use crate::pool::{NodePool, NIL};
use crate::{QueueFull, QueueStats};

struct Node<T> {
    next: AtomicU16,
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Node<T> {
    const fn new() -> Self {
        Self {
            next: AtomicU16::new(NIL),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }
}

/// Bounded lock-free event queue with `N` usable nodes.
///
/// Producers push at the head with one atomic exchange and one store;
/// the single consumer pops from the tail. A stub node that never carries
/// an item keeps the tail valid when the queue runs empty. Items are stored
/// by value in the node that carries them and moved out on dequeue.
///
/// `enqueue` never blocks and may be called from interrupt handlers.
/// Dequeuing requires the [`Consumer`] handle, of which there is exactly one.
pub struct EventQueue<T, const N: usize> {
    nodes: [Node<T>; N],
    stub: Node<T>,
    /// Most recently pushed node
    head: AtomicU16,
    /// Oldest node not yet consumed; touched by the consumer only
    tail: AtomicU16,
    pool: NodePool<N>,
    consumer_taken: AtomicBool,
}

// SAFETY: a node's value is written only by the producer that allocated it
// and read only by the consumer after the link publishing it was observed.
unsafe impl<T: Send, const N: usize> Sync for EventQueue<T, N> {}
unsafe impl<T: Send, const N: usize> Send for EventQueue<T, N> {}

impl<T, const N: usize> EventQueue<T, N> {
    /// Index of the stub node
    const STUB: u16 = {
        assert!(N > 0, "queue capacity must be non-zero");
        assert!(N < NIL as usize, "queue capacity must fit in a 16-bit node index");
        N as u16
    };

    /// Create an empty queue
    pub const fn new() -> Self {
        Self {
            nodes: [const { Node::new() }; N],
            stub: Node::new(),
            head: AtomicU16::new(Self::STUB),
            tail: AtomicU16::new(Self::STUB),
            pool: NodePool::new(),
            consumer_taken: AtomicBool::new(false),
        }
    }

    /// Claim the consumer side. Only the first call returns a handle.
    pub fn consumer(&self) -> Option<Consumer<'_, T, N>> {
        self.consumer_taken
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Consumer { queue: self })
    }

    /// Append `item`, or hand it back if no node is free.
    ///
    /// Lock-free and non-blocking; callable from any thread or interrupt.
    pub fn enqueue(&self, item: T) -> Result<(), QueueFull<T>> {
        let Some(index) = self.pool.alloc(|i| &self.node(i).next) else {
            return Err(QueueFull(item));
        };

        let node = self.node(index);
        // SAFETY: the pool hands `index` to this producer alone until the
        // consumer releases it.
        unsafe { (*node.value.get()).write(item) };
        node.next.store(NIL, Ordering::Relaxed);
        self.push(index);
        Ok(())
    }

    /// Number of items in flight. Point-in-time estimate.
    pub fn len(&self) -> usize {
        N - self.pool.stats().free
    }

    /// Best-effort emptiness check
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Best-effort check that an enqueue could succeed right now
    pub fn has_free_capacity(&self) -> bool {
        self.pool.has_free()
    }

    /// Number of usable nodes
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Pool occupancy statistics
    pub fn stats(&self) -> QueueStats {
        self.pool.stats()
    }

    #[inline]
    fn node(&self, index: u16) -> &Node<T> {
        if index == Self::STUB {
            &self.stub
        } else {
            &self.nodes[usize::from(index)]
        }
    }

    fn push(&self, index: u16) {
        let prev = self.head.swap(index, Ordering::AcqRel);
        self.node(prev).next.store(index, Ordering::Release);
    }

    /// Detach the oldest linked node.
    ///
    /// Returns `None` when empty, and also while the producer that pushed
    /// the newest node has not linked it yet; that producer wakes the
    /// consumer once it has.
    ///
    /// # Safety
    ///
    /// Must only be called by the single consumer.
    unsafe fn pop(&self) -> Option<u16> {
        let mut tail = self.tail.load(Ordering::Relaxed);
        let mut next = self.node(tail).next.load(Ordering::Acquire);

        if tail == Self::STUB {
            if next == NIL {
                return None;
            }
            self.tail.store(next, Ordering::Relaxed);
            tail = next;
            next = self.node(tail).next.load(Ordering::Acquire);
        }

        if next != NIL {
            self.tail.store(next, Ordering::Relaxed);
            return Some(tail);
        }

        if tail != self.head.load(Ordering::Acquire) {
            return None;
        }

        // `tail` is the last node; put the stub behind it so it can be
        // detached without leaving the list headless.
        self.stub.next.store(NIL, Ordering::Relaxed);
        self.push(Self::STUB);

        next = self.node(tail).next.load(Ordering::Acquire);
        if next != NIL {
            self.tail.store(next, Ordering::Relaxed);
            return Some(tail);
        }
        None
    }

    /// # Safety
    ///
    /// Must only be called by the single consumer.
    unsafe fn dequeue_unchecked(&self) -> Option<T> {
        let index = self.pop()?;
        let node = self.node(index);
        // SAFETY: popped nodes other than the stub carry an initialised item
        // and are owned by the consumer until released.
        let item = ptr::read(node.value.get()).assume_init();
        self.pool.release(index, |i| &self.node(i).next);
        Some(item)
    }
}

impl<T, const N: usize> Default for EventQueue<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Drop for EventQueue<T, N> {
    fn drop(&mut self) {
        // SAFETY: `&mut self` excludes every producer and consumer.
        while unsafe { self.dequeue_unchecked() }.is_some() {}
    }
}

impl<T, const N: usize> fmt::Debug for EventQueue<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventQueue")
            .field("capacity", &N)
            .field("len", &self.len())
            .finish()
    }
}

/// The consumer side of an [`EventQueue`].
pub struct Consumer<'q, T, const N: usize> {
    queue: &'q EventQueue<T, N>,
}

impl<'q, T, const N: usize> Consumer<'q, T, N> {
    /// Take the oldest item, or `None` if there is nothing to deliver yet
    pub fn dequeue(&mut self) -> Option<T> {
        // SAFETY: `Consumer` is unique per queue and `&mut self` serialises
        // calls through it.
        unsafe { self.queue.dequeue_unchecked() }
    }

    /// The queue this handle consumes from
    pub fn queue(&self) -> &'q EventQueue<T, N> {
        self.queue
    }
}

impl<T, const N: usize> fmt::Debug for Consumer<'_, T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer").field("queue", self.queue).finish()
    }
}
