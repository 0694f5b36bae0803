//! Free-node bookkeeping for the event queue.
//!
//! Nodes that have never been handed out are taken from a bump index, so an
//! empty pool needs no initialisation pass and can be built in a `const`
//! context. Nodes returned by the consumer go onto a lock-free stack whose
//! head carries a 16-bit generation tag next to the node index, so a
//! producer that raced with another allocation cannot install a stale link.
//!
//! A node index is handed out again only after it has been released: the
//! bump index gives out every fresh index exactly once and the stack only
//! contains released nodes.

use core::sync::atomic::{AtomicU16, AtomicU32, AtomicUsize, Ordering};

use crate::QueueStats;

/// Index value meaning "no node"
pub(crate) const NIL: u16 = u16::MAX;

const INDEX_MASK: u32 = 0xFFFF;

#[inline]
const fn pack(tag: u16, index: u16) -> u32 {
    ((tag as u32) << 16) | index as u32
}

#[inline]
const fn unpack(word: u32) -> (u16, u16) {
    ((word >> 16) as u16, (word & INDEX_MASK) as u16)
}

/// Allocation state for `N` nodes.
///
/// The free stack links through each node's `next` field, which is unused
/// while the node is free. The caller supplies access to it via `link`.
pub(crate) struct NodePool<const N: usize> {
    /// Tagged head of the released-node stack
    free: AtomicU32,
    /// Next never-used node index
    fresh: AtomicU16,
    /// Upper bound on allocatable nodes, for statistics
    available: AtomicUsize,
    /// Lowest value `available` has reached
    min_available: AtomicUsize,
}

impl<const N: usize> NodePool<N> {
    pub(crate) const fn new() -> Self {
        Self {
            free: AtomicU32::new(pack(0, NIL)),
            fresh: AtomicU16::new(0),
            available: AtomicUsize::new(N),
            min_available: AtomicUsize::new(N),
        }
    }

    /// Take a node that no one else owns. Safe from any number of producers.
    pub(crate) fn alloc<'a>(&'a self, link: impl Fn(u16) -> &'a AtomicU16) -> Option<u16> {
        let index = self.alloc_fresh().or_else(|| self.pop_free(&link))?;

        let left = self.available.fetch_sub(1, Ordering::Relaxed) - 1;
        self.min_available.fetch_min(left, Ordering::Relaxed);
        Some(index)
    }

    /// Return a node taken by [`alloc`](Self::alloc).
    ///
    /// Only the queue's consumer releases nodes.
    pub(crate) fn release<'a>(&'a self, index: u16, link: impl Fn(u16) -> &'a AtomicU16) {
        // Counted before the push so a producer popping this node never
        // drives the counter below zero.
        self.available.fetch_add(1, Ordering::Relaxed);

        let next = link(index);
        let mut head = self.free.load(Ordering::Relaxed);
        loop {
            let (tag, top) = unpack(head);
            next.store(top, Ordering::Relaxed);
            match self.free.compare_exchange_weak(
                head,
                pack(tag.wrapping_add(1), index),
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(current) => head = current,
            }
        }
    }

    pub(crate) fn stats(&self) -> QueueStats {
        QueueStats {
            capacity: N,
            free: self.available.load(Ordering::Relaxed),
            min_free: self.min_available.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn has_free(&self) -> bool {
        self.available.load(Ordering::Relaxed) > 0
    }

    fn alloc_fresh(&self) -> Option<u16> {
        self.fresh
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |next| {
                ((next as usize) < N).then(|| next + 1)
            })
            .ok()
    }

    fn pop_free<'a>(&'a self, link: &impl Fn(u16) -> &'a AtomicU16) -> Option<u16> {
        let mut head = self.free.load(Ordering::Acquire);
        loop {
            let (tag, top) = unpack(head);
            if top == NIL {
                return None;
            }
            // May read a link rewritten by a competing allocation; the tag
            // makes the exchange below fail in that case.
            let next = link(top).load(Ordering::Relaxed);
            match self.free.compare_exchange_weak(
                head,
                pack(tag.wrapping_add(1), next),
                Ordering::Acquire,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(top),
                Err(current) => head = current,
            }
        }
    }
}
