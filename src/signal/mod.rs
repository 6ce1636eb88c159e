//! A reentrant, synchronous signal/slot dispatcher
//!
//! A [`Signal`] keeps its connections in an intrusive [`RawList`] and walks
//! that list on every [`Signal::emit()`]. Slots may connect, disconnect, or
//! re-emit while an emission is running: each emission registers an
//! iteration token on the signal, and every removal of a connection repairs
//! the cursors of the tokens currently on the call stack.

use alloc::{boxed::Box, rc::Rc};
use core::{cell::Cell, fmt, marker::PhantomData, pin::pin, ptr::NonNull};

use mutex::{BlockingMutex, ConstInit, ScopedRawMutex};
use tracing::{debug, trace};

use crate::{
    impl_linked,
    intrusive::{Linked, Links, RawList, next_of, prev_of},
};

mod connection;
mod emission;

#[cfg(test)]
mod tests;

pub use connection::Connection;
use emission::{Emission, IterationToken};

/// The tag of the [`Links`] that thread connections onto their signal.
pub enum ConnectionTag {}

/// A list of slots that all get called, in connection order, on every
/// [`emit()`](Self::emit).
///
/// `R` is the [`ScopedRawMutex`] guarding the signal's bookkeeping. The
/// lock is only held for short sections and never while a slot runs, so
/// slots are free to call back into the signal. `A` is the argument type
/// each slot receives by reference.
///
/// Connections borrow the signal for `'s`, so the signal cannot move or be
/// dropped while any [`Connection`] to it exists.
pub struct Signal<'s, R: ScopedRawMutex, A: ?Sized> {
    pub(crate) inner: BlockingMutex<R, SignalInner>,
    _slots: PhantomData<(fn(&'s ()) -> &'s (), fn(&A))>,
}

/// The inner core of [`Signal`] which is only accessible with the mutex
/// locked.
pub(crate) struct SignalInner {
    connections: RawList<ConnectionTag>,
    /// Active emissions, innermost first.
    emissions: cordyceps::List<IterationToken>,
    next_serial: u64,
}

/// The part of a connection node the untyped [`SignalInner`] sees.
#[repr(C)]
pub(crate) struct ConnectionHeader {
    links: Links<ConnectionTag>,
    serial: u64,
}

impl_linked!(ConnectionHeader, links, ConnectionTag);

type Slot<'s, A> = dyn Fn(&A) + 's;

/// A heap allocated connection record.
///
/// The header comes first so a `NonNull<ConnectionHeader>` taken from the
/// list can be cast back to the full node.
#[repr(C)]
pub(crate) struct ConnectionNode<'s, A: ?Sized> {
    header: ConnectionHeader,
    slot: Cell<Option<Rc<Slot<'s, A>>>>,
}

// ---- impl Signal ----

impl<'s, R: ScopedRawMutex + ConstInit, A: ?Sized> Signal<'s, R, A> {
    /// Create a new [`Signal`].
    ///
    /// Requires that the mutex implements the [`ConstInit`] trait.
    pub fn new() -> Self {
        Self {
            inner: BlockingMutex::new(SignalInner::new()),
            _slots: PhantomData,
        }
    }
}

impl<'s, R: ScopedRawMutex, A: ?Sized> Signal<'s, R, A> {
    /// Create a new [`Signal`] with a given [`ScopedRawMutex`].
    ///
    /// Mainly useful when your mutex cannot be created in const context.
    pub fn new_manual(r: R) -> Self {
        Self {
            inner: BlockingMutex::const_new(r, SignalInner::new()),
            _slots: PhantomData,
        }
    }

    /// Connect `slot` at the end of the list of slots.
    ///
    /// The slot stays connected until the returned [`Connection`] is
    /// disconnected or dropped, or the signal is [closed](Self::close).
    /// A slot connected while an emission is running is not called by that
    /// emission.
    pub fn connect<F>(&'s self, slot: F) -> Connection<'s, R, A>
    where
        F: Fn(&A) + 's,
    {
        let slot: Rc<Slot<'s, A>> = Rc::new(slot);
        let node = self.inner.with_lock(|inner| {
            let serial = inner.next_serial;
            inner.next_serial += 1;
            let node = NonNull::from(Box::leak(Box::new(ConnectionNode {
                header: ConnectionHeader {
                    links: Links::new(),
                    serial,
                },
                slot: Cell::new(Some(slot)),
            })));
            trace!(serial, "signal: connect");
            // Safety: the node is boxed, so it never moves, and it is only
            // freed by `Connection::disconnect` after it has been unlinked.
            unsafe { inner.push(node.cast()) };
            node
        });
        Connection::new(self, node)
    }

    /// Call every connected slot with `args`, in connection order.
    ///
    /// Slots connected during the call are not invoked by it. Slots
    /// disconnected during the call are not invoked once removed. A slot may
    /// emit the same signal again; the nested emission runs to completion
    /// before the outer one resumes.
    ///
    /// If a slot panics, the panic propagates out of `emit` and the signal
    /// stays usable.
    pub fn emit(&self, args: &A) {
        let mut emission = pin!(Emission::new(&self.inner));
        let token = emission.as_mut().start();

        loop {
            let slot = self.inner.with_lock(|inner| {
                // Safety: `token` is pinned in `emission`, which outlives
                // this loop.
                let header = unsafe { inner.advance(token) }?;
                // Safety: every node on this signal's list is the header of a
                // `ConnectionNode<'s, A>` created by `connect`.
                let node = unsafe { header.cast::<ConnectionNode<'s, A>>().as_ref() };
                node.clone_slot()
            });
            let Some(slot) = slot else {
                break;
            };
            slot(args);
        }
    }

    /// Tear the signal down while keeping it in place.
    ///
    /// Every emission currently running stops before calling its next slot,
    /// and every connection is detached and its slot dropped. The
    /// [`Connection`] handles stay valid but report not connected.
    ///
    /// The signal can be connected to and emitted again afterwards.
    pub fn close(&self) {
        let stopped = self.inner.with_lock(|inner| inner.invalidate_emissions());
        let mut dropped = 0usize;
        loop {
            let slot: Option<Option<Rc<Slot<'s, A>>>> =
                self.inner.with_lock(|inner| inner.detach_first());
            let Some(slot) = slot else {
                break;
            };
            // slot destructors run unlocked, they may call back into us
            drop(slot);
            dropped += 1;
        }
        debug!(stopped, dropped, "signal: closed");
    }

    /// Returns `true` if no slot is connected.
    pub fn is_empty(&self) -> bool {
        self.inner.with_lock(|inner| inner.connections.is_empty())
    }

    /// Returns the number of connected slots.
    pub fn len(&self) -> usize {
        self.inner.with_lock(|inner| inner.connections.len())
    }

    /// Returns `true` while an emission of this signal is on the call stack.
    pub fn is_emitting(&self) -> bool {
        self.inner.with_lock(|inner| !inner.emissions.is_empty())
    }
}

impl<R: ScopedRawMutex + ConstInit, A: ?Sized> Default for Signal<'_, R, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ScopedRawMutex, A: ?Sized> fmt::Debug for Signal<'_, R, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (len, emissions) = self.inner.with_lock(|inner| {
            (inner.connections.len(), inner.emissions.len())
        });
        f.debug_struct("Signal")
            .field("connections", &len)
            .field("emissions", &emissions)
            .finish()
    }
}

// ---- impl SignalInner ----

impl SignalInner {
    fn new() -> Self {
        Self {
            connections: RawList::new(),
            emissions: cordyceps::List::new(),
            next_serial: 0,
        }
    }

    /// Link a connection at the tail.
    ///
    /// # Safety
    ///
    /// `node` must point to an unlinked header that stays put until it is
    /// unlinked again.
    unsafe fn push(&mut self, node: NonNull<ConnectionHeader>) {
        // Safety: forwarded to the caller.
        unsafe {
            let links = ConnectionHeader::links(node);
            self.connections.insert_before(self.connections.end(), links);
        }
    }

    /// Unlink a connection, repairing the cursors of running emissions.
    ///
    /// No-op if the connection is not linked.
    ///
    /// # Safety
    ///
    /// `node` must point to a live header that is unlinked or linked into
    /// this signal.
    pub(crate) unsafe fn remove(&mut self, node: NonNull<ConnectionHeader>) {
        // Safety: the caller guarantees `node` is live.
        let links = unsafe { ConnectionHeader::links(node) };
        if !unsafe { links.as_ref() }.is_linked() {
            return;
        }

        // Safety: `links` was just checked to be linked into this signal.
        let prev = unsafe { prev_of(links) };
        for token in self.emissions.iter() {
            if token.cursor.get() == Some(links) {
                // the next advance lands on the node after `node`
                token.cursor.set(Some(prev));
            }
        }
        // Safety: `node` is linked, and only ever into this signal.
        unsafe { self.connections.erase(links) };
    }

    /// Put a new emission on the stack, starting before the first
    /// connection and bounded by the connections that exist right now.
    fn register(&mut self, token: NonNull<IterationToken>) {
        // Safety: the token is pinned by its `Emission`, which removes it
        // again on drop.
        let t = unsafe { token.as_ref() };
        t.cursor.set(Some(self.connections.end()));
        t.limit.set(self.next_serial);
        t.live.set(true);
        self.emissions.push_front(token);
    }

    /// Take an emission off the stack, unless `close` already did.
    fn unregister(&mut self, token: NonNull<IterationToken>) {
        // Safety: see `register`.
        let t = unsafe { token.as_ref() };
        if !t.live.replace(false) {
            return;
        }
        // Safety: a live token is on this signal's stack.
        unsafe { self.emissions.remove(token) };
    }

    /// Move `token` to the next connection to call, if any.
    ///
    /// # Safety
    ///
    /// `token` must be pinned and registered with this signal (or
    /// invalidated by it).
    unsafe fn advance(&self, token: NonNull<IterationToken>) -> Option<NonNull<ConnectionHeader>> {
        // Safety: guaranteed by the caller.
        let t = unsafe { token.as_ref() };
        if !t.live.get() {
            return None;
        }
        // Safety: a live token's cursor is the sentinel or a connection
        // still linked here; removals back it up before unlinking.
        let next = unsafe { next_of(t.cursor.get()?) };
        if next == self.connections.end() {
            return None;
        }
        // Safety: every non-sentinel node on this list is a `ConnectionHeader`.
        let header = unsafe { ConnectionHeader::from_links(next) };
        // serials grow along the list, so everything from here on is newer
        if unsafe { header.as_ref() }.serial >= t.limit.get() {
            return None;
        }
        t.cursor.set(Some(next));
        Some(header)
    }

    /// Stop every running emission and clear the stack. Returns how many
    /// were stopped.
    fn invalidate_emissions(&mut self) -> usize {
        let mut stopped = 0;
        while let Some(token) = self.emissions.pop_front() {
            // Safety: tokens on the stack are pinned by their `Emission`.
            let t = unsafe { token.as_ref() };
            t.live.set(false);
            t.cursor.set(None);
            stopped += 1;
        }
        if stopped > 0 {
            trace!(stopped, "signal: invalidated emissions");
        }
        stopped
    }

    /// Unlink the first connection and hand back its slot for dropping.
    fn detach_first<'s, A: ?Sized>(&mut self) -> Option<Option<Rc<Slot<'s, A>>>> {
        let first = self.connections.first();
        if first == self.connections.end() {
            return None;
        }
        // Safety: `first` is a node of this list, hence a connection header
        // at the start of a `ConnectionNode<'s, A>`.
        unsafe {
            let header = ConnectionHeader::from_links(first);
            self.remove(header);
            Some(header.cast::<ConnectionNode<'s, A>>().as_ref().slot.take())
        }
    }
}

impl Drop for SignalInner {
    fn drop(&mut self) {
        self.invalidate_emissions();
        // `connections` unlinks whatever is left when it drops
    }
}

// ---- impl ConnectionNode ----

impl<'s, A: ?Sized> ConnectionNode<'s, A> {
    /// A new strong reference to the slot, kept alive across the call even
    /// if the slot disconnects itself.
    fn clone_slot(&self) -> Option<Rc<Slot<'s, A>>> {
        let slot = self.slot.take();
        self.slot.set(slot.clone());
        slot
    }
}
