//! Handles to connected slots

use alloc::boxed::Box;
use core::{fmt, ptr::NonNull};

use mutex::ScopedRawMutex;
use tracing::trace;

use super::{ConnectionNode, Signal};

/// Owning handle to a slot connected to a [`Signal`].
///
/// Dropping the handle disconnects the slot. A `Connection` can be moved
/// freely, including from inside a running slot: the connection record
/// itself lives on the heap and keeps its place in the signal's list.
///
/// The [`Default`] value is not connected to anything.
pub struct Connection<'s, R: ScopedRawMutex, A: ?Sized> {
    inner: Option<Attached<'s, R, A>>,
}

struct Attached<'s, R: ScopedRawMutex, A: ?Sized> {
    signal: &'s Signal<'s, R, A>,
    node: NonNull<ConnectionNode<'s, A>>,
}

impl<'s, R: ScopedRawMutex, A: ?Sized> Connection<'s, R, A> {
    pub(crate) fn new(signal: &'s Signal<'s, R, A>, node: NonNull<ConnectionNode<'s, A>>) -> Self {
        Self {
            inner: Some(Attached { signal, node }),
        }
    }

    /// Returns `true` if the slot is still connected to its signal.
    ///
    /// This is `false` after [`disconnect()`](Self::disconnect), after the
    /// signal was [closed](Signal::close), and for a default handle.
    pub fn is_connected(&self) -> bool {
        let Some(Attached { signal, node }) = &self.inner else {
            return false;
        };
        signal.inner.with_lock(|_inner| {
            // Safety: the node is owned by this handle and freed only in
            // `disconnect`.
            unsafe { node.as_ref() }.header.links.is_linked()
        })
    }

    /// Disconnect the slot and drop it.
    ///
    /// Emissions currently running will not call the slot again. Calling
    /// this more than once is a no-op.
    pub fn disconnect(&mut self) {
        let Some(Attached { signal, node }) = self.inner.take() else {
            return;
        };

        let slot = signal.inner.with_lock(|inner| {
            // Safety: the node is live, and linked into `signal` unless the
            // signal was closed.
            unsafe {
                let serial = node.as_ref().header.serial;
                trace!(serial, "signal: disconnect");
                inner.remove(node.cast());
                node.as_ref().slot.take()
            }
        });

        // the slot may own arbitrary state, drop it unlocked
        drop(slot);

        // Safety: the node was leaked from a `Box` in `Signal::connect` and
        // is unlinked now, so nothing else points at it.
        drop(unsafe { Box::from_raw(node.as_ptr()) });
    }
}

impl<R: ScopedRawMutex, A: ?Sized> Default for Connection<'_, R, A> {
    fn default() -> Self {
        Self { inner: None }
    }
}

impl<R: ScopedRawMutex, A: ?Sized> Drop for Connection<'_, R, A> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl<R: ScopedRawMutex, A: ?Sized> fmt::Debug for Connection<'_, R, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("node", &self.inner.as_ref().map(|a| a.node))
            .field("connected", &self.is_connected())
            .finish()
    }
}
