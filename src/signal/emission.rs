//! Per-emission iteration tokens

use core::{cell::Cell, pin::Pin, ptr::NonNull};

use cordyceps::{Linked, list::Links};
use mutex::{BlockingMutex, ScopedRawMutex};
use pin_project::{pin_project, pinned_drop};

use super::{ConnectionTag, SignalInner};

/// The bookkeeping of one running emission.
///
/// Tokens live on the emitting stack frame, pinned inside an [`Emission`],
/// and are threaded onto their signal's stack while the emission runs.
pub(crate) struct IterationToken {
    links: Links<IterationToken>,
    /// The connection called last, or the sentinel before the first call.
    pub(super) cursor: Cell<Option<NonNull<crate::intrusive::Links<ConnectionTag>>>>,
    /// Connections with a serial at or above this were made after the
    /// emission started.
    pub(super) limit: Cell<u64>,
    /// Cleared when the token leaves the stack, or when the signal is closed
    /// under it.
    pub(super) live: Cell<bool>,
}

/// Guard that keeps an [`IterationToken`] registered for as long as it is
/// alive, including while unwinding out of a panicking slot.
#[pin_project(PinnedDrop)]
pub(crate) struct Emission<'a, R: ScopedRawMutex> {
    inner: &'a BlockingMutex<R, SignalInner>,
    #[pin]
    token: IterationToken,
}

// ---- impl IterationToken ----

impl IterationToken {
    const fn new() -> Self {
        Self {
            links: Links::new(),
            cursor: Cell::new(None),
            limit: Cell::new(0),
            live: Cell::new(false),
        }
    }
}

unsafe impl Linked<Links<IterationToken>> for IterationToken {
    type Handle = NonNull<IterationToken>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        r
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        ptr
    }

    unsafe fn links(target: NonNull<Self>) -> NonNull<Links<IterationToken>> {
        // Safety: using `ptr::addr_of!` avoids creating a temporary
        // reference, which stacked borrows dislikes.
        let links = unsafe { core::ptr::addr_of_mut!((*target.as_ptr()).links) };
        unsafe { NonNull::new_unchecked(links) }
    }
}

// ---- impl Emission ----

impl<'a, R: ScopedRawMutex> Emission<'a, R> {
    pub(crate) const fn new(inner: &'a BlockingMutex<R, SignalInner>) -> Self {
        Self {
            inner,
            token: IterationToken::new(),
        }
    }

    /// Register the token with the signal and return a pointer to it.
    ///
    /// The pointer stays valid until `self` is dropped.
    pub(crate) fn start(self: Pin<&mut Self>) -> NonNull<IterationToken> {
        let this = self.project();
        // Safety: the token is only ever reached through this pointer, which
        // never moves it, and `PinnedDrop` unregisters it before it is freed.
        let token = NonNull::from(unsafe { this.token.get_unchecked_mut() });
        this.inner.with_lock(|inner| inner.register(token));
        token
    }
}

#[pinned_drop]
impl<R: ScopedRawMutex> PinnedDrop for Emission<'_, R> {
    fn drop(self: Pin<&mut Self>) {
        let this = self.project();
        // Safety: the pointer is only used to take the token off the stack,
        // it does not move it.
        let token = NonNull::from(unsafe { this.token.get_unchecked_mut() });
        this.inner.with_lock(|inner| inner.unregister(token));
    }
}
