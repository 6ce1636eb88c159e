//! The untyped core of a list: a heap-pinned sentinel and link surgery

use alloc::boxed::Box;
use core::ptr::NonNull;

use super::links::Links;

/// A circular doubly-linked ring of [`Links`] closed by a sentinel.
///
/// The sentinel lives in its own heap allocation, so its address is stable
/// even when the `RawList` value is moved. Neighbor nodes point at it by
/// address, which is why it may never be relocated.
pub(crate) struct RawList<Tag> {
    sentinel: NonNull<Links<Tag>>,
}

impl<Tag> RawList<Tag> {
    pub(crate) fn new() -> Self {
        let sentinel = NonNull::from(Box::leak(Box::new(Links::new())));
        // Safety: the sentinel was just allocated and is owned by this list.
        unsafe { Links::make_ring(sentinel) };
        Self { sentinel }
    }

    /// The sentinel, which doubles as the `end` position.
    #[inline]
    pub(crate) fn end(&self) -> NonNull<Links<Tag>> {
        self.sentinel
    }

    /// The first node, or the sentinel when empty.
    #[inline]
    pub(crate) fn first(&self) -> NonNull<Links<Tag>> {
        // Safety: the sentinel lives as long as the list and is always linked.
        unsafe { next_of(self.sentinel) }
    }

    /// The last node, or the sentinel when empty.
    #[inline]
    pub(crate) fn last(&self) -> NonNull<Links<Tag>> {
        // Safety: see `first`.
        unsafe { prev_of(self.sentinel) }
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.first() == self.sentinel
    }

    /// Count the nodes by walking the ring.
    pub(crate) fn len(&self) -> usize {
        let mut len = 0;
        let mut curr = self.first();
        while curr != self.sentinel {
            len += 1;
            // Safety: `curr` is a node of this ring.
            curr = unsafe { next_of(curr) };
        }
        len
    }

    /// Splice the unlinked `node` in front of `pos`.
    ///
    /// # Safety
    ///
    /// `pos` must be the sentinel or a node of this list, and `node` must
    /// point to valid, unlinked links that stay put while linked.
    pub(crate) unsafe fn insert_before(&mut self, pos: NonNull<Links<Tag>>, node: NonNull<Links<Tag>>) {
        // Safety: all three pointers are valid per the caller's contract.
        unsafe {
            let prev = prev_of(pos);
            let links = node.as_ref();
            debug_assert!(!links.is_linked(), "inserting an already linked node");
            links.set_prev(Some(prev));
            links.set_next(Some(pos));
            prev.as_ref().set_next(Some(node));
            pos.as_ref().set_prev(Some(node));
        }
    }

    /// Detach `node` and return its successor.
    ///
    /// # Safety
    ///
    /// `node` must be a (non-sentinel) node of this list.
    pub(crate) unsafe fn erase(&mut self, node: NonNull<Links<Tag>>) -> NonNull<Links<Tag>> {
        debug_assert_ne!(node, self.sentinel, "cannot erase the sentinel");
        // Safety: the caller guarantees `node` is linked into this list.
        unsafe {
            let next = next_of(node);
            node.as_ref().unlink();
            next
        }
    }

    /// Move the half-open range `[first, last)` in front of `pos`.
    ///
    /// Only link pointers are rewired; no node changes address. The range
    /// may come from this list or from any other list of the same tag.
    ///
    /// # Safety
    ///
    /// `pos` must be the sentinel or a node of this list. `first` and `last`
    /// must be positions of one list (possibly this one) with `last`
    /// reachable from `first` going forward without passing that list's
    /// sentinel, and `pos` must not lie inside `[first, last)`.
    pub(crate) unsafe fn splice(
        &mut self,
        pos: NonNull<Links<Tag>>,
        first: NonNull<Links<Tag>>,
        last: NonNull<Links<Tag>>,
    ) {
        if first == last || pos == first || pos == last {
            return;
        }

        // Safety: every pointer below is a linked node or sentinel, per the
        // caller's contract.
        unsafe {
            if next_of(first) == last {
                first.as_ref().unlink();
                self.insert_before(pos, first);
                return;
            }

            let last_incl = prev_of(last);
            let before_first = prev_of(first);
            let before_pos = prev_of(pos);

            // close the gap the range leaves behind
            before_first.as_ref().set_next(Some(last));
            last.as_ref().set_prev(Some(before_first));

            // and stitch the range in front of `pos`
            last_incl.as_ref().set_next(Some(pos));
            before_pos.as_ref().set_next(Some(first));
            first.as_ref().set_prev(Some(before_pos));
            pos.as_ref().set_prev(Some(last_incl));
        }
    }

    /// Exchange the chains of two lists.
    ///
    /// Neither sentinel moves; the head and tail of each chain are re-pointed
    /// at the other sentinel. An empty list's "first node" is its own
    /// sentinel, which must not be rewired, hence the four cases.
    pub(crate) fn swap(&mut self, other: &mut Self) {
        let (this_first, this_last) = (self.first(), self.last());
        let (other_first, other_last) = (other.first(), other.last());

        Self::adopt(self.sentinel, other.sentinel, other_first, other_last);
        Self::adopt(other.sentinel, self.sentinel, this_first, this_last);
    }

    /// Make `sentinel` the owner of the chain `first..=last` previously
    /// closed by `old`, or reset it to an empty ring if `first` is `old`.
    fn adopt(
        sentinel: NonNull<Links<Tag>>,
        old: NonNull<Links<Tag>>,
        first: NonNull<Links<Tag>>,
        last: NonNull<Links<Tag>>,
    ) {
        // Safety: both sentinels are owned by live lists, and `first`/`last`
        // are either `old` or nodes of its chain.
        unsafe {
            let links = sentinel.as_ref();
            if first != old {
                first.as_ref().set_prev(Some(sentinel));
                links.set_next(Some(first));
            } else {
                links.set_next(Some(sentinel));
            }

            if last != old {
                last.as_ref().set_next(Some(sentinel));
                links.set_prev(Some(last));
            } else {
                links.set_prev(Some(sentinel));
            }
        }
    }

    /// Unlink every node, leaving an empty ring.
    pub(crate) fn clear(&mut self) {
        let mut curr = self.first();
        while curr != self.sentinel {
            // Safety: `curr` is a node of this list. The walk only needs the
            // successor, which is read before the node is reset.
            unsafe {
                let next = next_of(curr);
                curr.as_ref().set_next(None);
                curr.as_ref().set_prev(None);
                curr = next;
            }
        }
        // Safety: every node has let go of the sentinel.
        unsafe { Links::make_ring(self.sentinel) };
    }

    /// Check the ring invariants, panicking if they do not hold.
    pub(crate) fn assert_valid(&self) {
        let mut forward = 0;
        let mut curr = self.sentinel;
        loop {
            // Safety: the walk stays on nodes of this ring.
            let (next, back) = unsafe {
                let next = next_of(curr);
                (next, prev_of(next))
            };
            assert_eq!(
                back,
                curr,
                "node {next:p} does not point back at its predecessor {curr:p}"
            );
            curr = next;
            if curr == self.sentinel {
                break;
            }
            forward += 1;
        }

        let mut backward = 0;
        let mut curr = self.last();
        while curr != self.sentinel {
            backward += 1;
            // Safety: the walk stays on nodes of this ring.
            curr = unsafe { prev_of(curr) };
        }
        assert_eq!(forward, backward, "forward and backward walks disagree on the length");
    }
}

impl<Tag> Drop for RawList<Tag> {
    fn drop(&mut self) {
        self.clear();
        // Safety: the sentinel was leaked from a `Box` in `new`, and the
        // ring is empty, so nothing points at it any more.
        drop(unsafe { Box::from_raw(self.sentinel.as_ptr()) });
    }
}

/// The successor of a linked node.
///
/// # Safety
///
/// `node` must point to live links that are linked into a ring, or to the
/// sentinel of a live list.
#[inline]
pub(crate) unsafe fn next_of<Tag>(node: NonNull<Links<Tag>>) -> NonNull<Links<Tag>> {
    // Safety: guaranteed by the caller.
    let next = unsafe { node.as_ref() }.next();
    debug_assert!(next.is_some(), "walked off an unlinked node");
    match next {
        Some(next) => next,
        None => node,
    }
}

/// The predecessor of a linked node.
///
/// # Safety
///
/// Same as [`next_of`].
#[inline]
pub(crate) unsafe fn prev_of<Tag>(node: NonNull<Links<Tag>>) -> NonNull<Links<Tag>> {
    // Safety: guaranteed by the caller.
    let prev = unsafe { node.as_ref() }.prev();
    debug_assert!(prev.is_some(), "walked off an unlinked node");
    match prev {
        Some(prev) => prev,
        None => node,
    }
}
