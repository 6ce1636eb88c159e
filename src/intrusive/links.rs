//! Link nodes embedded in list entities

use core::{
    cell::Cell,
    fmt,
    marker::{PhantomData, PhantomPinned},
    ptr::NonNull,
};

/// The tag used by a [`List`] when none is given.
///
/// [`List`]: crate::intrusive::List
pub enum DefaultTag {}

/// The pair of pointers an entity embeds to become a member of a [`List`].
///
/// A `Links` is either *unlinked* (both pointers empty) or linked into
/// exactly one circular list. The `Tag` parameter tells apart several
/// `Links` fields embedded in the same entity, so that entity can sit in
/// several independent lists at once.
///
/// Dropping a linked `Links` removes it from its list first.
///
/// [`List`]: crate::intrusive::List
pub struct Links<Tag = DefaultTag> {
    next: Cell<Link<Tag>>,
    prev: Cell<Link<Tag>>,
    _tag: PhantomData<Tag>,
    _pin: PhantomPinned,
}

pub(crate) type Link<Tag> = Option<NonNull<Links<Tag>>>;

/// Trait implemented by entities that embed a [`Links<Tag>`] field.
///
/// Use [`impl_linked!`](crate::impl_linked) to derive it for a concrete type.
///
/// # Safety
///
/// `links` must return a pointer to a `Links<Tag>` field stored inside the
/// pointed-to entity, and `from_links` must be its exact inverse. Entities
/// must not be moved while linked. The [`List`] API only accepts pinned
/// references, so implementors must also be `!Unpin`: embedding a `Links`
/// already makes a type `!Unpin`, unless it opts back in with `impl Unpin`.
///
/// [`List`]: crate::intrusive::List
pub unsafe trait Linked<Tag = DefaultTag> {
    /// Return the links of the entity pointed to by `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must point to a valid instance of `Self`.
    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<Tag>>;

    /// Recover the entity that embeds `links`.
    ///
    /// # Safety
    ///
    /// `links` must have been obtained from [`Linked::links`] for a valid
    /// instance of `Self`.
    unsafe fn from_links(links: NonNull<Links<Tag>>) -> NonNull<Self>;
}

/// Implement [`Linked`] for a concrete type with a [`Links`] field.
///
/// ```rust
/// use pinsignal::impl_linked;
/// use pinsignal::intrusive::Links;
///
/// enum ByAge {}
/// enum ByName {}
///
/// struct Person {
///     by_age: Links<ByAge>,
///     by_name: Links<ByName>,
///     age: u32,
/// }
///
/// impl_linked!(Person, by_age, ByAge);
/// impl_linked!(Person, by_name, ByName);
/// ```
///
/// The macro refuses `Unpin` types, since a `Pin<&T>` of one does not stop
/// the entity from moving while it is linked:
///
/// ```rust,compile_fail
/// use pinsignal::impl_linked;
/// use pinsignal::intrusive::Links;
///
/// struct Job {
///     queue: Links,
/// }
///
/// impl Unpin for Job {}
/// impl_linked!(Job, queue, pinsignal::intrusive::DefaultTag);
/// ```
#[macro_export]
macro_rules! impl_linked {
    ($ty:ty, $field:ident, $tag:ty) => {
        // Fails to resolve `some_item` when `$ty: Unpin`, as both impls apply.
        const _: fn() = || {
            trait AmbiguousIfUnpin<A> {
                fn some_item() {}
            }
            impl<T: ?Sized> AmbiguousIfUnpin<()> for T {}
            impl<T: ?Sized + ::core::marker::Unpin> AmbiguousIfUnpin<u8> for T {}
            let _ = <$ty as AmbiguousIfUnpin<_>>::some_item;
        };

        unsafe impl $crate::intrusive::Linked<$tag> for $ty {
            unsafe fn links(
                ptr: ::core::ptr::NonNull<Self>,
            ) -> ::core::ptr::NonNull<$crate::intrusive::Links<$tag>> {
                // Safety: using `ptr::addr_of!` avoids creating a temporary
                // reference, which stacked borrows dislikes.
                unsafe {
                    ::core::ptr::NonNull::new_unchecked(::core::ptr::addr_of_mut!(
                        (*ptr.as_ptr()).$field
                    ))
                }
            }

            unsafe fn from_links(
                links: ::core::ptr::NonNull<$crate::intrusive::Links<$tag>>,
            ) -> ::core::ptr::NonNull<Self> {
                let offset = ::core::mem::offset_of!($ty, $field);
                // Safety: `links` points at the `$field` of a `$ty`, so stepping
                // back by the field offset lands on the start of that `$ty`.
                unsafe {
                    ::core::ptr::NonNull::new_unchecked(
                        links.as_ptr().cast::<u8>().sub(offset).cast::<Self>(),
                    )
                }
            }
        }
    };
}

// ---- impl Links ----

impl<Tag> Links<Tag> {
    /// Create new, unlinked links.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: Cell::new(None),
            prev: Cell::new(None),
            _tag: PhantomData,
            _pin: PhantomPinned,
        }
    }

    /// Returns `true` if this node is currently linked into a list.
    pub fn is_linked(&self) -> bool {
        self.next.get().is_some()
    }

    #[inline]
    pub(crate) fn next(&self) -> Link<Tag> {
        self.next.get()
    }

    #[inline]
    pub(crate) fn prev(&self) -> Link<Tag> {
        self.prev.get()
    }

    #[inline]
    pub(crate) fn set_next(&self, next: Link<Tag>) {
        self.next.set(next);
    }

    #[inline]
    pub(crate) fn set_prev(&self, prev: Link<Tag>) {
        self.prev.set(prev);
    }

    /// Point both links at `this`, making it the sentinel of an empty ring.
    ///
    /// # Safety
    ///
    /// `this` must point to live links that no other node points at.
    pub(crate) unsafe fn make_ring(this: NonNull<Self>) {
        // Safety: guaranteed by the caller.
        let links = unsafe { this.as_ref() };
        links.set_next(Some(this));
        links.set_prev(Some(this));
    }

    /// Detach this node from its list, re-joining its neighbors.
    ///
    /// No-op if the node is not linked.
    pub(crate) fn unlink(&self) {
        let (Some(prev), Some(next)) = (self.prev.take(), self.next.take()) else {
            return;
        };
        // Safety: a linked node's neighbors are alive. Entities unlink
        // themselves on drop, and a list unlinks its chain before freeing
        // its sentinel.
        unsafe {
            prev.as_ref().set_next(Some(next));
            next.as_ref().set_prev(Some(prev));
        }
    }
}

impl<Tag> Default for Links<Tag> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Tag> Drop for Links<Tag> {
    fn drop(&mut self) {
        self.unlink();
    }
}

impl<Tag> fmt::Debug for Links<Tag> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Links")
            .field("self", &format_args!("{:p}", self))
            .field("next", &self.next.get())
            .field("prev", &self.prev.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::pin::pin;

    enum Ring {}

    #[test]
    fn new_links_are_unlinked() {
        let links = Links::<Ring>::new();
        assert!(!links.is_linked());
        assert_eq!(links.next(), None);
        assert_eq!(links.prev(), None);
    }

    #[test]
    fn unlink_rejoins_neighbors() {
        let head = pin!(Links::<Ring>::new());
        let mid = pin!(Links::<Ring>::new());
        let head = NonNull::from(&*head);
        let mid = NonNull::from(&*mid);

        unsafe {
            Links::make_ring(head);
            head.as_ref().set_next(Some(mid));
            head.as_ref().set_prev(Some(mid));
            mid.as_ref().set_next(Some(head));
            mid.as_ref().set_prev(Some(head));

            mid.as_ref().unlink();
            assert!(!mid.as_ref().is_linked());
            assert_eq!(head.as_ref().next(), Some(head));
            assert_eq!(head.as_ref().prev(), Some(head));

            // a second unlink is a no-op
            mid.as_ref().unlink();
            assert!(!mid.as_ref().is_linked());
        }
    }

    #[test]
    fn drop_unlinks() {
        let head = pin!(Links::<Ring>::new());
        let head = NonNull::from(&*head);
        unsafe { Links::make_ring(head) };
        {
            let node = pin!(Links::<Ring>::new());
            let node = NonNull::from(&*node);
            unsafe {
                head.as_ref().set_next(Some(node));
                head.as_ref().set_prev(Some(node));
                node.as_ref().set_next(Some(head));
                node.as_ref().set_prev(Some(head));
            }
            // node is dropped here
        }
        unsafe {
            assert_eq!(head.as_ref().next(), Some(head));
            assert_eq!(head.as_ref().prev(), Some(head));
        }
    }
}
