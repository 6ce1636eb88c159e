//! The typed, borrowing face of an intrusive list

use core::{fmt, marker::PhantomData, pin::Pin, ptr::NonNull};

use super::{
    cursor::{Cursor, CursorMut, Iter},
    links::{DefaultTag, Linked, Links},
    raw::RawList,
};

/// An intrusive, circular, doubly-linked list of `T`s.
///
/// The list does not own its elements. Each element embeds a
/// [`Links<Tag>`] field and is handed to the list as a pinned reference that
/// lives for `'a`; the list only threads pointers through it. This makes
/// removal by reference O(1) and lets one element sit in several lists with
/// different tags at once.
///
/// The sentinel node lives in a heap allocation owned by the list, so the
/// `List` value itself can be moved freely.
///
/// Dropping the list unlinks whatever it still holds, so every element must
/// outlive the list it was pushed into:
///
/// ```rust,compile_fail
/// use core::pin::pin;
/// use pinsignal::impl_linked;
/// use pinsignal::intrusive::{DefaultTag, Links, List};
///
/// struct Job {
///     queue: Links,
/// }
///
/// impl_linked!(Job, queue, DefaultTag);
///
/// let mut jobs = List::<Job>::new();
/// {
///     let job = pin!(Job { queue: Links::new() });
///     jobs.push_back(job.into_ref());
/// }
/// drop(jobs);
/// ```
pub struct List<'a, T, Tag = DefaultTag>
where
    T: Linked<Tag>,
{
    pub(crate) raw: RawList<Tag>,
    _items: PhantomData<Pin<&'a T>>,
}

/// A saved position in a [`List`]: either an element or the end.
///
/// A `Position` does not borrow the list. Turning it back into something
/// usable is `unsafe`, see [`List::cursor_mut_at()`] and [`List::splice()`].
pub struct Position<Tag = DefaultTag> {
    pub(crate) node: NonNull<Links<Tag>>,
}

// ---- impl List ----

impl<'a, T: Linked<Tag>, Tag> List<'a, T, Tag> {
    /// Create a new, empty list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            raw: RawList::new(),
            _items: PhantomData,
        }
    }

    /// Returns `true` if the list holds no elements.
    ///
    /// This operation completes in *O*(1) time.
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Returns the number of elements in the list.
    ///
    /// The list does not keep a count, so this walks it in *O*(n) time.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Appends an element to the tail of the list.
    ///
    /// # Panics
    ///
    /// If `item` is already linked into a list with this tag.
    pub fn push_back(&mut self, item: Pin<&'a T>) {
        let node = links_of(item);
        // Safety: the node is checked to be unlinked, and it is pinned and
        // borrowed for `'a`, so it outlives its membership.
        unsafe { self.raw.insert_before(self.raw.end(), node) };
    }

    /// Appends an element to the head of the list.
    ///
    /// # Panics
    ///
    /// If `item` is already linked into a list with this tag.
    pub fn push_front(&mut self, item: Pin<&'a T>) {
        let node = links_of(item);
        // Safety: see `push_back`.
        unsafe { self.raw.insert_before(self.raw.first(), node) };
    }

    /// Removes the element at the tail of the list.
    ///
    /// Returns [`None`] and leaves the list untouched if it is empty.
    pub fn pop_back(&mut self) -> Option<Pin<&'a T>> {
        if self.is_empty() {
            return None;
        }
        let last = self.raw.last();
        // Safety: the list is not empty, so `last` is an element.
        unsafe {
            self.raw.erase(last);
            Some(self.item(last))
        }
    }

    /// Removes the element at the head of the list.
    ///
    /// Returns [`None`] and leaves the list untouched if it is empty.
    pub fn pop_front(&mut self) -> Option<Pin<&'a T>> {
        if self.is_empty() {
            return None;
        }
        let first = self.raw.first();
        // Safety: the list is not empty, so `first` is an element.
        unsafe {
            self.raw.erase(first);
            Some(self.item(first))
        }
    }

    /// Returns the first element, or [`None`] if the list is empty.
    pub fn front(&self) -> Option<Pin<&'a T>> {
        self.cursor_front().get()
    }

    /// Returns the last element, or [`None`] if the list is empty.
    pub fn back(&self) -> Option<Pin<&'a T>> {
        let mut cursor = self.cursor_end();
        cursor.move_prev();
        cursor.get()
    }

    /// Unlinks every element. The elements themselves are untouched.
    pub fn clear(&mut self) {
        self.raw.clear();
    }

    /// Moves every element of `other` to the end of this list.
    ///
    /// `other` is left empty. This operation completes in *O*(1) time.
    pub fn append(&mut self, other: &mut Self) {
        self.cursor_end_mut().splice_before(other);
    }

    /// Exchange the elements of two lists.
    ///
    /// The sentinels stay where they are, so [`Position`]s at the end of a
    /// list keep referring to that list's end.
    pub fn swap(&mut self, other: &mut Self) {
        self.raw.swap(&mut other.raw);
    }

    /// Move all elements into a new list, leaving this one empty.
    #[must_use]
    pub fn take(&mut self) -> Self {
        let mut taken = Self::new();
        taken.swap(self);
        taken
    }

    /// Returns an [`Iterator`] over the elements, front to back.
    pub fn iter(&self) -> Iter<'_, 'a, T, Tag> {
        Iter::new(self)
    }

    /// A [`Cursor`] at the first element, or at the end if the list is empty.
    pub fn cursor_front(&self) -> Cursor<'_, 'a, T, Tag> {
        Cursor::new(self, self.raw.first())
    }

    /// A [`Cursor`] at the end of the list.
    pub fn cursor_end(&self) -> Cursor<'_, 'a, T, Tag> {
        Cursor::new(self, self.raw.end())
    }

    /// A [`CursorMut`] at the first element, or at the end if the list is empty.
    pub fn cursor_front_mut(&mut self) -> CursorMut<'_, 'a, T, Tag> {
        let first = self.raw.first();
        CursorMut::new(self, first)
    }

    /// A [`CursorMut`] at the end of the list.
    pub fn cursor_end_mut(&mut self) -> CursorMut<'_, 'a, T, Tag> {
        let end = self.raw.end();
        CursorMut::new(self, end)
    }

    /// The [`Position`] of the end of this list.
    pub fn end_position(&self) -> Position<Tag> {
        Position { node: self.raw.end() }
    }

    /// A [`CursorMut`] pointing at `item`, found in *O*(1) time.
    ///
    /// # Safety
    ///
    /// `item` must currently be an element of this list.
    pub unsafe fn cursor_mut_from_ref(&mut self, item: &T) -> CursorMut<'_, 'a, T, Tag> {
        // Safety: a shared reference is a valid pointer to `T`.
        let node = unsafe { T::links(NonNull::from(item)) };
        CursorMut::new(self, node)
    }

    /// A [`CursorMut`] at a previously saved [`Position`].
    ///
    /// # Safety
    ///
    /// `pos` must be the end of this list, or an element that is currently
    /// linked into this list.
    pub unsafe fn cursor_mut_at(&mut self, pos: Position<Tag>) -> CursorMut<'_, 'a, T, Tag> {
        CursorMut::new(self, pos.node)
    }

    /// Move the elements `[first, last)` of `other` in front of `at`.
    ///
    /// Empty ranges are a no-op. No element changes address, and the
    /// operation completes in *O*(1) time regardless of the range size.
    ///
    /// # Safety
    ///
    /// * `at` must be a position of this list.
    /// * `first` and `last` must be positions of `other`, with `last` at or
    ///   after `first`.
    pub unsafe fn splice(
        &mut self,
        at: Position<Tag>,
        other: &mut Self,
        first: Position<Tag>,
        last: Position<Tag>,
    ) {
        debug_assert!(
            first == last || first.node != other.raw.end(),
            "range cannot start at the end"
        );
        // Safety: forwarded to the caller.
        unsafe { self.raw.splice(at.node, first.node, last.node) };
    }

    /// Move the elements `[first, last)` of this list in front of `at`.
    ///
    /// # Safety
    ///
    /// All three positions must belong to this list, `last` must be at or
    /// after `first`, and `at` must not lie inside `[first, last)`.
    pub unsafe fn splice_within(
        &mut self,
        at: Position<Tag>,
        first: Position<Tag>,
        last: Position<Tag>,
    ) {
        debug_assert!(
            first == last || first.node != self.raw.end(),
            "range cannot start at the end"
        );
        // Safety: forwarded to the caller.
        unsafe { self.raw.splice(at.node, first.node, last.node) };
    }

    /// Walk the ring in both directions, panicking if any link is broken.
    pub fn assert_valid(&self) {
        self.raw.assert_valid();
    }

    /// Turn a linked node of this list back into an element reference.
    ///
    /// # Safety
    ///
    /// `node` must be an element (not the sentinel) of this list.
    pub(crate) unsafe fn item(&self, node: NonNull<Links<Tag>>) -> Pin<&'a T> {
        // Safety: elements are only ever inserted as `Pin<&'a T>`, so the
        // entity is pinned and alive for `'a`.
        unsafe { Pin::new_unchecked(T::from_links(node).as_ref()) }
    }
}

impl<T: Linked<Tag>, Tag> Drop for List<'_, T, Tag> {
    fn drop(&mut self) {
        self.raw.clear();
    }
}

impl<T: Linked<Tag>, Tag> Default for List<'_, T, Tag> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Linked<Tag>, Tag> fmt::Debug for List<'_, T, Tag> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("List")
            .field("sentinel", &self.raw.end())
            .field("len", &self.len())
            .finish()
    }
}

impl<'l, 'a, T: Linked<Tag>, Tag> IntoIterator for &'l List<'a, T, Tag> {
    type Item = Pin<&'a T>;
    type IntoIter = Iter<'l, 'a, T, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// The links of a pinned item, checked to be free for insertion.
pub(crate) fn links_of<T: Linked<Tag>, Tag>(item: Pin<&T>) -> NonNull<Links<Tag>> {
    let ptr = NonNull::from(item.get_ref());
    // Safety: `ptr` comes from a live reference.
    let node = unsafe { T::links(ptr) };
    assert!(
        !unsafe { node.as_ref() }.is_linked(),
        "cannot insert an element that is already linked"
    );
    node
}

// ---- impl Position ----

impl<Tag> Clone for Position<Tag> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Tag> Copy for Position<Tag> {}

impl<Tag> PartialEq for Position<Tag> {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node
    }
}

impl<Tag> Eq for Position<Tag> {}

impl<Tag> fmt::Debug for Position<Tag> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Position").field(&self.node).finish()
    }
}
