//! Cursors and iterators over a [`List`]

use core::{fmt, pin::Pin, ptr::NonNull};

use super::{
    links::{Linked, Links},
    list::{List, Position, links_of},
    raw::{next_of, prev_of},
};

/// A read-only cursor into a [`List`].
///
/// A cursor points either at an element or at the end (the sentinel). The
/// end sits between the last and the first element, so moving past either
/// end wraps around through it.
pub struct Cursor<'l, 'a, T: Linked<Tag>, Tag> {
    list: &'l List<'a, T, Tag>,
    curr: NonNull<Links<Tag>>,
}

/// A cursor into a [`List`] that can edit the list around it.
pub struct CursorMut<'l, 'a, T: Linked<Tag>, Tag> {
    list: &'l mut List<'a, T, Tag>,
    curr: NonNull<Links<Tag>>,
}

/// Iterator over the elements of a [`List`].
///
/// Returned by [`List::iter()`].
pub struct Iter<'l, 'a, T: Linked<Tag>, Tag> {
    list: &'l List<'a, T, Tag>,
    head: NonNull<Links<Tag>>,
    tail: NonNull<Links<Tag>>,
    done: bool,
}

// ---- impl Cursor ----

impl<'l, 'a, T: Linked<Tag>, Tag> Cursor<'l, 'a, T, Tag> {
    pub(crate) fn new(list: &'l List<'a, T, Tag>, curr: NonNull<Links<Tag>>) -> Self {
        Self { list, curr }
    }

    /// The element under the cursor, or [`None`] at the end.
    pub fn get(&self) -> Option<Pin<&'a T>> {
        if self.is_end() {
            return None;
        }
        // Safety: the cursor is not at the end, so `curr` is an element.
        Some(unsafe { self.list.item(self.curr) })
    }

    /// Returns `true` if the cursor is at the end of the list.
    pub fn is_end(&self) -> bool {
        self.curr == self.list.raw.end()
    }

    /// Step to the next element, or to the end after the last one.
    pub fn move_next(&mut self) {
        // Safety: `curr` is the sentinel or an element of the borrowed list,
        // which cannot change while we hold the borrow.
        self.curr = unsafe { next_of(self.curr) };
    }

    /// Step to the previous element, or to the end before the first one.
    pub fn move_prev(&mut self) {
        // Safety: see `move_next`.
        self.curr = unsafe { prev_of(self.curr) };
    }

    /// Save where this cursor points.
    pub fn position(&self) -> Position<Tag> {
        Position { node: self.curr }
    }
}

impl<T: Linked<Tag>, Tag> Clone for Cursor<'_, '_, T, Tag> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: Linked<Tag>, Tag> Copy for Cursor<'_, '_, T, Tag> {}

impl<T: Linked<Tag>, Tag> PartialEq for Cursor<'_, '_, T, Tag> {
    fn eq(&self, other: &Self) -> bool {
        self.curr == other.curr
    }
}

impl<T: Linked<Tag>, Tag> Eq for Cursor<'_, '_, T, Tag> {}

impl<T: Linked<Tag>, Tag> fmt::Debug for Cursor<'_, '_, T, Tag> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("curr", &self.curr)
            .field("is_end", &self.is_end())
            .finish()
    }
}

// ---- impl CursorMut ----

impl<'l, 'a, T: Linked<Tag>, Tag> CursorMut<'l, 'a, T, Tag> {
    pub(crate) fn new(list: &'l mut List<'a, T, Tag>, curr: NonNull<Links<Tag>>) -> Self {
        Self { list, curr }
    }

    /// The element under the cursor, or [`None`] at the end.
    pub fn get(&self) -> Option<Pin<&'a T>> {
        self.as_cursor().get()
    }

    /// Returns `true` if the cursor is at the end of the list.
    pub fn is_end(&self) -> bool {
        self.curr == self.list.raw.end()
    }

    /// Step to the next element, or to the end after the last one.
    pub fn move_next(&mut self) {
        // Safety: `curr` is the sentinel or an element of this list. Every
        // edit made through the cursor leaves it on a linked node.
        self.curr = unsafe { next_of(self.curr) };
    }

    /// Step to the previous element, or to the end before the first one.
    pub fn move_prev(&mut self) {
        // Safety: see `move_next`.
        self.curr = unsafe { prev_of(self.curr) };
    }

    /// Save where this cursor points.
    pub fn position(&self) -> Position<Tag> {
        Position { node: self.curr }
    }

    /// A read-only view of this cursor.
    pub fn as_cursor(&self) -> Cursor<'_, 'a, T, Tag> {
        Cursor::new(&*self.list, self.curr)
    }

    /// Link `item` in front of the cursor, then point the cursor at it.
    ///
    /// # Panics
    ///
    /// If `item` is already linked into a list with this tag.
    pub fn insert(&mut self, item: Pin<&'a T>) {
        let node = links_of(item);
        // Safety: `curr` belongs to this list, and the item is unlinked and
        // borrowed for `'a`.
        unsafe { self.list.raw.insert_before(self.curr, node) };
        self.curr = node;
    }

    /// Unlink the element under the cursor and move to its successor.
    ///
    /// Returns [`None`] and does nothing at the end.
    pub fn remove_current(&mut self) -> Option<Pin<&'a T>> {
        if self.is_end() {
            return None;
        }
        let node = self.curr;
        // Safety: the cursor is not at the end, so `node` is an element of
        // this list.
        unsafe {
            self.curr = self.list.raw.erase(node);
            Some(self.list.item(node))
        }
    }

    /// Move every element of `other` in front of the cursor.
    ///
    /// `other` is left empty and the cursor does not move.
    pub fn splice_before(&mut self, other: &mut List<'a, T, Tag>) {
        if other.is_empty() {
            return;
        }
        let (first, end) = (other.raw.first(), other.raw.end());
        // Safety: `curr` is in this list and `[first, end)` is all of
        // `other`, which is a different list since we hold both mutably.
        unsafe { self.list.raw.splice(self.curr, first, end) };
    }
}

impl<T: Linked<Tag>, Tag> fmt::Debug for CursorMut<'_, '_, T, Tag> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CursorMut")
            .field("curr", &self.curr)
            .field("is_end", &self.is_end())
            .finish()
    }
}

// ---- impl Iter ----

impl<'l, 'a, T: Linked<Tag>, Tag> Iter<'l, 'a, T, Tag> {
    pub(crate) fn new(list: &'l List<'a, T, Tag>) -> Self {
        Self {
            list,
            head: list.raw.first(),
            tail: list.raw.last(),
            done: list.is_empty(),
        }
    }
}

impl<'a, T: Linked<Tag>, Tag> Iterator for Iter<'_, 'a, T, Tag> {
    type Item = Pin<&'a T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let curr = self.head;
        if curr == self.tail {
            self.done = true;
        } else {
            // Safety: `curr` is an element of the borrowed list.
            self.head = unsafe { next_of(curr) };
        }
        // Safety: `head` only walks between the first and last elements.
        Some(unsafe { self.list.item(curr) })
    }
}

impl<T: Linked<Tag>, Tag> DoubleEndedIterator for Iter<'_, '_, T, Tag> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let curr = self.tail;
        if curr == self.head {
            self.done = true;
        } else {
            // Safety: `curr` is an element of the borrowed list.
            self.tail = unsafe { prev_of(curr) };
        }
        // Safety: `tail` only walks between the first and last elements.
        Some(unsafe { self.list.item(curr) })
    }
}

impl<T: Linked<Tag>, Tag> core::iter::FusedIterator for Iter<'_, '_, T, Tag> {}

impl<T: Linked<Tag>, Tag> fmt::Debug for Iter<'_, '_, T, Tag> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Iter")
            .field("head", &self.head)
            .field("tail", &self.tail)
            .field("done", &self.done)
            .finish()
    }
}
