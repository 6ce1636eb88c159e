//! Intrusive, circular, doubly-linked lists
//!
//! Entities embed one [`Links`] field per list they can belong to, tell the
//! fields apart with a tag type, and implement [`Linked`] for each tag
//! (usually through [`impl_linked!`](crate::impl_linked)). A [`List`] then
//! threads pointers through those fields without ever owning or moving the
//! entities.
//!
//! ```rust
//! use core::pin::pin;
//! use pinsignal::impl_linked;
//! use pinsignal::intrusive::{Links, List};
//!
//! enum Queue {}
//!
//! struct Job {
//!     queue: Links<Queue>,
//!     id: u32,
//! }
//!
//! impl_linked!(Job, queue, Queue);
//!
//! let a = pin!(Job { queue: Links::new(), id: 1 });
//! let a = a.into_ref();
//! let b = pin!(Job { queue: Links::new(), id: 2 });
//! let b = b.into_ref();
//!
//! let mut jobs = List::<Job, Queue>::new();
//! jobs.push_back(a);
//! jobs.push_front(b);
//!
//! let ids: Vec<u32> = jobs.iter().map(|job| job.id).collect();
//! assert_eq!(ids, [2, 1]);
//! ```

mod cursor;
mod links;
mod list;
mod raw;

pub use cursor::{Cursor, CursorMut, Iter};
pub use links::{DefaultTag, Linked, Links};
pub use list::{List, Position};

pub(crate) use raw::{RawList, next_of, prev_of};
