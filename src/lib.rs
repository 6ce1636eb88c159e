//! # `pinsignal`
//!
//! Intrusive linked lists, and a reentrant signal/slot dispatcher built on
//! them.
//!
//! * [`intrusive`] provides [`List`], a circular doubly-linked list that
//!   threads pointers through [`Links`] fields embedded in your own types.
//!   The list never owns or moves its elements, so one element can sit in
//!   several lists at once and be removed by reference in *O*(1).
//! * [`signal`] provides [`Signal`], a list of slots that are called in
//!   order on every emission. Slots may connect, disconnect, move handles,
//!   or re-emit while an emission is running.
//!
//! [`List`]: intrusive::List
//! [`Links`]: intrusive::Links
//! [`Signal`]: signal::Signal
//!
//! ## Examples
//!
//! ```rust
//! use core::cell::RefCell;
//! use pinsignal::signal::Signal;
//! use mutex::raw_impls::cs::CriticalSectionRawMutex as CsRm;
//!
//! let log = RefCell::new(Vec::new());
//! let clicked = Signal::<CsRm, u32>::new();
//!
//! let first = clicked.connect(|n| log.borrow_mut().push(("first", *n)));
//! let mut second = clicked.connect(|n| log.borrow_mut().push(("second", *n)));
//!
//! clicked.emit(&1);
//! second.disconnect();
//! clicked.emit(&2);
//!
//! assert_eq!(*log.borrow(), [("first", 1), ("second", 1), ("first", 2)]);
//! assert!(first.is_connected());
//! ```

#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod intrusive;
pub mod signal;
