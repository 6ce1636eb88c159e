use std::{
    cell::{Cell, RefCell},
    panic::{AssertUnwindSafe, catch_unwind},
    rc::Rc,
    string::String,
};

use assert_call::{CallRecorder, call};
use mutex::raw_impls::cs::CriticalSectionRawMutex;
use rstest::rstest;

use super::{Connection, Signal};

type Cs = CriticalSectionRawMutex;
type Handle<'s, A> = Rc<RefCell<Option<Connection<'s, Cs, A>>>>;

fn handle<'s, A: ?Sized>() -> Handle<'s, A> {
    Rc::new(RefCell::new(None))
}

#[test]
fn basic_broadcast() {
    let mut cr = CallRecorder::new();
    let s = Signal::<Cs, i32>::new();

    let _c1 = s.connect(|x| call!("1:{x}"));
    let mut c2 = s.connect(|x| call!("2:{x}"));
    let _c3 = s.connect(|x| call!("3:{x}"));

    s.emit(&42);
    cr.verify(["1:42", "2:42", "3:42"]);

    c2.disconnect();
    s.emit(&42);
    cr.verify(["1:42", "3:42"]);
}

#[test]
fn self_disconnect() {
    let mut cr = CallRecorder::new();
    let s = Signal::<Cs, ()>::new();

    let _a = s.connect(|_| call!("A"));
    let b = handle();
    *b.borrow_mut() = Some(s.connect({
        let b = b.clone();
        move |_| {
            let this = b.borrow_mut().take();
            if let Some(mut this) = this {
                this.disconnect();
            }
            call!("B");
        }
    }));
    let _c = s.connect(|_| call!("C"));

    s.emit(&());
    cr.verify(["A", "B", "C"]);

    s.emit(&());
    cr.verify(["A", "C"]);
    assert_eq!(s.len(), 2);
}

#[test]
fn disconnect_next_slot() {
    let mut cr = CallRecorder::new();
    let s = Signal::<Cs, ()>::new();

    let b = handle();
    let _a = s.connect({
        let b = b.clone();
        move |_| {
            call!("A");
            drop(b.borrow_mut().take());
        }
    });
    *b.borrow_mut() = Some(s.connect(|_| call!("B")));
    let _c = s.connect(|_| call!("C"));

    s.emit(&());
    cr.verify(["A", "C"]);

    s.emit(&());
    cr.verify(["A", "C"]);
}

#[test]
fn disconnect_previous_slot() {
    let mut cr = CallRecorder::new();
    let s = Signal::<Cs, ()>::new();

    let a = handle();
    *a.borrow_mut() = Some(s.connect(|_| call!("A")));
    let _b = s.connect({
        let a = a.clone();
        move |_| {
            call!("B");
            drop(a.borrow_mut().take());
        }
    });
    let _c = s.connect(|_| call!("C"));

    s.emit(&());
    cr.verify(["A", "B", "C"]);

    s.emit(&());
    cr.verify(["B", "C"]);
}

#[test]
fn connect_during_emission() {
    let mut cr = CallRecorder::new();
    let s = Signal::<Cs, ()>::new();

    let a = handle();
    let d = handle();
    *a.borrow_mut() = Some(s.connect({
        let (a, d, s) = (a.clone(), d.clone(), &s);
        move |_| {
            *d.borrow_mut() = Some(s.connect(|_| call!("D")));
            // single shot
            drop(a.borrow_mut().take());
        }
    }));
    let _b = s.connect(|_| call!("B"));

    s.emit(&());
    cr.verify("B");

    s.emit(&());
    cr.verify(["B", "D"]);
    assert!(d.borrow().as_ref().is_some_and(Connection::is_connected));
}

#[test]
fn recursive_emission() {
    let mut cr = CallRecorder::new();
    let s = Signal::<Cs, u32>::new();

    let _a = s.connect(|depth| {
        call!("A{depth}");
        if *depth == 1 {
            s.emit(&2);
        }
    });
    let _b = s.connect(|depth| call!("B{depth}"));
    let _c = s.connect(|depth| call!("C{depth}"));

    s.emit(&1);
    cr.verify(["A1", "A2", "B2", "C2", "B1", "C1"]);
    assert!(!s.is_emitting());
}

#[test]
fn slot_disconnected_in_nested_emission_is_skipped_by_outer() {
    let mut cr = CallRecorder::new();
    let s = Signal::<Cs, u32>::new();

    let b = handle();
    let _a = s.connect(|depth| {
        call!("A{depth}");
        if *depth == 1 {
            s.emit(&2);
        }
    });
    *b.borrow_mut() = Some(s.connect({
        let b = b.clone();
        move |depth| {
            call!("B{depth}");
            // dropped from inside the nested emission
            if *depth == 2 {
                drop(b.borrow_mut().take());
            }
        }
    }));
    let _c = s.connect(|depth| call!("C{depth}"));

    s.emit(&1);
    cr.verify(["A1", "A2", "B2", "C2", "C1"]);

    s.emit(&3);
    cr.verify(["A3", "C3"]);
}

#[test]
fn nested_emission_disconnects_slot_under_outer_cursor() {
    let mut cr = CallRecorder::new();
    let s = Signal::<Cs, u32>::new();

    let a = handle();
    *a.borrow_mut() = Some(s.connect(|depth| {
        call!("A{depth}");
        if *depth == 1 {
            s.emit(&2);
        }
    }));
    let _b = s.connect({
        let a = a.clone();
        move |depth| {
            call!("B{depth}");
            // the outer emission is still inside A
            if *depth == 2 {
                drop(a.borrow_mut().take());
            }
        }
    });
    let _c = s.connect(|depth| call!("C{depth}"));

    s.emit(&1);
    cr.verify(["A1", "A2", "B2", "C2", "B1", "C1"]);
    assert_eq!(s.len(), 2);

    s.emit(&1);
    cr.verify(["B1", "C1"]);
}

#[test]
fn close_during_emission_stops_every_level() {
    let mut cr = CallRecorder::new();
    let s = Signal::<Cs, u32>::new();

    let a = s.connect(|depth| {
        call!("A{depth}");
        if *depth == 1 {
            s.emit(&2);
        } else {
            s.close();
        }
    });
    let b = s.connect(|depth| call!("B{depth}"));

    s.emit(&1);
    cr.verify(["A1", "A2"]);

    assert!(!s.is_emitting());
    assert!(s.is_empty());
    assert!(!a.is_connected());
    assert!(!b.is_connected());

    s.emit(&1);
    cr.verify(());
}

#[test]
fn closed_signal_can_be_reused() {
    let mut cr = CallRecorder::new();
    let s = Signal::<Cs, ()>::new();

    let mut old = s.connect(|_| call!("old"));
    s.close();
    assert!(!old.is_connected());
    old.disconnect();
    assert!(!old.is_connected());

    let _new = s.connect(|_| call!("new"));
    s.emit(&());
    cr.verify("new");
}

#[test]
fn close_from_slot_skips_later_slots() {
    let mut cr = CallRecorder::new();
    let s = Signal::<Cs, ()>::new();

    let _a = s.connect(|_| {
        call!("A");
        s.close();
    });
    let _b = s.connect(|_| call!("B"));

    s.emit(&());
    cr.verify("A");
    assert!(s.is_empty());
}

#[test]
fn connection_move() {
    let mut cr = CallRecorder::new();
    let s = Signal::<Cs, ()>::new();

    let h1 = s.connect(|_| call!("A"));
    let h2 = h1;
    s.emit(&());
    cr.verify("A");

    drop(h2);
    s.emit(&());
    cr.verify(());
}

#[test]
fn connection_moved_during_emission_keeps_its_place() {
    let mut cr = CallRecorder::new();
    let s = Signal::<Cs, ()>::new();

    let slot_b = handle();
    let moved = handle();
    let _a = s.connect({
        let (slot_b, moved) = (slot_b.clone(), moved.clone());
        move |_| {
            call!("A");
            let c = slot_b.borrow_mut().take();
            *moved.borrow_mut() = c;
        }
    });
    *slot_b.borrow_mut() = Some(s.connect(|_| call!("B")));
    let _c = s.connect(|_| call!("C"));

    s.emit(&());
    cr.verify(["A", "B", "C"]);
    assert!(slot_b.borrow().is_none());
    assert!(moved.borrow().as_ref().is_some_and(Connection::is_connected));
}

#[test]
fn move_assign_disconnects_the_old_connection() {
    let mut cr = CallRecorder::new();
    let s = Signal::<Cs, ()>::new();

    let mut h = s.connect(|_| call!("A"));
    assert!(h.is_connected());
    h = s.connect(|_| call!("B"));
    s.emit(&());
    cr.verify("B");
    assert!(h.is_connected());
    assert_eq!(s.len(), 1);
}

#[test]
fn default_connection_is_not_connected() {
    let mut c = Connection::<Cs, ()>::default();
    assert!(!c.is_connected());
    c.disconnect();
    assert!(!c.is_connected());
}

#[test]
fn disconnect_is_idempotent_and_drops_the_slot() {
    let mut cr = CallRecorder::new();
    let s = Signal::<Cs, ()>::new();

    let state = Rc::new(());
    let mut c = s.connect({
        let state = state.clone();
        move |_| {
            let _ = &state;
            call!("A");
        }
    });
    assert_eq!(Rc::strong_count(&state), 2);

    c.disconnect();
    assert!(!c.is_connected());
    assert_eq!(Rc::strong_count(&state), 1);

    c.disconnect();
    assert!(!c.is_connected());
    s.emit(&());
    cr.verify(());
}

#[rstest]
#[case::never_connected(false)]
#[case::only_connection_disconnected(true)]
fn emit_without_slots_is_a_no_op(#[case] connect_first: bool) {
    let mut cr = CallRecorder::new();
    let s = Signal::<Cs, ()>::new();
    if connect_first {
        let mut c = s.connect(|_| call!("A"));
        c.disconnect();
    }
    assert!(s.is_empty());
    s.emit(&());
    cr.verify(());
    assert!(!s.is_emitting());
}

#[test]
fn panicking_slot_leaves_signal_usable() {
    let mut cr = CallRecorder::new();
    let s = Signal::<Cs, u32>::new();

    let _a = s.connect(|x| {
        call!("A{x}");
        if *x == 0 {
            panic!("slot failed");
        }
    });
    let _b = s.connect(|x| call!("B{x}"));

    let res = catch_unwind(AssertUnwindSafe(|| s.emit(&0)));
    assert!(res.is_err());
    cr.verify("A0");
    assert!(!s.is_emitting());

    s.emit(&1);
    cr.verify(["A1", "B1"]);
}

#[test]
fn unsized_arguments() {
    let mut cr = CallRecorder::new();
    let s = Signal::<Cs, str>::new();
    let _c = s.connect(|msg| call!("got {msg}"));

    let owned = String::from("hello");
    s.emit(&owned);
    cr.verify("got hello");
}

#[test]
fn is_emitting_inside_slot() {
    let seen = Cell::new(false);
    let s = Signal::<Cs, ()>::new();
    let _c = s.connect(|_| seen.set(s.is_emitting()));
    assert!(!s.is_emitting());
    s.emit(&());
    assert!(seen.get());
    assert!(!s.is_emitting());
}
