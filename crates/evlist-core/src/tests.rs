//! Unit tests for list mutators, batching, reconciliation and forwarding.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::change::{ChangeKind, ListChange, ListEvent};
use crate::error::ListError;
use crate::list::EventList;
use crate::listener::{listener_fn, ListEventListener};
use crate::lock::ListLock;
use crate::managed::ManagedList;
use crate::publisher::ListEventPublisher;
use crate::reconcile::same_arc;

/// Collects every event delivered to it.
struct Recorder<T> {
    events: Mutex<Vec<ListEvent<T>>>,
}

impl<T: Clone> Recorder<T> {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
        })
    }

    fn events(&self) -> Vec<ListEvent<T>> {
        self.events.lock().clone()
    }

    fn count(&self) -> usize {
        self.events.lock().len()
    }
}

impl<T: Clone + Send + Sync> ListEventListener<T> for Recorder<T> {
    fn list_changed(&self, event: &ListEvent<T>) {
        self.events.lock().push(event.clone());
    }
}

/// Creates a list holding `items` (loaded silently) with a recorder attached.
fn observed(items: &[&'static str]) -> (EventList<&'static str>, Arc<Recorder<&'static str>>) {
    let list = EventList::new();
    list.bulk_load(items.iter().copied())
        .expect("bulk load into a new list should succeed");
    let recorder = Recorder::new();
    list.add_listener(recorder.clone());
    (list, recorder)
}

fn assert_replays(
    before: &[&'static str],
    event: &ListEvent<&'static str>,
    after: &[&'static str],
) {
    let mut state = before.to_vec();
    event.replay(&mut state).expect("event should replay onto pre-state");
    assert_eq!(state, after, "replayed event must reconstruct post-state");
}

// ── single-element mutators ─────────────────────────────────────────

#[test]
fn push_records_one_insert_at_end() {
    let (list, rec) = observed(&["a"]);
    list.write().push("b").unwrap();

    let events = rec.events();
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].changes(),
        &[ListChange::Insert {
            index: 1,
            value: "b",
        }]
    );
    assert_eq!(list.read().to_vec(), vec!["a", "b"]);
}

#[test]
fn insert_checks_bounds_before_mutating() {
    let (list, rec) = observed(&["a", "b"]);
    let writer = list.write();

    writer.insert(2, "c").expect("inserting at len is allowed");
    let err = writer.insert(4, "z").unwrap_err();
    assert_eq!(err, ListError::IndexOutOfRange { index: 4, len: 3 });

    assert_eq!(writer.to_vec(), vec!["a", "b", "c"]);
    assert_eq!(rec.count(), 1, "failed insert must not notify");
}

#[test]
fn set_returns_old_value_and_records_update() {
    let (list, rec) = observed(&["a", "b"]);
    let old = list.write().set(1, "x").unwrap();
    assert_eq!(old, "b");
    assert_eq!(
        rec.events()[0].changes(),
        &[ListChange::Update {
            index: 1,
            old: "b",
            new: "x"
        }]
    );
}

#[test]
fn set_and_remove_reject_index_at_len() {
    let (list, rec) = observed(&["a"]);
    let writer = list.write();
    assert!(matches!(
        writer.set(1, "x"),
        Err(ListError::IndexOutOfRange { index: 1, len: 1 })
    ));
    assert!(matches!(
        writer.remove(1),
        Err(ListError::IndexOutOfRange { index: 1, len: 1 })
    ));
    assert!(matches!(
        writer.get(1),
        Err(ListError::IndexOutOfRange { index: 1, len: 1 })
    ));
    assert_eq!(rec.count(), 0);
}

#[test]
fn remove_by_index_and_by_value() {
    let (list, rec) = observed(&["a", "b", "c"]);
    let writer = list.write();

    assert_eq!(writer.remove(0).unwrap(), "a");
    assert!(writer.remove_item(&"c").unwrap());
    assert!(!writer.remove_item(&"zzz").unwrap(), "absent value is a no-op");

    let events = rec.events();
    assert_eq!(events.len(), 2, "absent value must not notify");
    assert_eq!(events[0].changes(), &[ListChange::Delete { index: 0, old: "a" }]);
    assert_eq!(events[1].changes(), &[ListChange::Delete { index: 1, old: "c" }]);
    assert_eq!(writer.to_vec(), vec!["b"]);
}

// ── bulk mutators ───────────────────────────────────────────────────

#[test]
fn insert_all_lands_contiguously_in_order() {
    let (list, rec) = observed(&["a", "d"]);
    assert!(list.write().insert_all(1, ["b", "c"]).unwrap());

    let events = rec.events();
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].changes(),
        &[
            ListChange::Insert {
                index: 1,
                value: "b",
            },
            ListChange::Insert {
                index: 2,
                value: "c",
            },
        ]
    );
    assert_replays(&["a", "d"], &events[0], &["a", "b", "c", "d"]);
}

#[test]
fn insert_all_with_nothing_is_silent() {
    let (list, rec) = observed(&["a"]);
    let writer = list.write();
    assert!(!writer.insert_all(0, Vec::new()).unwrap());
    assert!(!writer.extend(std::iter::empty()).unwrap());
    assert_eq!(rec.count(), 0);
    assert_eq!(list.publisher().last_sequence(), 0);
}

#[test]
fn clear_records_delete_at_zero_per_element() {
    let (list, rec) = observed(&["a", "b", "c"]);
    assert!(list.write().clear().unwrap());

    let events = rec.events();
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].changes(),
        &[
            ListChange::Delete { index: 0, old: "a" },
            ListChange::Delete { index: 0, old: "b" },
            ListChange::Delete { index: 0, old: "c" },
        ]
    );
    assert_replays(&["a", "b", "c"], &events[0], &[]);
    assert!(list.read().is_empty());
}

#[test]
fn clear_on_empty_is_silent() {
    let (list, rec) = observed(&[]);
    assert!(!list.write().clear().unwrap());
    assert_eq!(rec.count(), 0);
}

#[test]
fn remove_all_removes_every_occurrence_in_one_event() {
    let (list, rec) = observed(&["a", "b", "a", "c", "b"]);
    assert!(list.write().remove_all(&["a", "b"]).unwrap());

    let events = rec.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].count(ChangeKind::Delete), 4);
    assert_replays(&["a", "b", "a", "c", "b"], &events[0], &["c"]);
}

#[test]
fn retain_all_keeps_only_members() {
    let (list, rec) = observed(&["a", "b", "c", "d"]);
    assert!(list.write().retain_all(&["b", "d"]).unwrap());

    let events = rec.events();
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].changes(),
        &[
            ListChange::Delete { index: 0, old: "a" },
            ListChange::Delete { index: 1, old: "c" },
        ]
    );
    assert_eq!(list.read().to_vec(), vec!["b", "d"]);
}

#[test]
fn remove_all_and_retain_all_without_match_are_silent() {
    let (list, rec) = observed(&["a", "b"]);
    let writer = list.write();
    assert!(!writer.remove_all(&["x"]).unwrap());
    assert!(!writer.retain_all(&["a", "b", "x"]).unwrap());
    assert_eq!(rec.count(), 0);
}

// ── transactions ────────────────────────────────────────────────────

#[test]
fn outer_transaction_coalesces_primitive_calls() {
    let (list, rec) = observed(&["a", "b"]);
    let writer = list.write();

    writer.begin_event();
    writer.push("c").unwrap();
    writer.set(0, "z").unwrap();
    writer.remove(1).unwrap();
    writer.insert_all(0, ["p", "q"]).unwrap();
    assert_eq!(rec.count(), 0, "nothing is delivered before the outer commit");
    assert!(writer.commit_event().unwrap());

    let events = rec.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].len(), 5);
    assert_replays(&["a", "b"], &events[0], &writer.to_vec());
}

#[test]
fn nested_brackets_deliver_union_in_recording_order() {
    let (list, rec) = observed(&[]);
    let writer = list.write();

    writer.begin_event();
    writer.push("a").unwrap();
    writer.begin_event();
    writer.push("b").unwrap();
    assert!(!writer.commit_event().unwrap());
    writer.push("c").unwrap();
    assert!(writer.commit_event().unwrap());

    let events = rec.events();
    assert_eq!(events.len(), 1);
    let indices: Vec<usize> = events[0].iter().map(ListChange::index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
}

#[test]
fn batch_commits_applied_changes_even_on_error() {
    let (list, rec) = observed(&["a"]);
    let writer = list.write();

    let result = writer.batch(|w| {
        w.push("b")?;
        w.remove(10)?;
        w.push("never")
    });

    assert!(matches!(result, Err(ListError::IndexOutOfRange { index: 10, .. })));
    let events = rec.events();
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].changes(),
        &[ListChange::Insert {
            index: 1,
            value: "b",
        }]
    );
    assert_eq!(writer.to_vec(), vec!["a", "b"]);
}

#[test]
fn commit_without_begin_is_protocol_violation() {
    let (list, _rec) = observed(&[]);
    let writer = list.write();
    assert!(matches!(
        writer.commit_event(),
        Err(ListError::ProtocolViolation(_))
    ));
    assert!(matches!(
        writer.discard_event(),
        Err(ListError::ProtocolViolation(_))
    ));
}

#[test]
fn dropping_writer_with_open_bracket_still_delivers() {
    let (list, rec) = observed(&[]);
    {
        let writer = list.write();
        writer.begin_event();
        writer.push("a").unwrap();
    }
    assert_eq!(rec.count(), 1);
}

#[test]
fn events_carry_increasing_sequence_and_source() {
    let (list, rec) = observed(&[]);
    let writer = list.write();
    writer.push("a").unwrap();
    writer.push("b").unwrap();

    let events = rec.events();
    assert_eq!(events[0].source(), list.id());
    assert!(events[0].sequence() < events[1].sequence());
    assert_eq!(list.publisher().events_published(), 2);
}

#[test]
fn listener_observes_post_state() {
    let list = Arc::new(EventList::<u32>::new());
    let seen = Arc::new(Mutex::new(Vec::new()));

    let weak: Weak<EventList<u32>> = Arc::downgrade(&list);
    let sink = Arc::clone(&seen);
    list.add_listener(listener_fn(move |_event: &ListEvent<u32>| {
        if let Some(list) = weak.upgrade() {
            let reader = list.read();
            sink.lock().push(reader.to_vec());
        }
    }));

    let writer = list.write();
    writer.extend([1, 2]).unwrap();
    writer.set(0, 7).unwrap();

    assert_eq!(*seen.lock(), vec![vec![1, 2], vec![7, 2]]);
}

#[test]
fn listeners_called_in_registration_order() {
    let list = EventList::<u32>::new();
    let order = Arc::new(Mutex::new(Vec::new()));
    for tag in ["first", "second", "third"] {
        let sink = Arc::clone(&order);
        list.add_listener(listener_fn(move |_: &ListEvent<u32>| sink.lock().push(tag)));
    }
    list.write().push(1).unwrap();
    assert_eq!(*order.lock(), vec!["first", "second", "third"]);
}

#[test]
fn bracket_closed_by_another_writer_is_not_closed_again() {
    let (list, rec) = observed(&[]);
    let outer = list.write();
    outer.begin_event();
    outer.push("a").unwrap();
    {
        let inner = list.write();
        assert!(inner.commit_event().unwrap());
    }
    drop(outer);
    assert_eq!(rec.count(), 1);

    list.write().push("b").unwrap();
    let events = rec.events();
    assert_eq!(events.len(), 2);
    assert_eq!(
        events[1].changes(),
        &[ListChange::Insert {
            index: 1,
            value: "b",
        }]
    );
}

#[test]
fn writer_dropped_by_panic_discards_open_bracket() {
    let (list, rec) = observed(&[]);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let writer = list.write();
        writer.begin_event();
        writer.push("a").unwrap();
        panic!("composite update aborted");
    }));
    assert!(outcome.is_err());
    assert_eq!(rec.count(), 0, "a half-applied bracket must not be delivered");
    assert!(!list.lock().is_write_held_by_current_thread());

    // Storage keeps the applied push; the next transaction starts clean.
    list.write().push("b").unwrap();
    let events = rec.events();
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].changes(),
        &[ListChange::Insert {
            index: 1,
            value: "b",
        }]
    );
    assert_eq!(list.read().to_vec(), vec!["a", "b"]);
}

#[test]
fn mutating_inside_with_slice_is_rejected() {
    let (list, rec) = observed(&["a"]);
    let writer = list.write();
    let result = writer.with_slice(|items| {
        assert_eq!(items, &["a"]);
        writer.push("b")
    });
    assert!(matches!(result, Err(ListError::ProtocolViolation(_))));
    assert_eq!(writer.to_vec(), vec!["a"]);
    assert_eq!(rec.count(), 0);

    writer.push("b").unwrap();
    assert_eq!(rec.count(), 1);
    assert_eq!(rec.events()[0].len(), 1);
}

// ── reentrant delivery ──────────────────────────────────────────────

/// Records event sequences and replays every event onto a mirror.
fn mirroring_listener(
    sequences: &Arc<Mutex<Vec<u64>>>,
    mirror: &Arc<Mutex<Vec<u32>>>,
) -> Arc<dyn ListEventListener<u32>> {
    let sequences = Arc::clone(sequences);
    let mirror = Arc::clone(mirror);
    listener_fn(move |event: &ListEvent<u32>| {
        sequences.lock().push(event.sequence());
        event
            .replay(&mut mirror.lock())
            .expect("events must arrive in commit order");
    })
}

#[test]
fn listener_writing_to_its_own_list_keeps_commit_order() {
    let list = Arc::new(EventList::<u32>::new());
    let wrote = Arc::new(AtomicBool::new(false));

    let weak: Weak<EventList<u32>> = Arc::downgrade(&list);
    let flag = Arc::clone(&wrote);
    list.add_listener(listener_fn(move |_: &ListEvent<u32>| {
        if flag.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(list) = weak.upgrade() {
            list.write().push(99).expect("reentrant push");
        }
    }));

    let sequences = Arc::new(Mutex::new(Vec::new()));
    let mirror = Arc::new(Mutex::new(Vec::new()));
    list.add_listener(mirroring_listener(&sequences, &mirror));

    list.write().insert(0, 1).unwrap();

    assert_eq!(*sequences.lock(), vec![1, 2]);
    assert_eq!(*mirror.lock(), list.read().to_vec());
    assert_eq!(list.read().to_vec(), vec![1, 99]);
}

#[test]
fn listener_writing_to_a_sibling_list_keeps_category_order() {
    let lock = ListLock::new();
    let publisher = ListEventPublisher::new();
    let first = Arc::new(EventList::<u32>::with_handles(lock.clone(), publisher.clone()));
    let second = Arc::new(EventList::<u32>::with_handles(lock, publisher));

    let target = Arc::downgrade(&second);
    first.add_listener(listener_fn(move |event: &ListEvent<u32>| {
        if let Some(second) = target.upgrade() {
            second.write().push(event.len() as u32).expect("sibling push");
        }
    }));

    let sequences = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&sequences);
    let audit: Arc<dyn ListEventListener<u32>> = listener_fn(move |event: &ListEvent<u32>| {
        seen.lock().push(event.sequence());
    });
    first.add_listener(Arc::clone(&audit));
    second.add_listener(audit);

    first.write().push(7).unwrap();

    assert_eq!(*sequences.lock(), vec![1, 2]);
    assert_eq!(second.read().to_vec(), vec![1]);
}

// ── bulk load ───────────────────────────────────────────────────────

#[test]
fn bulk_load_is_silent_and_requires_empty_list() {
    let list = EventList::new();
    let rec = Recorder::<&'static str>::new();
    list.add_listener(rec.clone());

    assert_eq!(list.bulk_load(["a", "b"]).unwrap(), 2);
    assert_eq!(rec.count(), 0);

    let err = list.bulk_load(["c"]).unwrap_err();
    assert!(matches!(err, ListError::InvalidArgument(_)));
    assert_eq!(list.read().to_vec(), vec!["a", "b"]);
}

// ── reconciler ──────────────────────────────────────────────────────

#[test]
fn update_all_single_difference_is_one_update() {
    let (list, rec) = observed(&["a", "b", "c"]);
    assert!(list.write().update_all(&["a", "x", "c"]).unwrap());

    let events = rec.events();
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].changes(),
        &[ListChange::Update {
            index: 1,
            old: "b",
            new: "x"
        }]
    );
}

#[test]
fn update_all_growth_appends_inserts() {
    let (list, rec) = observed(&["a"]);
    assert!(list.write().update_all(&["a", "b", "c"]).unwrap());

    assert_eq!(
        rec.events()[0].changes(),
        &[
            ListChange::Insert {
                index: 1,
                value: "b",
            },
            ListChange::Insert {
                index: 2,
                value: "c",
            },
        ]
    );
}

#[test]
fn update_all_shrink_deletes_trailing() {
    let (list, rec) = observed(&["a", "b", "c"]);
    assert!(list.write().update_all(&["a"]).unwrap());

    let events = rec.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].count(ChangeKind::Delete), 2);
    assert_eq!(events[0].len(), 2);
    assert_replays(&["a", "b", "c"], &events[0], &["a"]);
    assert_eq!(list.read().len(), 1);
}

#[test]
fn update_all_with_empty_target_is_no_op() {
    let (list, rec) = observed(&[]);
    assert!(!list.write().update_all(&[]).unwrap());

    let (list, rec2) = observed(&["a"]);
    assert!(!list.write().update_all(&[]).unwrap());
    assert_eq!(list.read().to_vec(), vec!["a"], "empty target leaves contents alone");
    assert_eq!(rec.count() + rec2.count(), 0);
}

#[test]
fn update_all_with_equal_contents_is_silent() {
    let (list, rec) = observed(&["a", "b"]);
    assert!(!list.write().update_all(&["a", "b"]).unwrap());
    assert_eq!(rec.count(), 0);
    assert_eq!(list.publisher().last_sequence(), 0);
}

#[test]
fn update_all_matches_target_for_many_shapes() {
    let shapes: &[(&[&'static str], &[&'static str])] = &[
        (&[], &["a"]),
        (&["a", "b"], &["b", "a"]),
        (&["a", "b", "c", "d"], &["x"]),
        (&["a"], &["a", "a", "a"]),
        (&["a", "b", "c"], &["c", "b", "a", "d", "e"]),
    ];
    for (current, target) in shapes {
        let (list, rec) = observed(current);
        let changed = list.write().update_all(target).unwrap();
        let reader = list.read();
        assert_eq!(reader.len(), target.len());
        for (i, expected) in target.iter().enumerate() {
            assert_eq!(reader.get(i).unwrap(), *expected);
        }
        assert_eq!(changed, current != target);
        if changed {
            let events = rec.events();
            assert_eq!(events.len(), 1);
            assert_replays(current, &events[0], target);
        }
    }
}

#[test]
fn update_all_inside_outer_transaction_joins_it() {
    let (list, rec) = observed(&["a"]);
    let writer = list.write();
    writer.begin_event();
    writer.push("b").unwrap();
    writer.update_all(&["a", "b"]).unwrap();
    writer.update_all(&["z", "b"]).unwrap();
    writer.commit_event().unwrap();

    let events = rec.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].len(), 2);
}

#[test]
fn update_all_by_identity_reports_equal_but_distinct() {
    let a1 = Arc::new("a".to_string());
    let a2 = Arc::new("a".to_string());
    let list = EventList::new();
    list.bulk_load([Arc::clone(&a1)]).unwrap();
    let rec = Recorder::<Arc<String>>::new();
    list.add_listener(rec.clone());

    let writer = list.write();
    assert!(!writer.update_all(&[Arc::clone(&a2)]).unwrap(), "value equality suppresses");
    assert!(writer.update_all_by(&[Arc::clone(&a2)], same_arc).unwrap());
    assert_eq!(rec.count(), 1);
    assert!(Arc::ptr_eq(&writer.get(0).unwrap(), &a2));
}

// ── managed lists ───────────────────────────────────────────────────

#[test]
fn managed_list_forwards_delegate_events_unchanged() {
    let delegate = Arc::new(EventList::new());
    let managed = ManagedList::wrap(Arc::clone(&delegate));
    let direct = Recorder::<&'static str>::new();
    let forwarded = Recorder::<&'static str>::new();
    delegate.add_listener(direct.clone());
    managed.add_listener(forwarded.clone());

    managed.write().extend(["a", "b"]).unwrap();
    assert!(managed.update_all(&["a", "c"]).unwrap());

    assert_eq!(direct.events(), forwarded.events());
    assert_eq!(forwarded.count(), 2);
    assert_eq!(forwarded.events()[0].source(), delegate.id());
}

#[test]
fn managed_list_is_silent_while_initializing() {
    let delegate = Arc::new(EventList::new());
    let managed = ManagedList::uninitialized(Arc::clone(&delegate));
    let rec = Recorder::<&'static str>::new();
    managed.add_listener(rec.clone());
    assert!(!managed.was_initialized());

    managed.begin_initialization();
    assert_eq!(managed.inject_loaded_state(["a", "b"]).unwrap(), 2);
    managed.write().push("c").unwrap();
    managed.end_initialization();
    assert_eq!(rec.count(), 0, "initial load must not surface");

    managed.write().push("d").unwrap();
    assert_eq!(rec.count(), 1);
    assert_eq!(managed.read().to_vec(), vec!["a", "b", "c", "d"]);
}

#[test]
fn inject_outside_initialization_is_rejected() {
    let managed = ManagedList::wrap(Arc::new(EventList::<u32>::new()));
    assert!(matches!(
        managed.inject_loaded_state([1]),
        Err(ListError::ProtocolViolation(_))
    ));
}

#[test]
fn disposed_managed_list_stops_forwarding() {
    let delegate = Arc::new(EventList::new());
    let managed = ManagedList::wrap(Arc::clone(&delegate));
    let rec = Recorder::<u32>::new();
    managed.add_listener(rec.clone());
    assert_eq!(delegate.listener_count(), 1);

    assert!(managed.dispose());
    assert!(!managed.dispose());
    assert!(managed.is_disposed());
    assert_eq!(delegate.listener_count(), 0);

    delegate.write().push(1u32).unwrap();
    assert_eq!(rec.count(), 0);
}

#[test]
fn dropping_managed_list_detaches_forwarder() {
    let delegate = Arc::new(EventList::<u32>::new());
    {
        let _managed = ManagedList::wrap(Arc::clone(&delegate));
        assert_eq!(delegate.listener_count(), 1);
    }
    assert_eq!(delegate.listener_count(), 0);
}

#[test]
fn managed_list_shares_delegate_handles() {
    let delegate = Arc::new(EventList::<u32>::new());
    let managed = ManagedList::wrap(Arc::clone(&delegate));
    assert!(managed.lock().same_lock(delegate.lock()));
    assert!(managed.publisher().same_publisher(delegate.publisher()));
}
