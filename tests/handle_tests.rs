//! Integration tests for element handles.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use rstest::rstest;
use stable_order::prelude::*;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

/// Counts fallbacks from optimistic reads to the read guard.
struct GuardFallbacks(Arc<AtomicUsize>);

impl<S: tracing::Subscriber> Layer<S> for GuardFallbacks {
    fn on_event(&self, event: &tracing::Event<'_>, _context: Context<'_, S>) {
        if event.metadata().target() == "stable_order::lock" {
            self.0.fetch_add(1, AtomicOrdering::SeqCst);
        }
    }
}

#[rstest]
fn test_handle_tracks_element_through_growth_and_shifts() {
    let store = OrderedStore::new();
    let anchor = store.push_back("anchor");
    for index in 0..100 {
        if index % 2 == 0 {
            store.push_front("front");
        } else {
            store.push_back("back");
        }
    }
    assert_eq!(anchor.index(), Some(50));
    assert_eq!(store.value_of(&anchor).unwrap(), "anchor");
    for _ in 0..30 {
        store.pop_front();
    }
    assert_eq!(store.index_of(&anchor).unwrap(), 20);
}

#[rstest]
fn test_compare_waits_on_read_guard_while_writer_is_held() {
    let store: Arc<OrderedStore<i32>> = Arc::new((0..3).collect());
    let first = store.handle_at(0).unwrap();
    let last = store.handle_at(2).unwrap();

    let (held_sender, held_receiver) = mpsc::channel();
    let (release_sender, release_receiver) = mpsc::channel::<()>();
    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            let mut writer = store.write(true);
            held_sender.send(()).unwrap();
            release_receiver.recv().unwrap();
            writer.push_front(-1);
        })
    };
    held_receiver.recv().unwrap();

    let fallbacks = Arc::new(AtomicUsize::new(0));
    let comparison = {
        let fallbacks = Arc::clone(&fallbacks);
        thread::spawn(move || {
            let subscriber = tracing_subscriber::registry().with(GuardFallbacks(fallbacks));
            tracing::subscriber::with_default(subscriber, || {
                (first.compare(&last), first.index())
            })
        })
    };

    thread::sleep(Duration::from_millis(50));
    assert!(!comparison.is_finished());
    assert_eq!(fallbacks.load(AtomicOrdering::SeqCst), 1);

    release_sender.send(()).unwrap();
    writer.join().expect("writer panicked");
    let (ordering, index) = comparison.join().expect("comparison panicked");
    assert_eq!(ordering, Ok(Ordering::Less));
    assert_eq!(index, Some(1));
    assert_eq!(fallbacks.load(AtomicOrdering::SeqCst), 1);
}

#[rstest]
fn test_handle_reports_absence_after_removal() {
    let store: OrderedStore<i32> = (0..3).collect();
    let handle = store.handle_at(1).unwrap();
    assert!(handle.is_present());
    store.remove(1).unwrap();
    assert!(!handle.is_present());
    assert_eq!(handle.index(), None);
}

#[rstest]
fn test_handles_compare_by_position() {
    let store: OrderedStore<i32> = (0..5).collect();
    let first = store.handle_at(0).unwrap();
    let last = store.handle_at(4).unwrap();
    assert!(first < last);
    assert_eq!(first.order(&last), Ordering::Less);

    let moved = first.clone();
    store.move_between(&moved, Some(&last), None).unwrap();
    assert!(first > last);
}

#[rstest]
fn test_compare_rejects_foreign_and_stale_handles() {
    let left: OrderedStore<i32> = (0..2).collect();
    let right: OrderedStore<i32> = (0..2).collect();
    let mine = left.handle_at(0).unwrap();
    let theirs = right.handle_at(0).unwrap();
    assert!(matches!(
        mine.compare(&theirs),
        Err(CollectionError::IllegalArgument(Veto::WrongCollection))
    ));
    assert_eq!(mine.partial_cmp(&theirs), None);

    let other = left.handle_at(1).unwrap();
    left.remove_handle(&other).unwrap();
    assert!(mine.compare(&other).unwrap_err().is_stale());
}

#[rstest]
fn test_compare_rejects_mixed_orientation() {
    let store: OrderedStore<i32> = (0..2).collect();
    let first = store.handle_at(0).unwrap();
    let second = store.handle_at(1).unwrap();
    assert!(first.compare(&second.flipped()).is_err());
}

#[rstest]
#[should_panic(expected = "handles are not comparable")]
fn test_order_panics_for_foreign_handles() {
    let left: OrderedStore<i32> = (0..1).collect();
    let right: OrderedStore<i32> = (0..1).collect();
    let _ = left.handle_at(0).unwrap().order(&right.handle_at(0).unwrap());
}

#[rstest]
fn test_flipped_handles_invert_order_and_equality() {
    let store: OrderedStore<i32> = (0..3).collect();
    let first = store.handle_at(0).unwrap();
    let flipped = first.flipped();
    assert!(flipped.is_flipped());
    assert_ne!(first, flipped);
    assert!(first.same_element(&flipped));
    assert_eq!(flipped.flipped(), first);

    let second = store.handle_at(1).unwrap().flipped();
    assert!(second < flipped);
}

#[rstest]
fn test_flipped_handle_is_rejected_by_unflipped_collection() {
    let store: OrderedStore<i32> = (0..3).collect();
    let flipped = store.handle_at(0).unwrap().flipped();
    assert!(matches!(
        store.index_of(&flipped),
        Err(CollectionError::IllegalArgument(Veto::WrongCollection))
    ));
}

#[rstest]
fn test_handles_hash_by_identity() {
    let store: OrderedStore<i32> = [7, 7, 7].into_iter().collect();
    let handles: HashSet<Handle> = (0..3).map(|index| store.handle_at(index).unwrap()).collect();
    assert_eq!(handles.len(), 3);
    assert!(handles.contains(&store.handle_at(1).unwrap()));
}

#[rstest]
fn test_handle_survives_value_replacement() {
    let store: OrderedStore<i32> = (0..3).collect();
    let handle = store.handle_at(2).unwrap();
    store.set(2, 20).unwrap();
    assert_eq!(store.value_of(&handle).unwrap(), 20);
    assert_eq!(handle, store.handle_at(2).unwrap());
}

#[rstest]
fn test_handle_collection_identity() {
    let store: OrderedStore<i32> = (0..1).collect();
    let handle = store.handle_at(0).unwrap();
    assert_eq!(handle.collection(), store.id());
    assert_eq!(handle.collection(), store.exchange_id());
    assert_eq!(store.source_handle(&handle, store.id()), Some(handle.clone()));
}

#[rstest]
fn test_debug_shows_current_index() {
    let store: OrderedStore<i32> = (0..3).collect();
    let handle = store.handle_at(2).unwrap();
    store.pop_front();
    let rendered = format!("{handle:?}");
    assert!(rendered.contains("index: Some(1)"));
}
