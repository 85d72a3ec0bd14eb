//! Property-based tests for OrderedStore against a `VecDeque` model.
//!
//! Every random operation sequence is replayed on both; contents must agree
//! after each step, and every live handle must still resolve to the value it
//! was minted for.

use std::collections::VecDeque;

use proptest::prelude::*;
use stable_order::prelude::*;

#[derive(Debug, Clone)]
enum Operation {
    PushBack(i32),
    PushFront(i32),
    Insert(usize, i32),
    Remove(usize),
    PopFront,
    PopBack,
    Set(usize, i32),
    InsertAll(usize, Vec<i32>),
}

fn operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        3 => any::<i32>().prop_map(Operation::PushBack),
        3 => any::<i32>().prop_map(Operation::PushFront),
        3 => (any::<usize>(), any::<i32>()).prop_map(|(index, value)| Operation::Insert(index, value)),
        3 => any::<usize>().prop_map(Operation::Remove),
        1 => Just(Operation::PopFront),
        1 => Just(Operation::PopBack),
        1 => (any::<usize>(), any::<i32>()).prop_map(|(index, value)| Operation::Set(index, value)),
        1 => (any::<usize>(), prop::collection::vec(any::<i32>(), 0..8))
            .prop_map(|(index, values)| Operation::InsertAll(index, values)),
    ]
}

/// Applies `operation` to the model as an unbounded deque.
fn apply_model(model: &mut VecDeque<i32>, operation: &Operation) {
    let len = model.len();
    match operation {
        Operation::PushBack(value) => model.push_back(*value),
        Operation::PushFront(value) => model.push_front(*value),
        Operation::Insert(index, value) => model.insert(index % (len + 1), *value),
        Operation::Remove(index) => {
            if len > 0 {
                model.remove(index % len);
            }
        }
        Operation::PopFront => {
            model.pop_front();
        }
        Operation::PopBack => {
            model.pop_back();
        }
        Operation::Set(index, value) => {
            if len > 0 {
                model[index % len] = *value;
            }
        }
        Operation::InsertAll(index, values) => {
            let at = index % (len + 1);
            for (step, value) in values.iter().enumerate() {
                model.insert(at + step, *value);
            }
        }
    }
}

fn apply_store(store: &OrderedStore<i32>, operation: &Operation) -> Vec<(Handle, i32)> {
    let len = store.len();
    match operation {
        Operation::PushBack(value) => vec![(store.push_back(*value), *value)],
        Operation::PushFront(value) => vec![(store.push_front(*value), *value)],
        Operation::Insert(index, value) => {
            vec![(store.insert(index % (len + 1), *value).unwrap(), *value)]
        }
        Operation::Remove(index) => {
            if len > 0 {
                store.remove(index % len).unwrap();
            }
            Vec::new()
        }
        Operation::PopFront => {
            store.pop_front();
            Vec::new()
        }
        Operation::PopBack => {
            store.pop_back();
            Vec::new()
        }
        Operation::Set(index, value) => {
            if len > 0 {
                let handle = store.handle_at(index % len).unwrap();
                store.set(index % len, *value).unwrap();
                return vec![(handle, *value)];
            }
            Vec::new()
        }
        Operation::InsertAll(index, values) => store
            .insert_all(index % (len + 1), values.clone())
            .unwrap()
            .into_iter()
            .zip(values.iter().copied())
            .collect(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Growable store behaves exactly like a deque.
    #[test]
    fn prop_store_matches_deque(operations in prop::collection::vec(operation(), 0..200)) {
        let store = OrderedStore::new();
        let mut model = VecDeque::new();
        let mut tracked: Vec<(Handle, i32)> = Vec::new();

        for operation in &operations {
            apply_model(&mut model, operation);
            for (handle, value) in apply_store(&store, operation) {
                tracked.retain(|(known, _)| !known.same_element(&handle));
                tracked.push((handle, value));
            }
            prop_assert_eq!(store.to_vec(), model.iter().copied().collect::<Vec<_>>());
        }

        for (handle, value) in &tracked {
            if handle.is_present() {
                let index = store.index_of(handle).unwrap();
                prop_assert_eq!(model[index], *value);
                prop_assert_eq!(handle.index(), Some(index));
            } else {
                prop_assert!(store.index_of(handle).unwrap_err().is_stale());
            }
        }
    }

    /// Handles stay ordered like their elements.
    #[test]
    fn prop_handle_order_matches_index_order(
        operations in prop::collection::vec(operation(), 1..100)
    ) {
        let store = OrderedStore::new();
        for operation in &operations {
            apply_store(&store, operation);
        }
        let handles: Vec<Handle> = (0..store.len()).map(|index| store.handle_at(index).unwrap()).collect();
        for pair in handles.windows(2) {
            prop_assert!(pair[0] < pair[1]);
            prop_assert!(pair[1].flipped() < pair[0].flipped());
        }
    }

    /// A fixed store of capacity N holds the last N values pushed at the back.
    #[test]
    fn prop_fixed_store_keeps_newest(
        capacity in 1usize..32,
        values in prop::collection::vec(any::<i32>(), 0..200)
    ) {
        let store = OrderedStore::with_config(StoreConfig::fixed(capacity).unwrap()).unwrap();
        for value in &values {
            store.push_back(*value);
            prop_assert!(store.len() <= capacity);
        }
        let expected: Vec<i32> = values.iter().rev().take(capacity).rev().copied().collect();
        prop_assert_eq!(store.to_vec(), expected);
    }

    /// Pushing N + 1 values into a full store evicts exactly the oldest one
    /// per push, invalidating its handle.
    #[test]
    fn prop_fixed_store_evicts_one_per_overflow(capacity in 1usize..16) {
        let store = OrderedStore::with_config(StoreConfig::fixed(capacity).unwrap()).unwrap();
        let values: Vec<i32> = (0..=i32::try_from(capacity).unwrap()).collect();
        let handles: Vec<Handle> = values.iter().map(|value| store.push_back(*value)).collect();

        prop_assert!(!handles[0].is_present());
        prop_assert!(handles[1..].iter().all(Handle::is_present));
        prop_assert_eq!(store.to_vec(), values[1..].to_vec());
    }
}
