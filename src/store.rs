use std::sync::Mutex;

use crate::core::item::Item;

/// Handle returned by [`ItemStore::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(usize);

type Subscriber = Box<dyn Fn(&[Item]) + Send + Sync>;

/// The in-memory ordered collection of Items plus its change notification.
///
/// The sequence is always sorted ascending by due date; `insert` positions
/// each item with a binary search instead of re-sorting. Items live only for
/// the current load cycle and are cleared wholesale by `reset`.
pub struct ItemStore {
    items: Mutex<Vec<Item>>,
    subscribers: Mutex<Vec<(usize, Subscriber)>>,
    next_id: Mutex<usize>,
}

impl Default for ItemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemStore {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            subscribers: Mutex::new(Vec::new()),
            next_id: Mutex::new(0),
        }
    }

    /// Clear the sequence to empty and notify subscribers.
    pub fn reset(&self) {
        {
            let mut items = self.items.lock().unwrap();
            items.clear();
        }
        self.notify();
    }

    /// Insert an item at its sorted position and notify subscribers
    /// synchronously with the new sequence.
    pub fn insert(&self, item: Item) {
        {
            let mut items = self.items.lock().unwrap();
            let dates: Vec<i64> = items.iter().map(|i| i.date.timestamp_millis()).collect();
            let index = insertion_index(&dates, item.date.timestamp_millis());
            items.insert(index, item);
        }
        self.notify();
    }

    /// Snapshot of the current sequence without subscribing.
    pub fn current(&self) -> Vec<Item> {
        self.items.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register for change notifications. The callback runs synchronously on
    /// every mutation with the full new sequence, and must not call back into
    /// subscribe/unsubscribe.
    pub fn subscribe(&self, callback: impl Fn(&[Item]) + Send + Sync + 'static) -> SubscriptionId {
        let mut next_id = self.next_id.lock().unwrap();
        let id = *next_id;
        *next_id += 1;
        self.subscribers
            .lock()
            .unwrap()
            .push((id, Box::new(callback)));
        SubscriptionId(id)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers
            .lock()
            .unwrap()
            .retain(|(sub_id, _)| *sub_id != id.0);
    }

    fn notify(&self) {
        let snapshot = self.current();
        for (_, callback) in self.subscribers.lock().unwrap().iter() {
            callback(&snapshot);
        }
    }
}

/// Locate the index at which `target` should be inserted into the sorted
/// slice `dates` to keep it sorted.
///
/// On an exact match this returns the first index found by the bisection,
/// which is not necessarily the first or last duplicate. That matches the
/// upstream behavior and is fine for display ordering.
fn insertion_index(dates: &[i64], target: i64) -> usize {
    let mut low: isize = 0;
    let mut high: isize = dates.len() as isize - 1;
    while low <= high {
        let mid = (low + high) / 2;
        let probe = dates[mid as usize];
        if probe < target {
            low = mid + 1;
        } else if probe > target {
            high = mid - 1;
        } else {
            return mid as usize;
        }
    }
    low as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::item::Completion;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn item(name: &str, timestamp: i64) -> Item {
        Item::new(
            name,
            "Class",
            "",
            "https://example.com",
            Utc.timestamp_opt(timestamp, 0).unwrap(),
            Completion::Unknown,
        )
    }

    fn is_sorted(items: &[Item]) -> bool {
        items.windows(2).all(|w| w[0].date <= w[1].date)
    }

    #[test]
    fn insertion_index_empty() {
        assert_eq!(insertion_index(&[], 5), 0);
    }

    #[test]
    fn insertion_index_bounds() {
        let dates = [10, 20, 30];
        assert_eq!(insertion_index(&dates, 5), 0);
        assert_eq!(insertion_index(&dates, 15), 1);
        assert_eq!(insertion_index(&dates, 25), 2);
        assert_eq!(insertion_index(&dates, 35), 3);
    }

    #[test]
    fn insertion_index_duplicate_returns_matching_position() {
        let dates = [10, 20, 20, 20, 30];
        let index = insertion_index(&dates, 20);
        assert_eq!(dates[index], 20);
    }

    #[test]
    fn stays_sorted_under_arbitrary_insertions() {
        let store = ItemStore::new();
        for (i, ts) in [50, 10, 30, 30, 90, 0, 70, 30, 100, 20].iter().enumerate() {
            store.insert(item(&format!("a{}", i), *ts));
            assert!(is_sorted(&store.current()));
        }
        assert_eq!(store.len(), 10);
    }

    #[test]
    fn reset_then_inserts_yield_matching_length() {
        let store = ItemStore::new();
        store.insert(item("old", 1));
        store.reset();
        assert!(store.is_empty());
        for i in 0..5 {
            store.insert(item("new", i));
        }
        assert_eq!(store.len(), 5);
    }

    #[test]
    fn subscribers_see_every_change_until_unsubscribed() {
        let store = ItemStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let id = store.subscribe(move |items| {
            assert!(items.windows(2).all(|w| w[0].date <= w[1].date));
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        store.insert(item("a", 10));
        store.insert(item("b", 5));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        store.unsubscribe(id);
        store.insert(item("c", 7));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.len(), 3);
    }
}
