//! Bounded capture logs with change notification.
//!
//! Every interceptor stores what it captures in a [`BoundedLog`]: a
//! fixed-capacity, oldest-first sequence that evicts strictly FIFO once full
//! and notifies its subscribers after every change.
//!
//! # Example
//!
//! ```
//! use pageprobe_core::buffer::BoundedLog;
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let log = BoundedLog::new(2);
//! let changes = Rc::new(Cell::new(0));
//! let seen = Rc::clone(&changes);
//! let sub = log.subscribe(move || seen.set(seen.get() + 1));
//!
//! log.push("a");
//! log.push("b");
//! log.push("c");
//! assert_eq!(log.entries(), vec!["b", "c"]);
//! assert_eq!(changes.get(), 3);
//!
//! sub.unsubscribe();
//! log.clear();
//! assert_eq!(changes.get(), 3);
//! ```

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

type Callback<A> = Rc<dyn Fn(&A)>;

trait Detach {
    fn detach(&self, id: u64);
}

struct ListenerSet<A> {
    next_id: Cell<u64>,
    callbacks: RefCell<Vec<(u64, Callback<A>)>>,
}

impl<A> Detach for ListenerSet<A> {
    fn detach(&self, id: u64) {
        self.callbacks.borrow_mut().retain(|(cb_id, _)| *cb_id != id);
    }
}

/// Fan-out list of callbacks receiving `&A`.
///
/// Notification runs over a copy of the registered callbacks, so a callback
/// may subscribe or unsubscribe (itself or others) while being notified.
pub struct Listeners<A> {
    inner: Rc<ListenerSet<A>>,
}

impl<A: 'static> Listeners<A> {
    /// Create an empty listener list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ListenerSet {
                next_id: Cell::new(1),
                callbacks: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Register a callback. It stays registered until the returned
    /// [`Subscription`] is explicitly unsubscribed.
    pub fn add<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&A) + 'static,
    {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner
            .callbacks
            .borrow_mut()
            .push((id, Rc::new(callback)));

        let set: Weak<dyn Detach> = Rc::downgrade(&self.inner) as Weak<dyn Detach>;
        Subscription { set, id }
    }

    /// Invoke every callback registered at the time of the call.
    pub fn notify(&self, value: &A) {
        let snapshot: Vec<Callback<A>> = self
            .inner
            .callbacks
            .borrow()
            .iter()
            .map(|(_, cb)| Rc::clone(cb))
            .collect();

        for callback in snapshot {
            callback(value);
        }
    }

    /// Number of registered callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.callbacks.borrow().len()
    }

    /// Check if no callbacks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<A: 'static> Default for Listeners<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Clone for Listeners<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<A> fmt::Debug for Listeners<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("len", &self.inner.callbacks.borrow().len())
            .finish()
    }
}

/// Handle returned by `subscribe`; call [`Subscription::unsubscribe`] to stop
/// receiving notifications.
///
/// Dropping the handle does not unsubscribe.
pub struct Subscription {
    set: Weak<dyn Detach>,
    id: u64,
}

impl Subscription {
    /// Remove the callback. Calling this more than once is harmless.
    pub fn unsubscribe(&self) {
        if let Some(set) = self.set.upgrade() {
            set.detach(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

struct LogInner<T> {
    entries: RefCell<VecDeque<T>>,
    capacity: usize,
    next_id: Cell<u64>,
    listeners: Listeners<()>,
}

/// Fixed-capacity, oldest-first log with change notification.
///
/// Cloning yields another handle to the same log.
pub struct BoundedLog<T> {
    inner: Rc<LogInner<T>>,
}

impl<T: Clone + 'static> BoundedLog<T> {
    /// Create a log holding at most `capacity` entries (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Rc::new(LogInner {
                entries: RefCell::new(VecDeque::with_capacity(capacity)),
                capacity,
                next_id: Cell::new(1),
                listeners: Listeners::new(),
            }),
        }
    }

    /// Maximum number of entries.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Allocate the next entry id. Ids increase for the lifetime of the log
    /// and are not reset by [`BoundedLog::clear`].
    pub fn next_id(&self) -> u64 {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        id
    }

    /// Append an entry, evicting the oldest while at capacity, then notify.
    pub fn push(&self, entry: T) {
        {
            let mut entries = self.inner.entries.borrow_mut();
            while entries.len() >= self.inner.capacity {
                entries.pop_front();
            }
            entries.push_back(entry);
        }
        self.inner.listeners.notify(&());
    }

    /// Ordered copy of all entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<T> {
        self.inner.entries.borrow().iter().cloned().collect()
    }

    /// The last `n` entries, oldest first.
    #[must_use]
    pub fn recent(&self, n: usize) -> Vec<T> {
        let entries = self.inner.entries.borrow();
        let skip = entries.len().saturating_sub(n);
        entries.iter().skip(skip).cloned().collect()
    }

    /// Most recently pushed entry.
    #[must_use]
    pub fn latest(&self) -> Option<T> {
        self.inner.entries.borrow().back().cloned()
    }

    /// Number of entries currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entries.borrow().len()
    }

    /// Check if the log holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply `edit` to the first entry matching `find`, then notify.
    ///
    /// Returns `false` without notifying when no held entry matches, e.g.
    /// because it was already evicted.
    pub fn update<P, F>(&self, find: P, edit: F) -> bool
    where
        P: Fn(&T) -> bool,
        F: FnOnce(&mut T),
    {
        let found = {
            let mut entries = self.inner.entries.borrow_mut();
            match entries.iter_mut().find(|entry| find(entry)) {
                Some(entry) => {
                    edit(entry);
                    true
                }
                None => false,
            }
        };
        if found {
            self.inner.listeners.notify(&());
        }
        found
    }

    /// Remove every entry and notify.
    pub fn clear(&self) {
        self.inner.entries.borrow_mut().clear();
        self.inner.listeners.notify(&());
    }

    /// Register a zero-argument change callback.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + 'static,
    {
        self.inner.listeners.add(move |_: &()| callback())
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.len()
    }
}

impl<T> Clone for BoundedLog<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for BoundedLog<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedLog")
            .field("len", &self.inner.entries.borrow().len())
            .field("capacity", &self.inner.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::cell::RefCell;

    #[test]
    fn test_update_edits_held_entry_and_notifies() {
        let log = BoundedLog::new(2);
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        let _sub = log.subscribe(move || counter.set(counter.get() + 1));

        log.push(1);
        log.push(2);
        assert!(log.update(|v| *v == 1, |v| *v = 10));
        assert_eq!(log.entries(), vec![10, 2]);
        assert_eq!(hits.get(), 3);

        log.push(3);
        assert!(!log.update(|v| *v == 10, |v| *v = 99));
        assert_eq!(log.entries(), vec![2, 3]);
        assert_eq!(hits.get(), 4);
    }

    #[test]
    fn test_push_and_entries_in_order() {
        let log = BoundedLog::new(3);
        log.push(1);
        log.push(2);
        assert_eq!(log.entries(), vec![1, 2]);
        assert_eq!(log.len(), 2);
        assert!(!log.is_empty());
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let log = BoundedLog::new(500);
        for i in 1..=501 {
            log.push(i);
        }
        let entries = log.entries();
        assert_eq!(entries.len(), 500);
        assert!(!entries.contains(&1));
        assert_eq!(entries[0], 2);
        assert_eq!(entries[499], 501);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let log = BoundedLog::new(0);
        assert_eq!(log.capacity(), 1);
        log.push("a");
        log.push("b");
        assert_eq!(log.entries(), vec!["b"]);
    }

    #[test]
    fn test_ids_monotonic_across_clear() {
        let log: BoundedLog<u64> = BoundedLog::new(4);
        let a = log.next_id();
        let b = log.next_id();
        log.clear();
        let c = log.next_id();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_recent_and_latest() {
        let log = BoundedLog::new(10);
        for i in 0..6 {
            log.push(i);
        }
        assert_eq!(log.recent(3), vec![3, 4, 5]);
        assert_eq!(log.recent(100).len(), 6);
        assert_eq!(log.latest(), Some(5));
    }

    #[test]
    fn test_clear_notifies() {
        let log = BoundedLog::new(4);
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let _sub = log.subscribe(move || c.set(c.get() + 1));

        log.push(1);
        log.clear();
        assert!(log.is_empty());
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn test_unsubscribe_stops_only_that_callback() {
        let log = BoundedLog::new(4);
        let first = Rc::new(Cell::new(0));
        let second = Rc::new(Cell::new(0));
        let f = Rc::clone(&first);
        let s = Rc::clone(&second);
        let sub_first = log.subscribe(move || f.set(f.get() + 1));
        let _sub_second = log.subscribe(move || s.set(s.get() + 1));

        log.push(1);
        sub_first.unsubscribe();
        sub_first.unsubscribe();
        log.push(2);

        assert_eq!(first.get(), 1);
        assert_eq!(second.get(), 2);
        assert_eq!(log.subscriber_count(), 1);
    }

    #[test]
    fn test_self_unsubscribe_during_notify() {
        let log = BoundedLog::new(4);
        let calls = Rc::new(RefCell::new(Vec::new()));
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        let c = Rc::clone(&calls);
        let _a = log.subscribe(move || c.borrow_mut().push("a"));

        let c = Rc::clone(&calls);
        let own = Rc::clone(&slot);
        let sub_b = log.subscribe(move || {
            c.borrow_mut().push("b");
            if let Some(sub) = own.borrow().as_ref() {
                sub.unsubscribe();
            }
        });
        *slot.borrow_mut() = Some(sub_b);

        let c = Rc::clone(&calls);
        let _c = log.subscribe(move || c.borrow_mut().push("c"));

        log.push(1);
        log.push(2);

        assert_eq!(*calls.borrow(), vec!["a", "b", "c", "a", "c"]);
    }

    #[test]
    fn test_subscriber_can_read_log() {
        let log = BoundedLog::new(4);
        let seen = Rc::new(Cell::new(0));
        let reader = log.clone();
        let s = Rc::clone(&seen);
        let _sub = log.subscribe(move || s.set(reader.len()));

        log.push("x");
        log.push("y");
        assert_eq!(seen.get(), 2);
    }

    #[test]
    fn test_listeners_pass_value() {
        let listeners: Listeners<i32> = Listeners::new();
        let total = Rc::new(Cell::new(0));
        let t = Rc::clone(&total);
        let sub = listeners.add(move |v| t.set(t.get() + *v));

        listeners.notify(&5);
        listeners.notify(&7);
        sub.unsubscribe();
        listeners.notify(&100);

        assert_eq!(total.get(), 12);
        assert!(listeners.is_empty());
    }

    #[test]
    fn test_unsubscribe_after_log_dropped() {
        let sub = {
            let log: BoundedLog<i32> = BoundedLog::new(2);
            log.subscribe(|| {})
        };
        sub.unsubscribe();
    }

    proptest! {
        #[test]
        fn prop_keeps_last_capacity_pushes(capacity in 1usize..64, pushes in 0usize..256) {
            let log = BoundedLog::new(capacity);
            for i in 0..pushes {
                log.push(i);
            }
            let expected: Vec<usize> = (pushes.saturating_sub(capacity)..pushes).collect();
            prop_assert_eq!(log.len(), pushes.min(capacity));
            prop_assert_eq!(log.entries(), expected);
        }
    }
}
