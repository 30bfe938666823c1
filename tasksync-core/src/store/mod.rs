//! Observable value cells
//!
//! A [`Store`] holds one value and an ordered list of listeners. Every write
//! replaces the whole value and then calls each listener, in the order they
//! subscribed, with the value that was written.
//!
//! Subscribing calls the new listener once with the current value before
//! returning, so a listener never has to special-case "nothing seen yet".
//!
//! Listeners run outside the store's locks: a listener may read, write or
//! subscribe to any store, including the one that is notifying it.
//!
//! Writes are delivered in the order they were committed. Only one thread
//! delivers at a time: a write that lands while another delivery is running
//! (on another thread, or from inside a listener of the same store) is
//! queued and handed to listeners by the delivering thread once the current
//! round finishes. The last value every listener sees is therefore always
//! the value [`Store::get`] returns.

mod subscription;

pub use subscription::Subscription;

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use subscription::Unsubscribe;

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Inner<T> {
    value: RwLock<T>,
    listeners: Mutex<Vec<(u64, Listener<T>)>>,
    next_id: AtomicU64,
    /// Committed values not yet handed to listeners, in commit order
    outbox: Mutex<VecDeque<T>>,
    delivering: AtomicBool,
}

impl<T> Inner<T> {
    fn listeners(&self) -> MutexGuard<'_, Vec<(u64, Listener<T>)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn outbox(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.outbox.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Send + Sync> Unsubscribe for Inner<T> {
    fn remove(&self, id: u64) {
        self.listeners().retain(|(listener_id, _)| *listener_id != id);
    }
}

/// Clears the delivering flag even if a listener panics
struct DeliveryGuard<'a>(&'a AtomicBool);

impl Drop for DeliveryGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A committed write whose listeners have not been notified yet
///
/// Returned by [`Store::commit`]. Listeners are notified by
/// [`Pending::notify`] or when the value is dropped.
#[must_use = "dropping a Pending notifies listeners immediately"]
pub struct Pending<'a, T>
where
    T: Clone + Send + Sync + 'static,
{
    store: &'a Store<T>,
}

impl<T> Pending<'_, T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Notify listeners now
    pub fn notify(self) {
        drop(self);
    }
}

impl<T> Drop for Pending<'_, T>
where
    T: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.store.deliver();
    }
}

/// A shared, observable value
///
/// Cloning a `Store` yields another handle to the same cell.
pub struct Store<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Store<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a store holding `initial`
    pub fn new(initial: T) -> Self {
        Self {
            inner: Arc::new(Inner {
                value: RwLock::new(initial),
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
                outbox: Mutex::new(VecDeque::new()),
                delivering: AtomicBool::new(false),
            }),
        }
    }

    /// Current value
    pub fn get(&self) -> T {
        self.inner
            .value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the value and notify every listener
    pub fn set(&self, value: T) {
        self.commit(value).notify();
    }

    /// Replace the value, deferring notification
    ///
    /// The write is visible to [`Store::get`] and its place in the delivery
    /// order is fixed as soon as this returns. Callers holding their own lock
    /// commit under it and notify after releasing it.
    pub fn commit(&self, value: T) -> Pending<'_, T> {
        let mut current = self
            .inner
            .value
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *current = value.clone();
        self.inner.outbox().push_back(value);
        drop(current);
        Pending { store: self }
    }

    /// Derive the next value from the current one and commit it
    ///
    /// The read and the write happen under one lock, so a concurrent `set`
    /// cannot slip in between them.
    pub fn update<F>(&self, f: F) -> T
    where
        F: FnOnce(&T) -> T,
    {
        let next = {
            let mut current = self
                .inner
                .value
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let next = f(&current);
            *current = next.clone();
            self.inner.outbox().push_back(next.clone());
            next
        };
        self.deliver();
        next
    }

    /// Register a listener
    ///
    /// The listener is called immediately with the current value, then on
    /// every subsequent write until the returned [`Subscription`] is dropped
    /// or released.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let listener: Listener<T> = Arc::new(listener);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners().push((id, Arc::clone(&listener)));

        listener(&self.get());

        let weak = Arc::downgrade(&self.inner);
        Subscription::new(weak, id)
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.inner.listeners().len()
    }

    /// Drain the outbox unless another delivery is already doing so
    fn deliver(&self) {
        loop {
            if self
                .inner
                .delivering
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return;
            }

            {
                let _guard = DeliveryGuard(&self.inner.delivering);
                loop {
                    let next = self.inner.outbox().pop_front();
                    match next {
                        Some(value) => self.notify(&value),
                        None => break,
                    }
                }
            }

            // A write queued between the last pop and releasing the flag
            if self.inner.outbox().is_empty() {
                return;
            }
        }
    }

    fn notify(&self, value: &T) {
        // Snapshot so listeners can subscribe or unsubscribe while we iterate
        let listeners: Vec<Listener<T>> = self
            .inner
            .listeners()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            listener(value);
        }
    }
}

impl<T> Default for Store<T>
where
    T: Clone + Default + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> fmt::Debug for Store<T>
where
    T: Clone + fmt::Debug + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("value", &self.get())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder<T: Clone + Send + Sync + 'static>() -> (Arc<Mutex<Vec<T>>>, impl Fn(&T) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |value: &T| sink.lock().unwrap().push(value.clone()))
    }

    #[test]
    fn test_get_and_set() {
        let store = Store::new(1);
        assert_eq!(store.get(), 1);

        store.set(2);
        assert_eq!(store.get(), 2);
    }

    #[test]
    fn test_subscribe_receives_current_value_immediately() {
        let store = Store::new("initial".to_string());
        let (seen, listener) = recorder();

        let _sub = store.subscribe(listener);
        assert_eq!(*seen.lock().unwrap(), vec!["initial".to_string()]);
    }

    #[test]
    fn test_set_notifies_in_subscription_order() {
        let store = Store::new(0);
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = Arc::clone(&order);
        let _a = store.subscribe(move |v: &i32| first.lock().unwrap().push(("a", *v)));
        let second = Arc::clone(&order);
        let _b = store.subscribe(move |v: &i32| second.lock().unwrap().push(("b", *v)));

        store.set(5);

        assert_eq!(
            *order.lock().unwrap(),
            vec![("a", 0), ("b", 0), ("a", 5), ("b", 5)]
        );
    }

    #[test]
    fn test_setting_equal_value_still_notifies() {
        let store = Store::new(7);
        let (seen, listener) = recorder();
        let _sub = store.subscribe(listener);

        store.set(7);
        store.set(7);

        assert_eq!(*seen.lock().unwrap(), vec![7, 7, 7]);
    }

    #[test]
    fn test_update_derives_from_current() {
        let store = Store::new(10);
        let (seen, listener) = recorder();
        let _sub = store.subscribe(listener);

        let next = store.update(|v| v + 5);

        assert_eq!(next, 15);
        assert_eq!(store.get(), 15);
        assert_eq!(*seen.lock().unwrap(), vec![10, 15]);
    }

    #[test]
    fn test_drop_subscription_unsubscribes() {
        let store = Store::new(0);
        let (seen, listener) = recorder();

        {
            let _sub = store.subscribe(listener);
            assert_eq!(store.listener_count(), 1);
        }

        assert_eq!(store.listener_count(), 0);
        store.set(1);
        assert_eq!(*seen.lock().unwrap(), vec![0]);
    }

    #[test]
    fn test_explicit_unsubscribe() {
        let store = Store::new(0);
        let (seen, listener) = recorder();

        let sub = store.subscribe(listener);
        store.set(1);
        sub.unsubscribe();
        store.set(2);

        assert_eq!(*seen.lock().unwrap(), vec![0, 1]);
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn test_subscription_outlives_store() {
        let store = Store::new(0);
        let sub = store.subscribe(|_: &i32| {});
        drop(store);
        // Releasing against a dropped store is a no-op
        sub.unsubscribe();
    }

    #[test]
    fn test_listener_can_write_other_store() {
        let source = Store::new(1);
        let mirror = Store::new(0);

        let target = mirror.clone();
        let _sub = source.subscribe(move |v: &i32| target.set(v * 100));

        assert_eq!(mirror.get(), 100);
        source.set(3);
        assert_eq!(mirror.get(), 300);
    }

    #[test]
    fn test_listener_can_read_notifying_store() {
        let store = Store::new(1);
        let (seen, listener) = recorder();

        let reader = store.clone();
        let _sub = store.subscribe(move |_: &i32| listener(&reader.get()));

        store.set(4);
        assert_eq!(*seen.lock().unwrap(), vec![1, 4]);
    }

    #[test]
    fn test_commit_defers_notification() {
        let store = Store::new(0);
        let (seen, listener) = recorder();
        let _sub = store.subscribe(listener);

        let pending = store.commit(5);
        assert_eq!(store.get(), 5);
        assert_eq!(*seen.lock().unwrap(), vec![0]);

        pending.notify();
        assert_eq!(*seen.lock().unwrap(), vec![0, 5]);
    }

    #[test]
    fn test_listener_can_write_notifying_store() {
        let store = Store::new(0);
        let (seen, listener) = recorder();

        let writer = store.clone();
        let _bump = store.subscribe(move |v: &i32| {
            if *v == 1 {
                writer.set(2);
            }
        });
        let _sub = store.subscribe(listener);

        store.set(1);

        // The nested write is delivered after the round for 1 completes
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(store.get(), 2);
    }

    #[test]
    fn test_concurrent_writers_leave_listeners_on_final_value() {
        use std::sync::Barrier;
        use std::thread;

        for _ in 0..500 {
            let store = Store::new(0);
            let last_seen = Arc::new(Mutex::new(0));
            let sink = Arc::clone(&last_seen);
            let _sub = store.subscribe(move |v: &i32| *sink.lock().unwrap() = *v);

            let barrier = Arc::new(Barrier::new(2));
            let writers: Vec<_> = [1, 2]
                .into_iter()
                .map(|value| {
                    let store = store.clone();
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        store.set(value);
                    })
                })
                .collect();
            for writer in writers {
                writer.join().unwrap();
            }

            assert_eq!(*last_seen.lock().unwrap(), store.get());
        }
    }

    #[test]
    fn test_clones_share_state() {
        let store = Store::new(0);
        let other = store.clone();
        other.set(9);
        assert_eq!(store.get(), 9);
    }

    #[test]
    fn test_debug_format() {
        let store = Store::new(42);
        let rendered = format!("{:?}", store);
        assert!(rendered.contains("42"));
    }
}
