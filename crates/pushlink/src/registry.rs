//! Subscriber registry.
//!
//! A [`SubscriberSet`] holds callbacks for one event type. Notification
//! snapshots the current members and releases the lock before calling any
//! of them, so callbacks may subscribe, unsubscribe or query the manager
//! freely. A callback that panics is logged and skipped; the remaining
//! callbacks still run.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Members<T> {
    next_id: u64,
    callbacks: Vec<(u64, Callback<T>)>,
}

/// A set of callbacks notified of events of type `T`.
pub struct SubscriberSet<T> {
    label: &'static str,
    members: Arc<Mutex<Members<T>>>,
}

impl<T: 'static> SubscriberSet<T> {
    /// Create an empty set. `label` names the set in logs.
    #[must_use]
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            members: Arc::new(Mutex::new(Members {
                next_id: 0,
                callbacks: Vec::new(),
            })),
        }
    }

    /// Register `callback`.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.insert(Arc::new(callback)).0
    }

    /// Register `callback` and immediately deliver `current` to it alone.
    pub fn subscribe_with_current<F>(&self, callback: F, current: &T) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let (subscription, callback) = self.insert(Arc::new(callback));
        invoke(self.label, subscription.id, &callback, current);
        subscription
    }

    /// Deliver `event` to every member registered when the call starts.
    ///
    /// Returns the number of callbacks that completed without panicking.
    pub fn notify(&self, event: &T) -> usize {
        let snapshot: Vec<(u64, Callback<T>)> = self.members.lock().callbacks.clone();

        let mut delivered = 0;
        for (id, callback) in &snapshot {
            if invoke(self.label, *id, callback, event) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Number of registered callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.lock().callbacks.len()
    }

    /// Whether no callbacks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, callback: Callback<T>) -> (Subscription, Callback<T>) {
        let id = {
            let mut members = self.members.lock();
            let id = members.next_id;
            members.next_id += 1;
            members.callbacks.push((id, Arc::clone(&callback)));
            id
        };

        let members: Weak<Mutex<Members<T>>> = Arc::downgrade(&self.members);
        let remove = Box::new(move || {
            if let Some(members) = members.upgrade() {
                members.lock().callbacks.retain(|(member, _)| *member != id);
            }
        });

        (
            Subscription {
                id,
                remove: Some(remove),
            },
            callback,
        )
    }
}

impl<T> std::fmt::Debug for SubscriberSet<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberSet")
            .field("label", &self.label)
            .field("len", &self.members.lock().callbacks.len())
            .finish()
    }
}

/// Registration handle returned by [`SubscriberSet::subscribe`].
///
/// Dropping the handle keeps the callback registered; call
/// [`unsubscribe`](Self::unsubscribe) to remove it.
#[must_use = "dropping a Subscription keeps the callback registered with no way to remove it"]
pub struct Subscription {
    id: u64,
    remove: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Identifier of this registration within its set.
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Remove the callback. Notifications already in progress for this
    /// callback run to completion; no new ones start.
    pub fn unsubscribe(mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

fn invoke<T>(label: &'static str, id: u64, callback: &Callback<T>, event: &T) -> bool {
    match catch_unwind(AssertUnwindSafe(|| callback(event))) {
        Ok(()) => true,
        Err(payload) => {
            tracing::error!(
                subscribers = label,
                subscriber = id,
                panic = %panic_message(payload.as_ref()),
                "subscriber callback panicked"
            );
            false
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
