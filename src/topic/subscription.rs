//! Subscription entries and the list a topic walks during dispatch.

use crate::types::{Context, Subscriber};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One registered callback. Owned by its topic; only the `active` flag is
/// shared outward, through an [`Unsubscribe`](super::Unsubscribe) handle.
pub(crate) struct Subscription<M> {
    pub(crate) subscriber: Subscriber<M>,
    pub(crate) context: Option<Context>,
    pub(crate) once: bool,
    pub(crate) active: Arc<AtomicBool>,
}

impl<M> Subscription<M> {
    fn new(subscriber: Subscriber<M>, context: Option<Context>, once: bool) -> Self {
        Self {
            subscriber,
            context,
            once,
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Returns true only for the call that flipped the entry to inactive.
    pub(crate) fn deactivate(&self) -> bool {
        self.active.swap(false, Ordering::SeqCst)
    }

    fn matches(&self, subscriber: &Subscriber<M>, context: Option<&Context>) -> bool {
        self.subscriber.same(subscriber) && Context::same_opt(self.context.as_ref(), context)
    }
}

/// Ordered subscriptions, in delivery order.
///
/// Dispatch walks the list by index while callbacks may append to it, so
/// removal only ever marks entries inactive. Inactive entries are dropped by
/// [`compact`](SubscriptionList::compact) once no cycle is walking.
pub(crate) struct SubscriptionList<M> {
    entries: Vec<Arc<Subscription<M>>>,
    /// Dispatch cycles currently holding a cursor into `entries`.
    walkers: usize,
}

impl<M> SubscriptionList<M> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
            walkers: 0,
        }
    }

    /// Add a subscription unless the same (subscriber, context) pair is
    /// already active, in which case the existing entry is returned.
    pub(crate) fn insert(
        &mut self,
        subscriber: &Subscriber<M>,
        context: Option<Context>,
        once: bool,
    ) -> (Arc<Subscription<M>>, bool) {
        if let Some(existing) = self
            .entries
            .iter()
            .find(|e| e.is_active() && e.matches(subscriber, context.as_ref()))
        {
            return (Arc::clone(existing), false);
        }

        let entry = Arc::new(Subscription::new(subscriber.clone(), context, once));
        self.entries.push(Arc::clone(&entry));
        (entry, true)
    }

    pub(crate) fn get(&self, index: usize) -> Option<Arc<Subscription<M>>> {
        self.entries.get(index).cloned()
    }

    /// Deactivate every active entry for `subscriber`, whatever its context.
    pub(crate) fn deactivate_matching(&mut self, subscriber: &Subscriber<M>) -> usize {
        self.entries
            .iter()
            .filter(|e| e.subscriber.same(subscriber))
            .filter(|e| e.deactivate())
            .count()
    }

    pub(crate) fn deactivate_all(&mut self) -> usize {
        self.entries.iter().filter(|e| e.deactivate()).count()
    }

    pub(crate) fn active_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_active()).count()
    }

    pub(crate) fn begin_walk(&mut self) {
        self.walkers += 1;
    }

    pub(crate) fn end_walk(&mut self) {
        self.walkers -= 1;
        self.compact();
    }

    /// Drop inactive entries, unless a cycle is mid-walk.
    pub(crate) fn compact(&mut self) {
        if self.walkers == 0 {
            self.entries.retain(|e| e.is_active());
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
