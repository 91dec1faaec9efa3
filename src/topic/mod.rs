//! Topics: ordered subscriptions with deferred, queued delivery.
//!
//! Publishing never calls a subscriber inline. [`Topic::publish`] schedules
//! one dispatch cycle on the topic's [`Scheduler`]; when that cycle runs it
//! walks the *live* subscription list with an index cursor:
//!
//! - inactive entries are skipped, so unsubscribing takes effect for every
//!   entry the cursor has not reached yet, even mid-cycle;
//! - entries appended by a callback during the cycle are visited later in the
//!   same cycle;
//! - `once` entries are deactivated right before their callback runs;
//! - a failing or panicking subscriber is reported to the error sink and the
//!   cycle moves on.
//!
//! # Example
//!
//! ```ignore
//! let queue = Arc::new(TaskQueue::new());
//! let topic = herald::topic::<(i32, String)>(queue.clone());
//!
//! let printer = Subscriber::new(|(n, s): &(i32, String)| println!("{n} {s}"));
//! let handle = topic.sub(&printer);
//!
//! topic.publish((1, "one".to_string()));
//! queue.run_pending();
//!
//! assert!(handle.unsubscribe());
//! ```

mod subscription;

use crate::diagnostics::{self, SharedSink};
use crate::error::SubscriberError;
use crate::scheduler::Scheduler;
use crate::types::{Context, Subscriber};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use subscription::SubscriptionList;

/// Topic configuration.
#[derive(Clone)]
pub struct TopicConfig {
    /// Where dispatch cycles are scheduled.
    pub scheduler: Arc<dyn Scheduler>,

    /// Sink for subscriber failures (None = process-wide sink).
    pub sink: Option<SharedSink>,
}

impl TopicConfig {
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            scheduler,
            sink: None,
        }
    }

    /// Report failures to `sink` instead of the process-wide sink.
    pub fn with_sink(mut self, sink: SharedSink) -> Self {
        self.sink = Some(sink);
        self
    }
}

impl fmt::Debug for TopicConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopicConfig")
            .field("custom_sink", &self.sink.is_some())
            .finish_non_exhaustive()
    }
}

/// Delivery counters for a topic.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicStats {
    /// Messages handed to `publish`.
    pub published: u64,
    /// Subscriber invocations that completed successfully.
    pub delivered: u64,
    /// Subscriber invocations that returned an error or panicked.
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    published: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

struct Shared<M> {
    name: Option<String>,
    config: TopicConfig,
    list: Mutex<SubscriptionList<M>>,
    counters: Counters,
}

/// Lets an [`Unsubscribe`] compact its topic without knowing the message type.
trait Compact: Send + Sync {
    fn compact(&self);
}

impl<M> Compact for Shared<M>
where
    Shared<M>: Send + Sync,
{
    fn compact(&self) {
        self.list.lock().compact();
    }
}

/// A message channel.
///
/// `Topic` is a handle: clones share the same subscriptions, and equality is
/// identity.
pub struct Topic<M> {
    shared: Arc<Shared<M>>,
}

impl<M: Send + 'static> Topic<M> {
    /// Create an anonymous topic.
    pub fn with_config(config: TopicConfig) -> Self {
        Self::build(None, config)
    }

    /// Create a named topic. The name shows up in logs and error reports.
    pub fn named(name: impl Into<String>, config: TopicConfig) -> Self {
        Self::build(Some(name.into()), config)
    }

    fn build(name: Option<String>, config: TopicConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                name,
                config,
                list: Mutex::new(SubscriptionList::new()),
                counters: Counters::default(),
            }),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.shared.name.as_deref()
    }

    /// Subscribe `subscriber` until it is unsubscribed.
    ///
    /// If the same subscriber is already active on this topic (with no
    /// context), nothing is added and the handle refers to the existing entry.
    pub fn sub(&self, subscriber: &Subscriber<M>) -> Unsubscribe {
        self.register(subscriber, None, false)
    }

    /// Like [`sub`](Topic::sub), binding `context` to every delivery.
    pub fn sub_with(&self, subscriber: &Subscriber<M>, context: Context) -> Unsubscribe {
        self.register(subscriber, Some(context), false)
    }

    /// Subscribe for a single delivery.
    pub fn once(&self, subscriber: &Subscriber<M>) -> Unsubscribe {
        self.register(subscriber, None, true)
    }

    /// Like [`once`](Topic::once), binding `context` to the delivery.
    pub fn once_with(&self, subscriber: &Subscriber<M>, context: Context) -> Unsubscribe {
        self.register(subscriber, Some(context), true)
    }

    fn register(
        &self,
        subscriber: &Subscriber<M>,
        context: Option<Context>,
        once: bool,
    ) -> Unsubscribe {
        let (entry, created) = self.shared.list.lock().insert(subscriber, context, once);
        if created {
            tracing::debug!(topic = ?self.shared.name, once, "subscribed");
        }

        let shared: Arc<dyn Compact> = self.shared.clone();
        Unsubscribe {
            active: Arc::clone(&entry.active),
            topic: Arc::downgrade(&shared),
        }
    }

    /// Deactivate every subscription of `subscriber`, whatever its context.
    pub fn unsub(&self, subscriber: &Subscriber<M>) {
        let mut list = self.shared.list.lock();
        let removed = list.deactivate_matching(subscriber);
        list.compact();
        if removed > 0 {
            tracing::debug!(topic = ?self.shared.name, removed, "unsubscribed by callback");
        }
    }

    /// Deactivate and clear every subscription.
    pub fn unsub_all(&self) {
        let mut list = self.shared.list.lock();
        let removed = list.deactivate_all();
        list.compact();
        tracing::debug!(topic = ?self.shared.name, removed, "unsubscribed all");
    }

    /// Schedule delivery of `message` to the active subscribers.
    ///
    /// Returns immediately; nothing is delivered until the scheduler runs
    /// the cycle.
    pub fn publish(&self, message: M) {
        self.shared.counters.published.fetch_add(1, Ordering::Relaxed);
        let shared = Arc::clone(&self.shared);
        self.shared
            .config
            .scheduler
            .schedule(Box::new(move || shared.dispatch(&message)));
    }

    /// Number of active subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.shared.list.lock().active_count()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriber_count() == 0
    }

    pub fn stats(&self) -> TopicStats {
        let c = &self.shared.counters;
        TopicStats {
            published: c.published.load(Ordering::Relaxed),
            delivered: c.delivered.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
        }
    }

    /// True if both handles refer to the same topic.
    pub fn ptr_eq(a: &Topic<M>, b: &Topic<M>) -> bool {
        Arc::ptr_eq(&a.shared, &b.shared)
    }
}

impl<M> Shared<M> {
    /// Run one dispatch cycle for `message`.
    fn dispatch(&self, message: &M) {
        tracing::trace!(topic = ?self.name, "dispatch cycle starting");
        let _walk = Walk::begin(&self.list);

        let mut cursor = 0;
        let mut visited = 0usize;
        loop {
            // The lock is released before the callback runs, so callbacks
            // may subscribe and unsubscribe freely.
            let Some(entry) = self.list.lock().get(cursor) else {
                break;
            };
            cursor += 1;

            let eligible = if entry.once {
                entry.deactivate()
            } else {
                entry.is_active()
            };
            if !eligible {
                continue;
            }

            visited += 1;
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                entry.subscriber.call(entry.context.as_ref(), message)
            }));
            let error = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(source)) => Some(SubscriberError::Failed {
                    topic: self.name.clone(),
                    source,
                }),
                Err(payload) => Some(SubscriberError::Panicked {
                    topic: self.name.clone(),
                    message: panic_message(payload.as_ref()),
                }),
            };

            match error {
                None => {
                    self.counters.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Some(error) => {
                    self.counters.failed.fetch_add(1, Ordering::Relaxed);
                    self.report(&error);
                }
            }
        }

        tracing::trace!(topic = ?self.name, visited, "dispatch cycle finished");
    }

    /// A panicking sink is logged and otherwise ignored.
    fn report(&self, error: &SubscriberError) {
        let reported = catch_unwind(AssertUnwindSafe(|| match &self.config.sink {
            Some(sink) => sink.report(error),
            None => diagnostics::report(error),
        }));
        if let Err(payload) = reported {
            tracing::warn!(
                topic = ?self.name,
                panic = %panic_message(payload.as_ref()),
                "error sink panicked"
            );
        }
    }
}

/// Registers a dispatch cycle as a walker for as long as it lives, so the
/// list is compacted again even if the cycle unwinds.
struct Walk<'a, M> {
    list: &'a Mutex<SubscriptionList<M>>,
}

impl<'a, M> Walk<'a, M> {
    fn begin(list: &'a Mutex<SubscriptionList<M>>) -> Self {
        list.lock().begin_walk();
        Walk { list }
    }
}

impl<M> Drop for Walk<'_, M> {
    fn drop(&mut self) {
        self.list.lock().end_walk();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl<M> Clone for Topic<M> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<M> PartialEq for Topic<M> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl<M> Eq for Topic<M> {}

impl<M> fmt::Debug for Topic<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Topic")
            .field("name", &self.shared.name)
            .field("subscribers", &self.shared.list.lock().active_count())
            .finish()
    }
}

/// Handle that removes exactly one subscription.
///
/// Clones share the subscription. The handle does not keep its topic alive.
#[derive(Clone)]
pub struct Unsubscribe {
    active: Arc<AtomicBool>,
    topic: Weak<dyn Compact>,
}

impl Unsubscribe {
    /// Deactivate the subscription.
    ///
    /// Returns true only for the call that actually deactivated it; false if
    /// it was already inactive, including after a `once` delivery.
    pub fn unsubscribe(&self) -> bool {
        let was_active = self.active.swap(false, Ordering::SeqCst);
        if was_active {
            if let Some(topic) = self.topic.upgrade() {
                topic.compact();
            }
        }
        was_active
    }

    /// True until the subscription is deactivated by any means.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("active", &self.is_active())
            .finish()
    }
}
