//! # Herald
//!
//! In-process publish/subscribe: topics with ordered subscriptions, one-shot
//! subscriptions, bulk unsubscription, and deferred delivery that stays
//! correct while subscribers add or remove subscriptions mid-delivery.
//!
//! ## Core Concepts
//!
//! - **Topics**: Ordered subscriber lists; `publish` schedules one dispatch cycle
//! - **Subscribers**: Shared callbacks, optionally bound to a context value
//! - **Schedulers**: The deferred-task facility dispatch cycles run on
//! - **Registries**: Name-keyed topic stores with bulk teardown
//! - **Diagnostics**: Where failing subscribers are reported
//!
//! ## Example
//!
//! ```ignore
//! use herald::{pub_sub, Subscriber, TaskQueue};
//! use std::sync::Arc;
//!
//! let queue = Arc::new(TaskQueue::new());
//! let registry = pub_sub::<(u32, String)>(queue.clone());
//!
//! let orders = registry.topic("orders");
//! let unsubscribe = orders.sub(&Subscriber::new(|(id, item): &(u32, String)| {
//!     println!("order {id}: {item}");
//! }));
//!
//! orders.publish((1, "coffee".to_string()));
//! queue.run_pending();
//!
//! assert!(unsubscribe.unsubscribe());
//! registry.unsub_all();
//! ```

pub mod diagnostics;
pub mod error;
pub mod registry;
pub mod scheduler;
pub mod topic;
pub mod types;

use std::sync::Arc;

// Re-exports
pub use diagnostics::{
    report, reset_error_sink, set_error_sink, CapturedError, CapturingSink, ErrorSink,
    SharedSink, TracingSink,
};
pub use error::{BoxError, SubscriberError};
pub use registry::Registry;
pub use scheduler::{DispatchThread, Scheduler, Task, TaskQueue};
pub use topic::{Topic, TopicConfig, TopicStats, Unsubscribe};
pub use types::{Context, Subscriber};

/// Create a registry whose topics schedule delivery on `scheduler`.
pub fn pub_sub<M: Send + 'static>(scheduler: Arc<dyn Scheduler>) -> Registry<M> {
    Registry::with_config(TopicConfig::new(scheduler))
}

/// Create a standalone anonymous topic that schedules delivery on `scheduler`.
pub fn topic<M: Send + 'static>(scheduler: Arc<dyn Scheduler>) -> Topic<M> {
    Topic::with_config(TopicConfig::new(scheduler))
}
