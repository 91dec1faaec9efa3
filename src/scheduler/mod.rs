//! Deferred task scheduling.
//!
//! Topics never deliver inline: every publication becomes one [`Task`] handed
//! to a [`Scheduler`], which runs it after the publishing call has returned.
//!
//! Two schedulers are provided:
//! - [`TaskQueue`]: a manually pumped run loop. Nothing runs until the owner
//!   calls [`TaskQueue::run_pending`], which makes delivery fully
//!   deterministic in tests.
//! - [`DispatchThread`]: a dedicated worker thread that runs tasks serially as
//!   soon as they arrive.
//!
//! # Example
//!
//! ```ignore
//! let queue = Arc::new(TaskQueue::new());
//! let topic = herald::topic::<&str>(queue.clone());
//! topic.sub(&Subscriber::new(|msg| println!("got {msg}")));
//!
//! topic.publish("hello");
//! assert_eq!(queue.pending(), 1);
//! queue.run_pending();
//! ```

mod queue;
mod thread;

pub use queue::TaskQueue;
pub use thread::DispatchThread;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// The host's deferred-task facility.
///
/// Implementations must never run `task` before `schedule` returns, and must
/// run tasks one at a time in the order they were scheduled.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, task: Task);
}
