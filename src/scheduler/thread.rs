//! Scheduler backed by a dedicated worker thread.

use super::{Scheduler, Task};
use crossbeam_channel::{bounded, unbounded, Sender};
use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::{self, JoinHandle, ThreadId};

/// Runs scheduled tasks one at a time on its own thread.
///
/// Dropping the handle closes the channel, lets the worker finish every task
/// already scheduled, and joins it.
pub struct DispatchThread {
    sender: Option<Sender<Task>>,
    handle: Option<JoinHandle<()>>,
    worker: ThreadId,
}

impl DispatchThread {
    /// Spawn a worker thread named `name`.
    pub fn spawn(name: impl Into<String>) -> io::Result<Self> {
        let name = name.into();
        let (sender, receiver) = unbounded::<Task>();

        let handle = thread::Builder::new().name(name.clone()).spawn(move || {
            tracing::trace!(worker = %name, "dispatch thread starting");
            for task in receiver {
                if catch_unwind(AssertUnwindSafe(task)).is_err() {
                    tracing::warn!(worker = %name, "scheduled task panicked");
                }
            }
            tracing::trace!(worker = %name, "dispatch thread exiting");
        })?;

        Ok(Self {
            sender: Some(sender),
            worker: handle.thread().id(),
            handle: Some(handle),
        })
    }

    /// Block until every task scheduled before this call has run.
    ///
    /// Returns immediately when called from the worker thread itself.
    pub fn flush(&self) {
        if thread::current().id() == self.worker {
            return;
        }
        let Some(sender) = &self.sender else {
            return;
        };

        let (done_tx, done_rx) = bounded::<()>(1);
        let task: Task = Box::new(move || {
            let _ = done_tx.send(());
        });
        if sender.send(task).is_ok() {
            let _ = done_rx.recv();
        }
    }
}

impl Scheduler for DispatchThread {
    fn schedule(&self, task: Task) {
        if let Some(sender) = &self.sender {
            if sender.send(task).is_err() {
                tracing::warn!("dispatch thread is gone, dropping task");
            }
        }
    }
}

impl Drop for DispatchThread {
    fn drop(&mut self) {
        drop(self.sender.take());

        if let Some(handle) = self.handle.take() {
            if thread::current().id() != self.worker {
                let _ = handle.join();
            }
        }
    }
}
