//! Manually pumped FIFO run loop.

use super::{Scheduler, Task};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::ReentrantMutex;
use std::cell::Cell;

/// A run loop that only makes progress when pumped.
///
/// Tasks scheduled while the queue is being drained are picked up by the same
/// [`run_pending`](TaskQueue::run_pending) call. Pumping from inside a running
/// task does nothing, so tasks never overlap.
pub struct TaskQueue {
    sender: Sender<Task>,
    receiver: Receiver<Task>,
    /// Set while the owning thread is running a task.
    pump: ReentrantMutex<Cell<bool>>,
}

impl TaskQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            pump: ReentrantMutex::new(Cell::new(false)),
        }
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Run the oldest waiting task. Returns false if the queue was empty.
    pub fn run_next(&self) -> bool {
        let pump = self.pump.lock();
        if pump.get() {
            return false;
        }
        self.run_one(&pump)
    }

    /// Run tasks until the queue is empty, including tasks scheduled by the
    /// tasks being run. Returns how many tasks ran.
    pub fn run_pending(&self) -> usize {
        let pump = self.pump.lock();
        if pump.get() {
            return 0;
        }
        let mut ran = 0;
        while self.run_one(&pump) {
            ran += 1;
        }
        ran
    }

    fn run_one(&self, running: &Cell<bool>) -> bool {
        match self.receiver.try_recv() {
            Ok(task) => {
                let _running = Running::enter(running);
                task();
                true
            }
            Err(_) => false,
        }
    }
}

/// Clears the running flag even if the task unwinds.
struct Running<'a>(&'a Cell<bool>);

impl<'a> Running<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Running(flag)
    }
}

impl Drop for Running<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl Scheduler for TaskQueue {
    fn schedule(&self, task: Task) {
        // Both ends live in `self`, so the channel cannot be disconnected.
        let _ = self.sender.send(task);
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}
