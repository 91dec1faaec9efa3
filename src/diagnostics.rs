//! Process-wide reporting of subscriber failures.
//!
//! Every [`SubscriberError`] is reported exactly once. A topic reports to its
//! own sink when one was configured with
//! [`TopicConfig::with_sink`](crate::TopicConfig::with_sink), and to the
//! process-wide sink otherwise. The process-wide sink defaults to
//! [`TracingSink`].

use crate::error::SubscriberError;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Receives subscriber failures.
pub trait ErrorSink: Send + Sync {
    fn report(&self, error: &SubscriberError);
}

impl<F> ErrorSink for F
where
    F: Fn(&SubscriberError) + Send + Sync,
{
    fn report(&self, error: &SubscriberError) {
        self(error)
    }
}

/// Shared handle to a sink.
pub type SharedSink = Arc<dyn ErrorSink>;

static GLOBAL_SINK: RwLock<Option<SharedSink>> = parking_lot::const_rwlock(None);

/// Replace the process-wide sink. Returns the previously installed sink, or
/// `None` if the default was active.
pub fn set_error_sink(sink: SharedSink) -> Option<SharedSink> {
    GLOBAL_SINK.write().replace(sink)
}

/// Restore the default [`TracingSink`].
pub fn reset_error_sink() -> Option<SharedSink> {
    GLOBAL_SINK.write().take()
}

/// Report a failure to the process-wide sink.
pub fn report(error: &SubscriberError) {
    // Clone out so a sink may itself call `set_error_sink`.
    let sink = GLOBAL_SINK.read().clone();
    match sink {
        Some(sink) => sink.report(error),
        None => TracingSink.report(error),
    }
}

/// Logs failures at error level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn report(&self, error: &SubscriberError) {
        tracing::error!(
            topic = error.topic_name().unwrap_or("<anonymous>"),
            panicked = error.is_panic(),
            "{}",
            error
        );
    }
}

/// A reported failure, as seen by a [`CapturingSink`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapturedError {
    pub topic: Option<String>,
    pub message: String,
    pub panicked: bool,
}

/// Records every failure it receives. Intended for tests.
#[derive(Debug, Default)]
pub struct CapturingSink {
    errors: Mutex<Vec<CapturedError>>,
}

impl CapturingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything reported so far, oldest first.
    pub fn errors(&self) -> Vec<CapturedError> {
        self.errors.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.errors.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.lock().is_empty()
    }

    pub fn clear(&self) {
        self.errors.lock().clear();
    }
}

impl ErrorSink for CapturingSink {
    fn report(&self, error: &SubscriberError) {
        // Keep only the innermost message for returned errors; the wrapper
        // text is the same for every entry.
        let message = match error {
            SubscriberError::Failed { source, .. } => source.to_string(),
            SubscriberError::Panicked { message, .. } => message.clone(),
        };
        self.errors.lock().push(CapturedError {
            topic: error.topic_name().map(str::to_owned),
            message,
            panicked: error.is_panic(),
        });
    }
}
