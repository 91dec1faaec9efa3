//! Error types for subscriber delivery.

use thiserror::Error;

/// Boxed error a fallible subscriber may return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A failure raised by a subscriber callback while it was being invoked.
///
/// Never returned to the publisher. Each failure is caught at the point of
/// invocation and handed to exactly one [`ErrorSink`](crate::ErrorSink).
#[derive(Debug, Error)]
pub enum SubscriberError {
    #[error("subscriber on topic {} failed: {source}", display_topic(.topic))]
    Failed {
        topic: Option<String>,
        #[source]
        source: BoxError,
    },

    #[error("subscriber on topic {} panicked: {message}", display_topic(.topic))]
    Panicked {
        topic: Option<String>,
        message: String,
    },
}

impl SubscriberError {
    /// Name of the topic the failing subscriber was attached to.
    pub fn topic_name(&self) -> Option<&str> {
        match self {
            SubscriberError::Failed { topic, .. } | SubscriberError::Panicked { topic, .. } => {
                topic.as_deref()
            }
        }
    }

    /// True if the subscriber panicked rather than returning an error.
    pub fn is_panic(&self) -> bool {
        matches!(self, SubscriberError::Panicked { .. })
    }
}

fn display_topic(topic: &Option<String>) -> &str {
    topic.as_deref().unwrap_or("<anonymous>")
}
