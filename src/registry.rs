//! Name-keyed topic registry.

use crate::topic::{Topic, TopicConfig};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;

/// Creates topics on first use and hands out the same topic for the same
/// name afterwards.
pub struct Registry<M> {
    config: TopicConfig,
    topics: RwLock<HashMap<String, Topic<M>>>,
}

impl<M: Send + 'static> Registry<M> {
    /// Create an empty registry. Every topic it creates uses `config`.
    pub fn with_config(config: TopicConfig) -> Self {
        Self {
            config,
            topics: RwLock::new(HashMap::new()),
        }
    }

    /// Get the topic called `name`, creating it if needed.
    ///
    /// Names are compared exactly; no normalization is applied.
    pub fn topic(&self, name: &str) -> Topic<M> {
        if let Some(topic) = self.topics.read().get(name) {
            return topic.clone();
        }

        self.topics
            .write()
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!(topic = name, "creating topic");
                Topic::named(name, self.config.clone())
            })
            .clone()
    }

    /// Unsubscribe everything from every topic created so far.
    ///
    /// The topics themselves stay registered.
    pub fn unsub_all(&self) {
        // Release the map lock before taking any topic lock.
        let topics: Vec<Topic<M>> = self.topics.read().values().cloned().collect();
        for topic in &topics {
            topic.unsub_all();
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.topics.read().contains_key(name)
    }

    /// Names of all registered topics, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.topics.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.topics.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.read().is_empty()
    }
}

impl<M> fmt::Debug for Registry<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("topics", &self.topics.read().len())
            .finish()
    }
}
