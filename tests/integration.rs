//! End-to-end delivery tests driven by a manually pumped queue.

use herald::{pub_sub, topic, CapturingSink, Context, Subscriber, TaskQueue, Topic, TopicConfig};
use parking_lot::Mutex;
use std::sync::Arc;

type Log = Arc<Mutex<Vec<String>>>;

fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn recorder(log: &Log, tag: &'static str) -> Subscriber<String> {
    let log = Arc::clone(log);
    Subscriber::new(move |msg: &String| log.lock().push(format!("{tag}:{msg}")))
}

fn setup<M: Send + 'static>() -> (Arc<TaskQueue>, Topic<M>) {
    let queue = Arc::new(TaskQueue::new());
    let topic = topic::<M>(queue.clone());
    (queue, topic)
}

// --- Registry ---

#[test]
fn test_registry_returns_same_topic() {
    let queue = Arc::new(TaskQueue::new());
    let registry = pub_sub::<String>(queue);

    let first = registry.topic("test");
    let second = registry.topic("test");
    let other = registry.topic("other");

    assert!(Topic::ptr_eq(&first, &second));
    assert!(!Topic::ptr_eq(&first, &other));
}

#[test]
fn test_registry_unsub_all_clears_every_topic() {
    let queue = Arc::new(TaskQueue::new());
    let registry = pub_sub::<String>(queue.clone());
    let log = new_log();

    let t1 = registry.topic("test1");
    let t2 = registry.topic("test2");
    t1.sub(&recorder(&log, "a"));
    t2.sub(&recorder(&log, "b"));

    registry.unsub_all();

    t1.publish("hello".to_string());
    queue.run_pending();
    t2.publish("world".to_string());
    queue.run_pending();

    assert!(log.lock().is_empty());
    // Topics survive teardown and can be reused.
    assert!(Topic::ptr_eq(&registry.topic("test1"), &t1));
    t1.sub(&recorder(&log, "c"));
    t1.publish("again".to_string());
    queue.run_pending();
    assert_eq!(*log.lock(), vec!["c:again"]);
}

// --- Subscription and Unsubscription ---

#[test]
fn test_subscribers_called_in_order() {
    let (queue, topic) = setup::<String>();
    let log = new_log();

    topic.sub(&recorder(&log, "a"));
    topic.sub(&recorder(&log, "b"));
    topic.publish("hello".to_string());

    assert!(log.lock().is_empty(), "delivery must be deferred");
    queue.run_pending();

    assert_eq!(*log.lock(), vec!["a:hello", "b:hello"]);
}

#[test]
fn test_unsub_by_callback() {
    let (queue, topic) = setup::<String>();
    let log = new_log();
    let a = recorder(&log, "a");

    topic.sub(&a);
    topic.unsub(&a);
    topic.publish("hello".to_string());
    queue.run_pending();

    assert!(log.lock().is_empty());
}

#[test]
fn test_unsub_unknown_callback_is_noop() {
    let (queue, topic) = setup::<String>();
    let log = new_log();

    topic.sub(&recorder(&log, "a"));
    topic.unsub(&recorder(&log, "stranger"));
    topic.publish("x".to_string());
    queue.run_pending();

    assert_eq!(*log.lock(), vec!["a:x"]);
}

#[test]
fn test_unsubscribe_handle() {
    let (queue, topic) = setup::<String>();
    let log = new_log();

    let handle = topic.sub(&recorder(&log, "a"));
    assert!(handle.unsubscribe());

    topic.publish("hello".to_string());
    queue.run_pending();

    assert!(log.lock().is_empty());
    assert!(!handle.unsubscribe());
}

#[test]
fn test_unsubscribe_one_of_many() {
    let (queue, topic) = setup::<String>();
    let log = new_log();

    topic.sub(&recorder(&log, "a"));
    let b = topic.sub(&recorder(&log, "b"));
    topic.sub(&recorder(&log, "c"));
    b.unsubscribe();

    topic.publish("m".to_string());
    queue.run_pending();

    assert_eq!(*log.lock(), vec!["a:m", "c:m"]);
}

#[test]
fn test_resubscribe_after_unsubscribe() {
    let (queue, topic) = setup::<String>();
    let log = new_log();
    let a = recorder(&log, "a");

    let first = topic.sub(&a);
    first.unsubscribe();
    let second = topic.sub(&a);

    topic.publish("x".to_string());
    queue.run_pending();

    assert_eq!(*log.lock(), vec!["a:x"]);
    assert!(!first.unsubscribe());
    assert!(second.unsubscribe());
}

#[test]
fn test_publish_without_subscribers() {
    let (queue, topic) = setup::<String>();

    topic.publish("nobody".to_string());
    assert_eq!(queue.run_pending(), 1);
    assert_eq!(topic.stats().published, 1);
    assert_eq!(topic.stats().delivered, 0);
}

#[test]
fn test_each_publish_is_its_own_cycle() {
    let (queue, topic) = setup::<String>();
    let log = new_log();
    topic.sub(&recorder(&log, "a"));
    topic.sub(&recorder(&log, "b"));

    topic.publish("1".to_string());
    topic.publish("2".to_string());
    assert_eq!(queue.pending(), 2);
    queue.run_pending();

    assert_eq!(*log.lock(), vec!["a:1", "b:1", "a:2", "b:2"]);
}

// --- Context Binding ---

#[test]
fn test_context_binding() {
    let (queue, topic) = setup::<()>();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let s = Arc::clone(&seen);
    let sub = Subscriber::contextual(move |ctx: Option<&Context>, _: &()| {
        let value = ctx
            .and_then(|c| c.downcast_ref::<&str>())
            .ok_or("missing context")?;
        s.lock().push(value.to_string());
        Ok::<(), &str>(())
    });

    topic.sub_with(&sub, Context::new("context"));
    topic.publish(());
    queue.run_pending();

    assert_eq!(*seen.lock(), vec!["context"]);
}

#[test]
fn test_context_binding_with_once() {
    let queue = Arc::new(TaskQueue::new());
    let sink = Arc::new(CapturingSink::new());
    let topic = Topic::<()>::with_config(TopicConfig::new(queue.clone()).with_sink(sink.clone()));
    let seen = Arc::new(Mutex::new(0));

    let s = Arc::clone(&seen);
    let sub = Subscriber::contextual(move |ctx: Option<&Context>, _: &()| {
        let value = ctx.and_then(|c| c.downcast_ref::<u32>()).ok_or("missing context")?;
        *s.lock() += *value;
        Ok::<(), &str>(())
    });

    topic.once_with(&sub, Context::new(5u32));
    topic.publish(());
    topic.publish(());
    queue.run_pending();

    assert_eq!(*seen.lock(), 5);
    assert!(sink.is_empty());
}

#[test]
fn test_same_callback_different_contexts() {
    let (queue, topic) = setup::<()>();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let s = Arc::clone(&seen);
    let sub = Subscriber::contextual(move |ctx: Option<&Context>, _: &()| {
        let label = ctx.and_then(|c| c.downcast_ref::<char>()).copied().unwrap_or('-');
        s.lock().push(label);
        Ok::<(), herald::BoxError>(())
    });

    let x = Context::new('x');
    topic.sub(&sub);
    topic.sub_with(&sub, x.clone());
    topic.sub_with(&sub, x);
    topic.sub_with(&sub, Context::new('y'));
    assert_eq!(topic.subscriber_count(), 3);

    topic.publish(());
    queue.run_pending();
    assert_eq!(*seen.lock(), vec!['-', 'x', 'y']);

    topic.unsub(&sub);
    assert!(topic.is_empty());
}

// --- One-Time Subscription ---

#[test]
fn test_once_fires_once() {
    let (queue, topic) = setup::<String>();
    let log = new_log();

    topic.once(&recorder(&log, "a"));
    topic.publish("hello".to_string());
    queue.run_pending();
    topic.publish("world".to_string());
    queue.run_pending();

    assert_eq!(*log.lock(), vec!["a:hello"]);
}

#[test]
fn test_once_across_queued_publications() {
    let (queue, topic) = setup::<String>();
    let log = new_log();

    topic.once(&recorder(&log, "a"));
    topic.publish("1".to_string());
    topic.publish("2".to_string());
    queue.run_pending();

    assert_eq!(*log.lock(), vec!["a:1"]);
}

#[test]
fn test_once_unsubscribe_twice() {
    let (_, topic) = setup::<String>();
    let log = new_log();

    let handle = topic.once(&recorder(&log, "a"));
    assert!(handle.unsubscribe());
    assert!(!handle.unsubscribe());
}

#[test]
fn test_once_unsubscribe_after_delivery() {
    let (queue, topic) = setup::<String>();
    let log = new_log();

    let handle = topic.once(&recorder(&log, "a"));
    topic.publish("hello".to_string());
    queue.run_pending();

    assert!(!handle.is_active());
    assert!(!handle.unsubscribe());
}

#[test]
fn test_once_unsubscribed_before_publish() {
    let (queue, topic) = setup::<String>();
    let log = new_log();

    let handle = topic.once(&recorder(&log, "a"));
    handle.unsubscribe();
    topic.publish("hello".to_string());
    queue.run_pending();

    assert!(log.lock().is_empty());
}

#[test]
fn test_sub_while_once_active_keeps_once() {
    let (queue, topic) = setup::<String>();
    let log = new_log();
    let a = recorder(&log, "a");

    topic.once(&a);
    topic.sub(&a);
    topic.publish("1".to_string());
    topic.publish("2".to_string());
    queue.run_pending();

    assert_eq!(*log.lock(), vec!["a:1"]);
}

// --- Unsubscribing All Subscribers ---

#[test]
fn test_unsub_all() {
    let (queue, topic) = setup::<String>();
    let log = new_log();

    topic.sub(&recorder(&log, "a"));
    topic.sub(&recorder(&log, "b"));
    topic.unsub_all();
    topic.publish("hello".to_string());
    queue.run_pending();

    assert!(log.lock().is_empty());
    assert!(topic.is_empty());
}

#[test]
fn test_unsub_all_after_publish_before_run() {
    let (queue, topic) = setup::<String>();
    let log = new_log();

    let handle = topic.sub(&recorder(&log, "a"));
    topic.publish("queued".to_string());
    topic.unsub_all();
    queue.run_pending();

    assert!(log.lock().is_empty());
    assert!(!handle.unsubscribe());
}

// --- Argument Order ---

#[test]
fn test_argument_order_preserved() {
    let (queue, topic) = setup::<(i32, &'static str, i32)>();
    let seen = Arc::new(Mutex::new(None));

    let s = Arc::clone(&seen);
    topic.sub(&Subscriber::new(move |args: &(i32, &'static str, i32)| {
        *s.lock() = Some(*args);
    }));
    topic.publish((1, "qwerty", 3));
    queue.run_pending();

    assert_eq!(*seen.lock(), Some((1, "qwerty", 3)));
}
