use std::sync::{Arc, Mutex};
use std::time::Duration;

use devloop::broadcast::{Broadcast, Delivery};
use tokio::time::timeout;

fn recording_subscriber<V: Clone + Send + 'static>(
    chan: &Broadcast<V>,
) -> Arc<Mutex<Vec<V>>>
where
    V: Eq,
{
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    chan.subscribe(move |v: &V| {
        log.lock().unwrap().push(v.clone());
        Delivery::Retain
    });
    seen
}

#[test]
fn every_subscriber_sees_each_send_exactly_once() {
    let chan: Broadcast<&'static str> = Broadcast::new();
    let seen_a = recording_subscriber(&chan);
    let seen_b = recording_subscriber(&chan);

    chan.send(&"one");
    chan.send(&"two");

    assert_eq!(*seen_a.lock().unwrap(), vec!["one", "two"]);
    assert_eq!(*seen_b.lock().unwrap(), vec!["one", "two"]);
}

#[test]
fn subscriber_registered_after_a_send_misses_it() {
    let chan: Broadcast<i32> = Broadcast::new();
    chan.send(&1);

    let seen = recording_subscriber(&chan);
    chan.send(&2);

    assert_eq!(*seen.lock().unwrap(), vec![2]);
}

#[test]
fn send_with_no_subscribers_is_a_no_op() {
    let chan: Broadcast<i32> = Broadcast::new();
    chan.send(&42);
}

#[test]
fn unsubscribe_is_idempotent() {
    let chan: Broadcast<i32> = Broadcast::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    let id = chan.subscribe(move |v: &i32| {
        log.lock().unwrap().push(*v);
        Delivery::Retain
    });

    assert!(chan.unsubscribe(id));
    assert!(!chan.unsubscribe(id));

    chan.send(&1);
    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(chan.subscriber_count(), 0);
}

#[test]
fn self_unsubscribe_during_delivery_spares_other_subscribers() {
    let chan: Broadcast<i32> = Broadcast::new();

    let once_count = Arc::new(Mutex::new(0usize));
    let once_log = once_count.clone();
    chan.subscribe(move |_: &i32| {
        *once_log.lock().unwrap() += 1;
        Delivery::Unsubscribe
    });

    let durable = recording_subscriber(&chan);

    chan.send(&1);
    chan.send(&2);

    assert_eq!(*once_count.lock().unwrap(), 1);
    assert_eq!(*durable.lock().unwrap(), vec![1, 2]);
}

#[tokio::test]
async fn wait_resolves_on_matching_send() {
    let chan: Broadcast<&'static str> = Broadcast::new();
    let wait = chan.wait("go");

    chan.send(&"other");
    chan.send(&"go");

    wait.await;
    assert_eq!(chan.subscriber_count(), 0);
}

#[tokio::test]
async fn wait_does_not_resolve_without_a_matching_send() {
    let chan: Broadcast<&'static str> = Broadcast::new();
    let wait = chan.wait("go");

    chan.send(&"not-go");

    let res = timeout(Duration::from_millis(50), wait).await;
    assert!(res.is_err(), "wait must not resolve without a matching send");
}

#[tokio::test]
async fn concurrent_waits_each_resolve_from_a_single_send() {
    let chan: Broadcast<i32> = Broadcast::new();
    let first = chan.wait(7);
    let second = chan.wait(7);

    chan.send(&7);

    first.await;
    second.await;
}

#[tokio::test]
async fn send_and_wait_delivers_then_awaits_the_answer() {
    let chan: Broadcast<&'static str> = Broadcast::new();
    let seen = recording_subscriber(&chan);

    let wait = chan.send_and_wait(&"ping", "pong");
    // The send part is synchronous.
    assert_eq!(*seen.lock().unwrap(), vec!["ping"]);

    chan.send(&"pong");
    wait.await;
}

#[test]
fn dropping_a_wait_unsubscribes_it() {
    let chan: Broadcast<i32> = Broadcast::new();
    let wait = chan.wait(1);
    assert_eq!(chan.subscriber_count(), 1);

    drop(wait);
    assert_eq!(chan.subscriber_count(), 0);
}
