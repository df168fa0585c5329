// In-process topic exchange with AMQP-style routing keys.
//
// Topics are `.`-separated words. Subscription patterns may use `*` for
// exactly one word and `#` for zero or more words. Every subscription owns a
// bounded queue; publishing never waits on a slow subscriber.

use crate::domain::BusError;
use crate::domain::ports::{Delivery, MessageBus, Subscription};
use crate::interface_adapters::utils::rng::rand_id;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, warn};

// Log the first dropped message and then every Nth one per subscription.
const DROP_LOG_EVERY: u64 = 100;

struct Route {
    id: u64,
    pattern: String,
    sender: mpsc::Sender<Delivery>,
    dropped: AtomicU64,
}

pub struct TopicExchange {
    routes: RwLock<Vec<Route>>,
    queue_capacity: usize,
    closed: AtomicBool,
}

impl TopicExchange {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            routes: RwLock::new(Vec::new()),
            queue_capacity: queue_capacity.max(1),
            closed: AtomicBool::new(false),
        }
    }

    pub fn unsubscribe(&self, id: u64) -> bool {
        let mut routes = self.routes.write().unwrap_or_else(|e| e.into_inner());
        let before = routes.len();
        routes.retain(|route| route.id != id);
        routes.len() != before
    }

    pub fn subscription_count(&self) -> usize {
        self.routes.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Stops routing. Every open subscription sees the end of its stream.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.routes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    fn prune_closed(&self) {
        let mut routes = self.routes.write().unwrap_or_else(|e| e.into_inner());
        routes.retain(|route| {
            let open = !route.sender.is_closed();
            if !open {
                debug!(subscription = route.id, pattern = %route.pattern, "pruned closed subscription");
            }
            open
        });
    }
}

impl MessageBus for TopicExchange {
    fn publish(&self, topic: &str, payload: Arc<str>) -> Result<(), BusError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }
        if !is_valid_topic(topic) {
            return Err(BusError::InvalidTopic(topic.to_string()));
        }

        let mut saw_closed = false;
        {
            let routes = self.routes.read().unwrap_or_else(|e| e.into_inner());
            for route in routes.iter().filter(|r| topic_matches(&r.pattern, topic)) {
                let delivery = Delivery {
                    topic: topic.to_string(),
                    payload: payload.clone(),
                };
                match route.sender.try_send(delivery) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        let dropped = route.dropped.fetch_add(1, Ordering::Relaxed);
                        if dropped % DROP_LOG_EVERY == 0 {
                            warn!(
                                subscription = route.id,
                                pattern = %route.pattern,
                                dropped = dropped + 1,
                                "subscriber queue full; dropping message"
                            );
                        }
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => saw_closed = true,
                }
            }
        }

        if saw_closed {
            self.prune_closed();
        }
        Ok(())
    }

    fn subscribe(&self, pattern: &str) -> Result<Subscription, BusError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }
        if !is_valid_pattern(pattern) {
            return Err(BusError::InvalidTopic(pattern.to_string()));
        }

        let (sender, receiver) = mpsc::channel(self.queue_capacity);
        let id = rand_id();
        self.routes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(Route {
                id,
                pattern: pattern.to_string(),
                sender,
                dropped: AtomicU64::new(0),
            });

        Ok(Subscription {
            id,
            pattern: pattern.to_string(),
            receiver,
        })
    }
}

/// True when `topic` is routed to a subscription on `pattern`.
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let topic: Vec<&str> = topic.split('.').collect();
    words_match(&pattern, &topic)
}

fn words_match(pattern: &[&str], topic: &[&str]) -> bool {
    match (pattern.first(), topic.first()) {
        (None, None) => true,
        (Some(&"#"), _) => {
            words_match(&pattern[1..], topic)
                || (!topic.is_empty() && words_match(pattern, &topic[1..]))
        }
        (Some(&"*"), Some(_)) => words_match(&pattern[1..], &topic[1..]),
        (Some(p), Some(t)) if p == t => words_match(&pattern[1..], &topic[1..]),
        _ => false,
    }
}

fn is_valid_topic(topic: &str) -> bool {
    !topic.is_empty()
        && topic
            .split('.')
            .all(|word| !word.is_empty() && word != "*" && word != "#")
}

fn is_valid_pattern(pattern: &str) -> bool {
    !pattern.is_empty() && pattern.split('.').all(|word| !word.is_empty())
}
