//! In-process message bus.
//!
//! The engine publishes every [`Event`] here; the CLI, tests and any UI layer
//! subscribe with a callback. Delivery is synchronous and in subscription
//! order, on the caller's thread.

use tracing::debug;

use crate::events::Event;

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Box<dyn FnMut(&Event)>;

#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    subscribers: Vec<(SubscriptionId, Callback)>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&Event) + 'static,
    {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        debug!(?id, "EventBus::subscribe");
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _)| *sub != id);
        self.subscribers.len() != before
    }

    /// Deliver `event` to every subscriber. No subscribers is fine.
    pub fn publish(&mut self, event: &Event) {
        debug!(
            event_type = event.event_type(),
            subscribers = self.subscribers.len(),
            "EventBus::publish"
        );
        for (_, callback) in self.subscribers.iter_mut() {
            callback(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn sample() -> Event {
        Event::DayRolledOver {
            habit_key: "read".into(),
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            qualified: true,
            carryover: 0.0,
            at: Utc::now(),
        }
    }

    #[test]
    fn publish_reaches_every_subscriber() {
        let mut bus = EventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let a = Rc::clone(&seen);
        let b = Rc::clone(&seen);
        bus.subscribe(move |e| a.borrow_mut().push(format!("a:{}", e.event_type())));
        bus.subscribe(move |e| b.borrow_mut().push(format!("b:{}", e.event_type())));
        bus.publish(&sample());
        assert_eq!(
            *seen.borrow(),
            vec!["a:DayRolledOver".to_string(), "b:DayRolledOver".to_string()]
        );
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let mut bus = EventBus::new();
        let count = Rc::new(RefCell::new(0));
        let c = Rc::clone(&count);
        let id = bus.subscribe(move |_| *c.borrow_mut() += 1);
        bus.publish(&sample());
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(&sample());
        assert_eq!(*count.borrow(), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
