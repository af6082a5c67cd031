//! In-process publish/subscribe registry.
//!
//! The bus lives on the loop thread only. Handlers are held weakly so a
//! component can keep its own `Rc<EventBus>` without forming a cycle.

use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use shared::{
    domain::ComponentId,
    event::{Action, Event},
};
use tracing::{debug, trace};

pub trait Subscriber {
    fn on_event(&self, event: &Event);
}

struct Subscription {
    action: Action,
    target: ComponentId,
    subscriber: ComponentId,
    handler: Weak<dyn Subscriber>,
}

impl Subscription {
    fn is_key(&self, action: Action, target: ComponentId, subscriber: ComponentId) -> bool {
        self.action == action && self.target == target && self.subscriber == subscriber
    }

    fn is_live(&self) -> bool {
        self.handler.strong_count() > 0
    }
}

#[derive(Default)]
pub struct EventBus {
    subscriptions: RefCell<Vec<Subscription>>,
}

impl EventBus {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Delivers `event` to every subscriber registered for its action and
    /// source, in registration order. Registry changes made by handlers take
    /// effect from the next publish on.
    pub fn publish(&self, event: Event) {
        let action = event.action();
        let handlers: Vec<Rc<dyn Subscriber>> = {
            let mut subscriptions = self.subscriptions.borrow_mut();
            subscriptions.retain(Subscription::is_live);
            subscriptions
                .iter()
                .filter(|sub| sub.action == action && sub.target == event.source)
                .filter_map(|sub| sub.handler.upgrade())
                .collect()
        };

        if handlers.is_empty() {
            trace!(%action, source = %event.source, "event has no subscribers");
            return;
        }

        for handler in handlers {
            handler.on_event(&event);
        }
    }

    /// Returns `false` when the triple was already registered.
    pub fn subscribe(
        &self,
        action: Action,
        target: ComponentId,
        subscriber: ComponentId,
        handler: Weak<dyn Subscriber>,
    ) -> bool {
        let mut subscriptions = self.subscriptions.borrow_mut();
        if subscriptions
            .iter()
            .any(|sub| sub.is_key(action, target, subscriber))
        {
            return false;
        }
        debug!(%action, %target, %subscriber, "subscribe");
        subscriptions.push(Subscription {
            action,
            target,
            subscriber,
            handler,
        });
        true
    }

    /// Returns `false` when nothing matched.
    pub fn unsubscribe(&self, action: Action, target: ComponentId, subscriber: ComponentId) -> bool {
        let mut subscriptions = self.subscriptions.borrow_mut();
        let before = subscriptions.len();
        subscriptions.retain(|sub| !sub.is_key(action, target, subscriber));
        let removed = subscriptions.len() != before;
        if removed {
            debug!(%action, %target, %subscriber, "unsubscribe");
        }
        removed
    }

    pub fn is_subscribed(
        &self,
        action: Action,
        target: ComponentId,
        subscriber: ComponentId,
    ) -> bool {
        self.subscriptions
            .borrow()
            .iter()
            .any(|sub| sub.is_key(action, target, subscriber) && sub.is_live())
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions
            .borrow()
            .iter()
            .filter(|sub| sub.is_live())
            .count()
    }
}

#[cfg(test)]
#[path = "tests/bus_tests.rs"]
mod tests;
