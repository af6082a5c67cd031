use std::rc::{Rc, Weak};

use shared::{
    domain::ComponentId,
    event::{Action, Event, Signal},
};

use crate::bus::{EventBus, Subscriber};

/// Identity plus bus access shared by every panel participant.
pub struct Component {
    id: ComponentId,
    bus: Rc<EventBus>,
}

impl Component {
    pub fn new(bus: Rc<EventBus>) -> Self {
        Self {
            id: ComponentId::random(),
            bus,
        }
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn bus(&self) -> &Rc<EventBus> {
        &self.bus
    }

    pub fn publish(&self, signal: Signal) {
        self.bus.publish(Event::new(self.id, signal));
    }

    /// Registers `subscriber` (the component owning this core) for `action`
    /// events emitted by `target`.
    pub fn subscribe<S>(&self, action: Action, target: ComponentId, subscriber: &Rc<S>) -> bool
    where
        S: Subscriber + 'static,
    {
        let handler: Weak<dyn Subscriber> = Rc::downgrade(subscriber) as Weak<dyn Subscriber>;
        self.bus.subscribe(action, target, self.id, handler)
    }

    pub fn unsubscribe(&self, action: Action, target: ComponentId) -> bool {
        self.bus.unsubscribe(action, target, self.id)
    }
}
