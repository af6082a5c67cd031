//! Fan-out of panel events to the connected browser.
//!
//! Subscription intents are buffered and only become live bus entries while
//! a client is connected. A disconnect tears the live entries down and keeps
//! the buffer for the next client.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use shared::{
    domain::{ClientId, ComponentId},
    event::{Action, Event, Signal},
    protocol::SocketMessage,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    bus::{EventBus, Subscriber},
    component::Component,
};

/// Serialized messages queued for one websocket client.
pub type Outbox = mpsc::UnboundedSender<String>;

struct Connection {
    client: ClientId,
    outbox: Outbox,
}

pub struct BroadcastServer {
    component: Component,
    buffer: RefCell<Vec<(Action, ComponentId)>>,
    live: RefCell<Vec<(Action, ComponentId)>>,
    connection: RefCell<Option<Connection>>,
    sent: Cell<u64>,
    dropped: Cell<u64>,
}

impl BroadcastServer {
    pub fn new(bus: Rc<EventBus>) -> Rc<Self> {
        Rc::new(Self {
            component: Component::new(bus),
            buffer: RefCell::new(Vec::new()),
            live: RefCell::new(Vec::new()),
            connection: RefCell::new(None),
            sent: Cell::new(0),
            dropped: Cell::new(0),
        })
    }

    pub fn id(&self) -> ComponentId {
        self.component.id()
    }

    pub fn subscribe(self: &Rc<Self>, action: Action, target: ComponentId) {
        {
            let mut buffer = self.buffer.borrow_mut();
            if !buffer.contains(&(action, target)) {
                buffer.push((action, target));
            }
        }
        if self.is_connected() {
            self.materialize(action, target);
        }
    }

    pub fn unsubscribe(&self, action: Action, target: ComponentId) {
        self.buffer
            .borrow_mut()
            .retain(|entry| *entry != (action, target));
        let was_live = {
            let mut live = self.live.borrow_mut();
            let before = live.len();
            live.retain(|entry| *entry != (action, target));
            live.len() != before
        };
        if was_live {
            self.component.unsubscribe(action, target);
        }
    }

    pub fn on_open(self: &Rc<Self>, client: ClientId, outbox: Outbox) {
        info!(%client, "socket open");
        let previous = self
            .connection
            .borrow_mut()
            .replace(Connection { client, outbox });
        if let Some(previous) = previous {
            info!(client = %previous.client, "socket replaced by newer client");
        }

        let pending = self.buffer.borrow().clone();
        for (action, target) in pending {
            self.materialize(action, target);
        }
    }

    pub fn on_close(&self, client: ClientId) {
        let current = self.connection.borrow().as_ref().map(|conn| conn.client);
        if current != Some(client) {
            debug!(%client, "close for inactive client ignored");
            return;
        }
        info!(%client, "socket close");
        self.connection.borrow_mut().take();

        let live = std::mem::take(&mut *self.live.borrow_mut());
        for (action, target) in live {
            self.component.unsubscribe(action, target);
            debug!(%action, %target, "desub");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.borrow().is_some()
    }

    pub fn buffered(&self) -> Vec<(Action, ComponentId)> {
        self.buffer.borrow().clone()
    }

    pub fn live_subscriptions(&self) -> usize {
        self.live.borrow().len()
    }

    pub fn sent_messages(&self) -> u64 {
        self.sent.get()
    }

    pub fn dropped_messages(&self) -> u64 {
        self.dropped.get()
    }

    fn materialize(self: &Rc<Self>, action: Action, target: ComponentId) {
        {
            let mut live = self.live.borrow_mut();
            if live.contains(&(action, target)) {
                return;
            }
            live.push((action, target));
        }
        self.component.subscribe(action, target, self);
        debug!(%action, %target, "sub");
    }

    fn write(&self, channel: &str, body: serde_json::Value) {
        let message = SocketMessage::put(channel, body);
        let data = match serde_json::to_string(&message) {
            Ok(data) => data,
            Err(err) => {
                warn!(%channel, %err, "message could not be encoded");
                self.dropped.set(self.dropped.get() + 1);
                return;
            }
        };

        let delivered = self
            .connection
            .borrow()
            .as_ref()
            .is_some_and(|conn| conn.outbox.send(data.clone()).is_ok());
        if delivered {
            debug!(%data, "message was sent");
            self.sent.set(self.sent.get() + 1);
        } else {
            warn!(%data, "message was lost");
            self.dropped.set(self.dropped.get() + 1);
        }
    }
}

impl Subscriber for BroadcastServer {
    fn on_event(&self, event: &Event) {
        if let Signal::PercentChanged(percent) = event.signal {
            debug!(percent, "socket received volume");
            self.write("volume", serde_json::json!(percent));
        }
    }
}

#[cfg(test)]
#[path = "tests/socket_tests.rs"]
mod tests;
