//! The cooperative loop that owns all panel state.
//!
//! Anything running off the loop thread (edge callbacks, websocket tasks)
//! talks to the panel through a [`LoopHandle`]; messages are handled one at
//! a time in admission order.

use std::{
    cell::RefCell,
    ops::ControlFlow,
    rc::{Rc, Weak},
    sync::Arc,
    time::Duration,
};

use shared::domain::{ClientId, Level, Pin};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::{
    bus::EventBus,
    channel::InputChannel,
    gpio::Gpio,
    socket::{BroadcastServer, Outbox},
};

pub enum LoopMessage {
    Edge { pin: Pin, level: Level },
    ClientOpened { client: ClientId, outbox: Outbox },
    ClientClosed(ClientId),
    Shutdown,
}

#[derive(Clone)]
pub struct LoopHandle {
    tx: mpsc::UnboundedSender<LoopMessage>,
}

impl LoopHandle {
    /// Returns `false` once the reactor is gone.
    pub fn send(&self, message: LoopMessage) -> bool {
        self.tx.send(message).is_ok()
    }

    pub fn edge(&self, pin: Pin, level: Level) -> bool {
        self.send(LoopMessage::Edge { pin, level })
    }

    pub fn client_opened(&self, client: ClientId, outbox: Outbox) -> bool {
        self.send(LoopMessage::ClientOpened { client, outbox })
    }

    pub fn client_closed(&self, client: ClientId) -> bool {
        self.send(LoopMessage::ClientClosed(client))
    }

    pub fn shutdown(&self) -> bool {
        self.send(LoopMessage::Shutdown)
    }
}

/// Routes edge notices to the inputs opened on this loop.
#[derive(Default)]
pub struct EdgeRouter {
    inputs: RefCell<Vec<Weak<InputChannel>>>,
}

impl EdgeRouter {
    pub fn register(&self, input: &Rc<InputChannel>) {
        self.inputs.borrow_mut().push(Rc::downgrade(input));
    }

    /// Returns how many inputs accepted the edge.
    pub fn dispatch(&self, pin: Pin, level: Level) -> usize {
        let inputs: Vec<Rc<InputChannel>> = {
            let mut inputs = self.inputs.borrow_mut();
            inputs.retain(|input| input.strong_count() > 0);
            inputs.iter().filter_map(Weak::upgrade).collect()
        };
        inputs
            .iter()
            .filter(|input| input.on_edge(pin, level))
            .count()
    }
}

/// Everything a hardware-bound component needs at construction.
#[derive(Clone)]
pub struct IoContext {
    pub bus: Rc<EventBus>,
    pub gpio: Arc<dyn Gpio>,
    pub edges: Rc<EdgeRouter>,
    pub handle: LoopHandle,
    pub debounce: Duration,
}

pub struct Reactor {
    bus: Rc<EventBus>,
    edges: Rc<EdgeRouter>,
    tx: mpsc::UnboundedSender<LoopMessage>,
    rx: mpsc::UnboundedReceiver<LoopMessage>,
    socket: Option<Rc<BroadcastServer>>,
}

impl Reactor {
    pub fn new(bus: Rc<EventBus>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            bus,
            edges: Rc::new(EdgeRouter::default()),
            tx,
            rx,
            socket: None,
        }
    }

    pub fn handle(&self) -> LoopHandle {
        LoopHandle {
            tx: self.tx.clone(),
        }
    }

    pub fn context(&self, gpio: Arc<dyn Gpio>, debounce: Duration) -> IoContext {
        IoContext {
            bus: Rc::clone(&self.bus),
            gpio,
            edges: Rc::clone(&self.edges),
            handle: self.handle(),
            debounce,
        }
    }

    pub fn attach_socket(&mut self, server: Rc<BroadcastServer>) {
        self.socket = Some(server);
    }

    /// Handles everything already queued without waiting. Returns the number
    /// of messages processed; stops early on shutdown.
    pub fn run_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.rx.try_recv() {
            handled += 1;
            if route(&self.edges, self.socket.as_ref(), message).is_break() {
                break;
            }
        }
        handled
    }

    /// Runs until a shutdown message arrives or every [`LoopHandle`] is gone.
    pub async fn run(self) {
        let Self {
            edges,
            tx,
            mut rx,
            socket,
            ..
        } = self;
        drop(tx);
        info!("reactor started");
        while let Some(message) = rx.recv().await {
            if route(&edges, socket.as_ref(), message).is_break() {
                break;
            }
        }
        info!("reactor stopped");
    }
}

fn route(
    edges: &EdgeRouter,
    socket: Option<&Rc<BroadcastServer>>,
    message: LoopMessage,
) -> ControlFlow<()> {
    match message {
        LoopMessage::Edge { pin, level } => {
            if edges.dispatch(pin, level) == 0 {
                trace!(%pin, ?level, "edge for unregistered pin ignored");
            }
        }
        LoopMessage::ClientOpened { client, outbox } => match socket {
            Some(socket) => socket.on_open(client, outbox),
            None => debug!(%client, "client opened without broadcast server"),
        },
        LoopMessage::ClientClosed(client) => {
            if let Some(socket) = socket {
                socket.on_close(client);
            }
        }
        LoopMessage::Shutdown => return ControlFlow::Break(()),
    }
    ControlFlow::Continue(())
}

#[cfg(test)]
#[path = "tests/reactor_tests.rs"]
mod tests;
