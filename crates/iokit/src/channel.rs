use std::{cell::Cell, rc::Rc, sync::Arc};

use shared::{
    domain::{ComponentId, Direction, Edge, Level, Pin, Pull},
    event::Signal,
};
use tracing::{debug, warn};

use crate::{
    component::Component,
    error::IoError,
    gpio::{EdgeCallback, Gpio, PinOptions},
    reactor::IoContext,
};

/// Pin ownership shared by inputs and outputs.
struct Channel {
    component: Component,
    gpio: Arc<dyn Gpio>,
    pin: Pin,
    closed: Cell<bool>,
}

impl Channel {
    fn open(
        ctx: &IoContext,
        pin: Pin,
        direction: Direction,
        options: PinOptions,
    ) -> Result<Self, IoError> {
        ctx.gpio.setup(pin, direction, options)?;
        Ok(Self {
            component: Component::new(Rc::clone(&ctx.bus)),
            gpio: Arc::clone(&ctx.gpio),
            pin,
            closed: Cell::new(false),
        })
    }

    fn get(&self) -> Level {
        self.gpio.read(self.pin)
    }

    /// Returns `true` only for the call that actually closed the channel.
    fn mark_closed(&self) -> bool {
        !self.closed.replace(true)
    }
}

/// Digital input raising `VALUE_CHANGED` on every debounced edge.
pub struct InputChannel {
    channel: Channel,
}

impl InputChannel {
    pub fn open(ctx: &IoContext, pin: Pin) -> Result<Rc<Self>, IoError> {
        let channel = Channel::open(ctx, pin, Direction::In, PinOptions::pull(Pull::Up))?;

        let sampler = Arc::downgrade(&ctx.gpio);
        let handle = ctx.handle.clone();
        let callback: EdgeCallback = Arc::new(move |edge_pin| {
            let Some(gpio) = sampler.upgrade() else {
                return;
            };
            let level = gpio.read(edge_pin);
            if !handle.edge(edge_pin, level) {
                warn!(pin = %edge_pin, "edge after reactor shutdown dropped");
            }
        });
        if let Err(err) = ctx.gpio.on_edge(pin, Edge::Both, callback, ctx.debounce) {
            ctx.gpio.cleanup(pin);
            return Err(err);
        }

        let input = Rc::new(Self { channel });
        ctx.edges.register(&input);
        debug!(%pin, id = %input.id(), "input channel open");
        Ok(input)
    }

    pub fn id(&self) -> ComponentId {
        self.channel.component.id()
    }

    pub fn pin(&self) -> Pin {
        self.channel.pin
    }

    pub fn get(&self) -> Level {
        self.channel.get()
    }

    /// Publishes the sampled level when the edge belongs to this pin.
    pub fn on_edge(&self, pin: Pin, level: Level) -> bool {
        if self.channel.closed.get() || pin != self.channel.pin {
            return false;
        }
        self.channel.component.publish(Signal::LevelChanged(level));
        true
    }

    /// Deregisters the edge callback, then releases the pin.
    pub fn close(&self) {
        if !self.channel.mark_closed() {
            return;
        }
        self.channel.gpio.remove_edge(self.channel.pin);
        self.channel.gpio.cleanup(self.channel.pin);
        debug!(pin = %self.channel.pin, "input channel closed");
    }
}

impl Drop for InputChannel {
    fn drop(&mut self) {
        self.close();
    }
}

pub struct OutputChannel {
    channel: Channel,
}

impl OutputChannel {
    pub fn open(ctx: &IoContext, pin: Pin) -> Result<Self, IoError> {
        let channel = Channel::open(ctx, pin, Direction::Out, PinOptions::initial(Level::Low))?;
        Ok(Self { channel })
    }

    pub fn id(&self) -> ComponentId {
        self.channel.component.id()
    }

    pub fn pin(&self) -> Pin {
        self.channel.pin
    }

    pub fn get(&self) -> Level {
        self.channel.get()
    }

    pub fn put(&self, level: Level) -> Result<(), IoError> {
        self.channel.gpio.write(self.channel.pin, level)
    }

    pub fn toggle(&self) -> Result<Level, IoError> {
        let next = !self.get();
        self.put(next)?;
        Ok(next)
    }

    pub fn close(&self) {
        if self.channel.mark_closed() {
            self.channel.gpio.cleanup(self.channel.pin);
        }
    }
}

impl Drop for OutputChannel {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
#[path = "tests/channel_tests.rs"]
mod tests;
