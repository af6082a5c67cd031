//! Quadrature decoding for a two-line rotary encoder.
//!
//! Wiring convention: turning clockwise moves CLK before DT, which decodes
//! as `ROTATE_RIGHT`. Every CLK transition is one decision; DT-only
//! transitions never decide anything.

use std::{cell::Cell, rc::Rc};

use shared::{
    domain::{ComponentId, Level, Pin},
    event::{Action, Event, Signal},
};
use tracing::info;

use crate::{
    bus::Subscriber, channel::InputChannel, component::Component, error::IoError,
    reactor::IoContext,
};

pub struct RotaryEncoder {
    component: Component,
    clk: Rc<InputChannel>,
    dt: Rc<InputChannel>,
    last_clk: Cell<Level>,
}

impl RotaryEncoder {
    pub fn open(ctx: &IoContext, clk_pin: Pin, dt_pin: Pin) -> Result<Rc<Self>, IoError> {
        let clk = InputChannel::open(ctx, clk_pin)?;
        let dt = match InputChannel::open(ctx, dt_pin) {
            Ok(dt) => dt,
            Err(err) => {
                clk.close();
                return Err(err);
            }
        };

        let encoder = Rc::new(Self {
            component: Component::new(Rc::clone(&ctx.bus)),
            last_clk: Cell::new(clk.get()),
            clk,
            dt,
        });
        encoder
            .component
            .subscribe(Action::ValueChanged, encoder.clk.id(), &encoder);
        encoder
            .component
            .subscribe(Action::ValueChanged, encoder.dt.id(), &encoder);
        Ok(encoder)
    }

    pub fn id(&self) -> ComponentId {
        self.component.id()
    }

    pub fn clk(&self) -> &Rc<InputChannel> {
        &self.clk
    }

    pub fn dt(&self) -> &Rc<InputChannel> {
        &self.dt
    }

    fn decide(&self, clk: Level, dt: Level) -> Option<Signal> {
        if clk == self.last_clk.replace(clk) {
            return None;
        }
        if dt == clk {
            Some(Signal::RotateLeft)
        } else {
            Some(Signal::RotateRight)
        }
    }

    pub fn close(&self) {
        self.component.unsubscribe(Action::ValueChanged, self.clk.id());
        self.component.unsubscribe(Action::ValueChanged, self.dt.id());
        self.clk.close();
        self.dt.close();
    }
}

impl Subscriber for RotaryEncoder {
    fn on_event(&self, event: &Event) {
        let Signal::LevelChanged(level) = event.signal else {
            return;
        };
        let (clk, dt) = if event.source == self.clk.id() {
            (level, self.dt.get())
        } else if event.source == self.dt.id() {
            (self.clk.get(), level)
        } else {
            return;
        };

        if let Some(signal) = self.decide(clk, dt) {
            info!(action = %signal.action(), "rotation");
            self.component.publish(signal);
        }
    }
}

#[cfg(test)]
#[path = "tests/encoder_tests.rs"]
mod tests;
