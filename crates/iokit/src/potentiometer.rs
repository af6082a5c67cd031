use std::{cell::Cell, rc::Rc};

use shared::{
    domain::{ComponentId, Pin},
    event::{Action, Event, Signal},
};

use crate::{
    bus::Subscriber, component::Component, encoder::RotaryEncoder, error::IoError,
    reactor::IoContext,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PotentiometerSettings {
    pub initial: f64,
    pub steps: u32,
}

impl Default for PotentiometerSettings {
    fn default() -> Self {
        Self {
            initial: 0.0,
            steps: 32,
        }
    }
}

/// Bounded accumulator over encoder detents. `ROTATE_LEFT` raises the value.
///
/// A `VALUE_CHANGED` percentage is published after every rotation, also when
/// the value is already pinned at a bound.
pub struct Potentiometer {
    component: Component,
    encoder: Rc<RotaryEncoder>,
    value: Cell<f64>,
    step: f64,
}

impl Potentiometer {
    pub fn open(
        ctx: &IoContext,
        clk_pin: Pin,
        dt_pin: Pin,
        settings: PotentiometerSettings,
    ) -> Result<Rc<Self>, IoError> {
        if settings.steps == 0 {
            return Err(IoError::InvalidSettings("steps must be positive".into()));
        }
        if !settings.initial.is_finite() {
            return Err(IoError::InvalidSettings(format!(
                "initial value {} is not a number",
                settings.initial
            )));
        }

        let encoder = RotaryEncoder::open(ctx, clk_pin, dt_pin)?;
        let potentiometer = Rc::new(Self {
            component: Component::new(Rc::clone(&ctx.bus)),
            value: Cell::new(settings.initial.clamp(0.0, 1.0)),
            step: 1.0 / f64::from(settings.steps),
            encoder,
        });
        let encoder_id = potentiometer.encoder.id();
        potentiometer
            .component
            .subscribe(Action::RotateLeft, encoder_id, &potentiometer);
        potentiometer
            .component
            .subscribe(Action::RotateRight, encoder_id, &potentiometer);
        Ok(potentiometer)
    }

    pub fn id(&self) -> ComponentId {
        self.component.id()
    }

    pub fn encoder(&self) -> &Rc<RotaryEncoder> {
        &self.encoder
    }

    pub fn value(&self) -> f64 {
        self.value.get()
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn percent(&self) -> u8 {
        to_percent(self.value.get())
    }

    pub fn close(&self) {
        let encoder_id = self.encoder.id();
        self.component.unsubscribe(Action::RotateLeft, encoder_id);
        self.component.unsubscribe(Action::RotateRight, encoder_id);
        self.encoder.close();
    }
}

impl Subscriber for Potentiometer {
    fn on_event(&self, event: &Event) {
        let value = self.value.get();
        let next = match event.signal {
            Signal::RotateLeft => (value + self.step).min(1.0),
            Signal::RotateRight => (value - self.step).max(0.0),
            _ => return,
        };
        self.value.set(next);
        self.component.publish(Signal::PercentChanged(to_percent(next)));
    }
}

fn to_percent(value: f64) -> u8 {
    (value * 100.0).round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
#[path = "tests/potentiometer_tests.rs"]
mod tests;
