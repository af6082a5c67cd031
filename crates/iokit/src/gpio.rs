//! Hardware abstraction consumed by the panel, plus an in-memory chip.
//!
//! Edge callbacks may run on any thread. They must only sample levels and
//! hand work over to the loop through a [`crate::reactor::LoopHandle`].

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use shared::domain::{Direction, Edge, Level, Pin, Pull};
use tokio::time::Instant;
use tracing::trace;

use crate::error::IoError;

pub type EdgeCallback = Arc<dyn Fn(Pin) + Send + Sync>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PinOptions {
    pub pull: Pull,
    pub initial: Option<Level>,
}

impl PinOptions {
    pub fn pull(pull: Pull) -> Self {
        Self {
            pull,
            initial: None,
        }
    }

    pub fn initial(level: Level) -> Self {
        Self {
            pull: Pull::Off,
            initial: Some(level),
        }
    }
}

pub trait Gpio: Send + Sync {
    fn setup(&self, pin: Pin, direction: Direction, options: PinOptions) -> Result<(), IoError>;
    fn cleanup(&self, pin: Pin);
    fn read(&self, pin: Pin) -> Level;
    fn write(&self, pin: Pin, level: Level) -> Result<(), IoError>;
    fn on_edge(
        &self,
        pin: Pin,
        edge: Edge,
        callback: EdgeCallback,
        debounce: Duration,
    ) -> Result<(), IoError>;
    fn remove_edge(&self, pin: Pin);
}

/// Calls made against a [`SimulatedGpio`], in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpioCall {
    Setup(Pin, Direction),
    Cleanup(Pin),
    Write(Pin, Level),
    OnEdge(Pin, Edge),
    RemoveEdge(Pin),
}

struct EdgeWatch {
    edge: Edge,
    callback: EdgeCallback,
    debounce: Duration,
    last_fired: Option<Instant>,
}

struct SimPin {
    direction: Direction,
    level: Level,
    watch: Option<EdgeWatch>,
}

#[derive(Default)]
struct SimState {
    pins: HashMap<Pin, SimPin>,
    floating: HashMap<Pin, Level>,
    calls: Vec<GpioCall>,
}

/// In-memory chip. `drive` plays the part of the outside world pulling a
/// line up or down, including the per-pin debounce window.
#[derive(Default)]
pub struct SimulatedGpio {
    state: Mutex<SimState>,
}

impl SimulatedGpio {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets the external level of `pin`. Returns whether an edge callback ran.
    pub fn drive(&self, pin: Pin, level: Level) -> bool {
        let callback = {
            let mut state = self.lock();
            let Some(sim) = state.pins.get_mut(&pin) else {
                state.floating.insert(pin, level);
                return false;
            };
            let previous = sim.level;
            sim.level = level;
            let Some(watch) = sim.watch.as_mut() else {
                return false;
            };
            if !watch.edge.matches(previous, level) {
                return false;
            }
            let now = Instant::now();
            let bouncing = watch
                .last_fired
                .is_some_and(|last| now.duration_since(last) < watch.debounce);
            if bouncing {
                trace!(%pin, ?level, "edge suppressed by debounce");
                return false;
            }
            watch.last_fired = Some(now);
            Arc::clone(&watch.callback)
        };
        callback(pin);
        true
    }

    pub fn is_configured(&self, pin: Pin) -> bool {
        self.lock().pins.contains_key(&pin)
    }

    pub fn has_edge(&self, pin: Pin) -> bool {
        self.lock()
            .pins
            .get(&pin)
            .is_some_and(|sim| sim.watch.is_some())
    }

    pub fn calls(&self) -> Vec<GpioCall> {
        self.lock().calls.clone()
    }
}

impl Gpio for SimulatedGpio {
    fn setup(&self, pin: Pin, direction: Direction, options: PinOptions) -> Result<(), IoError> {
        let mut state = self.lock();
        state.calls.push(GpioCall::Setup(pin, direction));
        let floating = state.floating.remove(&pin);
        let watch = state
            .pins
            .remove(&pin)
            .filter(|_| direction == Direction::In)
            .and_then(|sim| sim.watch);
        let level = match (direction, options.initial, options.pull) {
            (Direction::Out, Some(level), _) => level,
            (Direction::Out, None, _) => Level::Low,
            (Direction::In, _, Pull::Up) => floating.unwrap_or(Level::High),
            (Direction::In, _, Pull::Down) => floating.unwrap_or(Level::Low),
            (Direction::In, _, Pull::Off) => floating.unwrap_or(Level::Low),
        };
        state.pins.insert(
            pin,
            SimPin {
                direction,
                level,
                watch,
            },
        );
        Ok(())
    }

    fn cleanup(&self, pin: Pin) {
        let mut state = self.lock();
        state.calls.push(GpioCall::Cleanup(pin));
        state.pins.remove(&pin);
    }

    fn read(&self, pin: Pin) -> Level {
        let state = self.lock();
        state
            .pins
            .get(&pin)
            .map(|sim| sim.level)
            .or_else(|| state.floating.get(&pin).copied())
            .unwrap_or(Level::Low)
    }

    fn write(&self, pin: Pin, level: Level) -> Result<(), IoError> {
        let mut state = self.lock();
        state.calls.push(GpioCall::Write(pin, level));
        let sim = state
            .pins
            .get_mut(&pin)
            .ok_or(IoError::PinNotConfigured { pin })?;
        if sim.direction != Direction::Out {
            return Err(IoError::WrongDirection {
                pin,
                expected: Direction::Out,
                actual: sim.direction,
            });
        }
        sim.level = level;
        Ok(())
    }

    fn on_edge(
        &self,
        pin: Pin,
        edge: Edge,
        callback: EdgeCallback,
        debounce: Duration,
    ) -> Result<(), IoError> {
        let mut state = self.lock();
        state.calls.push(GpioCall::OnEdge(pin, edge));
        let sim = state
            .pins
            .get_mut(&pin)
            .ok_or(IoError::PinNotConfigured { pin })?;
        if sim.direction != Direction::In {
            return Err(IoError::WrongDirection {
                pin,
                expected: Direction::In,
                actual: sim.direction,
            });
        }
        if sim.watch.is_some() {
            return Err(IoError::EdgeConflict { pin });
        }
        sim.watch = Some(EdgeWatch {
            edge,
            callback,
            debounce,
            last_fired: None,
        });
        Ok(())
    }

    fn remove_edge(&self, pin: Pin) {
        let mut state = self.lock();
        state.calls.push(GpioCall::RemoveEdge(pin));
        if let Some(sim) = state.pins.get_mut(&pin) {
            sim.watch = None;
        }
    }
}

#[cfg(test)]
#[path = "tests/gpio_tests.rs"]
mod tests;
