//! Event plumbing and hardware-facing components of the radio front panel.

pub mod bus;
pub mod channel;
pub mod component;
pub mod display;
pub mod encoder;
pub mod error;
pub mod gpio;
pub mod potentiometer;
pub mod reactor;
pub mod socket;
pub mod timer;

pub use bus::{EventBus, Subscriber};
pub use channel::{InputChannel, OutputChannel};
pub use component::Component;
pub use display::{Display, DisplayRenderer};
pub use encoder::RotaryEncoder;
pub use error::IoError;
pub use gpio::{Gpio, SimulatedGpio};
pub use potentiometer::{Potentiometer, PotentiometerSettings};
pub use reactor::{IoContext, LoopHandle, LoopMessage, Reactor};
pub use socket::{BroadcastServer, Outbox};
pub use timer::PeriodicTimer;

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
