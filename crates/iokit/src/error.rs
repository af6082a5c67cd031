use shared::domain::{Direction, Pin};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("pin {pin} is not configured")]
    PinNotConfigured { pin: Pin },
    #[error("pin {pin} is configured as {actual:?}, expected {expected:?}")]
    WrongDirection {
        pin: Pin,
        expected: Direction,
        actual: Direction,
    },
    #[error("conflicting edge detection already enabled for pin {pin}")]
    EdgeConflict { pin: Pin },
    #[error("invalid potentiometer settings: {0}")]
    InvalidSettings(String),
}
