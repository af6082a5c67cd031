use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{ComponentId, Level};

/// Subscription key. Several signals may share one action; subscribers tell
/// them apart by the event source they subscribed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    ValueChanged,
    RotateLeft,
    RotateRight,
    AuthStart,
    AuthDone,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::ValueChanged => "VALUE_CHANGED",
            Action::RotateLeft => "ROTATE_LEFT",
            Action::RotateRight => "ROTATE_RIGHT",
            Action::AuthStart => "AUTH_START",
            Action::AuthDone => "AUTH_DONE",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Signal {
    /// A digital input settled on a new level.
    LevelChanged(Level),
    RotateLeft,
    RotateRight,
    /// Potentiometer position as an integer percentage.
    PercentChanged(u8),
    /// Login code to show while waiting for the token to be claimed.
    AuthStart(String),
    /// Greeting shown once the session is authenticated.
    AuthDone(String),
}

impl Signal {
    pub fn action(&self) -> Action {
        match self {
            Signal::LevelChanged(_) | Signal::PercentChanged(_) => Action::ValueChanged,
            Signal::RotateLeft => Action::RotateLeft,
            Signal::RotateRight => Action::RotateRight,
            Signal::AuthStart(_) => Action::AuthStart,
            Signal::AuthDone(_) => Action::AuthDone,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub source: ComponentId,
    pub signal: Signal,
}

impl Event {
    pub fn new(source: ComponentId, signal: Signal) -> Self {
        Self { source, signal }
    }

    pub fn action(&self) -> Action {
        self.signal.action()
    }
}
