//! Terminal stand-ins for the panel hardware: a text display and a keyboard
//! driven rotary encoder.

use std::{sync::Arc, time::Duration};

use iokit::{Display, LoopHandle, SimulatedGpio};
use shared::domain::{Level, Pin};
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

pub struct ConsoleDisplay;

impl Display for ConsoleDisplay {
    fn render(&self, text: &str) {
        info!(text, "display");
        println!("[display] {}", text.replace('\n', " | "));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Clockwise,
    CounterClockwise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Turn(Rotation),
    Quit,
}

/// `l`/`+` turn left (volume up), `r`/`-` turn right, `q` quits.
pub fn parse_keys(line: &str) -> Vec<Command> {
    line.chars()
        .filter_map(|key| match key {
            'l' | 'L' | '+' => Some(Command::Turn(Rotation::CounterClockwise)),
            'r' | 'R' | '-' => Some(Command::Turn(Rotation::Clockwise)),
            'q' | 'Q' => Some(Command::Quit),
            other => {
                if !other.is_whitespace() {
                    debug!(key = %other, "unknown key");
                }
                None
            }
        })
        .collect()
}

/// Plays the encoder's two lines on a simulated chip. The lines rest either
/// both high or both low; each detent moves both to the other rest level,
/// the leading line first.
pub struct EncoderDriver {
    gpio: Arc<SimulatedGpio>,
    clk: Pin,
    dt: Pin,
    rest: Level,
    gap: Duration,
}

impl EncoderDriver {
    /// `gap` separates the two edges of a detent so the loop samples the
    /// first one before the second line moves.
    pub fn new(gpio: Arc<SimulatedGpio>, clk: Pin, dt: Pin, gap: Duration) -> Self {
        Self {
            gpio,
            clk,
            dt,
            rest: Level::High,
            gap,
        }
    }

    pub async fn detent(&mut self, rotation: Rotation) {
        let target = !self.rest;
        let (lead, trail) = match rotation {
            Rotation::Clockwise => (self.clk, self.dt),
            Rotation::CounterClockwise => (self.dt, self.clk),
        };
        self.gpio.drive(lead, target);
        tokio::time::sleep(self.gap).await;
        self.gpio.drive(trail, target);
        tokio::time::sleep(self.gap).await;
        self.rest = target;
    }
}

/// Reads commands from stdin until `q` or end of input.
pub async fn run_keyboard(mut driver: EncoderDriver, handle: LoopHandle) {
    info!("keyboard encoder: l/+ turns left, r/- turns right, q quits");
    let mut lines = BufReader::new(io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("stdin closed, keyboard encoder off");
                return;
            }
            Err(err) => {
                warn!(%err, "stdin failed, keyboard encoder off");
                return;
            }
        };
        for command in parse_keys(&line) {
            match command {
                Command::Turn(rotation) => driver.detent(rotation).await,
                Command::Quit => {
                    info!("quit requested");
                    handle.shutdown();
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/console_tests.rs"]
mod tests;
