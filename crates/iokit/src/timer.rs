use std::{cell::Cell, future::Future, rc::Rc, time::Duration};

use tokio::{
    sync::Notify,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::debug;

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Repeats an async body on the local loop until stopped.
///
/// The first tick fires immediately, and the next tick waits for the body
/// to finish. Whether the timer is still live is checked right before each
/// body runs, so a tick that was already due when [`PeriodicTimer::stop`]
/// was called never runs. Must be started inside a `LocalSet`.
pub struct PeriodicTimer {
    name: &'static str,
    live: Rc<Cell<bool>>,
    wake: Rc<Notify>,
    task: JoinHandle<()>,
}

impl PeriodicTimer {
    pub fn start<F, Fut>(name: &'static str, period: Duration, mut body: F) -> Self
    where
        F: FnMut() -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        let live = Rc::new(Cell::new(true));
        let wake = Rc::new(Notify::new());
        let task = tokio::task::spawn_local({
            let live = Rc::clone(&live);
            let wake = Rc::clone(&wake);
            async move {
                let mut ticks = time::interval(period.max(MIN_PERIOD));
                ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = ticks.tick() => {}
                        _ = wake.notified() => {}
                    }
                    if !live.get() {
                        break;
                    }
                    body().await;
                }
                debug!(timer = name, "periodic timer finished");
            }
        });
        debug!(timer = name, ?period, "periodic timer started");
        Self {
            name,
            live,
            wake,
            task,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_live(&self) -> bool {
        self.live.get()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Idempotent. Safe to call from inside the timer's own body.
    pub fn stop(&self) {
        if self.live.replace(false) {
            debug!(timer = self.name, "periodic timer stopped");
            self.wake.notify_one();
        }
    }
}

impl Drop for PeriodicTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
#[path = "tests/timer_tests.rs"]
mod tests;
