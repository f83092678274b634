//! Tokio timer service.
//!
//! [`TokioTimers`] arms every engine timer as a sleeping task. Expired ids
//! arrive on the receiver returned by [`TokioTimers::new`]; the driver loop
//! hands each one to [`Engine::timer_expired`](crate::Engine::timer_expired).
//!
//! ```ignore
//! let (timers, mut expired) = TokioTimers::new();
//! let mut engine = Engine::new(config, MyPlatform::new(timers))?;
//! while let Some(timer) = expired.recv().await {
//!     let _ = engine.timer_expired(timer);
//! }
//! ```

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::core::TimerService;
use crate::timer::TimerId;

/// [`TimerService`] backed by tokio tasks.
///
/// Must be driven from inside a tokio runtime.
#[derive(Debug)]
pub struct TokioTimers {
    tasks: HashMap<TimerId, JoinHandle<()>>,
    expired: mpsc::UnboundedSender<TimerId>,
}

impl TokioTimers {
    /// Create the service and the receiver of expired timer ids.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerId>) {
        let (expired, rx) = mpsc::unbounded_channel();
        let timers = Self {
            tasks: HashMap::new(),
            expired,
        };
        (timers, rx)
    }

    /// Number of timers still waiting to fire.
    pub fn pending(&self) -> usize {
        self.tasks.values().filter(|task| !task.is_finished()).count()
    }
}

impl TimerService for TokioTimers {
    fn start_timer(&mut self, timer: TimerId, after: Duration) {
        self.tasks.retain(|_, task| !task.is_finished());
        if let Some(previous) = self.tasks.remove(&timer) {
            previous.abort();
        }

        trace!(%timer, ?after, "timer armed");
        let expired = self.expired.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            // a closed receiver means the driver is gone
            let _ = expired.send(timer);
        });
        self.tasks.insert(timer, task);
    }

    fn stop_timer(&mut self, timer: TimerId) {
        if let Some(task) = self.tasks.remove(&timer) {
            trace!(%timer, "timer stopped");
            task.abort();
        }
    }
}

impl Drop for TokioTimers {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}
