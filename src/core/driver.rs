use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use crate::core::Engine;
use tracing::{debug, info};

pub type SharedEngine = Arc<Mutex<Engine>>;

/// Background task that keeps a live engine's timers moving in real time.
///
/// Every period it locks the engine and runs whatever is due. Dropping the
/// handle stops the task.
pub struct Driver {
    handle: Option<JoinHandle<()>>,
    stop: watch::Sender<bool>,
}

impl Driver {
    pub fn spawn(engine: SharedEngine, period: Duration) -> Self {
        let (stop, mut stopped) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!("Driver started ({:?} period)", period);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let fired = engine.lock().await.run_due_timers();
                        if fired > 0 {
                            debug!("Driver ran {} timer(s)", fired);
                        }
                    }
                    changed = stopped.changed() => {
                        if changed.is_err() || *stopped.borrow() {
                            break;
                        }
                    }
                }
            }

            engine.lock().await.shutdown();
            info!("Driver stopped");
        });

        Self {
            handle: Some(handle),
            stop,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stops the task and waits for it, leaving the engine shut down.
    pub async fn shutdown(mut self) {
        let _ = self.stop.send(true);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
