//! Connection liveness watchdog.
//!
//! The heartbeat runs as its own task for the lifetime of one broker session.
//! It only reads a [`ConnectionProbe`] and talks to the consume loop through
//! cancellation tokens: the loop cancels `stop` to end it, and the heartbeat
//! cancels `connection_lost` when the probe reports the connection dead.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::ConnectionProbe;

/// Bounded wait for the heartbeat task to finish after it is stopped.
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

pub struct Heartbeat {
    stop: CancellationToken,
    handle: JoinHandle<()>,
}

impl Heartbeat {
    /// Probe interval for a negotiated heartbeat: half of it, at least one second.
    pub fn tick_interval(heartbeat: Duration) -> Duration {
        (heartbeat / 2).max(Duration::from_secs(1))
    }

    pub fn spawn(
        probe: Arc<dyn ConnectionProbe>,
        heartbeat: Duration,
        connection_lost: CancellationToken,
    ) -> Self {
        let stop = CancellationToken::new();
        let tick = Self::tick_interval(heartbeat);
        let task_stop = stop.clone();

        let handle = tokio::spawn(async move {
            debug!(tick_ms = tick.as_millis() as u64, "Heartbeat started");
            loop {
                tokio::select! {
                    _ = task_stop.cancelled() => break,
                    _ = tokio::time::sleep(tick) => {
                        if !probe.is_alive() {
                            warn!("Heartbeat detected a dead broker connection");
                            connection_lost.cancel();
                            break;
                        }
                    }
                }
            }
            debug!("Heartbeat stopped");
        });

        Self { stop, handle }
    }

    /// Stop the task and wait for it, up to two seconds.
    pub async fn stop(self) {
        self.stop.cancel();
        if tokio::time::timeout(JOIN_TIMEOUT, self.handle).await.is_err() {
            warn!("Heartbeat task did not stop in time");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Flag(AtomicBool);

    impl ConnectionProbe for Flag {
        fn is_alive(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn test_tick_interval() {
        assert_eq!(Heartbeat::tick_interval(Duration::from_secs(60)), Duration::from_secs(30));
        assert_eq!(Heartbeat::tick_interval(Duration::from_secs(1)), Duration::from_secs(1));
        assert_eq!(Heartbeat::tick_interval(Duration::ZERO), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dead_connection_is_reported() {
        let probe = Arc::new(Flag(AtomicBool::new(true)));
        let lost = CancellationToken::new();
        let heartbeat = Heartbeat::spawn(probe.clone(), Duration::from_secs(10), lost.clone());

        tokio::time::sleep(Duration::from_secs(12)).await;
        assert!(!lost.is_cancelled());

        probe.0.store(false, Ordering::SeqCst);
        tokio::time::timeout(Duration::from_secs(6), lost.cancelled())
            .await
            .unwrap();

        heartbeat.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_joins_task() {
        let probe = Arc::new(Flag(AtomicBool::new(true)));
        let lost = CancellationToken::new();
        let heartbeat = Heartbeat::spawn(probe, Duration::from_secs(60), lost.clone());

        heartbeat.stop().await;
        assert!(!lost.is_cancelled());
    }
}
