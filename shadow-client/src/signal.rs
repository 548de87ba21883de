//! Poll signal and the timer that fires it.
//!
//! [`PollSignal`] is a single-slot "poll due" flag backed by
//! [`tokio::sync::Notify`]: firing it while nobody waits stores one permit,
//! and further fires before that permit is consumed are absorbed.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{interval, MissedTickBehavior};

/// Payload-less, coalescing poll signal.
#[derive(Debug, Clone, Default)]
pub struct PollSignal {
    notify: Arc<Notify>,
}

impl PollSignal {
    /// Create a signal with nothing pending.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a poll as due. Never blocks.
    pub fn fire(&self) {
        self.notify.notify_one();
    }

    /// Wait until a poll is due, consuming the pending signal.
    pub async fn wait(&self) {
        self.notify.notified().await;
    }
}

/// Spawn the poll timer.
///
/// The first signal fires immediately, then one per `period` regardless of
/// how long the engine takes. Ticks missed while the runtime was busy are
/// skipped. Abort the returned handle to stop the timer.
///
/// # Panics
///
/// The timer task panics if `period` is zero.
pub fn spawn_poll_timer(signal: PollSignal, period: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("Poll timer started (interval: {}s)", period.as_secs());

        let mut timer = interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            timer.tick().await;
            tracing::trace!("poll due");
            signal.fire();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[tokio::test]
    async fn fire_before_wait_is_kept() {
        let signal = PollSignal::new();
        signal.fire();

        timeout(Duration::from_millis(50), signal.wait())
            .await
            .expect("pending signal should complete the wait");
    }

    #[tokio::test]
    async fn repeated_fires_coalesce() {
        let signal = PollSignal::new();
        signal.fire();
        signal.fire();
        signal.fire();

        signal.wait().await;
        let second = timeout(Duration::from_millis(50), signal.wait()).await;
        assert!(second.is_err(), "only one signal may be pending");
    }

    #[tokio::test]
    async fn clones_share_the_slot() {
        let signal = PollSignal::new();
        let producer = signal.clone();
        producer.fire();

        timeout(Duration::from_millis(50), signal.wait())
            .await
            .expect("clone should deliver to the same slot");
    }

    #[tokio::test(start_paused = true)]
    async fn timer_fires_immediately_then_periodically() {
        let signal = PollSignal::new();
        let handle = spawn_poll_timer(signal.clone(), Duration::from_secs(60));

        timeout(Duration::from_secs(1), signal.wait())
            .await
            .expect("first tick is immediate");

        assert!(timeout(Duration::from_secs(30), signal.wait())
            .await
            .is_err());

        timeout(Duration::from_secs(31), signal.wait())
            .await
            .expect("second tick after one period");

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn timer_ticks_do_not_queue_up() {
        let signal = PollSignal::new();
        let handle = spawn_poll_timer(signal.clone(), Duration::from_secs(10));

        // Nobody consumes while several periods pass.
        tokio::time::sleep(Duration::from_secs(35)).await;

        signal.wait().await;
        assert!(timeout(Duration::from_secs(1), signal.wait())
            .await
            .is_err());

        handle.abort();
    }
}
