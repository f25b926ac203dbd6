use std::{future::Future, time::Duration};

use tokio::{
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A repeating background task. The first tick fires one period after
/// spawning. Stopping (or dropping) cancels the loop before its next tick;
/// a tick already running is left to finish.
#[derive(Debug)]
pub struct Poller {
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl Poller {
    /// `tick` returns `false` to end the loop from the inside.
    pub fn spawn<F, Fut>(period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let shutdown = CancellationToken::new();
        let cancelled = shutdown.clone();
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        if !tick().await {
                            break;
                        }
                    }
                }
            }
            debug!("poller stopped");
        });
        Self { shutdown, task }
    }

    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    fn counting(period: Duration) -> (Poller, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let poller = Poller::spawn(period, move || {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                true
            }
        });
        (poller, count)
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_period_after_the_first_interval() {
        let (poller, count) = counting(Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        poller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_means_no_more_ticks() {
        let (poller, count) = counting(Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(15)).await;
        poller.stop();
        let before = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), before);
        assert!(poller.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels() {
        let (poller, count) = counting(Duration::from_secs(10));
        drop(poller);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
