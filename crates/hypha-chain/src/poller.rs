//! Fixed-interval polling with manual revalidation

use crate::error::Result;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::warn;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Re-runs a fetch every `interval` and keeps the latest successful value.
///
/// Fetches run one at a time. Revalidations requested while a fetch is in
/// flight collapse into a single follow-up fetch. The polling task stops when
/// the poller is dropped.
pub struct Poller<T> {
    rx: watch::Receiver<Option<T>>,
    revalidate: Arc<Notify>,
    task: JoinHandle<()>,
}

impl<T> Poller<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn spawn<F, Fut>(interval: Duration, fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let (tx, rx) = watch::channel(None);
        let revalidate = Arc::new(Notify::new());
        let notified = revalidate.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = notified.notified() => ticker.reset(),
                }
                match fetch().await {
                    Ok(value) => {
                        if tx.send(Some(value)).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("Poll failed ({:?}): {}", e.kind(), e),
                }
            }
        });

        Self {
            rx,
            revalidate,
            task,
        }
    }

    /// Most recent successful value, if any fetch has succeeded yet
    pub fn latest(&self) -> Option<T> {
        self.rx.borrow().clone()
    }

    /// Fetch again now instead of waiting for the next tick
    pub fn revalidate(&self) {
        self.revalidate.notify_one();
    }

    /// Wait for the next published value
    pub async fn changed(&mut self) -> Option<T> {
        self.rx.changed().await.ok()?;
        self.latest()
    }
}

impl<T> Drop for Poller<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChainError;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn counting_poller(counter: Arc<AtomicU64>, interval: Duration) -> Poller<u64> {
        Poller::spawn(interval, move || {
            let counter = counter.clone();
            async move { Ok(counter.fetch_add(1, Ordering::SeqCst) + 1) }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_on_interval() {
        let counter = Arc::new(AtomicU64::new(0));
        let mut poller = counting_poller(counter.clone(), Duration::from_secs(10));

        assert_eq!(poller.changed().await, Some(1));
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(poller.changed().await, Some(2));
        assert_eq!(poller.latest(), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_revalidate_fetches_immediately() {
        let counter = Arc::new(AtomicU64::new(0));
        let mut poller = counting_poller(counter.clone(), Duration::from_secs(3600));

        assert_eq!(poller.changed().await, Some(1));
        poller.revalidate();
        assert_eq!(poller.changed().await, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_fetch_keeps_last_value() {
        let counter = Arc::new(AtomicU64::new(0));
        let mut poller = Poller::spawn(Duration::from_secs(10), {
            let counter = counter.clone();
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Ok(7u64)
                    } else {
                        Err(ChainError::RateLimited("429".to_string()))
                    }
                }
            }
        });

        assert_eq!(poller.changed().await, Some(7));
        tokio::time::advance(Duration::from_secs(30)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(counter.load(Ordering::SeqCst) >= 2);
        assert_eq!(poller.latest(), Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_polling() {
        let counter = Arc::new(AtomicU64::new(0));
        let mut poller = counting_poller(counter.clone(), Duration::from_secs(10));
        assert_eq!(poller.changed().await, Some(1));
        drop(poller);

        tokio::time::advance(Duration::from_secs(60)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
