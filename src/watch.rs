//! Periodic update checks.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::notify::Notifier;
use crate::tracker::Tracker;

/// Run one check and hand any changes to `notifier`.
///
/// Never fails: store and delivery errors are logged so the next cycle can
/// try again. Returns the number of changed items reported.
pub async fn run_cycle(tracker: &Tracker, notifier: &dyn Notifier) -> usize {
    let changed = match tracker.check_for_updates().await {
        Ok(changed) => changed,
        Err(e) => {
            tracing::error!(error = %e, "Update check failed");
            return 0;
        }
    };

    if changed.is_empty() {
        tracing::debug!("No updates found");
        return 0;
    }

    if let Err(e) = notifier.notify(&changed).await {
        tracing::error!(error = %e, count = changed.len(), "Failed to deliver update report");
    }
    changed.len()
}

/// Check for updates every `every` until `shutdown` is cancelled.
///
/// The first check runs immediately. Cycles run one at a time; if a cycle
/// overruns the interval, the ticks it missed are dropped rather than
/// queued. Cancellation is observed between cycles, so an in-flight check
/// finishes and persists before the loop returns.
pub async fn run_watch(
    tracker: &Tracker,
    notifier: &dyn Notifier,
    every: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(interval_secs = every.as_secs(), "Watching Workshop items for updates");

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                tracing::info!("Shutdown requested, stopping watch");
                break;
            }
            _ = ticker.tick() => {}
        }

        let reported = run_cycle(tracker, notifier).await;
        if reported > 0 {
            tracing::info!(count = reported, "Reported updated Workshop items");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;
    use crate::notify::NotifyError;
    use crate::steam::{DetailSource, FetchOutcome, RemoteDetail};
    use crate::store::types::id;
    use crate::store::ItemId;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("workshop_watch")
            .join("watch_tests")
            .join(name);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Every fetch reports a newer marker than the last one, after `delay`.
    struct AdvancingSource {
        next: AtomicI64,
        delay: Duration,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: AtomicUsize,
    }

    impl AdvancingSource {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                next: AtomicI64::new(100),
                delay,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl DetailSource for AdvancingSource {
        async fn fetch(&self, ids: &[ItemId]) -> FetchOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let marker = self.next.fetch_add(10, Ordering::SeqCst);
            FetchOutcome::Fetched(
                ids.iter()
                    .map(|id| (*id, RemoteDetail::Updated(marker)))
                    .collect(),
            )
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        reports: Mutex<Vec<Vec<ItemId>>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, changed: &[ItemId]) -> Result<(), NotifyError> {
            self.reports.lock().unwrap().push(changed.to_vec());
            if self.fail {
                return Err(NotifyError::HttpStatus { status: 500 });
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_cycle_baselines_then_reports() {
        let dir = test_dir("cycle");
        let source = AdvancingSource::new(Duration::ZERO);
        let tracker = Tracker::open(&dir.join("items.json"), source).await.unwrap();
        tracker.add_tracked("5").await;
        let notifier = RecordingNotifier::default();

        assert_eq!(run_cycle(&tracker, &notifier).await, 0);
        assert!(notifier.reports.lock().unwrap().is_empty());

        assert_eq!(run_cycle(&tracker, &notifier).await, 1);
        assert_eq!(*notifier.reports.lock().unwrap(), vec![vec![id(5)]]);
    }

    #[tokio::test]
    async fn test_cycle_survives_notifier_failure() {
        let dir = test_dir("notifier_failure");
        let source = AdvancingSource::new(Duration::ZERO);
        let tracker = Tracker::open(&dir.join("items.json"), source).await.unwrap();
        tracker.add_tracked("5").await;
        let notifier = RecordingNotifier {
            fail: true,
            ..Default::default()
        };

        run_cycle(&tracker, &notifier).await;
        assert_eq!(run_cycle(&tracker, &notifier).await, 1);
        assert_eq!(run_cycle(&tracker, &notifier).await, 1);
        assert_eq!(notifier.reports.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_watch_stops_on_cancel_and_never_overlaps() {
        let dir = test_dir("watch_loop");
        let source = AdvancingSource::new(Duration::from_millis(30));
        let tracker = Tracker::open(&dir.join("items.json"), source.clone())
            .await
            .unwrap();
        tracker.add_tracked("1 2").await;
        let notifier = RecordingNotifier::default();

        let shutdown = CancellationToken::new();
        let cancel = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            cancel.cancel();
        });

        tokio::time::timeout(
            Duration::from_secs(5),
            run_watch(&tracker, &notifier, Duration::from_millis(5), shutdown),
        )
        .await
        .expect("watch loop must stop after cancellation");

        let calls = source.calls.load(Ordering::SeqCst);
        assert!(calls >= 2, "expected several cycles, got {}", calls);
        assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);

        let reports = notifier.reports.lock().unwrap();
        assert_eq!(reports.len(), calls - 1);
        assert!(reports.iter().all(|r| *r == vec![id(1), id(2)]));
    }

    #[tokio::test]
    async fn test_watch_returns_immediately_when_already_cancelled() {
        let dir = test_dir("watch_cancelled");
        let source = AdvancingSource::new(Duration::ZERO);
        let tracker = Tracker::open(&dir.join("items.json"), source.clone())
            .await
            .unwrap();
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        run_watch(&tracker, &RecordingNotifier::default(), Duration::from_secs(3600), shutdown)
            .await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }
}
