//! Periodic rescanning of deployed rule and decision releases.

use std::sync::Arc;
use std::time::Duration;
use delegate_services::Refreshable;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::ResolvedConfig;

/// Handle to a running scanner. Dropping it stops the scanner.
pub struct ScannerHandle {
    label: String,
    stop: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl ScannerHandle {
    /// What this scanner refreshes.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Stop scanning and wait for the loop to exit.
    pub async fn stop(mut self) {
        let _ = self.stop.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ScannerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Starts refresh loops for releases that have a scanner interval.
pub struct ReleaseScanner;

impl ReleaseScanner {
    /// Refresh `target` every `interval`. The first refresh happens one
    /// interval after start. Must be called inside a Tokio runtime.
    pub fn start(target: Arc<dyn Refreshable>, interval: Duration) -> ScannerHandle {
        let label = target.label().to_string();
        let (stop, mut stopped) = watch::channel(false);

        info!(target = %label, ?interval, "Release scanner started");
        let loop_label = label.clone();
        let first = tokio::time::Instant::now() + interval;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(first, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match target.refresh().await {
                            Ok(()) => debug!(target = %loop_label, "Release refreshed"),
                            Err(e) => warn!(target = %loop_label, error = %e, "Release refresh failed"),
                        }
                    }
                    changed = stopped.changed() => {
                        if changed.is_err() || *stopped.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!(target = %loop_label, "Release scanner stopped");
        });

        ScannerHandle {
            label,
            stop,
            task: Some(task),
        }
    }

    /// Start scanners for the configured releases that have an interval.
    /// A backend is only scanned when it is supplied.
    pub fn for_config(
        config: &ResolvedConfig,
        rules: Option<Arc<dyn Refreshable>>,
        decisions: Option<Arc<dyn Refreshable>>,
    ) -> Vec<ScannerHandle> {
        let rules_interval = config.rules.as_ref().and_then(|r| r.scanner_interval);
        let decisions_interval = config
            .skills
            .as_ref()
            .and_then(|s| s.release.scanner_interval);

        [(rules, rules_interval), (decisions, decisions_interval)]
            .into_iter()
            .filter_map(|(target, interval)| Some(Self::start(target?, interval?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use delegate_services::{Result, ServiceError};
    use crate::config::StrategyConfig;

    struct Counting {
        label: &'static str,
        refreshes: AtomicUsize,
        fail: bool,
    }

    impl Counting {
        fn new(label: &'static str, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                label,
                refreshes: AtomicUsize::new(0),
                fail,
            })
        }

        fn count(&self) -> usize {
            self.refreshes.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl Refreshable for Counting {
        fn label(&self) -> &str {
            self.label
        }

        async fn refresh(&self) -> Result<()> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ServiceError::Unavailable("repository offline".into()));
            }
            Ok(())
        }
    }

    async fn advance(by: Duration) {
        tokio::time::advance(by).await;
        // let the scanner task run
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_refreshes_every_interval_until_stopped() {
        let target = Counting::new("rules", false);
        let handle = ReleaseScanner::start(target.clone(), Duration::from_secs(10));
        assert_eq!(handle.label(), "rules");

        advance(Duration::from_secs(5)).await;
        assert_eq!(target.count(), 0);

        advance(Duration::from_secs(5)).await;
        assert_eq!(target.count(), 1);

        advance(Duration::from_secs(20)).await;
        assert!(target.count() >= 2);

        handle.stop().await;
        let after_stop = target.count();
        advance(Duration::from_secs(60)).await;
        assert_eq!(target.count(), after_stop);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_refresh_is_timed_from_start() {
        let target = Counting::new("rules", false);
        let handle = ReleaseScanner::start(target.clone(), Duration::from_secs(10));

        // the loop is first polled only after time has moved on
        tokio::time::advance(Duration::from_secs(5)).await;
        advance(Duration::from_secs(5)).await;
        assert_eq!(target.count(), 1);
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_errors_keep_scanning() {
        let target = Counting::new("skills", true);
        let handle = ReleaseScanner::start(target.clone(), Duration::from_secs(1));

        advance(Duration::from_secs(1)).await;
        advance(Duration::from_secs(1)).await;
        assert!(target.count() >= 2);
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_for_config_only_scans_releases_with_interval() {
        let config = StrategyConfig::from_toml(
            "[rules]\nrelease_id = \"com.acme:rules:1\"\nscanner_interval_ms = 1000\n\
             [skills]\nrelease_id = \"com.acme:skills:1\"\n",
        )
        .unwrap()
        .resolve()
        .unwrap();

        let rules = Counting::new("rules", false);
        let skills = Counting::new("skills", false);
        let handles = ReleaseScanner::for_config(
            &config,
            Some(rules.clone() as Arc<dyn Refreshable>),
            Some(skills.clone() as Arc<dyn Refreshable>),
        );

        assert_eq!(handles.len(), 1);
        assert_eq!(handles[0].label(), "rules");

        advance(Duration::from_secs(1)).await;
        assert_eq!(rules.count(), 1);
        assert_eq!(skills.count(), 0);
    }

    #[tokio::test]
    async fn test_for_config_without_intervals_starts_nothing() {
        let handles = ReleaseScanner::for_config(&ResolvedConfig::default(), None, None);
        assert!(handles.is_empty());
    }
}
