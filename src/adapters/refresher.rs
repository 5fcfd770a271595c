use std::{sync::Arc, time::Duration};

use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::{
    core::{BootstrapError, RefreshError, RouteTable},
    ports::directory::ServiceDirectory,
    tracing_setup::configure_component_tracing,
};

/// Shortest accepted refresh interval; `tokio::time::interval` rejects zero.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_millis(10);

/// Periodically pulls the service list and publishes a fresh route table.
///
/// Refreshes run one after another on a single task, so publications are
/// totally ordered. A failed refresh leaves the last good table in place.
pub struct RouteRefresher {
    directory: Arc<dyn ServiceDirectory>,
    routes: Arc<RouteTable>,
    interval: Duration,
}

impl RouteRefresher {
    pub fn new(
        directory: Arc<dyn ServiceDirectory>,
        routes: Arc<RouteTable>,
        interval: Duration,
    ) -> Self {
        if interval < MIN_REFRESH_INTERVAL {
            tracing::warn!(
                "Refresh interval {:?} too short, using {:?}",
                interval,
                MIN_REFRESH_INTERVAL
            );
        }
        Self {
            directory,
            routes,
            interval: interval.max(MIN_REFRESH_INTERVAL),
        }
    }

    pub fn routes(&self) -> &Arc<RouteTable> {
        &self.routes
    }

    /// Fetch once and publish. Returns the new table generation.
    pub async fn refresh(&self) -> Result<u64, RefreshError> {
        let services = self.directory.fetch_services().await?;
        let count = services.len();
        let generation = self.routes.publish(services);
        tracing::info!(
            services = count,
            generation,
            "Service routes updated successfully"
        );
        Ok(generation)
    }

    /// The initial refresh. Failing here means the gateway must not serve.
    pub async fn bootstrap(&self) -> Result<u64, BootstrapError> {
        let services = self.directory.fetch_services().await?;
        let count = services.len();
        let generation = self.routes.publish(services);
        if count == 0 {
            tracing::warn!("Service directory returned no services; every request will 404");
        }
        tracing::info!(services = count, generation, "Initial service routes loaded");
        Ok(generation)
    }

    /// Refresh every `interval` until `shutdown` fires.
    ///
    /// The first refresh happens one interval after the call, since startup
    /// already ran [`RouteRefresher::bootstrap`].
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!(
            "Route refresher started. Interval: {:?}, directory timeout governs each fetch",
            self.interval
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let result = tokio::select! {
                _ = shutdown.cancelled() => break,
                result = self.refresh() => result,
            };

            if let Err(e) = result {
                tracing::error!(
                    generation = self.routes.generation(),
                    "Failed to update routes: {}. Keeping previous routes.",
                    e
                );
            }
        }

        tracing::info!("Route refresher is shutting down.");
    }

    /// Run the refresh loop on its own task.
    pub fn spawn(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let span = configure_component_tracing("route_refresher");
        tokio::spawn(async move { self.run(shutdown).await }.instrument(span))
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use async_trait::async_trait;

    use super::*;
    use crate::{
        core::ServiceRecord,
        ports::directory::{DirectoryError, DirectoryResult},
    };

    /// Answers from a queue; an empty queue means the directory is down.
    struct QueueDirectory {
        answers: Mutex<VecDeque<Vec<ServiceRecord>>>,
        fetches: AtomicUsize,
    }

    impl QueueDirectory {
        fn new(answers: Vec<Vec<ServiceRecord>>) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers.into()),
                fetches: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ServiceDirectory for QueueDirectory {
        async fn fetch_services(&self) -> DirectoryResult<Vec<ServiceRecord>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| DirectoryError::Connectivity {
                    url: "http://registry/services".to_string(),
                    message: "connection refused".to_string(),
                })
        }
    }

    fn refresher(directory: Arc<QueueDirectory>, interval: Duration) -> RouteRefresher {
        RouteRefresher::new(directory, Arc::new(RouteTable::new()), interval)
    }

    #[tokio::test]
    async fn test_bootstrap_failure_is_error() {
        let refresher = refresher(QueueDirectory::new(vec![]), Duration::from_secs(30));
        let err = refresher.bootstrap().await.unwrap_err();
        assert!(matches!(err.source, DirectoryError::Connectivity { .. }));
        assert!(refresher.routes().is_empty());
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_table() {
        let directory = QueueDirectory::new(vec![vec![ServiceRecord::new(
            "users",
            "http://users:8080",
        )]]);
        let refresher = refresher(directory, Duration::from_secs(30));

        assert_eq!(refresher.bootstrap().await.unwrap(), 1);
        let before = refresher.routes().lookup("users");

        assert!(refresher.refresh().await.is_err());

        assert_eq!(refresher.routes().lookup("users"), before);
        assert_eq!(refresher.routes().generation(), 1);
    }

    #[tokio::test]
    async fn test_refresh_reflects_latest_fetch() {
        let directory = QueueDirectory::new(vec![
            vec![
                ServiceRecord::new("users", "http://users:8080"),
                ServiceRecord::new("orders", "http://orders:8080"),
            ],
            vec![ServiceRecord::new("orders", "http://orders-v2:8080")],
        ]);
        let refresher = refresher(directory, Duration::from_secs(30));

        refresher.bootstrap().await.unwrap();
        refresher.refresh().await.unwrap();

        let routes = refresher.routes();
        assert!(routes.lookup("users").is_none());
        assert_eq!(
            routes.lookup("orders").as_deref(),
            Some("http://orders-v2:8080")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_refreshes_on_interval_until_shutdown() {
        let directory = QueueDirectory::new(vec![
            vec![ServiceRecord::new("a", "http://a")],
            vec![ServiceRecord::new("b", "http://b")],
            vec![ServiceRecord::new("c", "http://c")],
        ]);
        let refresher = Arc::new(refresher(directory.clone(), Duration::from_secs(30)));
        refresher.bootstrap().await.unwrap();

        let shutdown = CancellationToken::new();
        let handle = refresher.clone().spawn(shutdown.clone());

        tokio::time::sleep(Duration::from_secs(65)).await;
        assert_eq!(directory.fetches.load(Ordering::SeqCst), 3);
        assert_eq!(refresher.routes().lookup("c").as_deref(), Some("http://c"));

        // directory now down: table survives the next tick
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(directory.fetches.load(Ordering::SeqCst), 4);
        assert_eq!(refresher.routes().lookup("c").as_deref(), Some("http://c"));

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_clamped() {
        let directory = QueueDirectory::new(vec![]);
        let refresher = Arc::new(refresher(directory.clone(), Duration::ZERO));

        let shutdown = CancellationToken::new();
        let handle = refresher.clone().spawn(shutdown.clone());

        tokio::time::sleep(MIN_REFRESH_INTERVAL * 3 + Duration::from_millis(5)).await;
        shutdown.cancel();
        // a panicking interval would surface as a JoinError here
        handle.await.unwrap();

        let fetches = directory.fetches.load(Ordering::SeqCst);
        assert!((2..=4).contains(&fetches), "fetches = {fetches}");
    }
}
