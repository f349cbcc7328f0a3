//! Background task rebuilding the proxy pool once it goes stale.

use crate::pool::ProxyPool;

use log::info;
use parking_lot::Mutex;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};

static GLOBAL_REFRESHER: OnceLock<ProxyRefresher> = OnceLock::new();

/// Periodically checks [`ProxyPool::should_rotate`] and refreshes the pool
/// when it returns true.
///
/// The refresher is either stopped or running one background task.
/// [`start`](Self::start) and [`stop`](Self::stop) are idempotent.
pub struct ProxyRefresher {
    pool: Arc<ProxyPool>,
    interval: Duration,
    /// Stop signal of the running task, `None` while stopped.
    shutdown: Mutex<Option<watch::Sender<bool>>>,
}

impl ProxyRefresher {
    /// Create a stopped refresher ticking at the pool's `refresh_interval`.
    pub fn new(pool: Arc<ProxyPool>) -> Self {
        let interval = pool.config.refresh_interval;
        Self::with_interval(pool, interval)
    }

    /// Create a stopped refresher with an explicit tick interval.
    pub fn with_interval(pool: Arc<ProxyPool>, interval: Duration) -> Self {
        Self {
            pool,
            // tokio intervals reject a zero period
            interval: interval.max(Duration::from_millis(1)),
            shutdown: Mutex::new(None),
        }
    }

    /// Get the process-wide refresher, creating it for `pool` on first access.
    pub fn global(pool: Arc<ProxyPool>) -> &'static Self {
        GLOBAL_REFRESHER.get_or_init(|| Self::new(pool))
    }

    /// Spawn the background task. Must be called inside a tokio runtime.
    ///
    /// Does nothing if already running or if the pool is disabled.
    pub fn start(&self) {
        let mut shutdown = self.shutdown.lock();

        if shutdown.is_some() {
            info!("Proxy refresher is already running");
            return;
        }

        if !self.pool.config.enabled {
            info!("Proxy pool is disabled, proxy refresher will not start");
            return;
        }

        let (tx, rx) = watch::channel(false);
        *shutdown = Some(tx);

        info!("Starting proxy refresher (interval: {}s)", self.interval.as_secs());
        tokio::spawn(run(Arc::clone(&self.pool), self.interval, rx));
    }

    /// Signal the background task to exit. Does nothing if not running.
    ///
    /// A rotation already in progress is allowed to finish first.
    pub fn stop(&self) {
        if let Some(tx) = self.shutdown.lock().take() {
            info!("Stopping proxy refresher");
            let _ = tx.send(true);
        }
    }

    /// Whether the background task has been started and not stopped.
    pub fn is_running(&self) -> bool {
        self.shutdown.lock().is_some()
    }

    /// Run one rotation check right away, outside the schedule.
    ///
    /// Returns whether the pool was refreshed.
    pub async fn check_rotation(&self) -> bool {
        rotate_if_stale(&self.pool).await
    }
}

async fn run(pool: Arc<ProxyPool>, period: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                rotate_if_stale(&pool).await;
            }
            _ = shutdown.changed() => {
                info!("Proxy refresher stopped");
                return;
            }
        }
    }
}

async fn rotate_if_stale(pool: &ProxyPool) -> bool {
    info!("Checking proxy pool rotation");
    let old_size = pool.size();

    if !pool.refresh_if_stale().await {
        info!("Proxy pool rotation not needed, proxies are still fresh");
        return false;
    }

    info!(
        "Proxy pool rotation completed. Old proxy count: {}, new proxy count: {}",
        old_size,
        pool.size()
    );
    true
}
