//! Background eviction of idle clients.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::registry::ClientRegistry;

/// Default time between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
/// Default idle time after which a client is forgotten.
pub const DEFAULT_IDLE_THRESHOLD: Duration = Duration::from_secs(180);

/// Periodically evicts clients that have gone quiet.
///
/// Runs until its cancellation token is triggered.
pub struct Sweeper {
    registry: Arc<ClientRegistry>,
    interval: Duration,
    idle_threshold: Duration,
    cancel_token: CancellationToken,
}

impl Sweeper {
    /// Create a sweeper with the default interval and idle threshold.
    pub fn new(registry: Arc<ClientRegistry>, cancel_token: CancellationToken) -> Self {
        Self {
            registry,
            interval: DEFAULT_SWEEP_INTERVAL,
            idle_threshold: DEFAULT_IDLE_THRESHOLD,
            cancel_token,
        }
    }

    /// Set the time between sweeps.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set how long a client may stay idle before eviction.
    pub fn with_idle_threshold(mut self, idle_threshold: Duration) -> Self {
        self.idle_threshold = idle_threshold;
        self
    }

    /// Spawn the sweep loop onto the current runtime.
    ///
    /// The first sweep runs one interval after spawning.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run the sweep loop until cancelled.
    pub async fn run(self) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            interval = ?self.interval,
            idle_threshold = ?self.idle_threshold,
            "Starting client sweeper"
        );

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Client sweeper stopped");
                    return;
                }
                _ = ticker.tick() => {
                    let evicted = self.registry.sweep(self.idle_threshold);
                    if evicted > 0 {
                        debug!(
                            evicted,
                            remaining = self.registry.len(),
                            "Evicted idle clients"
                        );
                    }
                }
            }
        }
    }
}
