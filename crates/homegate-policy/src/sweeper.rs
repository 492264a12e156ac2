//! Background sweep of expired confirmations
//!
//! The task holds only a weak reference to engine state and exits when the
//! engine is dropped or its cancellation token fires.

use crate::engine::EngineShared;
use homegate_core::{HubError, HubResult};
use std::sync::Weak;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub(crate) struct Sweeper {
    shutdown_token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Spawn the sweep loop on the current Tokio runtime
    pub(crate) fn spawn(shared: Weak<EngineShared>, every: Duration) -> HubResult<Self> {
        if every.is_zero() {
            return Err(HubError::Runtime("sweep interval must be non-zero".to_string()));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| HubError::Runtime(format!("sweeper needs a Tokio runtime: {}", e)))?;

        let shutdown_token = CancellationToken::new();
        let cancelled = shutdown_token.clone();
        let handle = runtime.spawn(run(shared, every, cancelled));

        info!(interval_secs = every.as_secs_f64(), "Started confirmation sweeper");
        Ok(Self {
            shutdown_token,
            handle,
        })
    }

    pub(crate) fn is_running(&self) -> bool {
        !self.shutdown_token.is_cancelled() && !self.handle.is_finished()
    }

    pub(crate) fn stop(&self) {
        if !self.shutdown_token.is_cancelled() {
            self.shutdown_token.cancel();
            info!("Stopped confirmation sweeper");
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.shutdown_token.cancel();
    }
}

async fn run(shared: Weak<EngineShared>, every: Duration, shutdown_token: CancellationToken) {
    let mut tick = interval(every);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            // cancellation wins over a ready tick
            biased;

            _ = shutdown_token.cancelled() => {
                debug!("Sweeper received shutdown signal");
                break;
            }
            _ = tick.tick() => {
                let Some(shared) = shared.upgrade() else {
                    debug!("Engine dropped; sweeper exiting");
                    break;
                };
                if shutdown_token.is_cancelled() {
                    break;
                }
                shared.sweep_expired();
            }
        }
    }
}
