//! Host connectivity signal and the reconnect-driven sync trigger.

use serde::Deserialize;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, Duration, Instant, Interval},
};
use tracing::{debug, info, warn};

use crate::engine::sync::{SyncEngine, SyncOutcome};

/// Host side of the connectivity signal.
#[derive(Debug)]
pub struct ConnectivityReporter {
    tx: watch::Sender<bool>,
}

impl ConnectivityReporter {
    /// Publishes the current network state.
    pub fn set_online(&self, online: bool) {
        self.tx.send_replace(online);
    }

    /// Last published state.
    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Read side of the connectivity signal, held by the engine.
#[derive(Debug, Clone)]
pub struct Connectivity {
    rx: watch::Receiver<bool>,
}

impl Connectivity {
    /// True when the host last reported the network as available.
    pub fn is_online(&self) -> bool {
        *self.rx.borrow()
    }

    /// Waits for the next report. Errors once the reporter is dropped.
    pub async fn changed(&mut self) -> Result<bool, watch::error::RecvError> {
        self.rx.changed().await?;
        Ok(*self.rx.borrow_and_update())
    }

    /// Current state, marking it as seen so only later reports wake
    /// [`Connectivity::changed`].
    pub fn observe(&mut self) -> bool {
        *self.rx.borrow_and_update()
    }

    /// A signal that never changes.
    pub fn fixed(online: bool) -> Self {
        let (_, rx) = watch::channel(online);
        Self { rx }
    }
}

/// Creates a linked reporter/reader pair starting at `online`.
pub fn connectivity(online: bool) -> (ConnectivityReporter, Connectivity) {
    let (tx, rx) = watch::channel(online);
    (ConnectivityReporter { tx }, Connectivity { rx })
}

/// Auto-sync trigger tuning.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Also attempt a pass on this period while online.
    pub interval_ms: Option<u64>,
}

/// Runs a pass whenever the network comes back with work pending.
///
/// Stops when the connectivity reporter is dropped; abort the handle to stop
/// it earlier.
pub fn spawn_auto_sync(engine: SyncEngine, config: TriggerConfig) -> JoinHandle<()> {
    // Baseline is the state at call time; a report sent before the task is
    // first polled still counts as a transition.
    let mut conn = engine.connectivity().clone();
    let mut was_online = conn.observe();
    tokio::spawn(async move {
        let mut ticker = config.interval_ms.map(|ms| {
            let period = Duration::from_millis(ms.max(1));
            time::interval_at(Instant::now() + period, period)
        });

        loop {
            tokio::select! {
                changed = conn.changed() => {
                    let Ok(online) = changed else { break; };
                    if online && !was_online {
                        info!("back online");
                        sync_if_pending(&engine).await;
                    }
                    was_online = online;
                }
                _ = next_tick(&mut ticker) => {
                    if conn.is_online() {
                        sync_if_pending(&engine).await;
                    }
                }
            }
        }
        debug!("auto-sync trigger stopped");
    })
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn sync_if_pending(engine: &SyncEngine) {
    match engine.queue().stats().await {
        Ok(stats) if stats.pending == 0 => {}
        Ok(_) => match engine.sync_queue().await {
            Ok(SyncOutcome::AlreadyRunning) => debug!("sync already in progress"),
            Ok(_) => {}
            Err(err) => warn!(error = %err, "auto-sync failed"),
        },
        Err(err) => warn!(error = %err, "could not read queue stats"),
    }
}
