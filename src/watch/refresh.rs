//! Background refresh of the status cache.
//!
//! Keeps the cache warm so requests rarely pay for a read. Failures are not
//! retried beyond the next tick; they are logged when the state changes so a
//! persistently broken file does not flood the error log.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use super::{StatusCache, StatusSnapshot};
use crate::logger;

/// What the refresher saw on its previous tick
#[derive(Debug, Clone, PartialEq, Eq)]
enum Observed {
    Unknown,
    Missing,
    Loaded,
    Failed(String),
}

impl Observed {
    fn from_snapshot(snapshot: &StatusSnapshot) -> Self {
        match snapshot {
            StatusSnapshot::Missing => Self::Missing,
            StatusSnapshot::Document(_) => Self::Loaded,
            StatusSnapshot::Failed(message) => Self::Failed(message.clone()),
        }
    }
}

/// Spawn the refresher on the current runtime.
///
/// Ticks never overlap: the load runs inside the loop body and missed ticks
/// are delayed rather than bursted. The task runs until the process exits.
pub fn spawn_refresher(cache: Arc<StatusCache>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut observed = Observed::Unknown;

        loop {
            ticker.tick().await;
            let snapshot = cache.load().await;
            observed = report(&cache, observed, &snapshot);
            if observed == Observed::Loaded {
                log_current(&cache).await;
            }
        }
    })
}

fn report(cache: &StatusCache, previous: Observed, snapshot: &StatusSnapshot) -> Observed {
    let current = Observed::from_snapshot(snapshot);
    let path = cache.path().display();

    match (&previous, &current) {
        (_, Observed::Failed(message)) if previous != current => {
            logger::log_warning(&format!("[Watch] {message}"));
        }
        (Observed::Unknown | Observed::Loaded, Observed::Missing) => {
            logger::log_info(&format!("[Watch] {path} not found, serving null"));
        }
        (Observed::Failed(_), Observed::Missing) => {
            logger::log_info(&format!("[Watch] {path} removed"));
        }
        (Observed::Failed(_), Observed::Loaded) => {
            logger::log_info(&format!("[Watch] {path} recovered"));
        }
        _ => {}
    }

    current
}

async fn log_current(cache: &StatusCache) {
    if let Some(read_at) = cache.last_read().await {
        logger::log_debug(&format!(
            "[Watch] {} current as of {} ({} parses)",
            cache.path().display(),
            read_at.format("%H:%M:%S"),
            cache.parse_count()
        ));
    }
}
