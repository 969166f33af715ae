//! Periodic sweep task (spec §2 item 8, §4.6).
//!
//! Mirrors `voice/rate_limit.rs::start_cleanup_task`'s shape: a
//! `tokio::time::interval` loop spawned once at startup, calling back into
//! the owning component on every tick for as long as the process runs.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::csm::Csm;

/// Spawn the sweeper loop. The returned handle is not expected to finish;
/// dropping it detaches the task rather than stopping it, matching the
/// teacher's cleanup-task spawn.
pub fn spawn(csm: Arc<Csm>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so the first real sweep
        // happens one full interval after startup.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            debug!("running sweep");
            csm.sweep_once().await;
        }
    })
}
