//! Background sync orchestration.
//!
//! One sync at a time: the `is_syncing` flag is claimed with a
//! compare-exchange so a scheduled run and a manual /refresh can never
//! overlap.

use crate::db::SyncResults;
use crate::server::AppState;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Default)]
pub struct SyncStatus {
    /// Set once the first sync has landed data
    pub ready: AtomicBool,
    pub startup_complete: AtomicBool,
    pub is_syncing: AtomicBool,
    pub last_sync: Mutex<Option<String>>,
}

impl SyncStatus {
    pub fn last_sync_time(&self) -> Option<String> {
        self.last_sync.lock().ok().and_then(|guard| guard.clone())
    }
}

/// Scrape every configured city plus the manual list, sync the batch and
/// sweep out past events.
pub async fn run_full_sync(state: Arc<AppState>) -> SyncResults {
    info!("🔄 Starting full sync");
    let scraper_config = &state.config.scraper;

    let mut events = Vec::new();
    for city in &scraper_config.cities {
        info!("📍 Scraping {}", city);
        match state
            .fatsoma
            .scrape_events(city, scraper_config.limit_per_city, true)
            .await
        {
            Ok(city_events) => {
                info!("Found {} events in {}", city_events.len(), city);
                events.extend(city_events);
            }
            // One failing city feed never blocks the rest of the pass
            Err(e) => warn!("Error scraping {}: {}", city, e),
        }
    }

    events.extend(state.fatsoma.fetch_manual_events().await);

    // Manual organizers overlap the city feeds
    let mut seen = HashSet::new();
    events.retain(|e| seen.insert(e.event_id.clone()));
    info!("Collected {} unique events", events.len());

    let results = state.syncer.sync_events(&events).await;

    match state.cleanup.archive_past_events(false).await {
        Ok(removed) => info!("Cleanup removed {} past events", removed.len()),
        Err(e) => warn!("Cleanup failed: {}", e),
    }

    if let Ok(mut last) = state.status.last_sync.lock() {
        *last = Some(Utc::now().to_rfc3339());
    }
    state.status.ready.store(true, Ordering::SeqCst);
    state.status.startup_complete.store(true, Ordering::SeqCst);

    info!("✅ Full sync complete");
    results
}

/// Spawn a sync unless one is already running. Returns false when the
/// claim on the flag fails.
pub fn try_spawn_sync(state: Arc<AppState>) -> bool {
    if state
        .status
        .is_syncing
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return false;
    }

    tokio::spawn(async move {
        run_full_sync(state.clone()).await;
        state.status.is_syncing.store(false, Ordering::SeqCst);
    });
    true
}

/// Periodic sync loop. The first tick fires immediately so the server comes
/// up with fresh data.
pub fn start_scheduler(state: Arc<AppState>) {
    let interval_hours = state.config.sync.interval_hours;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_hours * 3600));
        loop {
            ticker.tick().await;
            if !try_spawn_sync(state.clone()) {
                info!("Sync already in progress, skipping scheduled run");
            }
        }
    });
    info!("⏰ Scheduler started: syncing every {} hours", interval_hours);
}
