// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod bus;
pub mod clock;
pub mod config;
pub mod error;
pub mod ingest;
pub mod item;
pub mod metrics;
pub mod rank;
pub mod scheduler;
pub mod service;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::create_router;
pub use crate::error::{ErrorClass, ServiceError};
pub use crate::item::{ExternalRecord, Item};
pub use crate::service::{Endpoint, HnService};

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::task::JoinHandle;
use tracing::info;

use crate::bus::{InProcessBus, MessageBus};
use crate::clock::Clock;
use crate::config::AppConfig;
use crate::ingest::Fetcher;
use crate::store::{FsSnapshotStore, MemoryItemStore, MemorySnapshotStore, SnapshotStore};

/// A wired pipeline: stores, bus, running workers, and the HTTP router.
pub struct App {
    pub router: Router,
    pub service: Arc<HnService>,
    pub bus: InProcessBus,
    pub items: Arc<MemoryItemStore>,
    pub snapshots: Arc<dyn SnapshotStore>,
    pub tasks: Vec<JoinHandle<()>>,
}

impl App {
    /// Abort every background task (workers, sweeper, schedulers).
    pub fn shutdown(&self) {
        for t in &self.tasks {
            t.abort();
        }
    }
}

/// Build the stores from `cfg`, start the bus workers, the TTL sweeper and
/// any configured schedulers, and return the router that fronts them.
pub async fn app(
    cfg: &AppConfig,
    fetcher: Arc<dyn Fetcher>,
    clock: Arc<dyn Clock>,
) -> anyhow::Result<App> {
    let items = Arc::new(MemoryItemStore::new(cfg.store.item_ttl(), clock.clone()));
    let snapshots: Arc<dyn SnapshotStore> = match &cfg.store.snapshot_dir {
        Some(dir) => {
            info!(dir = %dir.display(), "snapshots stored on disk");
            Arc::new(FsSnapshotStore::open(dir).await?)
        }
        None => Arc::new(MemorySnapshotStore::new(clock.clone())),
    };

    let bus = InProcessBus::new(cfg.workers.channel_capacity);
    let bus_handle: Arc<dyn MessageBus> = Arc::new(bus.clone());

    let service = Arc::new(HnService::new(
        fetcher,
        items.clone(),
        snapshots.clone(),
        bus_handle.clone(),
        clock,
    ));

    let mut tasks = service.serve(&bus, &cfg.workers);
    if cfg.store.item_ttl().is_some() && cfg.store.sweep_interval_secs > 0 {
        tasks.push(
            items
                .clone()
                .spawn_sweeper(Duration::from_secs(cfg.store.sweep_interval_secs)),
        );
    }
    if let Some(every) = cfg.schedule.fetch_interval() {
        tasks.push(scheduler::spawn_fetch_scheduler(service.clone(), every));
    }
    if let Some(every) = cfg.schedule.sort_interval() {
        tasks.push(scheduler::spawn_sort_scheduler(service.clone(), every));
    }

    let router = create_router(api::AppState {
        service: service.clone(),
        bus: bus_handle,
    });

    Ok(App {
        router,
        service,
        bus,
        items,
        snapshots,
        tasks,
    })
}
