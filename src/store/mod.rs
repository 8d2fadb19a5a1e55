// src/store/mod.rs
//! The two shared stores every worker coordinates through.
//!
//! All writes are single-key (or single-blob) operations, so nothing here
//! takes locks across keys.

pub mod item_store;
pub mod snapshot_store;

pub use item_store::{Entry, ItemStore, MemoryItemStore};
pub use snapshot_store::{FsSnapshotStore, MemorySnapshotStore, SnapshotInfo, SnapshotStore};

use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

/// One-time registration of every series the pipeline emits.
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("hn_dispatch_ids_total", "Ids published for processing.");
        describe_counter!(
            "hn_dispatch_publish_errors_total",
            "Ids whose dispatch publish failed."
        );
        describe_counter!("hn_process_stored_total", "Items upserted into the item store.");
        describe_counter!(
            "hn_process_skipped_total",
            "Upstream records skipped as non-stories."
        );
        describe_counter!(
            "hn_process_errors_total",
            "Process attempts that failed on fetch or store."
        );
        describe_counter!("hn_rank_snapshots_total", "Ranked snapshots written.");
        describe_counter!(
            "hn_rank_decode_errors_total",
            "Item-store entries skipped while ranking."
        );
        describe_counter!("hn_store_expired_total", "Item entries removed by the TTL sweep.");
        describe_gauge!("hn_rank_snapshot_items", "Items in the last ranked snapshot.");
        describe_gauge!("hn_store_item_ttl_secs", "Configured item expiry in seconds.");
        describe_histogram!("hn_rank_build_ms", "Snapshot build time in milliseconds.");
    });
}
