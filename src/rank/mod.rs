// src/rank/mod.rs
pub mod ranker;
pub mod top;
pub mod window;

pub use ranker::{rank, snapshot_name, Ranker, SnapshotSummary};
pub use top::{latest, TopPosts, TopQuery};
pub use window::{TrailingWindow, WINDOW_HOURS};
