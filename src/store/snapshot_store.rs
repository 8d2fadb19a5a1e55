// src/store/snapshot_store.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tokio::fs;

use crate::clock::Clock;
use crate::error::StoreError;

const EXT: &str = "json";

/// Metadata of one stored snapshot blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotInfo {
    pub name: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

/// Named-blob store for ranked snapshots. A put under an existing name
/// replaces the blob as a whole.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn put(&self, name: &str, data: Vec<u8>) -> Result<SnapshotInfo, StoreError>;

    /// `Ok(None)` when no blob exists under `name`.
    async fn get(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError>;

    async fn list(&self) -> Result<Vec<SnapshotInfo>, StoreError>;
}

fn validate_name(name: &str) -> Result<(), StoreError> {
    let bad = name.is_empty()
        || name.starts_with('.')
        || name.contains("..")
        || name.contains(['/', '\\']);
    if bad {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

pub struct MemorySnapshotStore {
    blobs: RwLock<BTreeMap<String, (SnapshotInfo, Vec<u8>)>>,
    clock: Arc<dyn Clock>,
}

impl MemorySnapshotStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            blobs: RwLock::new(BTreeMap::new()),
            clock,
        }
    }

    fn poisoned() -> StoreError {
        StoreError::Unavailable("snapshot store lock poisoned".into())
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn put(&self, name: &str, data: Vec<u8>) -> Result<SnapshotInfo, StoreError> {
        validate_name(name)?;
        let info = SnapshotInfo {
            name: name.to_string(),
            size: data.len() as u64,
            modified: self.clock.now(),
        };
        let mut blobs = self.blobs.write().map_err(|_| Self::poisoned())?;
        blobs.insert(name.to_string(), (info.clone(), data));
        Ok(info)
    }

    async fn get(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let blobs = self.blobs.read().map_err(|_| Self::poisoned())?;
        Ok(blobs.get(name).map(|(_, d)| d.clone()))
    }

    async fn list(&self) -> Result<Vec<SnapshotInfo>, StoreError> {
        let blobs = self.blobs.read().map_err(|_| Self::poisoned())?;
        Ok(blobs.values().map(|(i, _)| i.clone()).collect())
    }
}

/// Snapshot store backed by one `<name>.json` file per snapshot.
///
/// Writes go to a hidden temp file that is renamed over the target, so a
/// reader sees either the previous blob or the new one, never a partial file.
#[derive(Debug, Clone)]
pub struct FsSnapshotStore {
    dir: PathBuf,
}

impl FsSnapshotStore {
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{EXT}"))
    }

    async fn info_for(name: String, path: &Path) -> Result<SnapshotInfo, StoreError> {
        let meta = fs::metadata(path).await?;
        Ok(SnapshotInfo {
            name,
            size: meta.len(),
            modified: meta.modified()?.into(),
        })
    }
}

#[async_trait]
impl SnapshotStore for FsSnapshotStore {
    async fn put(&self, name: &str, data: Vec<u8>) -> Result<SnapshotInfo, StoreError> {
        validate_name(name)?;
        let target = self.path_for(name);

        // Each write gets its own temp file so concurrent puts of one name
        // race only on the final rename.
        let dir = self.dir.clone();
        let prefix = format!(".{name}.");
        let dest = target.clone();
        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            let mut tmp = tempfile::Builder::new()
                .prefix(&prefix)
                .suffix(".tmp")
                .tempfile_in(&dir)?;
            tmp.write_all(&data)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&dest).map_err(|e| StoreError::Io(e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("snapshot write task failed: {e}")))??;

        Self::info_for(name.to_string(), &target).await
    }

    async fn get(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError> {
        validate_name(name)?;
        match fs::read(self.path_for(name)).await {
            Ok(d) => Ok(Some(d)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<SnapshotInfo>, StoreError> {
        let mut out = Vec::new();
        let mut rd = fs::read_dir(&self.dir).await?;
        while let Some(ent) = rd.next_entry().await? {
            let path = ent.path();
            if path.extension().and_then(|s| s.to_str()) != Some(EXT) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if stem.starts_with('.') {
                continue;
            }
            match Self::info_for(stem.to_string(), &path).await {
                Ok(info) => out.push(info),
                // removed after read_dir saw it
                Err(StoreError::Io(e)) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[tokio::test]
    async fn memory_store_overwrites_by_name() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = MemorySnapshotStore::new(clock.clone());
        let a = store.put("hn_posts_2024-01-01", b"[1]".to_vec()).await.unwrap();
        clock.advance(chrono::Duration::seconds(5));
        let b = store.put("hn_posts_2024-01-01", b"[1,2]".to_vec()).await.unwrap();
        assert!(b.modified > a.modified);
        assert_eq!(b.size, 5);

        let list = store.list().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(
            store.get("hn_posts_2024-01-01").await.unwrap().unwrap(),
            b"[1,2]"
        );
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fs_store_round_trips_and_lists() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsSnapshotStore::open(tmp.path().join("snaps")).await.unwrap();

        store.put("hn_posts_2024-01-01", b"[]".to_vec()).await.unwrap();
        store.put("hn_posts_2024-01-02", b"[1]".to_vec()).await.unwrap();
        store.put("hn_posts_2024-01-02", b"[1,2]".to_vec()).await.unwrap();

        let mut names: Vec<_> = store.list().await.unwrap().into_iter().map(|i| i.name).collect();
        names.sort();
        assert_eq!(names, vec!["hn_posts_2024-01-01", "hn_posts_2024-01-02"]);
        assert_eq!(
            store.get("hn_posts_2024-01-02").await.unwrap().unwrap(),
            b"[1,2]"
        );
        assert!(store.get("hn_posts_1999-01-01").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_puts_of_one_name_never_tear() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(FsSnapshotStore::open(tmp.path()).await.unwrap());
        let name = "hn_posts_2024-05-01";

        for round in 0..25usize {
            let mut writers = Vec::new();
            for w in 0..4usize {
                let store = store.clone();
                // each writer's blob is one repeated byte with its own length
                let blob = vec![b'a' + w as u8; 200_000 + (round * 4 + w) * 1_000];
                writers.push(tokio::spawn(async move { store.put(name, blob).await }));
            }
            for h in writers {
                h.await.unwrap().expect("concurrent put failed");
            }

            let got = store.get(name).await.unwrap().unwrap();
            let first = got[0];
            assert!(got.iter().all(|b| *b == first), "round {round}: mixed content");
            let w = (first - b'a') as usize;
            assert_eq!(got.len(), 200_000 + (round * 4 + w) * 1_000, "round {round}");
        }

        // no temp files left behind
        let names: Vec<_> = store.list().await.unwrap().into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec![name.to_string()]);
        let mut rd = fs::read_dir(tmp.path()).await.unwrap();
        let mut files = 0;
        while rd.next_entry().await.unwrap().is_some() {
            files += 1;
        }
        assert_eq!(files, 1);
    }

    #[tokio::test]
    async fn list_ignores_temp_and_foreign_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsSnapshotStore::open(tmp.path()).await.unwrap();
        store.put("hn_posts_2024-01-01", b"[]".to_vec()).await.unwrap();
        fs::write(tmp.path().join(".hn_posts_2024-01-02.abc.tmp"), b"[").await.unwrap();
        fs::write(tmp.path().join(".hidden.json"), b"[]").await.unwrap();
        fs::write(tmp.path().join("notes.txt"), b"hi").await.unwrap();

        let names: Vec<_> = store.list().await.unwrap().into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["hn_posts_2024-01-01"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn list_skips_entries_that_vanish_before_stat() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsSnapshotStore::open(tmp.path()).await.unwrap();
        store.put("hn_posts_2024-01-01", b"[]".to_vec()).await.unwrap();
        // dangling link: read_dir sees it, metadata reports NotFound
        std::os::unix::fs::symlink(
            tmp.path().join("gone.json"),
            tmp.path().join("hn_posts_2024-01-02.json"),
        )
        .unwrap();

        let names: Vec<_> = store.list().await.unwrap().into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["hn_posts_2024-01-01"]);
    }

    #[tokio::test]
    async fn path_like_names_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsSnapshotStore::open(tmp.path()).await.unwrap();
        for bad in ["../escape", "a/b", ".hidden", ""] {
            let err = store.put(bad, b"[]".to_vec()).await.unwrap_err();
            assert!(matches!(err, StoreError::InvalidName(_)), "{bad}: {err:?}");
        }
    }
}
