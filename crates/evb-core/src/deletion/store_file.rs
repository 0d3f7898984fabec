//! JSON-lines journal store.
//!
//! Every mutation appends one line (`insert` or `remove`) and syncs it before
//! returning. Opening replays the journal and rewrites it as a compact snapshot
//! (write temp, rename over target). The snapshot is rewritten again whenever
//! tombstones outnumber live records, and before the next append after a
//! failed one, so a partly written line never prefixes a later record.

use std::{
    collections::BTreeMap,
    ffi::OsString,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::{
    fs::{self, File, OpenOptions},
    io::AsyncWriteExt,
    sync::Mutex,
};
use tracing::{debug, info, warn};

use crate::{
    deletion::{store::TaskStore, DeletionTask, TaskId},
    Error, Result,
};

const MIN_COMPACT_TOMBSTONES: usize = 256;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum JournalEntry {
    Insert { task: DeletionTask },
    Remove { task_id: TaskId },
}

pub struct FileStore {
    path: PathBuf,
    state: Mutex<Journal>,
}

struct Journal {
    file: File,
    live: BTreeMap<TaskId, DeletionTask>,
    tombstones: usize,
    /// Set when an append failed; the file tail may hold a fragment.
    needs_rewrite: bool,
}

impl Journal {
    async fn record(&mut self, path: &Path, entry: &JournalEntry) -> Result<()> {
        if self.needs_rewrite {
            self.compact(path).await?;
            self.needs_rewrite = false;
            info!(path = %path.display(), "deletion journal rewritten after failed append");
        }
        if let Err(e) = append(&mut self.file, entry).await {
            self.needs_rewrite = true;
            return Err(e);
        }
        Ok(())
    }

    async fn compact(&mut self, path: &Path) -> Result<()> {
        self.file = write_snapshot(path, &self.live).await?;
        self.tombstones = 0;
        Ok(())
    }
}

impl FileStore {
    /// Open (or create) the journal at `path`.
    ///
    /// Any failure here is [`Error::StoreUnavailable`]: the bot must not run
    /// without a store it can trust.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let unavailable = |reason: String| Error::StoreUnavailable {
            path: path.clone(),
            reason,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| unavailable(format!("cannot create directory: {e}")))?;
        }

        let live = match fs::read_to_string(&path).await {
            Ok(txt) => replay(&txt).map_err(unavailable)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(unavailable(format!("cannot read journal: {e}"))),
        };

        let file = write_snapshot(&path, &live)
            .await
            .map_err(|e| unavailable(format!("cannot write journal: {e}")))?;

        info!(path = %path.display(), pending = live.len(), "deletion store opened");

        Ok(Self {
            path,
            state: Mutex::new(Journal {
                file,
                live,
                tombstones: 0,
                needs_rewrite: false,
            }),
        })
    }
}

#[async_trait]
impl TaskStore for FileStore {
    async fn insert(&self, task: &DeletionTask) -> Result<bool> {
        let mut j = self.state.lock().await;
        if j.live.contains_key(&task.task_id) {
            return Ok(false);
        }
        j.record(&self.path, &JournalEntry::Insert { task: task.clone() })
            .await?;
        j.live.insert(task.task_id.clone(), task.clone());
        Ok(true)
    }

    async fn remove(&self, task_id: &TaskId) -> Result<bool> {
        let mut j = self.state.lock().await;
        if !j.live.contains_key(task_id) {
            return Ok(false);
        }
        j.record(
            &self.path,
            &JournalEntry::Remove {
                task_id: task_id.clone(),
            },
        )
        .await?;
        j.live.remove(task_id);
        j.tombstones += 1;

        // The removal is durable at this point; compaction is best effort.
        if j.tombstones > j.live.len().max(MIN_COMPACT_TOMBSTONES) {
            debug!(tombstones = j.tombstones, live = j.live.len(), "compacting deletion journal");
            if let Err(e) = j.compact(&self.path).await {
                warn!(
                    tombstones = j.tombstones,
                    "journal compaction failed, keeping current file: {e}"
                );
            }
        }
        Ok(true)
    }

    async fn list(&self) -> Result<Vec<DeletionTask>> {
        let j = self.state.lock().await;
        Ok(j.live.values().cloned().collect())
    }
}

fn replay(txt: &str) -> std::result::Result<BTreeMap<TaskId, DeletionTask>, String> {
    let mut live = BTreeMap::new();
    let lines: Vec<&str> = txt.lines().collect();
    let torn_tail_possible = !txt.ends_with('\n');

    for (idx, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<JournalEntry>(line) {
            Ok(JournalEntry::Insert { task }) => {
                live.insert(task.task_id.clone(), task);
            }
            Ok(JournalEntry::Remove { task_id }) => {
                live.remove(&task_id);
            }
            Err(e) if torn_tail_possible && idx + 1 == lines.len() => {
                // Crash mid-append: the record was never acknowledged.
                warn!(line = idx + 1, "ignoring torn journal tail: {e}");
            }
            Err(e) => return Err(format!("corrupt journal line {}: {e}", idx + 1)),
        }
    }
    Ok(live)
}

async fn append(file: &mut File, entry: &JournalEntry) -> Result<()> {
    let mut line = serde_json::to_string(entry)?;
    line.push('\n');
    file.write_all(line.as_bytes()).await?;
    file.flush().await?;
    file.sync_data().await?;
    Ok(())
}

/// Replace the journal with one `insert` per live task; returns an append handle.
async fn write_snapshot(path: &Path, live: &BTreeMap<TaskId, DeletionTask>) -> Result<File> {
    let mut tmp_name = OsString::from(path.as_os_str());
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    let mut body = String::new();
    for task in live.values() {
        body.push_str(&serde_json::to_string(&JournalEntry::Insert {
            task: task.clone(),
        })?);
        body.push('\n');
    }

    let mut out = File::create(&tmp).await?;
    out.write_all(body.as_bytes()).await?;
    out.flush().await?;
    out.sync_all().await?;
    drop(out);

    // Opened before the rename: the handle follows the new inode, so it can
    // never point at the journal being replaced.
    let file = OpenOptions::new().append(true).open(&tmp).await?;
    fs::rename(&tmp, path).await?;
    Ok(file)
}
