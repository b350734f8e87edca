//! Durable record of completed chunks.
//!
//! The ledger is a pretty-printed JSON array of chunk ids. Every commit
//! rewrites the whole file through a synced temporary sibling and a rename,
//! so a crash leaves either the previous or the new snapshot on disk.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::chunk::ChunkId;
use crate::error::LedgerError;

/// Ordered set of completed chunk ids backed by a JSON file.
#[derive(Debug)]
pub struct CompletionLedger {
    path: PathBuf,
    completed: Vec<ChunkId>,
    index: HashSet<ChunkId>,
}

impl CompletionLedger {
    /// Load the ledger at `path`, starting empty if the file does not exist.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();

        let ids: Vec<ChunkId> = match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| LedgerError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No ledger found, starting empty");
                Vec::new()
            }
            Err(source) => return Err(LedgerError::Read { path, source }),
        };

        let mut ledger = Self {
            path,
            completed: Vec::with_capacity(ids.len()),
            index: HashSet::with_capacity(ids.len()),
        };
        for id in ids {
            if ledger.index.insert(id.clone()) {
                ledger.completed.push(id);
            }
        }

        info!(
            path = %ledger.path.display(),
            completed = ledger.completed.len(),
            "Loaded completion ledger"
        );
        Ok(ledger)
    }

    pub fn is_complete(&self, id: &ChunkId) -> bool {
        self.index.contains(id)
    }

    /// Record `id` as complete and persist the full snapshot.
    ///
    /// Committing an id that is already present succeeds without writing.
    /// If the write fails the in-memory state is left untouched.
    pub async fn commit(&mut self, id: &ChunkId) -> Result<(), LedgerError> {
        if self.is_complete(id) {
            debug!(chunk = %id, "Chunk already in ledger");
            return Ok(());
        }

        let mut next = self.completed.clone();
        next.push(id.clone());
        self.persist(&next).await?;

        self.index.insert(id.clone());
        self.completed = next;
        debug!(chunk = %id, total = self.completed.len(), "Committed chunk");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }

    /// Completed ids in commit order.
    pub fn iter(&self) -> impl Iterator<Item = &ChunkId> {
        self.completed.iter()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, ids: &[ChunkId]) -> Result<(), LedgerError> {
        let json = serde_json::to_vec_pretty(ids)?;
        let tmp = self.temp_path();

        let result = async {
            if let Some(parent) = self.path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).await?;
                }
            }
            let mut file = fs::File::create(&tmp).await?;
            file.write_all(&json).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&tmp, &self.path).await
        }
        .await;

        if let Err(source) = result {
            let _ = fs::remove_file(&tmp).await;
            return Err(LedgerError::Write {
                path: self.path.clone(),
                source,
            });
        }
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "ledger".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
