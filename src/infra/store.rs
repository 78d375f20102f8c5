//! Append-only record store under `<repo>/.whence/`.
//!
//! Layout: `manifests/<id>.json` for committed record groups,
//! `pending/<id>.json` for single uncommitted records, `blobs/<hash>` for
//! the pre/post file snapshots pending records rely on. A `STORE` marker
//! carries the format version; `DISABLED` mutes recording without
//! deleting anything. Manifests are written once and never rewritten.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::errors::WhenceError;
use crate::core::record::{EditRecord, content_hash};

/// Default store directory name, overridable through config.
pub const DEFAULT_STORE_DIR: &str = ".whence";

const STORE_MARKER: &str = "STORE";
const DISABLED_MARKER: &str = "DISABLED";
const STORE_VERSION: &str = "1";

/// Group of records folded into one VCS commit; `commit_sha` is empty only
/// in the transient window before the fold completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub id: String,
    pub commit_sha: String,
    pub author: String,
    pub ts: DateTime<Utc>,
    pub records: Vec<EditRecord>,
}

/// One uncommitted record plus the snapshot hashes that anchor checkpoint
/// replay. The record's `manifest_id` doubles as the pending file name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRecord {
    pub record: EditRecord,
    #[serde(default)]
    pub pre_hash: Option<String>,
    #[serde(default)]
    pub post_hash: Option<String>,
}

#[derive(Debug)]
pub struct RecordStore {
    root: PathBuf,
}

impl RecordStore {
    /// Open an existing store. `NotInitialized` when the marker is absent,
    /// `StoreUnavailable` when it exists but cannot be read.
    pub fn open(repo_root: &Path, dir_name: &str) -> Result<Self> {
        let root = repo_root.join(dir_name);
        let marker = root.join(STORE_MARKER);
        if !marker.exists() {
            return Err(WhenceError::NotInitialized.into());
        }
        fs::read_to_string(&marker)
            .map_err(|e| WhenceError::StoreUnavailable(format!("{}: {e}", marker.display())))?;
        Ok(Self { root })
    }

    /// Create the store layout; idempotent.
    pub fn init(repo_root: &Path, dir_name: &str) -> Result<Self> {
        let root = repo_root.join(dir_name);
        for sub in ["manifests", "pending", "blobs"] {
            fs::create_dir_all(root.join(sub))
                .with_context(|| format!("Failed to create store directory {sub}"))?;
        }
        let marker = root.join(STORE_MARKER);
        if !marker.exists() {
            fs::write(&marker, STORE_VERSION).context("Failed to write store marker")?;
        }
        // Re-enabling clears a previous disable.
        let disabled = root.join(DISABLED_MARKER);
        if disabled.exists() {
            fs::remove_file(&disabled).context("Failed to clear DISABLED marker")?;
        }
        Ok(Self { root })
    }

    /// Stop recording without touching recorded data.
    pub fn disable(&self) -> Result<()> {
        fs::write(self.root.join(DISABLED_MARKER), "")
            .context("Failed to write DISABLED marker")?;
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.root.join(STORE_MARKER).exists() && !self.root.join(DISABLED_MARKER).exists()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Sorted committed-manifest ids.
    pub fn list_manifests(&self) -> Result<Vec<String>> {
        let dir = self.root.join("manifests");
        let mut ids = Vec::new();
        for entry in fs::read_dir(&dir)
            .map_err(|e| WhenceError::StoreUnavailable(format!("{}: {e}", dir.display())))?
        {
            let entry = entry
                .map_err(|e| WhenceError::StoreUnavailable(format!("{}: {e}", dir.display())))?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json")
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    pub fn read_manifest(&self, id: &str) -> Result<Manifest> {
        let path = self.root.join("manifests").join(format!("{id}.json"));
        let content = fs::read_to_string(&path)
            .map_err(|e| WhenceError::StoreUnavailable(format!("{}: {e}", path.display())))?;
        let mut manifest: Manifest = serde_json::from_str(&content)
            .map_err(|e| WhenceError::StoreUnavailable(format!("manifest {id}: {e}")))?;
        // Stamp identity onto the records so they carry a stable key.
        for (seq, record) in manifest.records.iter_mut().enumerate() {
            record.manifest_id = manifest.id.clone();
            record.seq = seq as u32;
            if record.commit_sha.is_empty() {
                record.commit_sha = manifest.commit_sha.clone();
            }
        }
        Ok(manifest)
    }

    /// All pending records, sorted by (ts, file). Individual unparseable
    /// files are dropped with a warning; an unreadable directory is fatal.
    pub fn read_all_pending(&self) -> Result<Vec<PendingRecord>> {
        let dir = self.root.join("pending");
        let mut pending = Vec::new();
        for entry in fs::read_dir(&dir)
            .map_err(|e| WhenceError::StoreUnavailable(format!("{}: {e}", dir.display())))?
        {
            let entry = entry
                .map_err(|e| WhenceError::StoreUnavailable(format!("{}: {e}", dir.display())))?;
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }
            let content = match fs::read_to_string(&path) {
                Ok(c) => c,
                Err(e) => {
                    warn!("skipping unreadable pending record {}: {e}", path.display());
                    continue;
                }
            };
            match serde_json::from_str::<PendingRecord>(&content) {
                Ok(mut p) => {
                    if p.record.manifest_id.is_empty()
                        && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
                    {
                        p.record.manifest_id = stem.to_string();
                    }
                    pending.push(p);
                }
                Err(e) => warn!("dropping malformed pending record {}: {e}", path.display()),
            }
        }
        pending.sort_by(|a, b| {
            (a.record.ts, &a.record.file).cmp(&(b.record.ts, &b.record.file))
        });
        Ok(pending)
    }

    pub fn pending_count(&self) -> Result<usize> {
        Ok(self.read_all_pending()?.len())
    }

    /// Tip of the append-only store: a digest over the sorted committed
    /// manifest ids. Changes exactly when a manifest lands.
    pub fn branch_tip_sha(&self) -> Result<String> {
        let ids = self.list_manifests()?;
        Ok(content_hash(&ids.join("\n")))
    }

    /// Snapshot content by hash; `Ok(None)` when the blob was collected.
    pub fn read_blob(&self, hash: &str) -> Result<Option<String>> {
        let path = self.blob_path(hash);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read blob {hash}")),
        }
    }

    /// Store a snapshot, returning its content hash.
    pub fn put_blob(&self, content: &str) -> Result<String> {
        let hash = content_hash(content);
        let path = self.blob_path(&hash);
        if !path.exists() {
            fs::write(&path, content).with_context(|| format!("Failed to write blob {hash}"))?;
        }
        Ok(hash)
    }

    fn blob_path(&self, hash: &str) -> PathBuf {
        self.root.join("blobs").join(hash)
    }

    /// Append a committed manifest. Appending an existing id is an error:
    /// the store is append-only.
    pub fn append_manifest(&self, manifest: &Manifest) -> Result<()> {
        let path = self
            .root
            .join("manifests")
            .join(format!("{}.json", manifest.id));
        if path.exists() {
            anyhow::bail!("manifest {} already exists", manifest.id);
        }
        write_json(&path, manifest)
    }

    /// Record a pending edit; the file name is the record's manifest id.
    pub fn append_pending(&self, pending: &PendingRecord) -> Result<()> {
        if pending.record.manifest_id.is_empty() {
            anyhow::bail!("pending record needs a manifest id");
        }
        let path = self
            .root
            .join("pending")
            .join(format!("{}.json", pending.record.manifest_id));
        write_json(&path, pending)
    }

    /// Fold pending records into a committed manifest and collect the
    /// snapshot blobs nothing references anymore.
    pub fn fold_pending(
        &self,
        pending_ids: &[String],
        manifest_id: &str,
        commit_sha: &str,
        author: &str,
        ts: DateTime<Utc>,
    ) -> Result<Manifest> {
        let mut records = Vec::new();
        for (seq, id) in pending_ids.iter().enumerate() {
            let path = self.root.join("pending").join(format!("{id}.json"));
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read pending record {id}"))?;
            let pending: PendingRecord = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse pending record {id}"))?;
            let mut record = pending.record;
            record.commit_sha = commit_sha.to_string();
            record.manifest_id = manifest_id.to_string();
            record.seq = seq as u32;
            records.push(record);
        }

        let manifest = Manifest {
            id: manifest_id.to_string(),
            commit_sha: commit_sha.to_string(),
            author: author.to_string(),
            ts,
            records,
        };
        self.append_manifest(&manifest)?;

        for id in pending_ids {
            let path = self.root.join("pending").join(format!("{id}.json"));
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove folded pending record {id}"))?;
        }
        self.gc_blobs()?;
        Ok(manifest)
    }

    // Delete every blob no remaining pending record references.
    fn gc_blobs(&self) -> Result<()> {
        let mut live = std::collections::HashSet::new();
        for pending in self.read_all_pending()? {
            live.extend(pending.pre_hash);
            live.extend(pending.post_hash);
        }
        let dir = self.root.join("blobs");
        for entry in fs::read_dir(&dir).context("Failed to list blobs")? {
            let entry = entry.context("Failed to list blobs")?;
            if let Some(name) = entry.file_name().to_str()
                && !live.contains(name)
            {
                fs::remove_file(entry.path())
                    .with_context(|| format!("Failed to collect blob {name}"))?;
            }
        }
        Ok(())
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value).context("Failed to serialize store file")?;
    let mut file = File::create(path)
        .with_context(|| format!("Failed to create store file {}", path.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write store file {}", path.display()))?;
    file.sync_all()
        .with_context(|| format!("Failed to sync store file {}", path.display()))?;
    Ok(())
}
