//! Content-addressed evidence store with WORM locking.
//!
//! On-disk layout under the store root:
//!
//! ```text
//! evidence/{hh}/{hash}    object bytes (hh = first two hex chars)
//! metadata/{hash}.json    sidecar metadata
//! locks/{hash}.worm       WORM marker, created exclusively
//! tmp/                    staging area for atomic renames
//! ```
//!
//! `put` is idempotent: identical bytes hash to the same id and the content
//! is written once. Writes stage into `tmp/` and atomically rename so a torn
//! write can never leave a hash-labeled path with wrong content. Every `get`
//! re-hashes what it read; a mismatch is corruption and is surfaced, never
//! retried. The WORM transition uses an exclusive marker create, so exactly
//! one of two racing lockers wins.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::object_id::ObjectId;

/// Case-level deletion veto, implemented by the audit ledger.
///
/// While a hold is active for a case, deletion of that case's objects must
/// be refused regardless of WORM state.
pub trait HoldRegistry: Send + Sync {
    fn is_hold_active(&self, case_id: &str) -> bool;
}

/// Tag key the store consults for legal-hold checks.
pub const CASE_ID_TAG: &str = "case_id";

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Metadata sidecar for a stored object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredObject {
    pub object_id: ObjectId,
    pub content_type: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    /// Same digest as `object_id`, recorded explicitly in the sidecar.
    pub checksum: String,
    pub tags: BTreeMap<String, String>,
    pub worm_locked: bool,
}

/// Content-addressed, deduplicating, WORM-lockable object store.
pub struct ContentStore {
    root: PathBuf,
    holds: Option<Arc<dyn HoldRegistry>>,
    /// Serializes sidecar read-modify-write (tag merge, lock flag).
    meta_lock: Mutex<()>,
}

impl ContentStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with_holds(root, None)
    }

    /// Open a store that consults `holds` before deleting.
    pub fn open_with_holds(
        root: impl Into<PathBuf>,
        holds: Option<Arc<dyn HoldRegistry>>,
    ) -> Result<Self> {
        let root = root.into();
        for dir in ["evidence", "metadata", "locks", "tmp"] {
            fs::create_dir_all(root.join(dir))?;
        }
        Ok(Self {
            root,
            holds,
            meta_lock: Mutex::new(()),
        })
    }

    fn content_path(&self, id: &ObjectId) -> PathBuf {
        self.root.join("evidence").join(id.shard()).join(id.to_hex())
    }

    fn metadata_path(&self, id: &ObjectId) -> PathBuf {
        self.root.join("metadata").join(format!("{}.json", id))
    }

    fn lock_path(&self, id: &ObjectId) -> PathBuf {
        self.root.join("locks").join(format!("{}.worm", id))
    }

    fn tmp_path(&self, id: &ObjectId) -> PathBuf {
        let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.root
            .join("tmp")
            .join(format!("{}-{}-{}", id, std::process::id(), n))
    }

    /// Store a payload, returning its content address.
    ///
    /// A second put of identical bytes is a no-op apart from merging `tags`
    /// into the existing sidecar.
    pub fn put(
        &self,
        bytes: &[u8],
        content_type: &str,
        tags: BTreeMap<String, String>,
    ) -> Result<ObjectId> {
        let id = ObjectId::for_bytes(bytes);
        let content_path = self.content_path(&id);

        if content_path.exists() {
            let _guard = self.meta_lock.lock();
            let mut meta = match self.read_metadata(&id) {
                Ok(meta) => meta,
                // Content without a sidecar: a put was interrupted between
                // the rename and the metadata write. Rebuild the sidecar.
                Err(StoreError::ObjectNotFound(_)) => StoredObject {
                    object_id: id,
                    content_type: content_type.to_string(),
                    size_bytes: bytes.len() as u64,
                    created_at: Utc::now(),
                    checksum: id.to_hex(),
                    tags: BTreeMap::new(),
                    worm_locked: self.lock_path(&id).exists(),
                },
                Err(e) => return Err(e),
            };
            meta.tags.extend(tags);
            self.write_metadata(&meta)?;
            info!(object_id = %id, "duplicate content, metadata tags merged");
            return Ok(id);
        }

        // Stage then rename: the hash-labeled path appears only once the
        // bytes are fully on disk.
        let tmp = self.tmp_path(&id);
        fs::write(&tmp, bytes)?;
        fs::create_dir_all(content_path.parent().expect("sharded path has a parent"))?;
        fs::rename(&tmp, &content_path)?;

        let meta = StoredObject {
            object_id: id,
            content_type: content_type.to_string(),
            size_bytes: bytes.len() as u64,
            created_at: Utc::now(),
            checksum: id.to_hex(),
            tags,
            worm_locked: false,
        };
        {
            let _guard = self.meta_lock.lock();
            self.write_metadata(&meta)?;
        }

        info!(object_id = %id, size = bytes.len(), "object stored");
        Ok(id)
    }

    /// Retrieve a payload, verifying its digest on the way out.
    pub fn get(&self, id: &ObjectId) -> Result<Vec<u8>> {
        let bytes = match fs::read(self.content_path(id)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::ObjectNotFound(id.to_hex()))
            }
            Err(e) => return Err(e.into()),
        };

        let actual = ObjectId::for_bytes(&bytes);
        if actual != *id {
            warn!(object_id = %id, actual = %actual, "checksum mismatch on read");
            return Err(StoreError::ChecksumMismatch {
                object_id: id.to_hex(),
                actual: actual.to_hex(),
            });
        }
        debug!(object_id = %id, size = bytes.len(), "object read");
        Ok(bytes)
    }

    /// Metadata for a stored object.
    pub fn metadata(&self, id: &ObjectId) -> Result<StoredObject> {
        let mut meta = self.read_metadata(id)?;
        // The lock marker is the source of truth for WORM state.
        meta.worm_locked = meta.worm_locked || self.lock_path(id).exists();
        Ok(meta)
    }

    /// One-way transition to WORM-locked.
    ///
    /// Exactly one of two concurrent callers succeeds; the loser gets
    /// `WormLocked`. There is no reverse transition under any API.
    pub fn apply_worm_lock(&self, id: &ObjectId) -> Result<()> {
        if !self.content_path(id).exists() {
            return Err(StoreError::ObjectNotFound(id.to_hex()));
        }

        let _guard = self.meta_lock.lock();
        let marker = self.lock_path(id);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&marker) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StoreError::WormLocked(id.to_hex()))
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(Utc::now().to_rfc3339().as_bytes())?;
        file.sync_all()?;

        let mut meta = self.read_metadata(id)?;
        meta.worm_locked = true;
        self.write_metadata(&meta)?;

        info!(object_id = %id, "WORM lock applied");
        Ok(())
    }

    /// Delete an object unless WORM-locked or covered by an active hold.
    ///
    /// Returns `false` if the object never existed.
    pub fn delete(&self, id: &ObjectId) -> Result<bool> {
        let _guard = self.meta_lock.lock();
        if !self.content_path(id).exists() {
            return Ok(false);
        }
        if self.lock_path(id).exists() {
            return Err(StoreError::WormLocked(id.to_hex()));
        }

        let meta = self.read_metadata(id)?;
        if let (Some(holds), Some(case_id)) = (&self.holds, meta.tags.get(CASE_ID_TAG)) {
            if holds.is_hold_active(case_id) {
                return Err(StoreError::LegalHold {
                    object_id: id.to_hex(),
                    case_id: case_id.clone(),
                });
            }
        }

        fs::remove_file(self.content_path(id))?;
        fs::remove_file(self.metadata_path(id))?;
        info!(object_id = %id, "object deleted");
        Ok(true)
    }

    /// List object metadata whose hex id starts with `prefix`.
    ///
    /// Results are id-ordered and capped at `limit`; no cursor state is
    /// retained between calls.
    pub fn list(&self, prefix: &str, limit: usize) -> Result<Vec<StoredObject>> {
        let mut ids: Vec<String> = Vec::new();
        for entry in fs::read_dir(self.root.join("metadata"))? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(stem) = Path::new(&name).file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if stem.starts_with(prefix) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();

        let mut out = Vec::new();
        for hex_id in ids.into_iter().take(limit) {
            let id = ObjectId::from_hex(&hex_id)?;
            match self.metadata(&id) {
                Ok(meta) => out.push(meta),
                // Sidecar removed between listing and read; skip it.
                Err(StoreError::ObjectNotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }

    fn read_metadata(&self, id: &ObjectId) -> Result<StoredObject> {
        let raw = match fs::read(self.metadata_path(id)) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::ObjectNotFound(id.to_hex()))
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&raw).map_err(|e| StoreError::Metadata {
            object_id: id.to_hex(),
            reason: e.to_string(),
        })
    }

    fn write_metadata(&self, meta: &StoredObject) -> Result<()> {
        let raw = serde_json::to_vec_pretty(meta).map_err(|e| StoreError::Metadata {
            object_id: meta.object_id.to_hex(),
            reason: e.to_string(),
        })?;
        let tmp = self.tmp_path(&meta.object_id);
        fs::write(&tmp, &raw)?;
        fs::rename(&tmp, self.metadata_path(&meta.object_id))?;
        Ok(())
    }
}
