use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::SystemTime;
use uuid::Uuid;

use crate::types::ContainerKind;

/// Bookkeeping entry for one live mount
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRecord {
    pub id: Uuid,
    pub source_image_path: PathBuf,
    pub mount_point: PathBuf,
    pub container_kind: ContainerKind,
    pub mounted_at: SystemTime,
}

/// Inner state of the mount table, protected by a single mutex
struct MountTableInner {
    entries: HashMap<Uuid, MountRecord>,
}

/// Registry of live mounts owned by the manager.
///
/// Clone creates a shallow copy sharing the same table. Handles never hold a
/// strong reference; their release callback carries a [`WeakMountTable`].
#[derive(Clone)]
pub struct MountTable {
    inner: Arc<Mutex<MountTableInner>>,
}

/// Non-owning reference to a [`MountTable`].
#[derive(Clone)]
pub struct WeakMountTable {
    inner: Weak<Mutex<MountTableInner>>,
}

impl MountTable {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MountTableInner {
                entries: HashMap::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MountTableInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Track a mount point from creation until its handle is released.
    pub fn insert(&self, record: MountRecord) {
        self.lock().entries.insert(record.id, record);
    }

    /// Remove a mount, returning its record if it was present.
    pub fn remove(&self, id: &Uuid) -> Option<MountRecord> {
        self.lock().entries.remove(id)
    }

    pub fn get(&self, id: &Uuid) -> Option<MountRecord> {
        self.lock().entries.get(id).cloned()
    }

    /// True if any live mount uses this mount point.
    pub fn contains_mount_point(&self, mount_point: &std::path::Path) -> bool {
        self.lock()
            .entries
            .values()
            .any(|record| record.mount_point == mount_point)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live mounts, oldest first.
    pub fn snapshot(&self) -> Vec<MountRecord> {
        let mut records: Vec<MountRecord> = self.lock().entries.values().cloned().collect();
        records.sort_by_key(|record| record.mounted_at);
        records
    }

    pub fn downgrade(&self) -> WeakMountTable {
        WeakMountTable {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl WeakMountTable {
    /// Remove a mount if the table is still alive.
    pub fn remove(&self, id: &Uuid) -> Option<MountRecord> {
        let inner = self.inner.upgrade()?;
        let mut inner = inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        inner.entries.remove(id)
    }
}

impl Default for MountTable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MountTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("MountTable")
            .field("entry_count", &inner.entries.len())
            .finish()
    }
}
