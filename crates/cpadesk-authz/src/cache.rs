//! Resolved permission sets cached per `(tenant_id, role_id)`.
//!
//! Entries are dropped explicitly whenever a role's grants change. The
//! cache is never required for correctness: a miss falls back to the
//! entitlement store.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

pub type PermissionSet = Arc<HashSet<String>>;

#[derive(Debug, Default)]
pub struct PermissionCache {
    entries: DashMap<(Uuid, Uuid), PermissionSet>,
    /// Bumped by every invalidation; see [`PermissionCache::insert`].
    epoch: AtomicU64,
}

impl PermissionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tenant_id: Uuid, role_id: Uuid) -> Option<PermissionSet> {
        let hit = self
            .entries
            .get(&(tenant_id, role_id))
            .map(|e| Arc::clone(e.value()));
        debug!(%tenant_id, %role_id, hit = hit.is_some(), "Permission cache lookup");
        hit
    }

    /// Current invalidation epoch. Read it before querying the store and
    /// pass it back to [`insert`](Self::insert).
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Store a set resolved while the cache was at `seen_epoch`.
    ///
    /// If any invalidation happened since, the entry is removed again, so
    /// a lookup racing a revoke never leaves a stale set behind. Returns
    /// whether the entry was kept.
    pub fn insert(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
        permissions: PermissionSet,
        seen_epoch: u64,
    ) -> bool {
        self.entries.insert((tenant_id, role_id), permissions);
        if self.epoch() != seen_epoch {
            self.entries.remove(&(tenant_id, role_id));
            return false;
        }
        true
    }

    pub fn invalidate(&self, tenant_id: Uuid, role_id: Uuid) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.entries.remove(&(tenant_id, role_id));
        debug!(%tenant_id, %role_id, "Permission cache invalidated");
    }

    /// Drop every entry of one tenant, e.g. after the tenant is deleted.
    pub fn invalidate_tenant(&self, tenant_id: Uuid) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.entries.retain(|(tenant, _), _| *tenant != tenant_id);
    }

    pub fn clear(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
