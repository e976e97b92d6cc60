//! In-memory repository backend.

use crate::models::{
    ListFilter, MemoryId, MemoryStatus, MemoryUnit, Page, TenantId, decode_cursor, encode_cursor,
};
use crate::storage::traits::{RepositoryBackend, UpdateFields};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory repository backend.
///
/// Units are held in a per-tenant map behind an `RwLock`. Data is not
/// persisted between runs.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    tenants: RwLock<HashMap<TenantId, HashMap<MemoryId, MemoryUnit>>>,
}

impl InMemoryRepository {
    /// Creates a new empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_err(operation: &str) -> Error {
        Error::OperationFailed {
            operation: operation.to_string(),
            cause: "Lock poisoned".to_string(),
        }
    }
}

impl RepositoryBackend for InMemoryRepository {
    fn put(&self, unit: &MemoryUnit) -> Result<()> {
        let mut tenants = self
            .tenants
            .write()
            .map_err(|_| Self::lock_err("repository_put"))?;
        let partition = tenants.entry(unit.tenant_id.clone()).or_default();
        let mut stored = unit.clone();
        if let Some(previous) = partition.get(&unit.id) {
            stored.version = previous.version + 1;
        } else {
            stored.version = stored.version.max(1);
        }
        partition.insert(stored.id.clone(), stored);
        Ok(())
    }

    fn get(&self, tenant: &TenantId, id: &MemoryId) -> Result<MemoryUnit> {
        let tenants = self
            .tenants
            .read()
            .map_err(|_| Self::lock_err("repository_get"))?;
        tenants
            .get(tenant)
            .and_then(|partition| partition.get(id))
            .cloned()
            .ok_or_else(|| Error::NotFound(id.as_str().to_string()))
    }

    fn list(
        &self,
        tenant: &TenantId,
        filter: &ListFilter,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<Page> {
        if limit == 0 {
            return Err(Error::InvalidArgument(
                "list limit must be at least 1".to_string(),
            ));
        }
        let resume_after = cursor.map(decode_cursor).transpose()?;

        let tenants = self
            .tenants
            .read()
            .map_err(|_| Self::lock_err("repository_list"))?;
        let mut matching: Vec<MemoryUnit> = tenants
            .get(tenant)
            .map(|partition| {
                partition
                    .values()
                    .filter(|u| filter.matches(u))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        // Newest first; id tiebreak keeps pagination stable across runs.
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        if let Some((created_at, ref id)) = resume_after {
            matching.retain(|u| {
                u.created_at < created_at || (u.created_at == created_at && u.id > *id)
            });
        }

        let next_cursor = if matching.len() > limit {
            matching
                .get(limit - 1)
                .map(|last| encode_cursor(last.created_at, &last.id))
        } else {
            None
        };
        matching.truncate(limit);

        Ok(Page {
            units: matching,
            next_cursor,
        })
    }

    fn update_fields(
        &self,
        tenant: &TenantId,
        id: &MemoryId,
        patch: &UpdateFields,
        expected_version: Option<u64>,
    ) -> Result<MemoryUnit> {
        let mut tenants = self
            .tenants
            .write()
            .map_err(|_| Self::lock_err("repository_update"))?;
        let unit = tenants
            .get_mut(tenant)
            .and_then(|partition| partition.get_mut(id))
            .ok_or_else(|| Error::NotFound(id.as_str().to_string()))?;

        if let Some(expected) = expected_version
            && expected != unit.version
        {
            return Err(Error::Conflict {
                expected,
                actual: unit.version,
            });
        }

        if let Some(ref summary) = patch.content_summary {
            unit.content_summary.clone_from(summary);
        }
        if let Some(salience) = patch.salience {
            unit.salience = salience.clamp(0.0, 1.0);
        }
        if let Some(ts) = patch.last_accessed_at {
            unit.last_accessed_at = ts;
        }
        if let Some((status, at)) = patch.status {
            unit.mark(status, at);
        }
        if let Some(ref tags) = patch.tags {
            unit.tags.clone_from(tags);
        }
        unit.version += 1;
        Ok(unit.clone())
    }

    fn soft_delete(&self, tenant: &TenantId, id: &MemoryId, now: u64) -> Result<MemoryUnit> {
        self.update_fields(
            tenant,
            id,
            &UpdateFields::new().with_status(MemoryStatus::Deleted, now),
            None,
        )
    }

    fn purge_expired(
        &self,
        tenant: &TenantId,
        now: u64,
        retention_secs: u64,
    ) -> Result<Vec<MemoryId>> {
        let mut tenants = self
            .tenants
            .write()
            .map_err(|_| Self::lock_err("repository_purge"))?;
        let Some(partition) = tenants.get_mut(tenant) else {
            return Ok(Vec::new());
        };
        let purged: Vec<MemoryId> = partition
            .values()
            .filter(|u| {
                u.status.is_terminal() && now.saturating_sub(u.status_changed_at) > retention_secs
            })
            .map(|u| u.id.clone())
            .collect();
        for id in &purged {
            partition.remove(id);
        }
        Ok(purged)
    }

    fn scan(&self, tenant: &TenantId) -> Result<Vec<MemoryUnit>> {
        let tenants = self
            .tenants
            .read()
            .map_err(|_| Self::lock_err("repository_scan"))?;
        let mut units: Vec<MemoryUnit> = tenants
            .get(tenant)
            .map(|partition| partition.values().cloned().collect())
            .unwrap_or_default();
        units.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(units)
    }

    fn count_active(&self, tenant: &TenantId) -> Result<usize> {
        let tenants = self
            .tenants
            .read()
            .map_err(|_| Self::lock_err("repository_count"))?;
        Ok(tenants
            .get(tenant)
            .map(|partition| partition.values().filter(|u| u.is_active()).count())
            .unwrap_or(0))
    }

    fn tenants(&self) -> Result<Vec<TenantId>> {
        let tenants = self
            .tenants
            .read()
            .map_err(|_| Self::lock_err("repository_tenants"))?;
        let mut ids: Vec<TenantId> = tenants
            .iter()
            .filter(|(_, partition)| !partition.is_empty())
            .map(|(tenant, _)| tenant.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}
