// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory `AssociationStore`.
//!
//! The durable persistence layer itself is out of scope (§1): this adapter
//! is what every test and single-process deployment uses in its place. The
//! per-project advisory lock is a real `tokio::sync::Mutex`, so its FIFO
//! queuing and cross-task exclusion semantics are not faked — only the
//! row storage is in-memory.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sbx_core::{Association, AssociationId, AssociationStatus, ProjectId, SandboxId, TenantId};
use tokio::sync::Mutex as TokioMutex;

use crate::error::{AdapterError, AdapterResult};
use crate::ports::{AssociationStore, ProjectLockGuard};

#[derive(Default)]
pub struct InMemoryAssociationStore {
    rows: Mutex<HashMap<ProjectId, Association>>,
    project_locks: Mutex<HashMap<ProjectId, Arc<TokioMutex<()>>>>,
}

impl InMemoryAssociationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, project_id: &ProjectId) -> Arc<TokioMutex<()>> {
        self.project_locks
            .lock()
            .entry(project_id.clone())
            .or_insert_with(|| Arc::new(TokioMutex::new(())))
            .clone()
    }
}

#[async_trait]
impl AssociationStore for InMemoryAssociationStore {
    async fn find_by_project(&self, project_id: &ProjectId) -> AdapterResult<Option<Association>> {
        Ok(self.rows.lock().get(project_id).cloned())
    }

    async fn find_by_id(&self, id: &AssociationId) -> AdapterResult<Option<Association>> {
        Ok(self.rows.lock().values().find(|a| &a.id == id).cloned())
    }

    async fn find_by_sandbox(&self, sandbox_id: &SandboxId) -> AdapterResult<Option<Association>> {
        Ok(self.rows.lock().values().find(|a| &a.sandbox_id == sandbox_id).cloned())
    }

    async fn find_by_tenant(
        &self,
        tenant_id: &TenantId,
        status: Option<AssociationStatus>,
        limit: usize,
        offset: usize,
    ) -> AdapterResult<Vec<Association>> {
        let rows = self.rows.lock();
        let mut matches: Vec<Association> = rows
            .values()
            .filter(|a| &a.tenant_id == tenant_id)
            .filter(|a| status.map(|s| s == a.status).unwrap_or(true))
            .cloned()
            .collect();
        matches.sort_by_key(|a| a.created_at);
        Ok(matches.into_iter().skip(offset).take(limit).collect())
    }

    async fn find_stale(&self, max_idle_seconds: u64, limit: usize) -> AdapterResult<Vec<Association>> {
        let threshold = chrono::Utc::now() - chrono::Duration::seconds(max_idle_seconds as i64);
        let rows = self.rows.lock();
        let mut stale: Vec<Association> = rows
            .values()
            .filter(|a| !a.status.is_terminal())
            .filter(|a| a.last_accessed_at.map(|t| t < threshold).unwrap_or(false))
            .cloned()
            .collect();
        stale.sort_by_key(|a| a.last_accessed_at);
        Ok(stale.into_iter().take(limit).collect())
    }

    async fn save(&self, association: Association) -> AdapterResult<()> {
        self.rows.lock().insert(association.project_id.clone(), association);
        Ok(())
    }

    async fn delete(&self, id: &AssociationId) -> AdapterResult<()> {
        self.rows.lock().retain(|_, a| &a.id != id);
        Ok(())
    }

    async fn delete_by_project(&self, project_id: &ProjectId) -> AdapterResult<()> {
        self.rows.lock().remove(project_id);
        Ok(())
    }

    async fn exists_for_project(&self, project_id: &ProjectId) -> AdapterResult<bool> {
        Ok(self.rows.lock().contains_key(project_id))
    }

    async fn acquire_project_lock(
        &self,
        project_id: &ProjectId,
        timeout: Duration,
    ) -> AdapterResult<ProjectLockGuard> {
        let mutex = self.lock_for(project_id);
        let guard = tokio::time::timeout(timeout, mutex.lock_owned())
            .await
            .map_err(|_| AdapterError::Timeout(timeout))?;
        Ok(ProjectLockGuard::new(project_id.clone(), move || drop(guard)))
    }

    async fn find_and_lock_by_project(
        &self,
        project_id: &ProjectId,
    ) -> AdapterResult<Option<Association>> {
        // The caller already holds the project lock acquired above; a plain
        // re-read is equivalent to `SELECT ... FOR UPDATE` here.
        self.find_by_project(project_id).await
    }
}

#[cfg(test)]
#[path = "in_memory_tests.rs"]
mod tests;
