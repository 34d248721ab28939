//! Generic in-memory repository.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use adaptest_core::session::EstimationRecord;
use adaptest_core::traits::{Entity, EstimationLog, Page, Repository};

use crate::error::StoreError;

/// A [`Repository`] over a sorted map, for tests, the CLI and single-process use.
pub struct InMemoryRepository<E: Entity> {
    records: RwLock<BTreeMap<E::Id, E>>,
}

impl<E: Entity> InMemoryRepository<E> {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl<E: Entity> Default for InMemoryRepository<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Last path segment of the entity's type name, for error messages.
pub(crate) fn kind<E>() -> &'static str {
    let full = std::any::type_name::<E>();
    full.rsplit("::").next().unwrap_or(full)
}

#[async_trait]
impl<E: Entity> Repository<E> for InMemoryRepository<E> {
    async fn create(&self, entity: E) -> anyhow::Result<()> {
        let mut records = self.records.write().await;
        let id = entity.id();
        if records.contains_key(&id) {
            return Err(StoreError::Duplicate {
                kind: kind::<E>(),
                id: id.to_string(),
            }
            .into());
        }
        records.insert(id, entity);
        Ok(())
    }

    async fn find(&self, id: &E::Id) -> anyhow::Result<Option<E>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn update(&self, entity: E) -> anyhow::Result<()> {
        let mut records = self.records.write().await;
        match records.get_mut(&entity.id()) {
            Some(slot) => {
                *slot = entity;
                Ok(())
            }
            None => Err(StoreError::NotFound {
                kind: kind::<E>(),
                id: entity.id().to_string(),
            }
            .into()),
        }
    }

    async fn list(&self, offset: usize, limit: usize) -> anyhow::Result<Page<E>> {
        let records = self.records.read().await;
        Ok(Page {
            items: records.values().skip(offset).take(limit).cloned().collect(),
            total: records.len(),
        })
    }
}

#[async_trait]
impl EstimationLog for InMemoryRepository<EstimationRecord> {
    async fn history(
        &self,
        examinee_id: &str,
        subject: Option<&str>,
    ) -> anyhow::Result<Vec<EstimationRecord>> {
        let records = self.records.read().await;
        let mut matching: Vec<EstimationRecord> = records
            .values()
            .filter(|r| r.examinee_id == examinee_id)
            .filter(|r| subject.map_or(true, |s| r.subject == s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(matching)
    }
}
