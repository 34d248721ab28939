//! Data-access seams between the adaptive engine and its storage.
//!
//! Every entity is persisted through the same [`Repository`] capability;
//! the item catalog extends it with nearest-difficulty lookup and the
//! estimation log with per-examinee history. Implementations live in the
//! `adaptest-store` crate.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{Item, ItemBank, ItemParameters};
use crate::session::EstimationRecord;

// ---------------------------------------------------------------------------
// Repository capability
// ---------------------------------------------------------------------------

/// A record that can be stored in a [`Repository`].
pub trait Entity: Clone + Send + Sync + 'static {
    /// Primary key type.
    type Id: Clone + Eq + std::hash::Hash + Ord + std::fmt::Display + Send + Sync;

    /// The record's primary key.
    fn id(&self) -> Self::Id;
}

/// One page of a listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    /// Records on this page.
    pub items: Vec<T>,
    /// Total number of records in the repository.
    pub total: usize,
}

/// Create/find/update/list over one entity type.
#[async_trait]
pub trait Repository<E: Entity>: Send + Sync {
    /// Insert a new record; fails if the id is taken.
    async fn create(&self, entity: E) -> anyhow::Result<()>;

    /// Fetch a record by id.
    async fn find(&self, id: &E::Id) -> anyhow::Result<Option<E>>;

    /// Replace an existing record; fails if it does not exist.
    async fn update(&self, entity: E) -> anyhow::Result<()>;

    /// List records ordered by id.
    async fn list(&self, offset: usize, limit: usize) -> anyhow::Result<Page<E>>;
}

// ---------------------------------------------------------------------------
// Item catalog
// ---------------------------------------------------------------------------

/// Item storage that can serve the next item for a target difficulty.
#[async_trait]
pub trait ItemCatalog: Repository<Item> + ItemParameterLookup {
    /// The item of `subject` whose difficulty is nearest `target`, skipping
    /// ids in `exclude`. Ties go to the smallest id.
    async fn nearest_item(
        &self,
        subject: &str,
        target: f64,
        exclude: &[String],
    ) -> anyhow::Result<Option<Item>>;
}

// ---------------------------------------------------------------------------
// Estimation history
// ---------------------------------------------------------------------------

/// Append-only log of final session estimates.
#[async_trait]
pub trait EstimationLog: Repository<EstimationRecord> {
    /// An examinee's records, newest first. `None` covers every subject.
    async fn history(
        &self,
        examinee_id: &str,
        subject: Option<&str>,
    ) -> anyhow::Result<Vec<EstimationRecord>>;
}

// ---------------------------------------------------------------------------
// Parameter lookup
// ---------------------------------------------------------------------------

/// Synchronous access to published item parameters.
pub trait ItemParameterLookup: Send + Sync {
    fn parameters(&self, item_id: &str) -> Option<ItemParameters>;
}

impl ItemParameterLookup for HashMap<String, ItemParameters> {
    fn parameters(&self, item_id: &str) -> Option<ItemParameters> {
        self.get(item_id).copied()
    }
}

impl ItemParameterLookup for ItemBank {
    fn parameters(&self, item_id: &str) -> Option<ItemParameters> {
        self.get(item_id).map(|i| i.parameters)
    }
}

impl Entity for Item {
    type Id = String;

    fn id(&self) -> String {
        self.id.clone()
    }
}
