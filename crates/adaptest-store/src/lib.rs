//! adaptest-store: in-memory storage backends.
//!
//! Implements the `Repository`, `ItemCatalog` and `EstimationLog` traits from
//! `adaptest-core` over process memory, and wires them into a ready-to-use
//! `AdaptiveTestService`.

pub mod catalog;
pub mod error;
pub mod memory;

use std::sync::Arc;

use adaptest_core::model::ItemBank;
use adaptest_core::session::{
    AbilityRecord, AdaptiveTestService, EstimationRecord, SessionServiceConfig, TestSession,
};

pub use catalog::InMemoryItemCatalog;
pub use error::StoreError;
pub use memory::InMemoryRepository;

/// Session store backed by memory.
pub type InMemorySessionStore = InMemoryRepository<TestSession>;
/// Ability store backed by memory.
pub type InMemoryAbilityStore = InMemoryRepository<AbilityRecord>;
/// Estimation history backed by memory.
pub type InMemoryEstimationLog = InMemoryRepository<EstimationRecord>;

/// Build a service over fresh in-memory stores serving the given banks.
pub fn in_memory_service(banks: Vec<ItemBank>, config: SessionServiceConfig) -> AdaptiveTestService {
    let catalog = InMemoryItemCatalog::from_banks(banks);
    tracing::debug!(items = catalog.len(), "in-memory catalog ready");
    AdaptiveTestService::new(
        Arc::new(catalog),
        Arc::new(InMemorySessionStore::new()),
        Arc::new(InMemoryAbilityStore::new()),
        Arc::new(InMemoryEstimationLog::new()),
        config,
    )
}
