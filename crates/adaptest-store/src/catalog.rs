//! In-memory item catalog.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use adaptest_core::model::{nearest_by_difficulty, Item, ItemBank, ItemParameters};
use adaptest_core::traits::{ItemCatalog, ItemParameterLookup, Page, Repository};

use crate::error::StoreError;
use crate::memory::kind;

/// Items of one or more banks, keyed by id.
///
/// Uses a blocking lock because parameter lookups happen synchronously
/// inside the estimator; no lock is held across an await.
#[derive(Default)]
pub struct InMemoryItemCatalog {
    items: RwLock<BTreeMap<String, Item>>,
}

impl InMemoryItemCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every item of every bank. On id collisions the first item wins.
    pub fn from_banks(banks: impl IntoIterator<Item = ItemBank>) -> Self {
        let mut items = BTreeMap::new();
        for bank in banks {
            for item in bank.items {
                if items.contains_key(&item.id) {
                    tracing::warn!(bank = %bank.id, item = %item.id, "duplicate item id ignored");
                    continue;
                }
                items.insert(item.id.clone(), item);
            }
        }
        Self {
            items: RwLock::new(items),
        }
    }

    pub fn from_bank(bank: ItemBank) -> Self {
        Self::from_banks([bank])
    }

    /// Number of items in the catalog.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, Item>> {
        self.items.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Item>> {
        self.items.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Repository<Item> for InMemoryItemCatalog {
    async fn create(&self, item: Item) -> anyhow::Result<()> {
        let mut items = self.write();
        if items.contains_key(&item.id) {
            return Err(StoreError::Duplicate {
                kind: kind::<Item>(),
                id: item.id,
            }
            .into());
        }
        items.insert(item.id.clone(), item);
        Ok(())
    }

    async fn find(&self, id: &String) -> anyhow::Result<Option<Item>> {
        Ok(self.read().get(id).cloned())
    }

    async fn update(&self, item: Item) -> anyhow::Result<()> {
        let mut items = self.write();
        match items.get_mut(&item.id) {
            Some(slot) => {
                *slot = item;
                Ok(())
            }
            None => Err(StoreError::NotFound {
                kind: kind::<Item>(),
                id: item.id,
            }
            .into()),
        }
    }

    async fn list(&self, offset: usize, limit: usize) -> anyhow::Result<Page<Item>> {
        let items = self.read();
        Ok(Page {
            items: items.values().skip(offset).take(limit).cloned().collect(),
            total: items.len(),
        })
    }
}

impl ItemParameterLookup for InMemoryItemCatalog {
    fn parameters(&self, item_id: &str) -> Option<ItemParameters> {
        self.read().get(item_id).map(|i| i.parameters)
    }
}

#[async_trait]
impl ItemCatalog for InMemoryItemCatalog {
    async fn nearest_item(
        &self,
        subject: &str,
        target: f64,
        exclude: &[String],
    ) -> anyhow::Result<Option<Item>> {
        let items = self.read();
        let candidates = items.values().filter(|i| i.subject == subject);
        Ok(nearest_by_difficulty(candidates, target, exclude).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, subject: &str, b: f64) -> Item {
        Item {
            id: id.into(),
            subject: subject.into(),
            prompt: format!("prompt {id}"),
            options: vec![],
            answer: "a".into(),
            knowledge_points: vec![],
            parameters: ItemParameters::new(b, 1.0, 0.2).unwrap(),
        }
    }

    fn bank(id: &str, subject: &str, items: Vec<Item>) -> ItemBank {
        ItemBank {
            id: id.into(),
            name: id.into(),
            subject: subject.into(),
            description: String::new(),
            items,
        }
    }

    #[tokio::test]
    async fn nearest_item_respects_subject_and_exclusions() {
        let catalog = InMemoryItemCatalog::from_banks([
            bank("m", "math", vec![item("m1", "math", -1.0), item("m2", "math", 0.3)]),
            bank("p", "physics", vec![item("p1", "physics", 0.0)]),
        ]);

        let pick = catalog.nearest_item("math", 0.0, &[]).await.unwrap().unwrap();
        assert_eq!(pick.id, "m2");

        let pick = catalog
            .nearest_item("math", 0.0, &["m2".into()])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pick.id, "m1");

        let none = catalog
            .nearest_item("math", 0.0, &["m1".into(), "m2".into()])
            .await
            .unwrap();
        assert!(none.is_none());
        assert!(catalog.nearest_item("chemistry", 0.0, &[]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_ids_keep_first_bank() {
        let catalog = InMemoryItemCatalog::from_banks([
            bank("a", "math", vec![item("q", "math", 1.0)]),
            bank("b", "math", vec![item("q", "math", -2.0)]),
        ]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.parameters("q").unwrap().difficulty(), 1.0);
    }

    #[tokio::test]
    async fn catalog_is_a_repository() {
        let catalog = InMemoryItemCatalog::new();
        catalog.create(item("x", "math", 0.0)).await.unwrap();
        assert!(catalog.create(item("x", "math", 0.5)).await.is_err());

        catalog.update(item("x", "math", 0.5)).await.unwrap();
        assert_eq!(catalog.parameters("x").unwrap().difficulty(), 0.5);
        assert!(catalog.update(item("y", "math", 0.0)).await.is_err());

        let page = catalog.list(0, 10).await.unwrap();
        assert_eq!(page.total, 1);
        assert!(catalog.parameters("y").is_none());
    }
}
