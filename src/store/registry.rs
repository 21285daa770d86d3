use std::collections::HashMap;
use std::sync::Arc;

use log::info;
use parking_lot::RwLock;

use crate::model::{check_identifier, Id};
use crate::store::error::{EntityKind, StoreError, StoreResult};
use crate::store::instance::{InstanceStore, InstanceSummary};
use crate::store::query::PageLimits;

/// Maps instance identifiers to their isolated stores.
///
/// The map has its own lock; once a store handle is out, work on it never
/// touches the registry lock again, so instances do not block each other.
#[derive(Debug, Default)]
pub struct InstanceRegistry {
    instances: RwLock<HashMap<Id, Arc<InstanceStore>>>,
    limits: PageLimits,
}

impl InstanceRegistry {
    pub fn new(limits: PageLimits) -> Self {
        Self {
            instances: RwLock::new(HashMap::new()),
            limits,
        }
    }

    /// Return the store for `instance_id`, creating an empty one on first
    /// reference.
    pub fn get_or_create(&self, instance_id: &str) -> StoreResult<Arc<InstanceStore>> {
        check_identifier("instance_id", instance_id)?;
        if let Some(store) = self.instances.read().get(instance_id) {
            return Ok(store.clone());
        }

        let mut instances = self.instances.write();
        let store = instances
            .entry(instance_id.to_string())
            .or_insert_with(|| {
                info!("Created instance '{}'", instance_id);
                Arc::new(InstanceStore::new(instance_id, self.limits))
            })
            .clone();
        Ok(store)
    }

    /// Create a store that must not exist yet.
    pub fn create(&self, instance_id: &str) -> StoreResult<Arc<InstanceStore>> {
        check_identifier("instance_id", instance_id)?;
        let mut instances = self.instances.write();
        if instances.contains_key(instance_id) {
            return Err(StoreError::conflict(EntityKind::Instance, instance_id));
        }
        let store = Arc::new(InstanceStore::new(instance_id, self.limits));
        instances.insert(instance_id.to_string(), store.clone());
        info!("Created instance '{}'", instance_id);
        Ok(store)
    }

    pub fn get(&self, instance_id: &str) -> StoreResult<Arc<InstanceStore>> {
        self.instances
            .read()
            .get(instance_id)
            .cloned()
            .ok_or_else(|| StoreError::InstanceNotFound(instance_id.to_string()))
    }

    /// Discard a store with everything in it. Handles already given out keep
    /// working on the detached store.
    pub fn remove(&self, instance_id: &str) -> StoreResult<InstanceSummary> {
        let store = self
            .instances
            .write()
            .remove(instance_id)
            .ok_or_else(|| StoreError::InstanceNotFound(instance_id.to_string()))?;
        let summary = store.summary();
        info!(
            "Removed instance '{}' ({} entities)",
            instance_id,
            summary.counts.total()
        );
        Ok(summary)
    }

    pub fn contains(&self, instance_id: &str) -> bool {
        self.instances.read().contains_key(instance_id)
    }

    pub fn instance_ids(&self) -> Vec<Id> {
        let mut ids: Vec<Id> = self.instances.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn summaries(&self) -> Vec<InstanceSummary> {
        let mut stores: Vec<Arc<InstanceStore>> =
            self.instances.read().values().cloned().collect();
        stores.sort_by(|a, b| a.id().cmp(b.id()));
        stores.iter().map(|store| store.summary()).collect()
    }

    pub fn len(&self) -> usize {
        self.instances.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewVariable, Violation};

    #[test]
    fn test_get_or_create_returns_same_store() {
        let registry = InstanceRegistry::default();
        let a = registry.get_or_create("a").unwrap();
        let again = registry.get_or_create("a").unwrap();
        assert!(Arc::ptr_eq(&a, &again));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_instances_are_isolated() {
        let registry = InstanceRegistry::default();
        let a = registry.get_or_create("a").unwrap();
        let b = registry.get_or_create("b").unwrap();
        a.create_variable(NewVariable::new("env", "dev")).unwrap();

        assert!(b.get_variable("env").is_err());
        b.create_variable(NewVariable::new("env", "prod")).unwrap();
        assert_eq!(a.get_variable("env").unwrap().value, "dev");
    }

    #[test]
    fn test_unknown_instance() {
        let registry = InstanceRegistry::default();
        assert_eq!(
            registry.get("ghost").unwrap_err(),
            StoreError::InstanceNotFound("ghost".to_string())
        );
        assert!(registry.remove("ghost").is_err());
    }

    #[test]
    fn test_remove_wipes_instance() {
        let registry = InstanceRegistry::default();
        let store = registry.get_or_create("a").unwrap();
        store.create_variable(NewVariable::new("env", "dev")).unwrap();

        let summary = registry.remove("a").unwrap();
        assert_eq!(summary.counts.variables, 1);
        assert!(!registry.contains("a"));

        let fresh = registry.get_or_create("a").unwrap();
        assert!(fresh.is_empty());
    }

    #[test]
    fn test_create_conflicts_and_validates() {
        let registry = InstanceRegistry::default();
        registry.create("a").unwrap();
        assert_eq!(
            registry.create("a").unwrap_err(),
            StoreError::conflict(EntityKind::Instance, "a")
        );
        assert_eq!(
            registry.get_or_create(" ").unwrap_err(),
            StoreError::from(Violation::Empty {
                field: "instance_id"
            })
        );
        assert_eq!(registry.instance_ids(), vec!["a".to_string()]);
    }
}
