//! Flat, instance-wide resources: connections, variables, pools and
//! providers.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use log::debug;

use crate::model::{
    Connection, ConnectionFilter, ConnectionUpdate, Id, NewConnection, NewPool, NewProvider,
    NewVariable, Pool, PoolFilter, PoolUpdate, Provider, ProviderFilter, ProviderHook,
    ProviderUpdate, SlotUsage, Variable, VariableFilter, VariableUpdate,
};
use crate::store::error::{EntityKind, StoreError, StoreResult};
use crate::store::instance::{patch_record, DeleteOutcome, InstanceStore, Record};
use crate::store::query::{paginate, ListQuery, Page};

fn insert_unique<T>(
    map: &mut BTreeMap<Id, Record<T>>,
    kind: EntityKind,
    record: Record<T>,
    key: &str,
) -> StoreResult<()> {
    match map.entry(key.to_string()) {
        Entry::Occupied(_) => Err(StoreError::conflict(kind, key)),
        Entry::Vacant(slot) => {
            slot.insert(record);
            Ok(())
        }
    }
}

fn find<'a, T>(
    map: &'a BTreeMap<Id, Record<T>>,
    kind: EntityKind,
    key: &str,
) -> StoreResult<&'a Record<T>> {
    map.get(key).ok_or_else(|| StoreError::not_found(kind, key))
}

fn find_mut<'a, T>(
    map: &'a mut BTreeMap<Id, Record<T>>,
    kind: EntityKind,
    key: &str,
) -> StoreResult<&'a mut Record<T>> {
    map.get_mut(key).ok_or_else(|| StoreError::not_found(kind, key))
}

fn remove<T>(
    map: &mut BTreeMap<Id, Record<T>>,
    kind: EntityKind,
    key: &str,
) -> StoreResult<DeleteOutcome> {
    map.remove(key)
        .map(|_| DeleteOutcome::single())
        .ok_or_else(|| StoreError::not_found(kind, key))
}

impl InstanceStore {
    // Connections

    pub fn create_connection(&self, new_connection: NewConnection) -> StoreResult<Connection> {
        let connection = new_connection.into_connection()?;
        let mut data = self.write();
        let record = data.record(connection.clone());
        insert_unique(
            &mut data.connections,
            EntityKind::Connection,
            record,
            &connection.conn_id,
        )?;
        debug!("[{}] created connection '{}'", self.id(), connection.conn_id);
        Ok(connection)
    }

    pub fn get_connection(&self, conn_id: &str) -> StoreResult<Connection> {
        let data = self.read();
        Ok(find(&data.connections, EntityKind::Connection, conn_id)?
            .value
            .clone())
    }

    pub fn list_connections(
        &self,
        filter: &ConnectionFilter,
        query: &ListQuery,
    ) -> StoreResult<Page<Connection>> {
        let data = self.read();
        let records = data
            .connections
            .values()
            .filter(|record| filter.matches(&record.value));
        Ok(paginate(records, query, self.limits())?)
    }

    pub fn patch_connection(
        &self,
        conn_id: &str,
        update: ConnectionUpdate,
    ) -> StoreResult<Connection> {
        let mut data = self.write();
        let record = find_mut(&mut data.connections, EntityKind::Connection, conn_id)?;
        let connection = patch_record(record, |connection| connection.apply_update(update))?;
        debug!("[{}] patched connection '{}'", self.id(), conn_id);
        Ok(connection)
    }

    pub fn delete_connection(&self, conn_id: &str) -> StoreResult<DeleteOutcome> {
        let outcome = remove(&mut self.write().connections, EntityKind::Connection, conn_id)?;
        debug!("[{}] deleted connection '{}'", self.id(), conn_id);
        Ok(outcome)
    }

    // Variables

    pub fn create_variable(&self, new_variable: NewVariable) -> StoreResult<Variable> {
        let variable = new_variable.into_variable()?;
        let mut data = self.write();
        let record = data.record(variable.clone());
        insert_unique(&mut data.variables, EntityKind::Variable, record, &variable.key)?;
        debug!("[{}] created variable '{}'", self.id(), variable.key);
        Ok(variable)
    }

    pub fn get_variable(&self, key: &str) -> StoreResult<Variable> {
        let data = self.read();
        Ok(find(&data.variables, EntityKind::Variable, key)?.value.clone())
    }

    pub fn list_variables(
        &self,
        filter: &VariableFilter,
        query: &ListQuery,
    ) -> StoreResult<Page<Variable>> {
        let data = self.read();
        let records = data
            .variables
            .values()
            .filter(|record| filter.matches(&record.value));
        Ok(paginate(records, query, self.limits())?)
    }

    pub fn patch_variable(&self, key: &str, update: VariableUpdate) -> StoreResult<Variable> {
        let mut data = self.write();
        let record = find_mut(&mut data.variables, EntityKind::Variable, key)?;
        let variable = patch_record(record, |variable| variable.apply_update(update))?;
        debug!("[{}] patched variable '{}'", self.id(), key);
        Ok(variable)
    }

    pub fn delete_variable(&self, key: &str) -> StoreResult<DeleteOutcome> {
        let outcome = remove(&mut self.write().variables, EntityKind::Variable, key)?;
        debug!("[{}] deleted variable '{}'", self.id(), key);
        Ok(outcome)
    }

    // Pools

    pub fn create_pool(&self, new_pool: NewPool) -> StoreResult<Pool> {
        let pool = new_pool.into_pool()?;
        let mut data = self.write();
        let record = data.record(pool.clone());
        insert_unique(&mut data.pools, EntityKind::Pool, record, &pool.name)?;
        debug!("[{}] created pool '{}' ({} slots)", self.id(), pool.name, pool.slots);
        Ok(pool)
    }

    pub fn get_pool(&self, name: &str) -> StoreResult<Pool> {
        let data = self.read();
        Ok(find(&data.pools, EntityKind::Pool, name)?.value.clone())
    }

    pub fn list_pools(&self, filter: &PoolFilter, query: &ListQuery) -> StoreResult<Page<Pool>> {
        let data = self.read();
        let records = data
            .pools
            .values()
            .filter(|record| filter.matches(&record.value));
        Ok(paginate(records, query, self.limits())?)
    }

    pub fn patch_pool(&self, name: &str, update: PoolUpdate) -> StoreResult<Pool> {
        let mut data = self.write();
        let record = find_mut(&mut data.pools, EntityKind::Pool, name)?;
        let pool = patch_record(record, |pool| pool.apply_update(update))?;
        debug!("[{}] patched pool '{}'", self.id(), name);
        Ok(pool)
    }

    /// Atomically replace the usage counters of a pool. Fails without any
    /// change when `used + queued` would exceed the pool's slots.
    pub fn update_pool_slots(&self, name: &str, usage: SlotUsage) -> StoreResult<Pool> {
        let mut data = self.write();
        let record = find_mut(&mut data.pools, EntityKind::Pool, name)?;
        let pool = patch_record(record, |pool| pool.set_usage(usage))?;
        debug!(
            "[{}] pool '{}' now {} used, {} queued, {} open",
            self.id(),
            name,
            pool.used_slots,
            pool.queued_slots,
            pool.open_slots
        );
        Ok(pool)
    }

    pub fn delete_pool(&self, name: &str) -> StoreResult<DeleteOutcome> {
        let outcome = remove(&mut self.write().pools, EntityKind::Pool, name)?;
        debug!("[{}] deleted pool '{}'", self.id(), name);
        Ok(outcome)
    }

    // Providers

    pub fn create_provider(&self, new_provider: NewProvider) -> StoreResult<Provider> {
        let provider = new_provider.into_provider()?;
        let mut data = self.write();
        let record = data.record(provider.clone());
        insert_unique(&mut data.providers, EntityKind::Provider, record, &provider.name)?;
        debug!(
            "[{}] created provider '{}' {}",
            self.id(),
            provider.name,
            provider.version
        );
        Ok(provider)
    }

    pub fn get_provider(&self, name: &str) -> StoreResult<Provider> {
        let data = self.read();
        Ok(find(&data.providers, EntityKind::Provider, name)?.value.clone())
    }

    pub fn list_providers(
        &self,
        filter: &ProviderFilter,
        query: &ListQuery,
    ) -> StoreResult<Page<Provider>> {
        let data = self.read();
        let records = data
            .providers
            .values()
            .filter(|record| filter.matches(&record.value));
        Ok(paginate(records, query, self.limits())?)
    }

    /// Hooks of one provider in declaration order.
    pub fn provider_hooks(&self, name: &str) -> StoreResult<Vec<ProviderHook>> {
        let data = self.read();
        Ok(find(&data.providers, EntityKind::Provider, name)?
            .value
            .hooks
            .clone())
    }

    pub fn patch_provider(&self, name: &str, update: ProviderUpdate) -> StoreResult<Provider> {
        let mut data = self.write();
        let record = find_mut(&mut data.providers, EntityKind::Provider, name)?;
        let provider = patch_record(record, |provider| provider.apply_update(update))?;
        debug!("[{}] patched provider '{}'", self.id(), name);
        Ok(provider)
    }

    pub fn delete_provider(&self, name: &str) -> StoreResult<DeleteOutcome> {
        let outcome = remove(&mut self.write().providers, EntityKind::Provider, name)?;
        debug!("[{}] deleted provider '{}'", self.id(), name);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ProviderHook, Violation};
    use crate::store::query::PageLimits;

    fn store() -> InstanceStore {
        InstanceStore::new("test", PageLimits::default())
    }

    #[test]
    fn test_connection_lifecycle() {
        let store = store();
        store
            .create_connection(NewConnection::new("pg", "postgres"))
            .unwrap();
        let err = store
            .create_connection(NewConnection::new("pg", "http"))
            .unwrap_err();
        assert_eq!(err, StoreError::conflict(EntityKind::Connection, "pg"));

        assert_eq!(store.delete_connection("pg").unwrap(), DeleteOutcome::single());
        let err = store.delete_connection("pg").unwrap_err();
        assert_eq!(err, StoreError::not_found(EntityKind::Connection, "pg"));
    }

    #[test]
    fn test_invalid_create_stores_nothing() {
        let store = store();
        let err = store
            .create_variable(NewVariable {
                key: Some("env".to_string()),
                ..NewVariable::default()
            })
            .unwrap_err();
        assert_eq!(err, StoreError::from(Violation::Missing { field: "value" }));
        assert!(store.is_empty());
    }

    #[test]
    fn test_variable_listing_by_prefix() {
        let store = store();
        for (key, value) in [("env", "dev"), ("api_key", "x"), ("env_region", "eu")] {
            store.create_variable(NewVariable::new(key, value)).unwrap();
        }
        let filter = VariableFilter {
            key_prefix: Some("env".to_string()),
        };
        let page = store
            .list_variables(&filter, &ListQuery::new().order_by("-key"))
            .unwrap();
        let keys: Vec<_> = page.items.iter().map(|v| v.key.as_str()).collect();
        assert_eq!(keys, vec!["env_region", "env"]);
    }

    #[test]
    fn test_pool_slot_updates() {
        let store = store();
        store.create_pool(NewPool::new("p", 10)).unwrap();

        let pool = store.update_pool_slots("p", SlotUsage::new(5, 3)).unwrap();
        assert_eq!(pool.open_slots, 2);

        let err = store
            .update_pool_slots("p", SlotUsage::new(8, 5))
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation(Violation::SlotOvercommit { .. })
        ));
        let pool = store.get_pool("p").unwrap();
        assert_eq!((pool.used_slots, pool.queued_slots), (5, 3));

        let shrink = PoolUpdate {
            slots: Some(7),
            ..PoolUpdate::default()
        };
        assert!(store.patch_pool("p", shrink).is_err());
        assert_eq!(store.get_pool("p").unwrap().slots, 10);
    }

    #[test]
    fn test_provider_hooks() {
        let store = store();
        let new_provider = NewProvider {
            hooks: Some(vec![ProviderHook::new("HttpHook", "http")]),
            ..NewProvider::new("http", "4.10.0")
        };
        store.create_provider(new_provider).unwrap();
        let hooks = store.provider_hooks("http").unwrap();
        assert_eq!(hooks.len(), 1);
        assert_eq!(hooks[0].connection_type, "http");
        assert!(store.provider_hooks("nope").is_err());
    }
}
