use std::collections::BTreeMap;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};

use crate::model::{
    now, Connection, Dag, DagRun, Id, Pool, Provider, TaskInstance, Timestamp, Variable, XCom,
};
use crate::store::error::{EntityKind, StoreError, StoreResult};
use crate::store::keys::{self, RunKey, TaskKey, XComKey};
use crate::store::query::PageLimits;

/// A stored value tagged with its creation sequence number.
#[derive(Debug, Clone, PartialEq)]
pub struct Record<T> {
    pub seq: u64,
    pub value: T,
}

impl<T> Record<T> {
    pub fn new(seq: u64, value: T) -> Self {
        Self { seq, value }
    }
}

/// Every collection of one instance. Only reachable through the instance's
/// lock.
#[derive(Debug, Default)]
pub(crate) struct Collections {
    next_seq: u64,
    pub dags: BTreeMap<Id, Record<Dag>>,
    pub dag_runs: BTreeMap<RunKey, Record<DagRun>>,
    pub task_instances: BTreeMap<TaskKey, Record<TaskInstance>>,
    pub xcoms: BTreeMap<XComKey, Record<XCom>>,
    pub connections: BTreeMap<Id, Record<Connection>>,
    pub variables: BTreeMap<Id, Record<Variable>>,
    pub pools: BTreeMap<Id, Record<Pool>>,
    pub providers: BTreeMap<Id, Record<Provider>>,
}

impl Collections {
    pub fn record<T>(&mut self, value: T) -> Record<T> {
        self.next_seq += 1;
        Record::new(self.next_seq, value)
    }

    /// Insert every entry whose key is still free. Returns how many went in
    /// and how many were skipped.
    pub fn insert_missing<K, T, S, I>(&mut self, select: S, entries: I) -> (usize, usize)
    where
        K: Ord,
        S: Fn(&mut Self) -> &mut BTreeMap<K, Record<T>>,
        I: IntoIterator<Item = (K, T)>,
    {
        let (mut inserted, mut skipped) = (0, 0);
        for (key, value) in entries {
            if select(&mut *self).contains_key(&key) {
                skipped += 1;
                continue;
            }
            let record = self.record(value);
            select(&mut *self).insert(key, record);
            inserted += 1;
        }
        (inserted, skipped)
    }

    pub fn counts(&self) -> EntityCounts {
        EntityCounts {
            dags: self.dags.len(),
            dag_runs: self.dag_runs.len(),
            task_instances: self.task_instances.len(),
            xcoms: self.xcoms.len(),
            connections: self.connections.len(),
            variables: self.variables.len(),
            pools: self.pools.len(),
            providers: self.providers.len(),
        }
    }

    pub fn require_dag(&self, dag_id: &str) -> StoreResult<&Record<Dag>> {
        self.dags
            .get(dag_id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Dag, dag_id))
    }

    pub fn require_run(&self, dag_id: &str, run_id: &str) -> StoreResult<&Record<DagRun>> {
        self.require_dag(dag_id)?;
        self.dag_runs.get(&keys::run_key(dag_id, run_id)).ok_or_else(|| {
            StoreError::not_found(EntityKind::DagRun, keys::display_path(&[dag_id, run_id]))
        })
    }

    pub fn require_task(
        &self,
        dag_id: &str,
        run_id: &str,
        task_id: &str,
    ) -> StoreResult<&Record<TaskInstance>> {
        self.require_run(dag_id, run_id)?;
        self.task_instances
            .get(&keys::task_key(dag_id, run_id, task_id))
            .ok_or_else(|| {
                StoreError::not_found(
                    EntityKind::TaskInstance,
                    keys::display_path(&[dag_id, run_id, task_id]),
                )
            })
    }
}

/// Per-kind entity totals of one instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCounts {
    pub dags: usize,
    pub dag_runs: usize,
    pub task_instances: usize,
    pub xcoms: usize,
    pub connections: usize,
    pub variables: usize,
    pub pools: usize,
    pub providers: usize,
}

impl EntityCounts {
    pub fn total(&self) -> usize {
        self.dags
            + self.dag_runs
            + self.task_instances
            + self.xcoms
            + self.connections
            + self.variables
            + self.pools
            + self.providers
    }
}

/// Result of a delete: the addressed entity plus every descendant the
/// cascade removed with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOutcome {
    pub removed: usize,
    pub cascaded: usize,
}

impl DeleteOutcome {
    pub fn with_cascade(cascaded: usize) -> Self {
        Self {
            removed: 1,
            cascaded,
        }
    }

    pub fn single() -> Self {
        Self::with_cascade(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceSummary {
    pub instance_id: Id,
    pub created_at: Timestamp,
    pub counts: EntityCounts,
}

/// One isolated namespace of mock resources. All collections share a
/// single readers-writer lock, so every operation sees and leaves a
/// consistent store.
#[derive(Debug)]
pub struct InstanceStore {
    id: Id,
    created_at: Timestamp,
    limits: PageLimits,
    data: RwLock<Collections>,
}

impl InstanceStore {
    pub fn new(id: impl Into<Id>, limits: PageLimits) -> Self {
        Self {
            id: id.into(),
            created_at: now(),
            limits,
            data: RwLock::new(Collections::default()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn limits(&self) -> PageLimits {
        self.limits
    }

    pub fn counts(&self) -> EntityCounts {
        self.read().counts()
    }

    pub fn is_empty(&self) -> bool {
        self.counts().total() == 0
    }

    pub fn summary(&self) -> InstanceSummary {
        InstanceSummary {
            instance_id: self.id.clone(),
            created_at: self.created_at,
            counts: self.counts(),
        }
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Collections> {
        self.data.read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Collections> {
        self.data.write()
    }
}

/// Apply a fallible change to a copy and store it only on success.
pub(crate) fn patch_record<T, F>(record: &mut Record<T>, apply: F) -> StoreResult<T>
where
    T: Clone,
    F: FnOnce(&mut T) -> Result<(), crate::model::Violation>,
{
    let mut next = record.value.clone();
    apply(&mut next)?;
    record.value = next.clone();
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewVariable, Violation};

    #[test]
    fn test_sequence_numbers_increase() {
        let mut data = Collections::default();
        let first = data.record(());
        let second = data.record(());
        assert!(first.seq < second.seq);
    }

    #[test]
    fn test_patch_record_is_all_or_nothing() {
        let variable = NewVariable::new("env", "dev").into_variable().unwrap();
        let mut record = Record::new(1, variable);

        let err = patch_record(&mut record, |variable| {
            variable.value = "prod".to_string();
            Err(Violation::Empty { field: "value" })
        })
        .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(record.value.value, "dev");
    }

    #[test]
    fn test_new_store_is_empty() {
        let store = InstanceStore::new("alpha", PageLimits::default());
        assert!(store.is_empty());
        assert_eq!(store.summary().instance_id, "alpha");
        assert_eq!(store.summary().counts, EntityCounts::default());
    }

    #[test]
    fn test_missing_parent_reported_first() {
        let data = Collections::default();
        let err = data.require_task("etl", "r1", "extract").unwrap_err();
        assert_eq!(err, StoreError::not_found(EntityKind::Dag, "etl"));
    }
}
