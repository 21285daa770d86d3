//! DAGs and their descendants: runs, task instances and XCom entries.

use log::debug;

use crate::model::{
    now, ClearTaskInstance, Dag, DagFilter, DagRun, DagRunFilter, DagRunUpdate, DagUpdate,
    NewDag, NewDagRun, NewTaskInstance, NewXCom, SetTaskInstanceState, TaskInstance,
    TaskInstanceAction, TaskInstanceFilter, TaskInstanceUpdate, TaskLog, Violation, XCom,
    XComFilter, XComUpdate,
};
use crate::store::error::{EntityKind, StoreError, StoreResult};
use crate::store::instance::{patch_record, DeleteOutcome, InstanceStore};
use crate::store::keys::{self, display_path, drain_scope, scan};
use crate::store::query::{paginate, ListQuery, Page};

fn run_not_found(dag_id: &str, run_id: &str) -> StoreError {
    StoreError::not_found(EntityKind::DagRun, display_path(&[dag_id, run_id]))
}

fn task_not_found(dag_id: &str, run_id: &str, task_id: &str) -> StoreError {
    StoreError::not_found(
        EntityKind::TaskInstance,
        display_path(&[dag_id, run_id, task_id]),
    )
}

fn xcom_path(dag_id: &str, run_id: &str, task_id: &str, map_index: i64, key: &str) -> String {
    display_path(&[dag_id, run_id, task_id, &map_index.to_string(), key])
}

impl InstanceStore {
    // DAGs

    pub fn create_dag(&self, new_dag: NewDag) -> StoreResult<Dag> {
        let dag = new_dag.into_dag()?;
        let mut data = self.write();
        if data.dags.contains_key(&dag.dag_id) {
            return Err(StoreError::conflict(EntityKind::Dag, dag.dag_id));
        }
        let record = data.record(dag.clone());
        data.dags.insert(dag.dag_id.clone(), record);
        debug!("[{}] created DAG '{}'", self.id(), dag.dag_id);
        Ok(dag)
    }

    pub fn get_dag(&self, dag_id: &str) -> StoreResult<Dag> {
        Ok(self.read().require_dag(dag_id)?.value.clone())
    }

    pub fn list_dags(&self, filter: &DagFilter, query: &ListQuery) -> StoreResult<Page<Dag>> {
        let data = self.read();
        let records = data
            .dags
            .values()
            .filter(|record| filter.matches(&record.value));
        Ok(paginate(records, query, self.limits())?)
    }

    pub fn patch_dag(&self, dag_id: &str, update: DagUpdate) -> StoreResult<Dag> {
        let mut data = self.write();
        let record = data
            .dags
            .get_mut(dag_id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Dag, dag_id))?;
        let dag = patch_record(record, |dag| dag.apply_update(update))?;
        debug!("[{}] patched DAG '{}'", self.id(), dag_id);
        Ok(dag)
    }

    /// Delete a DAG with all of its runs, task instances and XCom entries.
    pub fn delete_dag(&self, dag_id: &str) -> StoreResult<DeleteOutcome> {
        let mut data = self.write();
        if data.dags.remove(dag_id).is_none() {
            return Err(StoreError::not_found(EntityKind::Dag, dag_id));
        }
        let runs = drain_scope(&mut data.dag_runs, keys::runs_of_dag(dag_id), |key| {
            key.0 == dag_id
        });
        let tasks = drain_scope(
            &mut data.task_instances,
            keys::tasks_of_dag(dag_id),
            |key| key.0 == dag_id,
        );
        let xcoms = drain_scope(&mut data.xcoms, keys::xcoms_of_dag(dag_id), |key| {
            key.0 == dag_id
        });
        debug!(
            "[{}] deleted DAG '{}' ({} runs, {} task instances, {} XComs)",
            self.id(),
            dag_id,
            runs,
            tasks,
            xcoms
        );
        Ok(DeleteOutcome::with_cascade(runs + tasks + xcoms))
    }

    // DAG runs

    pub fn create_dag_run(&self, dag_id: &str, new_run: NewDagRun) -> StoreResult<DagRun> {
        let mut data = self.write();
        data.require_dag(dag_id)?;
        let run = new_run.into_dag_run(dag_id)?;
        let key = keys::run_key(dag_id, &run.run_id);
        if data.dag_runs.contains_key(&key) {
            return Err(StoreError::conflict(
                EntityKind::DagRun,
                display_path(&[dag_id, &run.run_id]),
            ));
        }
        let record = data.record(run.clone());
        data.dag_runs.insert(key, record);
        debug!("[{}] created DAG run '{}/{}'", self.id(), dag_id, run.run_id);
        Ok(run)
    }

    pub fn get_dag_run(&self, dag_id: &str, run_id: &str) -> StoreResult<DagRun> {
        Ok(self.read().require_run(dag_id, run_id)?.value.clone())
    }

    pub fn list_dag_runs(
        &self,
        dag_id: &str,
        filter: &DagRunFilter,
        query: &ListQuery,
    ) -> StoreResult<Page<DagRun>> {
        let data = self.read();
        data.require_dag(dag_id)?;
        let records = scan(&data.dag_runs, keys::runs_of_dag(dag_id), |key| {
            key.0 == dag_id
        })
        .map(|(_, record)| record)
        .filter(|record| filter.matches(&record.value));
        Ok(paginate(records, query, self.limits())?)
    }

    pub fn patch_dag_run(
        &self,
        dag_id: &str,
        run_id: &str,
        update: DagRunUpdate,
    ) -> StoreResult<DagRun> {
        let mut data = self.write();
        data.require_dag(dag_id)?;
        let record = data
            .dag_runs
            .get_mut(&keys::run_key(dag_id, run_id))
            .ok_or_else(|| run_not_found(dag_id, run_id))?;
        let run = patch_record(record, |run| run.apply_update(update))?;
        debug!("[{}] patched DAG run '{}/{}'", self.id(), dag_id, run_id);
        Ok(run)
    }

    pub fn delete_dag_run(&self, dag_id: &str, run_id: &str) -> StoreResult<DeleteOutcome> {
        let mut data = self.write();
        data.require_dag(dag_id)?;
        if data
            .dag_runs
            .remove(&keys::run_key(dag_id, run_id))
            .is_none()
        {
            return Err(run_not_found(dag_id, run_id));
        }
        let tasks = drain_scope(
            &mut data.task_instances,
            keys::tasks_of_run(dag_id, run_id),
            |key| key.0 == dag_id && key.1 == run_id,
        );
        let xcoms = drain_scope(
            &mut data.xcoms,
            keys::xcoms_of_run(dag_id, run_id),
            |key| key.0 == dag_id && key.1 == run_id,
        );
        debug!(
            "[{}] deleted DAG run '{}/{}' ({} task instances, {} XComs)",
            self.id(),
            dag_id,
            run_id,
            tasks,
            xcoms
        );
        Ok(DeleteOutcome::with_cascade(tasks + xcoms))
    }

    // Task instances

    pub fn create_task_instance(
        &self,
        dag_id: &str,
        run_id: &str,
        new_task: NewTaskInstance,
    ) -> StoreResult<TaskInstance> {
        let mut data = self.write();
        data.require_run(dag_id, run_id)?;
        let task = new_task.into_task_instance(dag_id, run_id)?;
        let key = keys::task_key(dag_id, run_id, &task.task_id);
        if data.task_instances.contains_key(&key) {
            return Err(StoreError::conflict(
                EntityKind::TaskInstance,
                display_path(&[dag_id, run_id, &task.task_id]),
            ));
        }
        let record = data.record(task.clone());
        data.task_instances.insert(key, record);
        debug!(
            "[{}] created task instance '{}/{}/{}'",
            self.id(),
            dag_id,
            run_id,
            task.task_id
        );
        Ok(task)
    }

    pub fn get_task_instance(
        &self,
        dag_id: &str,
        run_id: &str,
        task_id: &str,
    ) -> StoreResult<TaskInstance> {
        Ok(self
            .read()
            .require_task(dag_id, run_id, task_id)?
            .value
            .clone())
    }

    pub fn list_task_instances(
        &self,
        dag_id: &str,
        run_id: &str,
        filter: &TaskInstanceFilter,
        query: &ListQuery,
    ) -> StoreResult<Page<TaskInstance>> {
        let data = self.read();
        data.require_run(dag_id, run_id)?;
        let records = scan(
            &data.task_instances,
            keys::tasks_of_run(dag_id, run_id),
            |key| key.0 == dag_id && key.1 == run_id,
        )
        .map(|(_, record)| record)
        .filter(|record| filter.matches(&record.value));
        Ok(paginate(records, query, self.limits())?)
    }

    pub fn patch_task_instance(
        &self,
        dag_id: &str,
        run_id: &str,
        task_id: &str,
        update: TaskInstanceUpdate,
    ) -> StoreResult<TaskInstance> {
        let mut data = self.write();
        data.require_run(dag_id, run_id)?;
        let record = data
            .task_instances
            .get_mut(&keys::task_key(dag_id, run_id, task_id))
            .ok_or_else(|| task_not_found(dag_id, run_id, task_id))?;
        let task = patch_record(record, |task| task.apply_update(update))?;
        debug!(
            "[{}] patched task instance '{}/{}/{}'",
            self.id(),
            dag_id,
            run_id,
            task_id
        );
        Ok(task)
    }

    pub fn delete_task_instance(
        &self,
        dag_id: &str,
        run_id: &str,
        task_id: &str,
    ) -> StoreResult<DeleteOutcome> {
        let mut data = self.write();
        data.require_run(dag_id, run_id)?;
        if data
            .task_instances
            .remove(&keys::task_key(dag_id, run_id, task_id))
            .is_none()
        {
            return Err(task_not_found(dag_id, run_id, task_id));
        }
        let xcoms = drain_scope(
            &mut data.xcoms,
            keys::xcoms_of_task(dag_id, run_id, task_id),
            |key| key.0 == dag_id && key.1 == run_id && key.2 == task_id,
        );
        debug!(
            "[{}] deleted task instance '{}/{}/{}' ({} XComs)",
            self.id(),
            dag_id,
            run_id,
            task_id,
            xcoms
        );
        Ok(DeleteOutcome::with_cascade(xcoms))
    }

    /// Force a task instance into a state. With `dry_run` the outcome is
    /// reported but nothing is stored.
    pub fn set_task_instance_state(
        &self,
        dag_id: &str,
        run_id: &str,
        task_id: &str,
        request: SetTaskInstanceState,
    ) -> StoreResult<TaskInstanceAction> {
        let mut data = self.write();
        data.require_run(dag_id, run_id)?;
        let record = data
            .task_instances
            .get_mut(&keys::task_key(dag_id, run_id, task_id))
            .ok_or_else(|| task_not_found(dag_id, run_id, task_id))?;

        let state = request.new_state.as_str();
        let mut task = record.value.clone();
        task.set_state(request.new_state, now());
        if request.dry_run {
            return Ok(TaskInstanceAction::new(
                &task,
                format!("Task instance would be set to {}", state),
            ));
        }
        record.value = task.clone();
        debug!(
            "[{}] set task instance '{}/{}/{}' to {}",
            self.id(),
            dag_id,
            run_id,
            task_id,
            state
        );
        Ok(TaskInstanceAction::new(
            &task,
            format!("Task instance state set to {}", state),
        ))
    }

    /// Reset a task instance so it looks as if it never ran, unless the
    /// options exclude its current state.
    pub fn clear_task_instance(
        &self,
        dag_id: &str,
        run_id: &str,
        task_id: &str,
        options: ClearTaskInstance,
    ) -> StoreResult<TaskInstanceAction> {
        let mut data = self.write();
        data.require_run(dag_id, run_id)?;
        let record = data
            .task_instances
            .get_mut(&keys::task_key(dag_id, run_id, task_id))
            .ok_or_else(|| task_not_found(dag_id, run_id, task_id))?;

        if !options.applies_to(record.value.state) {
            return Ok(TaskInstanceAction::new(
                &record.value,
                format!(
                    "Task instance not cleared, state is {}",
                    record.value.state.as_str()
                ),
            ));
        }
        let mut task = record.value.clone();
        task.clear();
        if options.dry_run {
            return Ok(TaskInstanceAction::new(&task, "Task instance would be cleared"));
        }
        record.value = task.clone();
        debug!(
            "[{}] cleared task instance '{}/{}/{}'",
            self.id(),
            dag_id,
            run_id,
            task_id
        );
        Ok(TaskInstanceAction::new(&task, "Task instance cleared"))
    }

    /// Log of one try, rendered from the task instance. Tries are numbered
    /// from 1 up to the task's current `try_number`.
    pub fn task_log(
        &self,
        dag_id: &str,
        run_id: &str,
        task_id: &str,
        try_number: u32,
    ) -> StoreResult<TaskLog> {
        if try_number == 0 {
            return Err(Violation::OutOfRange {
                field: "try_number",
                value: 0,
            }
            .into());
        }
        let data = self.read();
        let task = &data.require_task(dag_id, run_id, task_id)?.value;
        if try_number > task.try_number {
            return Err(StoreError::not_found(
                EntityKind::TaskLog,
                display_path(&[dag_id, run_id, task_id, &try_number.to_string()]),
            ));
        }
        Ok(TaskLog::render(task, try_number, now()))
    }

    // XCom entries

    pub fn create_xcom(
        &self,
        dag_id: &str,
        run_id: &str,
        task_id: &str,
        new_xcom: NewXCom,
    ) -> StoreResult<XCom> {
        let mut data = self.write();
        let execution_date = data.require_run(dag_id, run_id)?.value.execution_date;
        data.require_task(dag_id, run_id, task_id)?;
        let xcom = new_xcom.into_xcom(dag_id, run_id, task_id, execution_date, now())?;
        let key = keys::xcom_key(dag_id, run_id, task_id, xcom.map_index, &xcom.key);
        if data.xcoms.contains_key(&key) {
            return Err(StoreError::conflict(
                EntityKind::XCom,
                xcom_path(dag_id, run_id, task_id, xcom.map_index, &xcom.key),
            ));
        }
        let record = data.record(xcom.clone());
        data.xcoms.insert(key, record);
        debug!(
            "[{}] created XCom '{}'",
            self.id(),
            xcom_path(dag_id, run_id, task_id, xcom.map_index, &xcom.key)
        );
        Ok(xcom)
    }

    pub fn get_xcom(
        &self,
        dag_id: &str,
        run_id: &str,
        task_id: &str,
        map_index: i64,
        key: &str,
    ) -> StoreResult<XCom> {
        let data = self.read();
        data.require_task(dag_id, run_id, task_id)?;
        data.xcoms
            .get(&keys::xcom_key(dag_id, run_id, task_id, map_index, key))
            .map(|record| record.value.clone())
            .ok_or_else(|| {
                StoreError::not_found(
                    EntityKind::XCom,
                    xcom_path(dag_id, run_id, task_id, map_index, key),
                )
            })
    }

    pub fn list_xcoms(
        &self,
        dag_id: &str,
        run_id: &str,
        task_id: &str,
        filter: &XComFilter,
        query: &ListQuery,
    ) -> StoreResult<Page<XCom>> {
        let data = self.read();
        data.require_task(dag_id, run_id, task_id)?;
        let records = scan(
            &data.xcoms,
            keys::xcoms_of_task(dag_id, run_id, task_id),
            |key| key.0 == dag_id && key.1 == run_id && key.2 == task_id,
        )
        .map(|(_, record)| record)
        .filter(|record| filter.matches(&record.value));
        Ok(paginate(records, query, self.limits())?)
    }

    pub fn patch_xcom(
        &self,
        dag_id: &str,
        run_id: &str,
        task_id: &str,
        map_index: i64,
        key: &str,
        update: XComUpdate,
    ) -> StoreResult<XCom> {
        let mut data = self.write();
        data.require_task(dag_id, run_id, task_id)?;
        let record = data
            .xcoms
            .get_mut(&keys::xcom_key(dag_id, run_id, task_id, map_index, key))
            .ok_or_else(|| {
                StoreError::not_found(
                    EntityKind::XCom,
                    xcom_path(dag_id, run_id, task_id, map_index, key),
                )
            })?;
        let xcom = patch_record(record, |xcom| xcom.apply_update(update))?;
        debug!(
            "[{}] patched XCom '{}'",
            self.id(),
            xcom_path(dag_id, run_id, task_id, map_index, key)
        );
        Ok(xcom)
    }

    pub fn delete_xcom(
        &self,
        dag_id: &str,
        run_id: &str,
        task_id: &str,
        map_index: i64,
        key: &str,
    ) -> StoreResult<DeleteOutcome> {
        let mut data = self.write();
        data.require_task(dag_id, run_id, task_id)?;
        let path = xcom_path(dag_id, run_id, task_id, map_index, key);
        if data
            .xcoms
            .remove(&keys::xcom_key(dag_id, run_id, task_id, map_index, key))
            .is_none()
        {
            return Err(StoreError::not_found(EntityKind::XCom, path));
        }
        debug!("[{}] deleted XCom '{}'", self.id(), path);
        Ok(DeleteOutcome::single())
    }

    /// The newest entry for `(task_id, map_index, key)` across every run of
    /// a DAG.
    pub fn latest_xcom(
        &self,
        dag_id: &str,
        task_id: &str,
        map_index: i64,
        key: &str,
    ) -> StoreResult<XCom> {
        let data = self.read();
        data.require_dag(dag_id)?;
        scan(&data.xcoms, keys::xcoms_of_dag(dag_id), |entry| {
            entry.0 == dag_id
        })
        .map(|(_, record)| record)
        .filter(|record| {
            record.value.task_id == task_id
                && record.value.map_index == map_index
                && record.value.key == key
        })
        .max_by_key(|record| (record.value.timestamp, record.seq))
        .map(|record| record.value.clone())
        .ok_or_else(|| {
            StoreError::not_found(
                EntityKind::XCom,
                display_path(&[dag_id, task_id, &map_index.to_string(), key]),
            )
        })
    }
}
