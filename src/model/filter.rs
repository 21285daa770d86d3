//! Per-kind list predicates. An unset field matches everything.

use crate::model::{
    Connection, Dag, DagRun, DagRunState, Pool, Provider, TaskInstance, TaskInstanceState,
    Timestamp, Variable, XCom,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DagFilter {
    /// Matches DAGs carrying any of these tags.
    pub tags: Vec<String>,
    pub dag_id_prefix: Option<String>,
    pub paused: Option<bool>,
}

impl DagFilter {
    pub fn matches(&self, dag: &Dag) -> bool {
        (self.tags.is_empty() || self.tags.iter().any(|tag| dag.has_tag(tag)))
            && prefix_matches(&self.dag_id_prefix, &dag.dag_id)
            && self.paused.map_or(true, |paused| dag.is_paused == paused)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DagRunFilter {
    pub state: Option<DagRunState>,
    pub execution_date_gte: Option<Timestamp>,
    pub execution_date_lte: Option<Timestamp>,
}

impl DagRunFilter {
    pub fn matches(&self, run: &DagRun) -> bool {
        self.state.map_or(true, |state| run.state == state)
            && self
                .execution_date_gte
                .map_or(true, |gte| run.execution_date >= gte)
            && self
                .execution_date_lte
                .map_or(true, |lte| run.execution_date <= lte)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskInstanceFilter {
    pub state: Option<TaskInstanceState>,
    pub pool: Option<String>,
}

impl TaskInstanceFilter {
    pub fn matches(&self, task: &TaskInstance) -> bool {
        self.state.map_or(true, |state| task.state == state)
            && self.pool.as_ref().map_or(true, |pool| &task.pool == pool)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct XComFilter {
    pub key: Option<String>,
    pub map_index: Option<i64>,
}

impl XComFilter {
    pub fn matches(&self, xcom: &XCom) -> bool {
        self.key.as_ref().map_or(true, |key| &xcom.key == key)
            && self.map_index.map_or(true, |index| xcom.map_index == index)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionFilter {
    pub conn_type: Option<String>,
}

impl ConnectionFilter {
    pub fn matches(&self, connection: &Connection) -> bool {
        self.conn_type
            .as_ref()
            .map_or(true, |conn_type| &connection.conn_type == conn_type)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableFilter {
    pub key_prefix: Option<String>,
}

impl VariableFilter {
    pub fn matches(&self, variable: &Variable) -> bool {
        prefix_matches(&self.key_prefix, &variable.key)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoolFilter {
    pub name_prefix: Option<String>,
}

impl PoolFilter {
    pub fn matches(&self, pool: &Pool) -> bool {
        prefix_matches(&self.name_prefix, &pool.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderFilter {
    pub name_prefix: Option<String>,
    /// Matches providers with at least one hook for this connection type.
    pub connection_type: Option<String>,
}

impl ProviderFilter {
    pub fn matches(&self, provider: &Provider) -> bool {
        prefix_matches(&self.name_prefix, &provider.name)
            && self
                .connection_type
                .as_ref()
                .map_or(true, |connection_type| provider.supports(connection_type))
    }
}

fn prefix_matches(prefix: &Option<String>, value: &str) -> bool {
    prefix
        .as_ref()
        .map_or(true, |prefix| value.starts_with(prefix.as_str()))
}
