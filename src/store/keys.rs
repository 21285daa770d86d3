//! Hierarchical keys of the workflow collections.
//!
//! Keys are tuples ordered lexicographically, so every descendant of a
//! parent sits in one contiguous range that starts at the parent's key
//! padded with the smallest values (`""`, `i64::MIN`). Listing children and
//! cascading deletes are both prefix-range scans.

use std::collections::BTreeMap;

use crate::model::Id;

pub type RunKey = (Id, Id);
pub type TaskKey = (Id, Id, Id);
pub type XComKey = (Id, Id, Id, i64, String);

pub fn run_key(dag_id: &str, run_id: &str) -> RunKey {
    (dag_id.to_string(), run_id.to_string())
}

pub fn task_key(dag_id: &str, run_id: &str, task_id: &str) -> TaskKey {
    (dag_id.to_string(), run_id.to_string(), task_id.to_string())
}

pub fn xcom_key(dag_id: &str, run_id: &str, task_id: &str, map_index: i64, key: &str) -> XComKey {
    (
        dag_id.to_string(),
        run_id.to_string(),
        task_id.to_string(),
        map_index,
        key.to_string(),
    )
}

pub fn runs_of_dag(dag_id: &str) -> RunKey {
    run_key(dag_id, "")
}

pub fn tasks_of_dag(dag_id: &str) -> TaskKey {
    task_key(dag_id, "", "")
}

pub fn tasks_of_run(dag_id: &str, run_id: &str) -> TaskKey {
    task_key(dag_id, run_id, "")
}

pub fn xcoms_of_dag(dag_id: &str) -> XComKey {
    xcom_key(dag_id, "", "", i64::MIN, "")
}

pub fn xcoms_of_run(dag_id: &str, run_id: &str) -> XComKey {
    xcom_key(dag_id, run_id, "", i64::MIN, "")
}

pub fn xcoms_of_task(dag_id: &str, run_id: &str, task_id: &str) -> XComKey {
    xcom_key(dag_id, run_id, task_id, i64::MIN, "")
}

/// Render a key path the way errors report it.
pub fn display_path(segments: &[&str]) -> String {
    segments.join("/")
}

/// Entries from `from` onwards for as long as `in_scope` holds.
pub fn scan<'a, K, V, F>(
    map: &'a BTreeMap<K, V>,
    from: K,
    in_scope: F,
) -> impl Iterator<Item = (&'a K, &'a V)> + 'a
where
    K: Ord + 'a,
    V: 'a,
    F: Fn(&K) -> bool + 'a,
{
    map.range(from..).take_while(move |entry| in_scope(entry.0))
}

/// Remove the contiguous range `scan` would visit, returning how many
/// entries went.
pub fn drain_scope<K, V, F>(map: &mut BTreeMap<K, V>, from: K, in_scope: F) -> usize
where
    K: Ord + Clone,
    F: Fn(&K) -> bool,
{
    let doomed: Vec<K> = scan(map, from, in_scope).map(|(key, _)| key.clone()).collect();
    for key in &doomed {
        map.remove(key);
    }
    doomed.len()
}
