use axum::{body::Bytes, extract::Path, response::Json};
use serde::Deserialize;

use crate::api::handlers::{
    bad_request, error_response, list_query, split_list, ApiError, Collection, PathParams,
    Payload, QueryParams,
};
use crate::api::instance_extractor::InstanceScope;
use crate::model::{
    non_negative_u32, ClearTaskInstance, Dag, DagFilter, DagRun, DagRunFilter, DagRunState,
    DagRunUpdate, DagUpdate, Id, NewDag, NewDagRun, NewTaskInstance, NewXCom,
    SetTaskInstanceState, TaskInstance, TaskInstanceAction, TaskInstanceFilter,
    TaskInstanceState, TaskInstanceUpdate, TaskLog, Timestamp, XCom, XComFilter, XComUpdate,
    UNMAPPED,
};
use crate::store::DeleteOutcome;

type ApiResult<T> = Result<Json<T>, ApiError>;

// DAGs

#[derive(Debug, Default, Deserialize)]
pub struct DagListParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub order_by: Option<String>,
    /// Comma separated; a DAG matches when it carries any of them.
    pub tags: Option<String>,
    pub dag_id_prefix: Option<String>,
    pub paused: Option<bool>,
}

pub async fn list_dags(
    InstanceScope(store): InstanceScope,
    QueryParams(params): QueryParams<DagListParams>,
) -> ApiResult<Collection<Dag>> {
    let filter = DagFilter {
        tags: split_list(params.tags.as_deref()),
        dag_id_prefix: params.dag_id_prefix,
        paused: params.paused,
    };
    let query = list_query(params.limit, params.offset, &params.order_by);
    let page = store.list_dags(&filter, &query).map_err(error_response)?;
    Ok(Json(Collection::new("dags", page)))
}

pub async fn create_dag(
    InstanceScope(store): InstanceScope,
    Payload(new_dag): Payload<NewDag>,
) -> ApiResult<Dag> {
    store.create_dag(new_dag).map(Json).map_err(error_response)
}

pub async fn get_dag(
    InstanceScope(store): InstanceScope,
    Path(dag_id): Path<Id>,
) -> ApiResult<Dag> {
    store.get_dag(&dag_id).map(Json).map_err(error_response)
}

pub async fn patch_dag(
    InstanceScope(store): InstanceScope,
    Path(dag_id): Path<Id>,
    Payload(update): Payload<DagUpdate>,
) -> ApiResult<Dag> {
    store.patch_dag(&dag_id, update).map(Json).map_err(error_response)
}

/// Deletes the DAG with all of its runs, task instances and XCom entries.
pub async fn delete_dag(
    InstanceScope(store): InstanceScope,
    Path(dag_id): Path<Id>,
) -> ApiResult<DeleteOutcome> {
    store.delete_dag(&dag_id).map(Json).map_err(error_response)
}

// DAG runs

#[derive(Debug, Default, Deserialize)]
pub struct DagRunListParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub order_by: Option<String>,
    pub state: Option<DagRunState>,
    pub execution_date_gte: Option<Timestamp>,
    pub execution_date_lte: Option<Timestamp>,
}

pub async fn list_dag_runs(
    InstanceScope(store): InstanceScope,
    Path(dag_id): Path<Id>,
    QueryParams(params): QueryParams<DagRunListParams>,
) -> ApiResult<Collection<DagRun>> {
    let filter = DagRunFilter {
        state: params.state,
        execution_date_gte: params.execution_date_gte,
        execution_date_lte: params.execution_date_lte,
    };
    let query = list_query(params.limit, params.offset, &params.order_by);
    let page = store
        .list_dag_runs(&dag_id, &filter, &query)
        .map_err(error_response)?;
    Ok(Json(Collection::new("dag_runs", page)))
}

pub async fn create_dag_run(
    InstanceScope(store): InstanceScope,
    Path(dag_id): Path<Id>,
    Payload(new_run): Payload<NewDagRun>,
) -> ApiResult<DagRun> {
    store
        .create_dag_run(&dag_id, new_run)
        .map(Json)
        .map_err(error_response)
}

pub async fn get_dag_run(
    InstanceScope(store): InstanceScope,
    Path((dag_id, run_id)): Path<(Id, Id)>,
) -> ApiResult<DagRun> {
    store
        .get_dag_run(&dag_id, &run_id)
        .map(Json)
        .map_err(error_response)
}

pub async fn patch_dag_run(
    InstanceScope(store): InstanceScope,
    Path((dag_id, run_id)): Path<(Id, Id)>,
    Payload(update): Payload<DagRunUpdate>,
) -> ApiResult<DagRun> {
    store
        .patch_dag_run(&dag_id, &run_id, update)
        .map(Json)
        .map_err(error_response)
}

pub async fn delete_dag_run(
    InstanceScope(store): InstanceScope,
    Path((dag_id, run_id)): Path<(Id, Id)>,
) -> ApiResult<DeleteOutcome> {
    store
        .delete_dag_run(&dag_id, &run_id)
        .map(Json)
        .map_err(error_response)
}

// Task instances

#[derive(Debug, Default, Deserialize)]
pub struct TaskInstanceListParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub order_by: Option<String>,
    pub state: Option<TaskInstanceState>,
    pub pool: Option<String>,
}

pub async fn list_task_instances(
    InstanceScope(store): InstanceScope,
    Path((dag_id, run_id)): Path<(Id, Id)>,
    QueryParams(params): QueryParams<TaskInstanceListParams>,
) -> ApiResult<Collection<TaskInstance>> {
    let filter = TaskInstanceFilter {
        state: params.state,
        pool: params.pool,
    };
    let query = list_query(params.limit, params.offset, &params.order_by);
    let page = store
        .list_task_instances(&dag_id, &run_id, &filter, &query)
        .map_err(error_response)?;
    Ok(Json(Collection::new("task_instances", page)))
}

pub async fn create_task_instance(
    InstanceScope(store): InstanceScope,
    Path((dag_id, run_id)): Path<(Id, Id)>,
    Payload(new_task): Payload<NewTaskInstance>,
) -> ApiResult<TaskInstance> {
    store
        .create_task_instance(&dag_id, &run_id, new_task)
        .map(Json)
        .map_err(error_response)
}

pub async fn get_task_instance(
    InstanceScope(store): InstanceScope,
    Path((dag_id, run_id, task_id)): Path<(Id, Id, Id)>,
) -> ApiResult<TaskInstance> {
    store
        .get_task_instance(&dag_id, &run_id, &task_id)
        .map(Json)
        .map_err(error_response)
}

pub async fn patch_task_instance(
    InstanceScope(store): InstanceScope,
    Path((dag_id, run_id, task_id)): Path<(Id, Id, Id)>,
    Payload(update): Payload<TaskInstanceUpdate>,
) -> ApiResult<TaskInstance> {
    store
        .patch_task_instance(&dag_id, &run_id, &task_id, update)
        .map(Json)
        .map_err(error_response)
}

pub async fn delete_task_instance(
    InstanceScope(store): InstanceScope,
    Path((dag_id, run_id, task_id)): Path<(Id, Id, Id)>,
) -> ApiResult<DeleteOutcome> {
    store
        .delete_task_instance(&dag_id, &run_id, &task_id)
        .map(Json)
        .map_err(error_response)
}

pub async fn set_task_instance_state(
    InstanceScope(store): InstanceScope,
    Path((dag_id, run_id, task_id)): Path<(Id, Id, Id)>,
    Payload(request): Payload<SetTaskInstanceState>,
) -> ApiResult<TaskInstanceAction> {
    store
        .set_task_instance_state(&dag_id, &run_id, &task_id, request)
        .map(Json)
        .map_err(error_response)
}

/// The body is optional; an empty request clears unconditionally.
pub async fn clear_task_instance(
    InstanceScope(store): InstanceScope,
    Path((dag_id, run_id, task_id)): Path<(Id, Id, Id)>,
    body: Bytes,
) -> ApiResult<TaskInstanceAction> {
    let options: ClearTaskInstance = if body.is_empty() {
        ClearTaskInstance::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| bad_request(&e.to_string()))?
    };
    store
        .clear_task_instance(&dag_id, &run_id, &task_id, options)
        .map(Json)
        .map_err(error_response)
}

pub async fn get_task_log(
    InstanceScope(store): InstanceScope,
    PathParams((dag_id, run_id, task_id, try_number)): PathParams<(Id, Id, Id, i64)>,
) -> ApiResult<TaskLog> {
    let try_number = non_negative_u32("try_number", try_number)
        .map_err(|violation| error_response(violation.into()))?;
    store
        .task_log(&dag_id, &run_id, &task_id, try_number)
        .map(Json)
        .map_err(error_response)
}

// XCom entries

#[derive(Debug, Default, Deserialize)]
pub struct XComListParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub order_by: Option<String>,
    pub key: Option<String>,
    pub map_index: Option<i64>,
}

/// Selects one mapped copy of an entry; unmapped by default.
#[derive(Debug, Deserialize)]
pub struct MapIndexParams {
    #[serde(default = "unmapped")]
    pub map_index: i64,
}

#[derive(Debug, Deserialize)]
pub struct LatestXComParams {
    pub task_id: Id,
    pub key: String,
    #[serde(default = "unmapped")]
    pub map_index: i64,
}

fn unmapped() -> i64 {
    UNMAPPED
}

pub async fn list_xcoms(
    InstanceScope(store): InstanceScope,
    Path((dag_id, run_id, task_id)): Path<(Id, Id, Id)>,
    QueryParams(params): QueryParams<XComListParams>,
) -> ApiResult<Collection<XCom>> {
    let filter = XComFilter {
        key: params.key,
        map_index: params.map_index,
    };
    let query = list_query(params.limit, params.offset, &params.order_by);
    let page = store
        .list_xcoms(&dag_id, &run_id, &task_id, &filter, &query)
        .map_err(error_response)?;
    Ok(Json(Collection::new("xcom_entries", page)))
}

pub async fn create_xcom(
    InstanceScope(store): InstanceScope,
    Path((dag_id, run_id, task_id)): Path<(Id, Id, Id)>,
    Payload(new_xcom): Payload<NewXCom>,
) -> ApiResult<XCom> {
    store
        .create_xcom(&dag_id, &run_id, &task_id, new_xcom)
        .map(Json)
        .map_err(error_response)
}

pub async fn get_xcom(
    InstanceScope(store): InstanceScope,
    Path((dag_id, run_id, task_id, key)): Path<(Id, Id, Id, String)>,
    QueryParams(params): QueryParams<MapIndexParams>,
) -> ApiResult<XCom> {
    store
        .get_xcom(&dag_id, &run_id, &task_id, params.map_index, &key)
        .map(Json)
        .map_err(error_response)
}

pub async fn patch_xcom(
    InstanceScope(store): InstanceScope,
    Path((dag_id, run_id, task_id, key)): Path<(Id, Id, Id, String)>,
    QueryParams(params): QueryParams<MapIndexParams>,
    Payload(update): Payload<XComUpdate>,
) -> ApiResult<XCom> {
    store
        .patch_xcom(&dag_id, &run_id, &task_id, params.map_index, &key, update)
        .map(Json)
        .map_err(error_response)
}

pub async fn delete_xcom(
    InstanceScope(store): InstanceScope,
    Path((dag_id, run_id, task_id, key)): Path<(Id, Id, Id, String)>,
    QueryParams(params): QueryParams<MapIndexParams>,
) -> ApiResult<DeleteOutcome> {
    store
        .delete_xcom(&dag_id, &run_id, &task_id, params.map_index, &key)
        .map(Json)
        .map_err(error_response)
}

/// Newest entry for a task and key across every run of the DAG.
pub async fn latest_xcom(
    InstanceScope(store): InstanceScope,
    Path(dag_id): Path<Id>,
    QueryParams(params): QueryParams<LatestXComParams>,
) -> ApiResult<XCom> {
    store
        .latest_xcom(&dag_id, &params.task_id, params.map_index, &params.key)
        .map(Json)
        .map_err(error_response)
}
