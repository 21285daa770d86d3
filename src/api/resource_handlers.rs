use axum::{extract::Path, response::Json};
use serde::Deserialize;

use crate::api::handlers::{
    error_response, list_query, ApiError, Collection, Payload, QueryParams,
};
use crate::api::instance_extractor::InstanceScope;
use crate::model::{
    Connection, ConnectionFilter, ConnectionUpdate, Id, NewConnection, NewPool, NewProvider,
    NewVariable, Pool, PoolFilter, PoolUpdate, Provider, ProviderFilter, ProviderHook,
    ProviderUpdate, SlotUsage, Variable, VariableFilter, VariableUpdate,
};
use crate::store::DeleteOutcome;

type ApiResult<T> = Result<Json<T>, ApiError>;

// Connections

#[derive(Debug, Default, Deserialize)]
pub struct ConnectionListParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub order_by: Option<String>,
    pub conn_type: Option<String>,
}

pub async fn list_connections(
    InstanceScope(store): InstanceScope,
    QueryParams(params): QueryParams<ConnectionListParams>,
) -> ApiResult<Collection<Connection>> {
    let filter = ConnectionFilter {
        conn_type: params.conn_type,
    };
    let query = list_query(params.limit, params.offset, &params.order_by);
    let page = store
        .list_connections(&filter, &query)
        .map_err(error_response)?;
    Ok(Json(Collection::new("connections", page)))
}

pub async fn create_connection(
    InstanceScope(store): InstanceScope,
    Payload(new_connection): Payload<NewConnection>,
) -> ApiResult<Connection> {
    store
        .create_connection(new_connection)
        .map(Json)
        .map_err(error_response)
}

pub async fn get_connection(
    InstanceScope(store): InstanceScope,
    Path(conn_id): Path<Id>,
) -> ApiResult<Connection> {
    store.get_connection(&conn_id).map(Json).map_err(error_response)
}

pub async fn patch_connection(
    InstanceScope(store): InstanceScope,
    Path(conn_id): Path<Id>,
    Payload(update): Payload<ConnectionUpdate>,
) -> ApiResult<Connection> {
    store
        .patch_connection(&conn_id, update)
        .map(Json)
        .map_err(error_response)
}

pub async fn delete_connection(
    InstanceScope(store): InstanceScope,
    Path(conn_id): Path<Id>,
) -> ApiResult<DeleteOutcome> {
    store
        .delete_connection(&conn_id)
        .map(Json)
        .map_err(error_response)
}

// Variables

#[derive(Debug, Default, Deserialize)]
pub struct VariableListParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub order_by: Option<String>,
    pub key_prefix: Option<String>,
}

pub async fn list_variables(
    InstanceScope(store): InstanceScope,
    QueryParams(params): QueryParams<VariableListParams>,
) -> ApiResult<Collection<Variable>> {
    let filter = VariableFilter {
        key_prefix: params.key_prefix,
    };
    let query = list_query(params.limit, params.offset, &params.order_by);
    let page = store
        .list_variables(&filter, &query)
        .map_err(error_response)?;
    Ok(Json(Collection::new("variables", page)))
}

pub async fn create_variable(
    InstanceScope(store): InstanceScope,
    Payload(new_variable): Payload<NewVariable>,
) -> ApiResult<Variable> {
    store
        .create_variable(new_variable)
        .map(Json)
        .map_err(error_response)
}

pub async fn get_variable(
    InstanceScope(store): InstanceScope,
    Path(key): Path<Id>,
) -> ApiResult<Variable> {
    store.get_variable(&key).map(Json).map_err(error_response)
}

pub async fn patch_variable(
    InstanceScope(store): InstanceScope,
    Path(key): Path<Id>,
    Payload(update): Payload<VariableUpdate>,
) -> ApiResult<Variable> {
    store
        .patch_variable(&key, update)
        .map(Json)
        .map_err(error_response)
}

pub async fn delete_variable(
    InstanceScope(store): InstanceScope,
    Path(key): Path<Id>,
) -> ApiResult<DeleteOutcome> {
    store.delete_variable(&key).map(Json).map_err(error_response)
}

// Pools

#[derive(Debug, Default, Deserialize)]
pub struct PoolListParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub order_by: Option<String>,
    pub name_prefix: Option<String>,
}

pub async fn list_pools(
    InstanceScope(store): InstanceScope,
    QueryParams(params): QueryParams<PoolListParams>,
) -> ApiResult<Collection<Pool>> {
    let filter = PoolFilter {
        name_prefix: params.name_prefix,
    };
    let query = list_query(params.limit, params.offset, &params.order_by);
    let page = store.list_pools(&filter, &query).map_err(error_response)?;
    Ok(Json(Collection::new("pools", page)))
}

pub async fn create_pool(
    InstanceScope(store): InstanceScope,
    Payload(new_pool): Payload<NewPool>,
) -> ApiResult<Pool> {
    store.create_pool(new_pool).map(Json).map_err(error_response)
}

pub async fn get_pool(
    InstanceScope(store): InstanceScope,
    Path(name): Path<Id>,
) -> ApiResult<Pool> {
    store.get_pool(&name).map(Json).map_err(error_response)
}

pub async fn patch_pool(
    InstanceScope(store): InstanceScope,
    Path(name): Path<Id>,
    Payload(update): Payload<PoolUpdate>,
) -> ApiResult<Pool> {
    store
        .patch_pool(&name, update)
        .map(Json)
        .map_err(error_response)
}

/// Counters missing from the body keep their current value.
pub async fn update_pool_slots(
    InstanceScope(store): InstanceScope,
    Path(name): Path<Id>,
    Payload(usage): Payload<SlotUsage>,
) -> ApiResult<Pool> {
    store
        .update_pool_slots(&name, usage)
        .map(Json)
        .map_err(error_response)
}

pub async fn delete_pool(
    InstanceScope(store): InstanceScope,
    Path(name): Path<Id>,
) -> ApiResult<DeleteOutcome> {
    store.delete_pool(&name).map(Json).map_err(error_response)
}

// Providers

#[derive(Debug, Default, Deserialize)]
pub struct ProviderListParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub order_by: Option<String>,
    pub name_prefix: Option<String>,
    pub connection_type: Option<String>,
}

pub async fn list_providers(
    InstanceScope(store): InstanceScope,
    QueryParams(params): QueryParams<ProviderListParams>,
) -> ApiResult<Collection<Provider>> {
    let filter = ProviderFilter {
        name_prefix: params.name_prefix,
        connection_type: params.connection_type,
    };
    let query = list_query(params.limit, params.offset, &params.order_by);
    let page = store
        .list_providers(&filter, &query)
        .map_err(error_response)?;
    Ok(Json(Collection::new("providers", page)))
}

pub async fn create_provider(
    InstanceScope(store): InstanceScope,
    Payload(new_provider): Payload<NewProvider>,
) -> ApiResult<Provider> {
    store
        .create_provider(new_provider)
        .map(Json)
        .map_err(error_response)
}

pub async fn get_provider(
    InstanceScope(store): InstanceScope,
    Path(name): Path<Id>,
) -> ApiResult<Provider> {
    store.get_provider(&name).map(Json).map_err(error_response)
}

pub async fn patch_provider(
    InstanceScope(store): InstanceScope,
    Path(name): Path<Id>,
    Payload(update): Payload<ProviderUpdate>,
) -> ApiResult<Provider> {
    store
        .patch_provider(&name, update)
        .map(Json)
        .map_err(error_response)
}

pub async fn delete_provider(
    InstanceScope(store): InstanceScope,
    Path(name): Path<Id>,
) -> ApiResult<DeleteOutcome> {
    store.delete_provider(&name).map(Json).map_err(error_response)
}

pub async fn list_provider_hooks(
    InstanceScope(store): InstanceScope,
    Path(name): Path<Id>,
) -> ApiResult<Collection<ProviderHook>> {
    let hooks = store.provider_hooks(&name).map_err(error_response)?;
    Ok(Json(Collection::all("hooks", hooks)))
}
