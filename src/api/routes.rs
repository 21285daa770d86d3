use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use tower::ServiceBuilder;

use crate::api::handlers::{self, AppState};
use crate::api::middleware::{cors_layer, request_logging};
use crate::api::{resource_handlers, workflow_handlers};

const DAG_RUN: &str = "/api/v1/dags/:dag_id/dagRuns/:run_id";
const TASK: &str = "/api/v1/dags/:dag_id/dagRuns/:run_id/taskInstances/:task_id";

pub fn create_router() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Instance management
        .route(
            "/api/v1/instances",
            get(handlers::list_instances).post(handlers::create_instance),
        )
        .route(
            "/api/v1/instances/:instance_id",
            get(handlers::get_instance).delete(handlers::delete_instance),
        )
        .route(
            "/api/v1/instances/:instance_id/populate",
            post(handlers::populate_instance),
        )
        // DAGs
        .route(
            "/api/v1/dags",
            get(workflow_handlers::list_dags).post(workflow_handlers::create_dag),
        )
        .route(
            "/api/v1/dags/:dag_id",
            get(workflow_handlers::get_dag)
                .patch(workflow_handlers::patch_dag)
                .delete(workflow_handlers::delete_dag),
        )
        .route(
            "/api/v1/dags/:dag_id/xcomEntries/latest",
            get(workflow_handlers::latest_xcom),
        )
        // DAG runs
        .route(
            "/api/v1/dags/:dag_id/dagRuns",
            get(workflow_handlers::list_dag_runs).post(workflow_handlers::create_dag_run),
        )
        .route(
            DAG_RUN,
            get(workflow_handlers::get_dag_run)
                .patch(workflow_handlers::patch_dag_run)
                .delete(workflow_handlers::delete_dag_run),
        )
        // Task instances
        .route(
            &format!("{DAG_RUN}/taskInstances"),
            get(workflow_handlers::list_task_instances)
                .post(workflow_handlers::create_task_instance),
        )
        .route(
            TASK,
            get(workflow_handlers::get_task_instance)
                .patch(workflow_handlers::patch_task_instance)
                .delete(workflow_handlers::delete_task_instance),
        )
        .route(
            &format!("{TASK}/setTaskInstanceState"),
            post(workflow_handlers::set_task_instance_state),
        )
        .route(
            &format!("{TASK}/clearTaskInstance"),
            post(workflow_handlers::clear_task_instance),
        )
        .route(
            &format!("{TASK}/logs/:try_number"),
            get(workflow_handlers::get_task_log),
        )
        // XCom entries
        .route(
            &format!("{TASK}/xcomEntries"),
            get(workflow_handlers::list_xcoms).post(workflow_handlers::create_xcom),
        )
        .route(
            &format!("{TASK}/xcomEntries/:xcom_key"),
            get(workflow_handlers::get_xcom)
                .patch(workflow_handlers::patch_xcom)
                .delete(workflow_handlers::delete_xcom),
        )
        // Connections
        .route(
            "/api/v1/connections",
            get(resource_handlers::list_connections).post(resource_handlers::create_connection),
        )
        .route(
            "/api/v1/connections/:conn_id",
            get(resource_handlers::get_connection)
                .patch(resource_handlers::patch_connection)
                .delete(resource_handlers::delete_connection),
        )
        // Variables
        .route(
            "/api/v1/variables",
            get(resource_handlers::list_variables).post(resource_handlers::create_variable),
        )
        .route(
            "/api/v1/variables/:variable_key",
            get(resource_handlers::get_variable)
                .patch(resource_handlers::patch_variable)
                .delete(resource_handlers::delete_variable),
        )
        // Pools
        .route(
            "/api/v1/pools",
            get(resource_handlers::list_pools).post(resource_handlers::create_pool),
        )
        .route(
            "/api/v1/pools/:pool_name",
            get(resource_handlers::get_pool)
                .patch(resource_handlers::patch_pool)
                .delete(resource_handlers::delete_pool),
        )
        .route(
            "/api/v1/pools/:pool_name/slots",
            patch(resource_handlers::update_pool_slots),
        )
        // Providers
        .route(
            "/api/v1/providers",
            get(resource_handlers::list_providers).post(resource_handlers::create_provider),
        )
        .route(
            "/api/v1/providers/:provider_name",
            get(resource_handlers::get_provider)
                .patch(resource_handlers::patch_provider)
                .delete(resource_handlers::delete_provider),
        )
        .route(
            "/api/v1/providers/:provider_name/hooks",
            get(resource_handlers::list_provider_hooks),
        )
        .fallback(handlers::not_found)
}

/// The complete service: routes, request logging and CORS, bound to `state`.
pub fn build_app(state: AppState) -> Router {
    create_router()
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_logging))
                .layer(cors_layer()),
        )
        .with_state(state)
}
