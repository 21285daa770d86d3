pub mod api;
pub mod config;
pub mod model;
pub mod seed;
pub mod store;

use std::sync::Arc;

use log::info;
use tokio::net::TcpListener;

// Export API types
pub use api::handlers;
pub use api::routes;
pub use api::{build_app, AppState, ServerState};

// Export all model types
pub use model::*;

// Export store and seed types
pub use seed::{PopulatePolicy, PopulateReport, SampleConfig, SampleGenerator};
pub use store::{InstanceRegistry, InstanceStore, StoreError, StoreResult};

use crate::config::AppConfig;

/// Build the shared server state: a registry holding the default instance,
/// filled with sample data when the configuration asks for it.
pub fn build_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let registry = Arc::new(InstanceRegistry::new(config.pagination));
    let default_store = registry.get_or_create(&config.instance.default_id)?;

    if config.instance.populate {
        let report = seed::populate(&default_store, &config.sample)?;
        info!(
            "Populated instance '{}' with {} entities",
            report.instance_id,
            report.inserted.total()
        );
    }

    Ok(Arc::new(ServerState {
        registry,
        default_instance: config.instance.default_id.clone(),
        sample: config.sample.clone(),
    }))
}

/// Serve the API on an already bound listener until the future resolves.
pub async fn serve_on<F>(
    listener: TcpListener,
    state: AppState,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let app = build_app(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Bind the configured address and serve until Ctrl-C.
pub async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    let state = build_state(&config)?;

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    info!(
        "Airflow mock API listening on http://{} (default instance '{}')",
        listener.local_addr()?,
        config.instance.default_id
    );

    serve_on(listener, state, shutdown_signal()).await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_state_creates_default_instance() {
        let config = AppConfig::default();
        let state = build_state(&config).unwrap();
        assert_eq!(state.default_instance, "default");
        assert!(state.registry.contains("default"));
        assert!(state.registry.get("default").unwrap().is_empty());
    }

    #[test]
    fn test_build_state_populates_on_request() {
        let mut config = AppConfig::default();
        config.instance.default_id = "demo".to_string();
        config.instance.populate = true;
        config.sample.seed = Some(7);

        let state = build_state(&config).unwrap();
        let counts = state.registry.get("demo").unwrap().counts();
        assert_eq!(counts.dags, 5);
        assert_eq!(counts.dag_runs, 15);
        assert_eq!(counts.task_instances, 60);
    }
}
