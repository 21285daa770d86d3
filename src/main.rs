use std::path::PathBuf;

use airflow_mock::config::AppConfig;
use airflow_mock::run_server;
use clap::Parser;

#[derive(Parser)]
#[command(
    name = "airflow-mock",
    about = "Mock Airflow REST API with isolated in-memory instances",
    version
)]
struct Cli {
    /// Instance served to requests without an X-Instance-Id header.
    #[arg(long)]
    instance_id: Option<String>,
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    /// Fill the default instance with sample data before serving.
    #[arg(long)]
    populate: bool,
    /// Configuration file; replaces the optional airflow-mock.toml lookup.
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn apply(self, config: &mut AppConfig) {
        if let Some(instance_id) = self.instance_id {
            config.instance.default_id = instance_id;
        }
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if self.populate {
            config.instance.populate = true;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = AppConfig::load_from(cli.config.as_deref())?;
    cli.apply(&mut config);
    log::info!(
        "Configuration loaded: server={}, default instance '{}'",
        config.server_address(),
        config.instance.default_id
    );

    run_server(config).await
}
