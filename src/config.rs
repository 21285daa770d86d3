use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::seed::SampleConfig;
use crate::store::PageLimits;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub instance: InstanceConfig,
    pub pagination: PageLimits,
    pub sample: SampleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceConfig {
    /// Instance served when a request names none.
    pub default_id: String,
    /// Fill the default instance with sample data at startup.
    pub populate: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            default_id: "default".to_string(),
            populate: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the `airflow-mock` config file if
    /// present, and `AIRFLOW_MOCK_*` environment variables.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(None)
    }

    /// Like [`AppConfig::load`], reading `path` instead of the default file.
    /// An explicitly named file must exist.
    pub fn load_from(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = config::Config::builder();

        config = config.add_source(config::Config::try_from(&AppConfig::default())?);

        config = match path {
            Some(path) => config.add_source(config::File::from(path).required(true)),
            None => config.add_source(config::File::with_name("airflow-mock").required(false)),
        };

        // Nested keys use a double underscore, e.g. AIRFLOW_MOCK_SERVER__PORT
        config = config.add_source(
            config::Environment::with_prefix("AIRFLOW_MOCK")
                .prefix_separator("_")
                .separator("__"),
        );

        let config = config.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        Ok(app_config)
    }

    /// Get the server bind address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::PopulatePolicy;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server_address(), "127.0.0.1:8080");
        assert_eq!(config.instance.default_id, "default");
        assert_eq!(config.pagination.default_limit, 100);
        assert_eq!(config.sample.policy, PopulatePolicy::Reject);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config: AppConfig = serde_json::from_str(
            r#"{"server": {"port": 9090}, "sample": {"policy": "merge", "dags": 2}}"#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.sample.policy, PopulatePolicy::Merge);
        assert_eq!(config.sample.runs_per_dag, 3);
        assert_eq!(config.pagination.max_limit, 1000);
    }
}
