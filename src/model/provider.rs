use serde::{Deserialize, Serialize};

use crate::model::{
    check_identifier, check_same_identifier, require_identifier, Id, UpdateValue, Violation,
};
use crate::store::query::{OrderKey, Orderable};

/// A typed connector exposed by a provider for one connection type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderHook {
    pub hook_name: String,
    pub connection_type: String,
    #[serde(default)]
    pub hook_class_name: Option<String>,
}

impl ProviderHook {
    pub fn new(hook_name: impl Into<String>, connection_type: impl Into<String>) -> Self {
        Self {
            hook_name: hook_name.into(),
            connection_type: connection_type.into(),
            hook_class_name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    pub name: Id,
    pub package_name: String,
    pub version: String,
    pub description: Option<String>,
    pub hooks: Vec<ProviderHook>,
    pub extra_links: Vec<String>,
}

impl Provider {
    pub fn supports(&self, connection_type: &str) -> bool {
        self.hooks
            .iter()
            .any(|hook| hook.connection_type == connection_type)
    }

    pub fn apply_update(&mut self, update: ProviderUpdate) -> Result<(), Violation> {
        check_same_identifier("name", &self.name, update.name.as_deref())?;
        if let Some(package_name) = &update.package_name {
            check_identifier("package_name", package_name)?;
        }
        if let Some(version) = &update.version {
            check_identifier("version", version)?;
        }
        if let Some(hooks) = &update.hooks {
            check_hooks(hooks)?;
        }

        if let Some(package_name) = update.package_name {
            self.package_name = package_name;
        }
        if let Some(version) = update.version {
            self.version = version;
        }
        self.description = update.description.apply_to(self.description.take());
        if let Some(hooks) = update.hooks {
            self.hooks = hooks;
        }
        if let Some(extra_links) = update.extra_links {
            self.extra_links = extra_links;
        }
        Ok(())
    }
}

fn check_hooks(hooks: &[ProviderHook]) -> Result<(), Violation> {
    for hook in hooks {
        check_identifier("hooks.hook_name", &hook.hook_name)?;
        check_identifier("hooks.connection_type", &hook.connection_type)?;
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewProvider {
    pub name: Option<Id>,
    pub package_name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub hooks: Option<Vec<ProviderHook>>,
    pub extra_links: Option<Vec<String>>,
}

impl NewProvider {
    pub fn new(name: impl Into<Id>, version: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            version: Some(version.into()),
            ..Self::default()
        }
    }

    /// `package_name` defaults to the conventional
    /// `apache-airflow-providers-<name>`.
    pub fn into_provider(self) -> Result<Provider, Violation> {
        let name = require_identifier("name", self.name)?;
        let version = require_identifier("version", self.version)?;
        let package_name = match self.package_name {
            Some(package_name) => {
                check_identifier("package_name", &package_name)?;
                package_name
            }
            None => format!("apache-airflow-providers-{}", name),
        };
        let hooks = self.hooks.unwrap_or_default();
        check_hooks(&hooks)?;

        Ok(Provider {
            name,
            package_name,
            version,
            description: self.description,
            hooks,
            extra_links: self.extra_links.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderUpdate {
    pub name: Option<Id>,
    pub package_name: Option<String>,
    pub version: Option<String>,
    #[serde(default)]
    pub description: UpdateValue<String>,
    pub hooks: Option<Vec<ProviderHook>>,
    pub extra_links: Option<Vec<String>>,
}

impl Orderable for Provider {
    const ORDER_FIELDS: &'static [&'static str] = &["name", "package_name", "version"];

    fn order_key(&self, field: &str) -> Option<OrderKey> {
        match field {
            "name" => Some(OrderKey::text(&self.name)),
            "package_name" => Some(OrderKey::text(&self.package_name)),
            "version" => Some(OrderKey::text(&self.version)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_package_name() {
        let provider = NewProvider::new("postgres", "5.10.0").into_provider().unwrap();
        assert_eq!(provider.package_name, "apache-airflow-providers-postgres");
    }

    #[test]
    fn test_version_required() {
        let new_provider = NewProvider {
            name: Some("http".to_string()),
            ..NewProvider::default()
        };
        assert_eq!(
            new_provider.into_provider().unwrap_err(),
            Violation::Missing { field: "version" }
        );
    }

    #[test]
    fn test_hook_order_is_kept() {
        let provider = NewProvider {
            hooks: Some(vec![
                ProviderHook::new("S3Hook", "aws"),
                ProviderHook::new("AwsGenericHook", "aws"),
            ]),
            ..NewProvider::new("amazon", "8.19.0")
        }
        .into_provider()
        .unwrap();
        assert_eq!(provider.hooks[0].hook_name, "S3Hook");
        assert!(provider.supports("aws"));
        assert!(!provider.supports("postgres"));
    }

    #[test]
    fn test_blank_hook_rejected() {
        let new_provider = NewProvider {
            hooks: Some(vec![ProviderHook::new("", "http")]),
            ..NewProvider::new("http", "4.10.0")
        };
        assert_eq!(
            new_provider.into_provider().unwrap_err(),
            Violation::Empty {
                field: "hooks.hook_name"
            }
        );
    }
}
