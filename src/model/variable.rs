use serde::{Deserialize, Serialize};

use crate::model::{check_same_identifier, require_identifier, Id, UpdateValue, Violation};
use crate::store::query::{OrderKey, Orderable};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub key: Id,
    pub value: String,
    pub description: Option<String>,
}

impl Variable {
    pub fn apply_update(&mut self, update: VariableUpdate) -> Result<(), Violation> {
        check_same_identifier("key", &self.key, update.key.as_deref())?;
        if let Some(value) = update.value {
            self.value = value;
        }
        self.description = update.description.apply_to(self.description.take());
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewVariable {
    pub key: Option<Id>,
    pub value: Option<String>,
    pub description: Option<String>,
}

impl NewVariable {
    pub fn new(key: impl Into<Id>, value: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            value: Some(value.into()),
            description: None,
        }
    }

    pub fn into_variable(self) -> Result<Variable, Violation> {
        Ok(Variable {
            key: require_identifier("key", self.key)?,
            value: self.value.ok_or(Violation::Missing { field: "value" })?,
            description: self.description,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VariableUpdate {
    pub key: Option<Id>,
    pub value: Option<String>,
    #[serde(default)]
    pub description: UpdateValue<String>,
}

impl Orderable for Variable {
    const ORDER_FIELDS: &'static [&'static str] = &["key", "value"];

    fn order_key(&self, field: &str) -> Option<OrderKey> {
        match field {
            "key" => Some(OrderKey::text(&self.key)),
            "value" => Some(OrderKey::text(&self.value)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_value_is_allowed() {
        let variable = NewVariable::new("flag", "").into_variable().unwrap();
        assert_eq!(variable.value, "");
    }

    #[test]
    fn test_value_required() {
        let new_var = NewVariable {
            key: Some("k".to_string()),
            ..NewVariable::default()
        };
        assert_eq!(
            new_var.into_variable().unwrap_err(),
            Violation::Missing { field: "value" }
        );
    }
}
