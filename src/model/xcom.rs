use serde::{Deserialize, Deserializer, Serialize};

use crate::model::{
    check_same_identifier, require_identifier, Id, Timestamp, UpdateValue, Violation,
};
use crate::store::query::{OrderKey, Orderable};

/// Map index of an XCom pushed by an unmapped task.
pub const UNMAPPED: i64 = -1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XCom {
    pub dag_id: Id,
    pub run_id: Id,
    pub task_id: Id,
    pub map_index: i64,
    pub key: String,
    pub value: serde_json::Value,
    pub timestamp: Timestamp,
    pub execution_date: Timestamp,
    pub description: Option<String>,
}

impl XCom {
    pub fn apply_update(&mut self, update: XComUpdate) -> Result<(), Violation> {
        check_same_identifier("key", &self.key, update.key.as_deref())?;
        if let Some(map_index) = update.map_index {
            if map_index != self.map_index {
                return Err(Violation::IdentifierChanged {
                    field: "map_index",
                    current: self.map_index.to_string(),
                    requested: map_index.to_string(),
                });
            }
        }
        match update.value {
            UpdateValue::Set(value) => self.value = value,
            UpdateValue::Unset => self.value = serde_json::Value::Null,
            UpdateValue::NoChange => {}
        }
        self.description = update.description.apply_to(self.description.take());
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewXCom {
    pub dag_id: Option<Id>,
    pub run_id: Option<Id>,
    pub task_id: Option<Id>,
    pub key: Option<String>,
    pub map_index: Option<i64>,
    #[serde(default, deserialize_with = "present_value")]
    pub value: Option<serde_json::Value>,
    pub description: Option<String>,
}

/// A present `null` payload is a value; only an absent field is missing.
fn present_value<'de, D>(deserializer: D) -> Result<Option<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

impl NewXCom {
    pub fn new(key: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            key: Some(key.into()),
            value: Some(value),
            ..Self::default()
        }
    }

    /// Convert to a stored entry. `execution_date` is copied from the owning
    /// run and `timestamp` is the creation time.
    pub fn into_xcom(
        self,
        dag_id: &str,
        run_id: &str,
        task_id: &str,
        execution_date: Timestamp,
        timestamp: Timestamp,
    ) -> Result<XCom, Violation> {
        check_same_identifier("dag_id", dag_id, self.dag_id.as_deref())?;
        check_same_identifier("run_id", run_id, self.run_id.as_deref())?;
        check_same_identifier("task_id", task_id, self.task_id.as_deref())?;
        let key = require_identifier("key", self.key)?;
        let map_index = self.map_index.unwrap_or(UNMAPPED);
        if map_index < UNMAPPED {
            return Err(Violation::OutOfRange {
                field: "map_index",
                value: map_index,
            });
        }
        let value = self.value.ok_or(Violation::Missing { field: "value" })?;

        Ok(XCom {
            dag_id: dag_id.to_string(),
            run_id: run_id.to_string(),
            task_id: task_id.to_string(),
            map_index,
            key,
            value,
            timestamp,
            execution_date,
            description: self.description,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct XComUpdate {
    pub key: Option<String>,
    pub map_index: Option<i64>,
    #[serde(default)]
    pub value: UpdateValue<serde_json::Value>,
    #[serde(default)]
    pub description: UpdateValue<String>,
}

impl Orderable for XCom {
    const ORDER_FIELDS: &'static [&'static str] = &["key", "map_index", "timestamp"];

    fn order_key(&self, field: &str) -> Option<OrderKey> {
        match field {
            "key" => Some(OrderKey::text(&self.key)),
            "map_index" => Some(OrderKey::Number(self.map_index)),
            "timestamp" => Some(OrderKey::Time(Some(self.timestamp))),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_into_xcom() {
        let now = chrono::Utc::now();
        let xcom = NewXCom::new("return_value", json!({"rows": 3}))
            .into_xcom("etl", "r1", "extract", now, now)
            .unwrap();
        assert_eq!(xcom.map_index, UNMAPPED);
        assert_eq!(xcom.value["rows"], 3);
        assert_eq!(xcom.execution_date, now);
    }

    #[test]
    fn test_value_is_required() {
        let now = chrono::Utc::now();
        let new_xcom = NewXCom {
            key: Some("k".to_string()),
            ..NewXCom::default()
        };
        assert_eq!(
            new_xcom.into_xcom("d", "r", "t", now, now).unwrap_err(),
            Violation::Missing { field: "value" }
        );
    }

    #[test]
    fn test_map_index_below_unmapped_rejected() {
        let now = chrono::Utc::now();
        let new_xcom = NewXCom {
            map_index: Some(-2),
            ..NewXCom::new("k", json!(1))
        };
        assert!(matches!(
            new_xcom.into_xcom("d", "r", "t", now, now),
            Err(Violation::OutOfRange { field: "map_index", value: -2 })
        ));
    }

    #[test]
    fn test_update_keeps_identity() {
        let now = chrono::Utc::now();
        let mut xcom = NewXCom::new("k", json!(1))
            .into_xcom("d", "r", "t", now, now)
            .unwrap();
        let err = xcom
            .apply_update(XComUpdate {
                map_index: Some(2),
                ..XComUpdate::default()
            })
            .unwrap_err();
        assert_eq!(err.field(), Some("map_index"));

        xcom.apply_update(XComUpdate {
            value: UpdateValue::Set(json!("two")),
            ..XComUpdate::default()
        })
        .unwrap();
        assert_eq!(xcom.value, json!("two"));
    }

    #[test]
    fn test_null_payload_is_a_value() {
        let now = chrono::Utc::now();
        let new_xcom: NewXCom = serde_json::from_value(json!({"key": "k", "value": null})).unwrap();
        let xcom = new_xcom.into_xcom("d", "r", "t", now, now).unwrap();
        assert_eq!(xcom.value, serde_json::Value::Null);

        let absent: NewXCom = serde_json::from_value(json!({"key": "k"})).unwrap();
        assert_eq!(absent.value, None);

        let update: XComUpdate = serde_json::from_value(json!({"value": null})).unwrap();
        assert_eq!(update.value, UpdateValue::Unset);
    }
}
