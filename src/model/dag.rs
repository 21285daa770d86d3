use serde::{Deserialize, Serialize};

use crate::model::{
    check_same_identifier, now, require_identifier, Id, Timestamp, UpdateValue, Violation,
};
use crate::store::query::{OrderKey, Orderable};

/// How often a DAG is meant to run, e.g. `{"type": "cron", "value": "0 0 * * *"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleInterval {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DagTag {
    pub name: String,
}

impl DagTag {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dag {
    pub dag_id: Id,
    pub dag_display_name: String,
    pub description: Option<String>,
    pub schedule_interval: Option<ScheduleInterval>,
    pub is_paused: bool,
    pub is_active: bool,
    pub owners: Vec<String>,
    pub fileloc: String,
    pub tags: Vec<DagTag>,
    pub last_parsed_time: Timestamp,
}

impl Dag {
    pub fn has_tag(&self, name: &str) -> bool {
        self.tags.iter().any(|tag| tag.name == name)
    }

    /// Apply a partial update. The DAG is left untouched when the update is
    /// rejected.
    pub fn apply_update(&mut self, update: DagUpdate) -> Result<(), Violation> {
        check_same_identifier("dag_id", &self.dag_id, update.dag_id.as_deref())?;
        let tags = update.tags.map(normalize_tags).transpose()?;
        if let Some(name) = &update.dag_display_name {
            if name.trim().is_empty() {
                return Err(Violation::Empty {
                    field: "dag_display_name",
                });
            }
        }

        if let Some(name) = update.dag_display_name {
            self.dag_display_name = name;
        }
        self.description = update.description.apply_to(self.description.take());
        self.schedule_interval = update
            .schedule_interval
            .apply_to(self.schedule_interval.take());
        if let Some(is_paused) = update.is_paused {
            self.is_paused = is_paused;
        }
        if let Some(is_active) = update.is_active {
            self.is_active = is_active;
        }
        if let Some(owners) = update.owners {
            self.owners = owners;
        }
        if let Some(tags) = tags {
            self.tags = tags;
        }
        Ok(())
    }
}

/// Input model for creating a DAG.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewDag {
    pub dag_id: Option<Id>,
    pub dag_display_name: Option<String>,
    pub description: Option<String>,
    pub schedule_interval: Option<ScheduleInterval>,
    pub is_paused: Option<bool>,
    pub is_active: Option<bool>,
    pub owners: Option<Vec<String>>,
    pub fileloc: Option<String>,
    pub tags: Option<Vec<DagTag>>,
}

impl NewDag {
    pub fn with_id(dag_id: impl Into<Id>) -> Self {
        Self {
            dag_id: Some(dag_id.into()),
            ..Self::default()
        }
    }

    /// Convert to a stored DAG, filling server-side defaults.
    pub fn into_dag(self) -> Result<Dag, Violation> {
        let dag_id = require_identifier("dag_id", self.dag_id)?;
        let tags = normalize_tags(self.tags.unwrap_or_default())?;
        let dag_display_name = match self.dag_display_name {
            Some(name) if name.trim().is_empty() => {
                return Err(Violation::Empty {
                    field: "dag_display_name",
                })
            }
            Some(name) => name,
            None => dag_id.clone(),
        };

        Ok(Dag {
            fileloc: self
                .fileloc
                .unwrap_or_else(|| format!("/tmp/dags/{}.py", dag_id)),
            dag_display_name,
            description: self.description,
            schedule_interval: self.schedule_interval,
            is_paused: self.is_paused.unwrap_or(false),
            is_active: self.is_active.unwrap_or(true),
            owners: self.owners.unwrap_or_default(),
            tags,
            last_parsed_time: now(),
            dag_id,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DagUpdate {
    pub dag_id: Option<Id>,
    pub dag_display_name: Option<String>,
    #[serde(default)]
    pub description: UpdateValue<String>,
    #[serde(default)]
    pub schedule_interval: UpdateValue<ScheduleInterval>,
    pub is_paused: Option<bool>,
    pub is_active: Option<bool>,
    pub owners: Option<Vec<String>>,
    pub tags: Option<Vec<DagTag>>,
}

/// Tags behave as a set: blank names are rejected and repeats dropped,
/// keeping first-seen order.
fn normalize_tags(tags: Vec<DagTag>) -> Result<Vec<DagTag>, Violation> {
    let mut unique: Vec<DagTag> = Vec::with_capacity(tags.len());
    for tag in tags {
        if tag.name.trim().is_empty() {
            return Err(Violation::Empty { field: "tags" });
        }
        if !unique.contains(&tag) {
            unique.push(tag);
        }
    }
    Ok(unique)
}

impl Orderable for Dag {
    const ORDER_FIELDS: &'static [&'static str] =
        &["dag_id", "dag_display_name", "is_paused", "last_parsed_time"];

    fn order_key(&self, field: &str) -> Option<OrderKey> {
        match field {
            "dag_id" => Some(OrderKey::text(&self.dag_id)),
            "dag_display_name" => Some(OrderKey::text(&self.dag_display_name)),
            "is_paused" => Some(OrderKey::Flag(self.is_paused)),
            "last_parsed_time" => Some(OrderKey::Time(Some(self.last_parsed_time))),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_dag_defaults() {
        let dag = NewDag::with_id("etl_daily").into_dag().unwrap();
        assert_eq!(dag.dag_display_name, "etl_daily");
        assert_eq!(dag.fileloc, "/tmp/dags/etl_daily.py");
        assert!(!dag.is_paused);
        assert!(dag.is_active);
        assert!(dag.tags.is_empty());
    }

    #[test]
    fn test_into_dag_requires_id() {
        let err = NewDag::default().into_dag().unwrap_err();
        assert_eq!(err, Violation::Missing { field: "dag_id" });
    }

    #[test]
    fn test_tags_are_deduplicated() {
        let new_dag = NewDag {
            tags: Some(vec![
                DagTag::new("etl"),
                DagTag::new("prod"),
                DagTag::new("etl"),
            ]),
            ..NewDag::with_id("d")
        };
        let dag = new_dag.into_dag().unwrap();
        assert_eq!(dag.tags, vec![DagTag::new("etl"), DagTag::new("prod")]);
    }

    #[test]
    fn test_apply_update_rejects_changed_id() {
        let mut dag = NewDag::with_id("d").into_dag().unwrap();
        let update = DagUpdate {
            dag_id: Some("other".to_string()),
            is_paused: Some(true),
            ..DagUpdate::default()
        };
        assert!(matches!(
            dag.apply_update(update),
            Err(Violation::IdentifierChanged { field: "dag_id", .. })
        ));
        assert!(!dag.is_paused);
    }

    #[test]
    fn test_apply_update_partial() {
        let mut dag = NewDag {
            description: Some("nightly".to_string()),
            ..NewDag::with_id("d")
        }
        .into_dag()
        .unwrap();

        let update: DagUpdate =
            serde_json::from_str(r#"{"is_paused": true, "tags": [{"name": "x"}]}"#).unwrap();
        dag.apply_update(update).unwrap();

        assert!(dag.is_paused);
        assert!(dag.has_tag("x"));
        assert_eq!(dag.description.as_deref(), Some("nightly"));
    }

    #[test]
    fn test_schedule_interval_wire_shape() {
        let schedule = ScheduleInterval {
            kind: "cron".to_string(),
            value: "0 0 * * *".to_string(),
        };
        let json = serde_json::to_value(&schedule).unwrap();
        assert_eq!(json["type"], "cron");
    }
}
