use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

use crate::model::{
    check_identifier, check_same_identifier, now, Id, JsonObject, Timestamp, UpdateValue,
    Violation,
};
use crate::store::query::{OrderKey, Orderable};

/// States a run may be asserted to be in. Any state may follow any other;
/// nothing here models a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DagRunState {
    Queued,
    Running,
    Success,
    Failed,
}

impl DagRunState {
    pub const ALL: [DagRunState; 4] = [
        DagRunState::Queued,
        DagRunState::Running,
        DagRunState::Success,
        DagRunState::Failed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DagRunState::Queued => "queued",
            DagRunState::Running => "running",
            DagRunState::Success => "success",
            DagRunState::Failed => "failed",
        }
    }

    pub fn is_finished(self) -> bool {
        matches!(self, DagRunState::Success | DagRunState::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DagRun {
    pub dag_id: Id,
    pub run_id: Id,
    pub execution_date: Timestamp,
    pub start_date: Option<Timestamp>,
    pub end_date: Option<Timestamp>,
    pub state: DagRunState,
    pub external_trigger: bool,
    pub conf: JsonObject,
}

impl DagRun {
    fn check_end_date(&self) -> Result<(), Violation> {
        if self.end_date.is_some() && !self.state.is_finished() {
            return Err(Violation::EndDateBeforeFinish {
                state: self.state.as_str(),
            });
        }
        Ok(())
    }

    /// Apply a partial update. Moving to an unfinished state drops a
    /// previously stored `end_date`; supplying one alongside such a state is
    /// rejected.
    pub fn apply_update(&mut self, update: DagRunUpdate) -> Result<(), Violation> {
        check_same_identifier("dag_id", &self.dag_id, update.dag_id.as_deref())?;
        check_same_identifier("run_id", &self.run_id, update.run_id.as_deref())?;

        let mut next = self.clone();
        if let Some(state) = update.state {
            next.state = state;
            if !state.is_finished() && !update.end_date.is_change() {
                next.end_date = None;
            }
        }
        if let Some(execution_date) = update.execution_date {
            next.execution_date = execution_date;
        }
        next.start_date = update.start_date.apply_to(next.start_date);
        next.end_date = update.end_date.apply_to(next.end_date);
        if let Some(external_trigger) = update.external_trigger {
            next.external_trigger = external_trigger;
        }
        if let Some(conf) = update.conf {
            next.conf = conf;
        }
        next.check_end_date()?;

        *self = next;
        Ok(())
    }
}

/// Input model for triggering a run. `run_id` is generated from the
/// execution date when omitted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewDagRun {
    pub dag_id: Option<Id>,
    pub run_id: Option<Id>,
    pub execution_date: Option<Timestamp>,
    pub start_date: Option<Timestamp>,
    pub end_date: Option<Timestamp>,
    pub state: Option<DagRunState>,
    pub external_trigger: Option<bool>,
    pub conf: Option<JsonObject>,
}

impl NewDagRun {
    pub fn with_id(run_id: impl Into<Id>) -> Self {
        Self {
            run_id: Some(run_id.into()),
            ..Self::default()
        }
    }

    pub fn into_dag_run(self, dag_id: &str) -> Result<DagRun, Violation> {
        check_same_identifier("dag_id", dag_id, self.dag_id.as_deref())?;
        let execution_date = self.execution_date.unwrap_or_else(now);
        let run_id = match self.run_id {
            Some(run_id) => {
                check_identifier("run_id", &run_id)?;
                run_id
            }
            None => manual_run_id(execution_date),
        };
        let state = self.state.unwrap_or(DagRunState::Queued);
        let start_date = match (self.start_date, state) {
            (Some(start_date), _) => Some(start_date),
            (None, DagRunState::Queued) => None,
            (None, _) => Some(now()),
        };

        let run = DagRun {
            dag_id: dag_id.to_string(),
            run_id,
            execution_date,
            start_date,
            end_date: self.end_date,
            state,
            external_trigger: self.external_trigger.unwrap_or(true),
            conf: self.conf.unwrap_or_default(),
        };
        run.check_end_date()?;
        Ok(run)
    }
}

pub fn manual_run_id(execution_date: Timestamp) -> Id {
    format!(
        "manual__{}",
        execution_date.to_rfc3339_opts(SecondsFormat::Micros, true)
    )
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DagRunUpdate {
    pub dag_id: Option<Id>,
    pub run_id: Option<Id>,
    pub state: Option<DagRunState>,
    pub execution_date: Option<Timestamp>,
    #[serde(default)]
    pub start_date: UpdateValue<Timestamp>,
    #[serde(default)]
    pub end_date: UpdateValue<Timestamp>,
    pub external_trigger: Option<bool>,
    pub conf: Option<JsonObject>,
}

impl Orderable for DagRun {
    const ORDER_FIELDS: &'static [&'static str] =
        &["run_id", "state", "execution_date", "start_date", "end_date"];

    fn order_key(&self, field: &str) -> Option<OrderKey> {
        match field {
            "run_id" => Some(OrderKey::text(&self.run_id)),
            "state" => Some(OrderKey::text(self.state.as_str())),
            "execution_date" => Some(OrderKey::Time(Some(self.execution_date))),
            "start_date" => Some(OrderKey::Time(self.start_date)),
            "end_date" => Some(OrderKey::Time(self.end_date)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_wire_names() {
        assert_eq!(
            serde_json::to_string(&DagRunState::Success).unwrap(),
            "\"success\""
        );
        let state: DagRunState = serde_json::from_str("\"queued\"").unwrap();
        assert_eq!(state, DagRunState::Queued);
        assert!(serde_json::from_str::<DagRunState>("\"upstream_failed\"").is_err());
    }

    #[test]
    fn test_into_dag_run_generates_manual_id() {
        let run = NewDagRun::default().into_dag_run("etl").unwrap();
        assert!(run.run_id.starts_with("manual__"));
        assert_eq!(run.state, DagRunState::Queued);
        assert!(run.start_date.is_none());
        assert!(run.end_date.is_none());
    }

    #[test]
    fn test_end_date_requires_finished_state() {
        let new_run = NewDagRun {
            state: Some(DagRunState::Running),
            end_date: Some(now()),
            ..NewDagRun::with_id("r1")
        };
        assert_eq!(
            new_run.into_dag_run("etl").unwrap_err(),
            Violation::EndDateBeforeFinish { state: "running" }
        );
    }

    #[test]
    fn test_rejects_mismatched_dag_id() {
        let new_run = NewDagRun {
            dag_id: Some("other".to_string()),
            ..NewDagRun::with_id("r1")
        };
        assert!(matches!(
            new_run.into_dag_run("etl"),
            Err(Violation::IdentifierChanged { field: "dag_id", .. })
        ));
    }

    #[test]
    fn test_any_state_may_follow_any_other() {
        let mut run = NewDagRun {
            state: Some(DagRunState::Success),
            end_date: Some(now()),
            ..NewDagRun::with_id("r1")
        }
        .into_dag_run("etl")
        .unwrap();

        run.apply_update(DagRunUpdate {
            state: Some(DagRunState::Queued),
            ..DagRunUpdate::default()
        })
        .unwrap();
        assert_eq!(run.state, DagRunState::Queued);
        assert!(run.end_date.is_none());

        run.apply_update(DagRunUpdate {
            state: Some(DagRunState::Failed),
            ..DagRunUpdate::default()
        })
        .unwrap();
        assert_eq!(run.state, DagRunState::Failed);
    }

    #[test]
    fn test_rejected_update_leaves_run_unchanged() {
        let mut run = NewDagRun::with_id("r1").into_dag_run("etl").unwrap();
        let before = run.clone();
        let result = run.apply_update(DagRunUpdate {
            end_date: UpdateValue::Set(now()),
            ..DagRunUpdate::default()
        });
        assert!(result.is_err());
        assert_eq!(run, before);
    }
}
