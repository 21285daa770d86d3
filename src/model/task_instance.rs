use serde::{Deserialize, Serialize};

use crate::model::{
    check_same_identifier, non_negative_u32, require_identifier, Id, JsonObject, Timestamp,
    UpdateValue, Violation,
};
use crate::store::query::{OrderKey, Orderable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskInstanceState {
    None,
    Scheduled,
    Queued,
    Running,
    Success,
    Failed,
    Skipped,
    UpForRetry,
}

impl TaskInstanceState {
    pub const ALL: [TaskInstanceState; 8] = [
        TaskInstanceState::None,
        TaskInstanceState::Scheduled,
        TaskInstanceState::Queued,
        TaskInstanceState::Running,
        TaskInstanceState::Success,
        TaskInstanceState::Failed,
        TaskInstanceState::Skipped,
        TaskInstanceState::UpForRetry,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskInstanceState::None => "none",
            TaskInstanceState::Scheduled => "scheduled",
            TaskInstanceState::Queued => "queued",
            TaskInstanceState::Running => "running",
            TaskInstanceState::Success => "success",
            TaskInstanceState::Failed => "failed",
            TaskInstanceState::Skipped => "skipped",
            TaskInstanceState::UpForRetry => "up_for_retry",
        }
    }

    pub fn is_finished(self) -> bool {
        matches!(
            self,
            TaskInstanceState::Success | TaskInstanceState::Failed | TaskInstanceState::Skipped
        )
    }

    /// States in which the task has not started yet.
    pub fn is_pending(self) -> bool {
        matches!(
            self,
            TaskInstanceState::None | TaskInstanceState::Scheduled | TaskInstanceState::Queued
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInstance {
    pub dag_id: Id,
    pub run_id: Id,
    pub task_id: Id,
    pub state: TaskInstanceState,
    pub try_number: u32,
    pub max_tries: u32,
    pub start_date: Option<Timestamp>,
    pub end_date: Option<Timestamp>,
    pub duration: Option<f64>,
    pub pool: String,
    pub queue: String,
    pub priority_weight: i32,
    pub operator: String,
    pub queued_when: Option<Timestamp>,
    pub queued_by_job_id: Option<String>,
    pub pid: Option<u32>,
    pub executor_config: JsonObject,
    pub rendered_fields: JsonObject,
}

impl TaskInstance {
    /// Force a state the way the "set task instance state" action does,
    /// stamping dates to match.
    pub fn set_state(&mut self, state: TaskInstanceState, at: Timestamp) {
        self.state = state;
        if state == TaskInstanceState::Running {
            self.start_date = Some(at);
            self.end_date = None;
            self.duration = None;
        } else if state.is_finished() {
            let start_date = *self.start_date.get_or_insert(at);
            self.end_date = Some(at);
            self.duration = Some(seconds_between(start_date, at));
        }
    }

    /// Reset the task as if it had never run.
    pub fn clear(&mut self) {
        self.state = TaskInstanceState::None;
        self.try_number = 1;
        self.start_date = None;
        self.end_date = None;
        self.duration = None;
        self.pid = None;
    }

    pub fn apply_update(&mut self, update: TaskInstanceUpdate) -> Result<(), Violation> {
        check_same_identifier("dag_id", &self.dag_id, update.dag_id.as_deref())?;
        check_same_identifier("run_id", &self.run_id, update.run_id.as_deref())?;
        check_same_identifier("task_id", &self.task_id, update.task_id.as_deref())?;
        let try_number = update
            .try_number
            .map(|v| non_negative_u32("try_number", v))
            .transpose()?;
        let max_tries = update
            .max_tries
            .map(|v| non_negative_u32("max_tries", v))
            .transpose()?;
        let duration = update.duration.try_map(check_duration)?;

        if let Some(state) = update.state {
            self.state = state;
        }
        if let Some(try_number) = try_number {
            self.try_number = try_number;
        }
        if let Some(max_tries) = max_tries {
            self.max_tries = max_tries;
        }
        self.start_date = update.start_date.apply_to(self.start_date);
        self.end_date = update.end_date.apply_to(self.end_date);
        self.duration = duration.apply_to(self.duration);
        if let Some(pool) = update.pool {
            self.pool = pool;
        }
        if let Some(queue) = update.queue {
            self.queue = queue;
        }
        if let Some(priority_weight) = update.priority_weight {
            self.priority_weight = priority_weight;
        }
        if let Some(operator) = update.operator {
            self.operator = operator;
        }
        self.queued_when = update.queued_when.apply_to(self.queued_when);
        self.pid = update.pid.apply_to(self.pid);
        self.queued_by_job_id = update.queued_by_job_id.apply_to(self.queued_by_job_id.take());
        if let Some(executor_config) = update.executor_config {
            self.executor_config = executor_config;
        }
        if let Some(rendered_fields) = update.rendered_fields {
            self.rendered_fields = rendered_fields;
        }
        Ok(())
    }
}

fn seconds_between(start: Timestamp, end: Timestamp) -> f64 {
    (end - start).num_milliseconds() as f64 / 1000.0
}

fn check_duration(value: f64) -> Result<f64, Violation> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(Violation::InvalidNumber { field: "duration" })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTaskInstance {
    pub dag_id: Option<Id>,
    pub run_id: Option<Id>,
    pub task_id: Option<Id>,
    pub state: Option<TaskInstanceState>,
    pub try_number: Option<i64>,
    pub max_tries: Option<i64>,
    pub start_date: Option<Timestamp>,
    pub end_date: Option<Timestamp>,
    pub duration: Option<f64>,
    pub pool: Option<String>,
    pub queue: Option<String>,
    pub priority_weight: Option<i32>,
    pub operator: Option<String>,
    pub queued_when: Option<Timestamp>,
    pub queued_by_job_id: Option<String>,
    pub pid: Option<u32>,
    pub executor_config: Option<JsonObject>,
    pub rendered_fields: Option<JsonObject>,
}

impl NewTaskInstance {
    pub fn with_id(task_id: impl Into<Id>) -> Self {
        Self {
            task_id: Some(task_id.into()),
            ..Self::default()
        }
    }

    pub fn into_task_instance(self, dag_id: &str, run_id: &str) -> Result<TaskInstance, Violation> {
        check_same_identifier("dag_id", dag_id, self.dag_id.as_deref())?;
        check_same_identifier("run_id", run_id, self.run_id.as_deref())?;
        let task_id = require_identifier("task_id", self.task_id)?;
        let try_number = non_negative_u32("try_number", self.try_number.unwrap_or(1))?;
        let max_tries = non_negative_u32("max_tries", self.max_tries.unwrap_or(0))?;
        let duration = self.duration.map(check_duration).transpose()?;

        Ok(TaskInstance {
            dag_id: dag_id.to_string(),
            run_id: run_id.to_string(),
            task_id,
            state: self.state.unwrap_or(TaskInstanceState::None),
            try_number,
            max_tries,
            start_date: self.start_date,
            end_date: self.end_date,
            duration,
            pool: self.pool.unwrap_or_else(|| "default_pool".to_string()),
            queue: self.queue.unwrap_or_else(|| "default".to_string()),
            priority_weight: self.priority_weight.unwrap_or(1),
            operator: self.operator.unwrap_or_else(|| "PythonOperator".to_string()),
            queued_when: self.queued_when,
            queued_by_job_id: self.queued_by_job_id,
            pid: self.pid,
            executor_config: self.executor_config.unwrap_or_default(),
            rendered_fields: self.rendered_fields.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskInstanceUpdate {
    pub dag_id: Option<Id>,
    pub run_id: Option<Id>,
    pub task_id: Option<Id>,
    pub state: Option<TaskInstanceState>,
    pub try_number: Option<i64>,
    pub max_tries: Option<i64>,
    #[serde(default)]
    pub start_date: UpdateValue<Timestamp>,
    #[serde(default)]
    pub end_date: UpdateValue<Timestamp>,
    #[serde(default)]
    pub duration: UpdateValue<f64>,
    pub pool: Option<String>,
    pub queue: Option<String>,
    pub priority_weight: Option<i32>,
    pub operator: Option<String>,
    #[serde(default)]
    pub queued_when: UpdateValue<Timestamp>,
    #[serde(default)]
    pub pid: UpdateValue<u32>,
    #[serde(default)]
    pub queued_by_job_id: UpdateValue<String>,
    pub executor_config: Option<JsonObject>,
    pub rendered_fields: Option<JsonObject>,
}

/// Body of the set-state action.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SetTaskInstanceState {
    pub new_state: TaskInstanceState,
    #[serde(default)]
    pub dry_run: bool,
}

impl SetTaskInstanceState {
    pub fn new(new_state: TaskInstanceState) -> Self {
        Self {
            new_state,
            dry_run: false,
        }
    }
}

/// Options of the clear action.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ClearTaskInstance {
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub only_failed: bool,
    #[serde(default)]
    pub only_running: bool,
}

impl ClearTaskInstance {
    pub fn applies_to(&self, state: TaskInstanceState) -> bool {
        !(self.only_failed && state != TaskInstanceState::Failed)
            && !(self.only_running && state != TaskInstanceState::Running)
    }
}

/// Result of the set-state and clear actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInstanceAction {
    pub dag_id: Id,
    pub run_id: Id,
    pub task_id: Id,
    pub state: TaskInstanceState,
    pub message: String,
}

impl TaskInstanceAction {
    pub fn new(task: &TaskInstance, message: impl Into<String>) -> Self {
        Self {
            dag_id: task.dag_id.clone(),
            run_id: task.run_id.clone(),
            task_id: task.task_id.clone(),
            state: task.state,
            message: message.into(),
        }
    }
}

impl Orderable for TaskInstance {
    const ORDER_FIELDS: &'static [&'static str] = &[
        "task_id",
        "state",
        "try_number",
        "start_date",
        "end_date",
        "priority_weight",
    ];

    fn order_key(&self, field: &str) -> Option<OrderKey> {
        match field {
            "task_id" => Some(OrderKey::text(&self.task_id)),
            "state" => Some(OrderKey::text(self.state.as_str())),
            "try_number" => Some(OrderKey::Number(i64::from(self.try_number))),
            "start_date" => Some(OrderKey::Time(self.start_date)),
            "end_date" => Some(OrderKey::Time(self.end_date)),
            "priority_weight" => Some(OrderKey::Number(i64::from(self.priority_weight))),
            _ => None,
        }
    }
}
