use serde::{Deserialize, Serialize};

use crate::model::{TaskInstance, TaskInstanceState, Timestamp};

/// Log output of one try of a task instance. Logs are rendered from the
/// task's stored facts rather than kept as separate records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskLog {
    pub try_number: u32,
    pub content: String,
    pub timestamp: Timestamp,
}

impl TaskLog {
    pub fn render(task: &TaskInstance, try_number: u32, at: Timestamp) -> Self {
        let started = task.start_date.unwrap_or(at).to_rfc3339();
        let mut lines = vec![
            format!(
                "[{}] {{taskinstance.py}} INFO - Dependencies all met for <TaskInstance: {}.{} {} [{}]>",
                started,
                task.dag_id,
                task.task_id,
                task.run_id,
                task.state.as_str()
            ),
            format!(
                "[{}] {{taskinstance.py}} INFO - Starting attempt {} of {}",
                started,
                try_number,
                task.max_tries + 1
            ),
            format!(
                "[{}] {{taskinstance.py}} INFO - Executing <Task({}): {}> on pool {}",
                started, task.operator, task.task_id, task.pool
            ),
        ];

        // Earlier tries always ended in a retry; only the latest try reflects
        // the current state.
        let finished = task.end_date.unwrap_or(at).to_rfc3339();
        if try_number < task.try_number {
            lines.push(format!(
                "[{}] {{taskinstance.py}} INFO - Marking task as UP_FOR_RETRY",
                finished
            ));
        } else if task.state.is_finished() {
            lines.push(format!(
                "[{}] {{taskinstance.py}} INFO - Marking task as {}",
                finished,
                task.state.as_str().to_uppercase()
            ));
        } else if task.state == TaskInstanceState::Running {
            lines.push(format!("[{}] {{taskinstance.py}} INFO - Task is running", at.to_rfc3339()));
        }

        Self {
            try_number,
            content: lines.join("\n"),
            timestamp: at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewTaskInstance;

    #[test]
    fn test_render_latest_try() {
        let mut task = NewTaskInstance::with_id("load")
            .into_task_instance("etl", "r1")
            .unwrap();
        task.try_number = 2;
        task.set_state(TaskInstanceState::Failed, chrono::Utc::now());

        let first = TaskLog::render(&task, 1, chrono::Utc::now());
        assert!(first.content.contains("UP_FOR_RETRY"));

        let latest = TaskLog::render(&task, 2, chrono::Utc::now());
        assert!(latest.content.contains("Marking task as FAILED"));
        assert!(latest.content.contains("<Task(PythonOperator): load>"));
        assert_eq!(latest.try_number, 2);
    }
}
