//! The `Agent` trait and the task envelope every agent speaks.
//!
//! Agents never let internal errors escape `run`: anything that goes
//! wrong is converted into `TaskOutput { status: Failed, errors }` so the
//! orchestrator can decide per command whether a failure is fatal.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Terminal status of an agent task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Completed,
    Failed,
}

/// Uniform input envelope handed to an agent.
///
/// `context` carries the task-specific payload; typed agents deserialize
/// it into their own task struct and fail cleanly on mismatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInput {
    pub task_type: String,
    pub target: String,
    #[serde(default)]
    pub context: serde_json::Value,
}

impl TaskInput {
    pub fn new(task_type: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            task_type: task_type.into(),
            target: target.into(),
            context: serde_json::Value::Null,
        }
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }
}

/// Uniform output envelope returned by an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutput {
    pub status: TaskStatus,
    #[serde(default)]
    pub result: serde_json::Value,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl TaskOutput {
    pub fn completed(result: serde_json::Value) -> Self {
        Self {
            status: TaskStatus::Completed,
            result,
            errors: Vec::new(),
        }
    }

    pub fn failed(errors: Vec<String>) -> Self {
        Self {
            status: TaskStatus::Failed,
            result: serde_json::Value::Null,
            errors,
        }
    }

    pub fn failed_with(message: impl Into<String>) -> Self {
        Self::failed(vec![message.into()])
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}

/// A unit of work in the orchestration pipeline.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Unique name identifying this agent.
    fn name(&self) -> &str;

    /// Human-readable description of what this agent does.
    fn description(&self) -> &str;

    /// Execute the task. Must not panic or return early with an error:
    /// every failure is reported through the returned `TaskOutput`.
    async fn run(&self, task: TaskInput) -> TaskOutput;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Agent for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes the task target back"
        }

        async fn run(&self, task: TaskInput) -> TaskOutput {
            TaskOutput::completed(serde_json::json!({ "target": task.target }))
        }
    }

    #[tokio::test]
    async fn agent_round_trip() {
        let out = Echo.run(TaskInput::new("echo", "hello")).await;
        assert!(out.is_completed());
        assert_eq!(out.result["target"], "hello");
    }

    #[test]
    fn failed_output_carries_errors() {
        let out = TaskOutput::failed_with("boom");
        assert_eq!(out.status, TaskStatus::Failed);
        assert_eq!(out.errors, vec!["boom".to_string()]);
    }

    #[test]
    fn task_output_serializes_snake_case_status() {
        let json = serde_json::to_value(TaskOutput::completed(serde_json::Value::Null)).unwrap();
        assert_eq!(json["status"], "completed");
    }
}
