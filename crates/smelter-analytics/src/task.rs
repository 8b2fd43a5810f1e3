// Task hit events

use serde::{Deserialize, Serialize};
use std::fmt;

/// Names of the tasks Smelter ships with
///
/// Anything not in this list was defined by the user or a plugin.
pub const BUILTIN_TASK_NAMES: &[&str] = &[
    "check",
    "clean",
    "compile",
    "compile:get-source-paths",
    "compile:get-source-names",
    "compile:get-dependency-graph",
    "compile:get-compilation-jobs",
    "compile:run-compiler",
    "compile:emit-artifacts",
    "console",
    "flatten",
    "flatten:get-flattened-sources",
    "help",
    "node",
    "run",
    "test",
    "test:get-test-files",
    "test:setup-test-environment",
    "test:run-tests",
];

/// Whether a task ships with Smelter or was user-defined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Builtin,
    Custom,
}

impl TaskKind {
    /// Classify a task by membership in [`BUILTIN_TASK_NAMES`]
    pub fn classify(task_name: &str) -> Self {
        if BUILTIN_TASK_NAMES.contains(&task_name) {
            TaskKind::Builtin
        } else {
            TaskKind::Custom
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Builtin => "builtin",
            TaskKind::Custom => "custom",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single task invocation worth reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskEvent {
    pub task_name: String,
    pub task_kind: TaskKind,
}

impl TaskEvent {
    /// Build an event, classifying the task name
    pub fn new(task_name: impl Into<String>) -> Self {
        let task_name = task_name.into();
        let task_kind = TaskKind::classify(&task_name);
        Self {
            task_name,
            task_kind,
        }
    }
}
