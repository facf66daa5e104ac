//! Static task-type → provider preference table.
//!
//! The table encodes assumed per-provider strengths; it is configuration,
//! not something the router learns.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::TaskType;

/// Ordered provider preference per task type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoutingTable {
    preferences: HashMap<String, Vec<String>>,
}

impl RoutingTable {
    /// An empty table: every task falls through to registration order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in preferences for the `openai`, `anthropic` and `gemini`
    /// providers.
    pub fn builtin() -> Self {
        let mut table = Self::new();
        table.set(TaskType::Learning, ["anthropic", "openai", "gemini"]);
        table.set(TaskType::QuestionGeneration, ["openai", "anthropic", "gemini"]);
        table.set(TaskType::Code, ["openai", "anthropic", "gemini"]);
        table.set(TaskType::Analysis, ["anthropic", "gemini", "openai"]);
        table.set(TaskType::Creative, ["openai", "gemini", "anthropic"]);
        table.set(TaskType::Reasoning, ["anthropic", "openai", "gemini"]);
        table.set(TaskType::Chat, ["openai", "anthropic", "gemini"]);
        table.set(TaskType::Generation, ["openai", "gemini", "anthropic"]);
        table
    }

    /// Replace the preference order for a task type.
    pub fn set<I, S>(&mut self, task_type: TaskType, order: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preferences.insert(
            task_type.as_str().to_string(),
            order.into_iter().map(Into::into).collect(),
        );
    }

    /// Preference order for a task type; empty when none is configured.
    pub fn preferred_order(&self, task_type: TaskType) -> &[String] {
        self.preferences
            .get(task_type.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every `(task, provider id)` pair mentioned in the table.
    pub fn referenced_providers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.preferences
            .iter()
            .flat_map(|(task, ids)| ids.iter().map(move |id| (task.as_str(), id.as_str())))
    }

    /// Task names that are not known task types.
    pub fn unknown_tasks(&self) -> Vec<&str> {
        self.preferences
            .keys()
            .map(String::as_str)
            .filter(|task| TaskType::parse(task) == TaskType::Unknown)
            .collect()
    }
}
