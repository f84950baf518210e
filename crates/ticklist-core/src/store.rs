use std::collections::HashSet;

use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::task::Task;

/// Error type for store mutations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("task not found: {0}")]
    NotFound(Uuid),
    #[error("reorder is not a permutation of the stored tasks (expected {expected} ids, got {got})")]
    NotAPermutation { expected: usize, got: usize },
}

/// Owns every task in store order. Callers receive copies and hand back
/// full replacements.
#[derive(Debug, Clone, Default)]
pub struct TaskStore {
    tasks: Vec<Task>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.tasks.iter().map(|task| task.uuid).collect()
    }

    pub fn get(&self, uuid: Uuid) -> Option<&Task> {
        self.tasks.iter().find(|task| task.uuid == uuid)
    }

    pub fn position(&self, uuid: Uuid) -> Option<usize> {
        self.tasks.iter().position(|task| task.uuid == uuid)
    }

    #[instrument(skip(self, task), fields(uuid = %task.uuid))]
    pub fn add(&mut self, task: Task) {
        self.tasks.push(task);
        debug!(count = self.tasks.len(), "task appended");
    }

    #[instrument(skip(self, task), fields(uuid = %task.uuid))]
    pub fn update(&mut self, task: Task) -> Result<(), StoreError> {
        let idx = self
            .position(task.uuid)
            .ok_or(StoreError::NotFound(task.uuid))?;
        self.tasks[idx] = task;
        Ok(())
    }

    #[instrument(skip(self, ids))]
    pub fn remove(&mut self, ids: &HashSet<Uuid>) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|task| !ids.contains(&task.uuid));
        let removed = before - self.tasks.len();
        info!(requested = ids.len(), removed, "removed tasks");
        removed
    }

    #[instrument(skip(self, new_order))]
    pub fn reorder(&mut self, new_order: &[Uuid]) -> Result<(), StoreError> {
        let not_permutation = StoreError::NotAPermutation {
            expected: self.tasks.len(),
            got: new_order.len(),
        };
        if new_order.len() != self.tasks.len() {
            return Err(not_permutation);
        }

        let mut slots: Vec<Option<Task>> = self.tasks.iter().cloned().map(Some).collect();
        let mut reordered = Vec::with_capacity(slots.len());
        for uuid in new_order {
            let taken = self
                .tasks
                .iter()
                .position(|task| task.uuid == *uuid)
                .and_then(|idx| slots[idx].take());
            match taken {
                Some(task) => reordered.push(task),
                None => return Err(not_permutation),
            }
        }

        self.tasks = reordered;
        debug!(count = self.tasks.len(), "store order replaced");
        Ok(())
    }
}
