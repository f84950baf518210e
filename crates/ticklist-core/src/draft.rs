use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::task::{Priority, Task, TaskColor};

/// State of the add/edit form before it is submitted.
///
/// The form always carries a due timestamp so toggling `has_due` back on
/// restores the last picked value; only `submit` decides whether it is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    editing: Option<EditTarget>,
    pub title: String,
    pub notes: String,
    pub has_due: bool,
    pub due: DateTime<Utc>,
    pub priority: Priority,
    pub color: TaskColor,
    pub notify: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct EditTarget {
    uuid: Uuid,
    completed: bool,
}

impl TaskDraft {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            editing: None,
            title: String::new(),
            notes: String::new(),
            has_due: false,
            due: now,
            priority: Priority::Medium,
            color: TaskColor::Blue,
            notify: false,
        }
    }

    pub fn editing(task: &Task, now: DateTime<Utc>) -> Self {
        Self {
            editing: Some(EditTarget {
                uuid: task.uuid,
                completed: task.completed,
            }),
            title: task.title.clone(),
            notes: task.notes.clone().unwrap_or_default(),
            has_due: task.due.is_some(),
            due: task.due.unwrap_or(now),
            priority: task.priority,
            color: task.color,
            notify: task.notify.unwrap_or(false),
        }
    }

    pub fn is_edit(&self) -> bool {
        self.editing.is_some()
    }

    pub fn can_submit(&self) -> bool {
        !self.title.trim().is_empty()
    }

    /// Builds the task the form describes, or `None` while submission is
    /// disabled.
    pub fn submit(self) -> Option<Task> {
        if !self.can_submit() {
            debug!("submit disabled: title is empty");
            return None;
        }

        let (uuid, completed) = match self.editing {
            Some(target) => (target.uuid, target.completed),
            None => (Uuid::new_v4(), false),
        };
        let due = self.has_due.then_some(self.due);
        let notify = due.map(|_| self.notify);
        let notes = if self.notes.is_empty() {
            None
        } else {
            Some(self.notes)
        };

        Some(Task {
            uuid,
            title: self.title,
            completed,
            due,
            notes,
            priority: self.priority,
            color: self.color,
            notify,
        })
    }
}
