use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::draft::TaskDraft;
use crate::gesture;
use crate::ordering::project;
use crate::reminder::{Arming, FireAt, ReminderScheduler};
use crate::store::TaskStore;
use crate::task::Task;

/// Something the user should be told after an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    ReminderScheduled { task: Uuid, fire_at: FireAt },
    AwaitingPermission { task: Uuid },
    NotifyReverted { task: Uuid },
    /// Notifications are off at the platform level; point the user at the
    /// system settings.
    SettingsPrompt,
}

/// Single-threaded owner of the task list and its reminders.
///
/// Every mutation goes through here. Gesture operations take offsets into
/// [`Session::projected`], never store positions.
#[derive(Debug)]
pub struct Session {
    store: TaskStore,
    reminders: ReminderScheduler,
    notices: Vec<Notice>,
}

impl Session {
    pub fn new(reminders: ReminderScheduler) -> Self {
        Self {
            store: TaskStore::new(),
            reminders,
            notices: Vec::new(),
        }
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn reminders(&self) -> &ReminderScheduler {
        &self.reminders
    }

    pub fn projected(&self) -> Vec<Task> {
        project(self.store.tasks())
    }

    pub fn task_at(&self, offset: usize) -> Option<Task> {
        self.projected().into_iter().nth(offset)
    }

    /// Returns the new task's id, or `None` when the draft cannot be
    /// submitted.
    #[instrument(skip(self, draft))]
    pub fn add(&mut self, draft: TaskDraft) -> Option<Uuid> {
        let task = draft.submit()?;
        let uuid = task.uuid;
        self.store.add(task.clone());
        info!(%uuid, title = %task.title, "task added");
        self.arm(&task);
        Some(uuid)
    }

    #[instrument(skip(self))]
    pub fn toggle(&mut self, offset: usize) -> Option<Uuid> {
        let Some(task) = self.task_at(offset) else {
            debug!("stale toggle offset ignored");
            return None;
        };
        let next = task.toggled();
        let uuid = next.uuid;
        match self.store.update(next) {
            Ok(()) => Some(uuid),
            Err(err) => {
                warn!(error = %err, "toggle failed");
                None
            }
        }
    }

    /// Opens the edit form for the task at `offset`, lets `fill` change it,
    /// and submits the result as a full replacement.
    #[instrument(skip(self, fill))]
    pub fn edit<F>(&mut self, offset: usize, now: DateTime<Utc>, fill: F) -> Option<Uuid>
    where
        F: FnOnce(&mut TaskDraft),
    {
        let Some(task) = self.task_at(offset) else {
            debug!("stale edit offset ignored");
            return None;
        };
        let mut draft = TaskDraft::editing(&task, now);
        fill(&mut draft);
        let replacement = draft.submit()?;
        let uuid = replacement.uuid;
        self.replace(replacement).then_some(uuid)
    }

    #[instrument(skip(self, task), fields(uuid = %task.uuid))]
    pub fn replace(&mut self, task: Task) -> bool {
        let Some(old) = self.store.get(task.uuid).cloned() else {
            warn!("replacement for unknown task ignored");
            return false;
        };
        if let Err(err) = self.store.update(task.clone()) {
            warn!(error = %err, "replace failed");
            return false;
        }

        if old.reminder_differs(&task) {
            self.reminders.cancel(task.uuid);
            self.arm(&task);
        }
        true
    }

    #[instrument(skip(self, offsets))]
    pub fn delete(&mut self, offsets: &BTreeSet<usize>) -> Vec<Uuid> {
        let removed = gesture::delete_projected(&mut self.store, offsets);
        for uuid in &removed {
            self.reminders.cancel(*uuid);
        }
        removed
    }

    #[instrument(skip(self, sources))]
    pub fn move_tasks(&mut self, sources: &BTreeSet<usize>, destination: usize) {
        if let Err(err) = gesture::move_projected(&mut self.store, sources, destination) {
            warn!(error = %err, "move rejected");
        }
    }

    /// Applies permission answers that arrived since the last call.
    #[instrument(skip(self))]
    pub fn pump(&mut self) {
        for verdict in self.reminders.drain_verdicts() {
            let Some(task) = self.store.get(verdict.task).cloned() else {
                debug!(task = %verdict.task, "permission verdict for removed task");
                continue;
            };

            if verdict.granted {
                let outcome = self.reminders.complete_grant(&task);
                self.record_arming(&task, outcome);
            } else {
                self.revert_notify(task.uuid);
            }
        }
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn arm(&mut self, task: &Task) {
        let outcome = self.reminders.arm(task);
        self.record_arming(task, outcome);
    }

    fn record_arming(&mut self, task: &Task, outcome: anyhow::Result<Arming>) {
        match outcome {
            Ok(Arming::Scheduled(fire_at)) => self.notices.push(Notice::ReminderScheduled {
                task: task.uuid,
                fire_at,
            }),
            Ok(Arming::AwaitingPermission) => {
                self.notices
                    .push(Notice::AwaitingPermission { task: task.uuid });
            }
            Ok(Arming::Denied) => self.revert_notify(task.uuid),
            Ok(Arming::Skipped | Arming::AlreadyScheduled) => {}
            Err(err) => {
                warn!(uuid = %task.uuid, error = %err, "failed to schedule reminder");
            }
        }
    }

    fn revert_notify(&mut self, uuid: Uuid) {
        let Some(mut task) = self.store.get(uuid).cloned() else {
            return;
        };
        if task.notify != Some(true) {
            return;
        }
        task.notify = Some(false);
        if self.store.update(task).is_ok() {
            info!(%uuid, "notification permission denied; notify reverted");
            self.notices.push(Notice::NotifyReverted { task: uuid });
            self.notices.push(Notice::SettingsPrompt);
        }
    }
}
