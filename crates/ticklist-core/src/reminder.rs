//! Due-date reminders.
//!
//! The platform notification service sits behind [`NotificationCenter`].
//! Permission requests are asynchronous: the center answers through a
//! [`PermissionReply`] whenever it likes, and the answers queue up until the
//! owning session drains them on its own thread.

use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, Sender};

use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::datetime::to_utc_from_local;
use crate::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    Granted,
    Denied,
    Undetermined,
}

/// Calendar components an alarm fires at. Seconds are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FireAt {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
}

impl FireAt {
    pub fn from_due(due: DateTime<Utc>, tz: Tz) -> Self {
        let local = due.with_timezone(&tz);
        Self {
            year: local.year(),
            month: local.month(),
            day: local.day(),
            hour: local.hour(),
            minute: local.minute(),
        }
    }

    pub fn to_utc(&self, tz: Tz) -> anyhow::Result<DateTime<Utc>> {
        let naive = chrono::NaiveDate::from_ymd_opt(self.year, self.month, self.day)
            .and_then(|date| date.and_hms_opt(self.hour, self.minute, 0))
            .ok_or_else(|| anyhow::anyhow!("invalid fire time: {self}"))?;
        to_utc_from_local(naive, tz, "fire-at")
    }
}

impl fmt::Display for FireAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderRequest {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub fire_at: FireAt,
}

impl ReminderRequest {
    /// `None` unless the task has a due date and opted in.
    pub fn for_task(task: &Task, tz: Tz) -> Option<Self> {
        if !task.wants_reminder() {
            return None;
        }
        let due = task.due?;
        Some(Self {
            id: task.uuid,
            title: task.title.clone(),
            body: task.notes.clone().unwrap_or_default(),
            fire_at: FireAt::from_due(due, tz),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionVerdict {
    pub task: Uuid,
    pub granted: bool,
}

/// Answer slot handed to [`NotificationCenter::request_permission`].
#[derive(Debug)]
pub struct PermissionReply {
    task: Uuid,
    tx: Sender<PermissionVerdict>,
}

impl PermissionReply {
    pub fn task(&self) -> Uuid {
        self.task
    }

    pub fn resolve(self, granted: bool) {
        let verdict = PermissionVerdict {
            task: self.task,
            granted,
        };
        if self.tx.send(verdict).is_err() {
            debug!(task = %self.task, "permission verdict arrived after scheduler was dropped");
        }
    }
}

/// Platform notification service.
pub trait NotificationCenter {
    fn permission_status(&self) -> PermissionStatus;

    /// Asks the user for permission. The answer is delivered later through
    /// `reply`, possibly after this call returns.
    fn request_permission(&self, reply: PermissionReply);

    fn schedule_one_shot(&self, request: ReminderRequest) -> anyhow::Result<()>;

    fn cancel(&self, id: Uuid);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arming {
    /// No due date or notify is off; the center was not contacted.
    Skipped,
    Scheduled(FireAt),
    AlreadyScheduled,
    Denied,
    AwaitingPermission,
}

pub struct ReminderScheduler {
    center: Rc<dyn NotificationCenter>,
    tz: Tz,
    scheduled: HashSet<Uuid>,
    awaiting: HashSet<Uuid>,
    tx: Sender<PermissionVerdict>,
    rx: Receiver<PermissionVerdict>,
}

impl fmt::Debug for ReminderScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReminderScheduler")
            .field("tz", &self.tz)
            .field("scheduled", &self.scheduled)
            .field("awaiting", &self.awaiting)
            .finish_non_exhaustive()
    }
}

impl ReminderScheduler {
    pub fn new(center: Rc<dyn NotificationCenter>, tz: Tz) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            center,
            tz,
            scheduled: HashSet::new(),
            awaiting: HashSet::new(),
            tx,
            rx,
        }
    }

    pub fn is_scheduled(&self, id: Uuid) -> bool {
        self.scheduled.contains(&id)
    }

    pub fn is_awaiting(&self, id: Uuid) -> bool {
        self.awaiting.contains(&id)
    }

    #[instrument(skip(self, task), fields(uuid = %task.uuid))]
    pub fn arm(&mut self, task: &Task) -> anyhow::Result<Arming> {
        if !task.wants_reminder() {
            return Ok(Arming::Skipped);
        }
        if self.scheduled.contains(&task.uuid) {
            return Ok(Arming::AlreadyScheduled);
        }

        match self.center.permission_status() {
            PermissionStatus::Granted => self.schedule(task),
            PermissionStatus::Denied => {
                info!("notification permission denied; reminder not scheduled");
                Ok(Arming::Denied)
            }
            PermissionStatus::Undetermined => {
                if self.awaiting.insert(task.uuid) {
                    debug!("requesting notification permission");
                    self.center.request_permission(PermissionReply {
                        task: task.uuid,
                        tx: self.tx.clone(),
                    });
                } else {
                    debug!("permission request already outstanding");
                }
                Ok(Arming::AwaitingPermission)
            }
        }
    }

    /// Schedules after a granted permission request, re-checking the task's
    /// current state.
    pub fn complete_grant(&mut self, task: &Task) -> anyhow::Result<Arming> {
        if !task.wants_reminder() {
            return Ok(Arming::Skipped);
        }
        if self.scheduled.contains(&task.uuid) {
            return Ok(Arming::AlreadyScheduled);
        }
        self.schedule(task)
    }

    fn schedule(&mut self, task: &Task) -> anyhow::Result<Arming> {
        let Some(request) = ReminderRequest::for_task(task, self.tz) else {
            return Ok(Arming::Skipped);
        };
        let fire_at = request.fire_at;
        self.center.schedule_one_shot(request)?;
        self.scheduled.insert(task.uuid);
        info!(uuid = %task.uuid, %fire_at, "scheduled reminder");
        Ok(Arming::Scheduled(fire_at))
    }

    #[instrument(skip(self))]
    pub fn cancel(&mut self, id: Uuid) -> bool {
        if self.scheduled.remove(&id) {
            self.center.cancel(id);
            debug!("cancelled reminder");
            true
        } else {
            false
        }
    }

    /// Collects every permission answer that has arrived so far.
    pub fn drain_verdicts(&mut self) -> Vec<PermissionVerdict> {
        let mut verdicts = Vec::new();
        while let Ok(verdict) = self.rx.try_recv() {
            if !self.awaiting.remove(&verdict.task) {
                warn!(task = %verdict.task, "unexpected permission verdict");
            }
            verdicts.push(verdict);
        }
        verdicts
    }
}
