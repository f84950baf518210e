use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{Config, parse_bool};
use crate::reminder::{NotificationCenter, PermissionReply, PermissionStatus, ReminderRequest};

/// In-process notification center for the shell: alarms live in memory and
/// are printed once their fire time passes.
#[derive(Debug)]
pub struct TerminalNotificationCenter {
    status: Cell<PermissionStatus>,
    grant_on_request: bool,
    alarms: RefCell<BTreeMap<Uuid, ReminderRequest>>,
}

impl TerminalNotificationCenter {
    pub fn new(status: PermissionStatus, grant_on_request: bool) -> Self {
        Self {
            status: Cell::new(status),
            grant_on_request,
            alarms: RefCell::new(BTreeMap::new()),
        }
    }

    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let status = cfg
            .notify_permission()
            .context("failed to read notification settings")?;
        let grant_on_request = cfg
            .get("notify.grant")
            .map(|raw| parse_bool(&raw))
            .unwrap_or(true);
        debug!(?status, grant_on_request, "initialized terminal notification center");
        Ok(Self::new(status, grant_on_request))
    }

    /// Scheduled alarms, earliest first.
    pub fn pending(&self) -> Vec<ReminderRequest> {
        let mut alarms: Vec<ReminderRequest> = self.alarms.borrow().values().cloned().collect();
        alarms.sort_by_key(|alarm| alarm.fire_at);
        alarms
    }

    /// Removes and returns every alarm whose fire time is at or before `now`.
    pub fn take_due(&self, now: DateTime<Utc>, tz: Tz) -> Vec<ReminderRequest> {
        let mut alarms = self.alarms.borrow_mut();
        let due_ids: Vec<Uuid> = alarms
            .values()
            .filter(|alarm| match alarm.fire_at.to_utc(tz) {
                Ok(fire_time) => fire_time <= now,
                Err(err) => {
                    warn!(id = %alarm.id, error = %err, "unresolvable fire time; firing now");
                    true
                }
            })
            .map(|alarm| alarm.id)
            .collect();

        let mut fired: Vec<ReminderRequest> = due_ids
            .iter()
            .filter_map(|id| alarms.remove(id))
            .collect();
        fired.sort_by_key(|alarm| alarm.fire_at);
        fired
    }
}

impl NotificationCenter for TerminalNotificationCenter {
    fn permission_status(&self) -> PermissionStatus {
        self.status.get()
    }

    fn request_permission(&self, reply: PermissionReply) {
        let granted = self.grant_on_request;
        self.status.set(if granted {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        });
        info!(task = %reply.task(), granted, "notification permission answered");
        reply.resolve(granted);
    }

    fn schedule_one_shot(&self, request: ReminderRequest) -> anyhow::Result<()> {
        if self.status.get() != PermissionStatus::Granted {
            return Err(anyhow!("notifications are not authorized"));
        }
        debug!(id = %request.id, fire_at = %request.fire_at, "alarm stored");
        self.alarms.borrow_mut().insert(request.id, request);
        Ok(())
    }

    fn cancel(&self, id: Uuid) {
        if self.alarms.borrow_mut().remove(&id).is_some() {
            debug!(%id, "alarm removed");
        }
    }
}
