use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use ticklist_core::draft::TaskDraft;
use ticklist_core::reminder::{
    NotificationCenter, PermissionReply, PermissionStatus, ReminderRequest, ReminderScheduler,
};
use ticklist_core::session::{Notice, Session};
use uuid::Uuid;

#[derive(Default)]
struct FakeCenter {
    status: RefCell<Option<PermissionStatus>>,
    replies: RefCell<Vec<PermissionReply>>,
    scheduled: RefCell<Vec<ReminderRequest>>,
    cancelled: RefCell<Vec<Uuid>>,
}

impl FakeCenter {
    fn new(status: PermissionStatus) -> Rc<Self> {
        let center = Self::default();
        *center.status.borrow_mut() = Some(status);
        Rc::new(center)
    }

    fn answer_all(&self, granted: bool) {
        *self.status.borrow_mut() = Some(if granted {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        });
        for reply in self.replies.borrow_mut().drain(..) {
            reply.resolve(granted);
        }
    }

    fn scheduled_ids(&self) -> Vec<Uuid> {
        self.scheduled.borrow().iter().map(|req| req.id).collect()
    }
}

impl NotificationCenter for FakeCenter {
    fn permission_status(&self) -> PermissionStatus {
        self.status.borrow().unwrap_or(PermissionStatus::Undetermined)
    }

    fn request_permission(&self, reply: PermissionReply) {
        self.replies.borrow_mut().push(reply);
    }

    fn schedule_one_shot(&self, request: ReminderRequest) -> anyhow::Result<()> {
        self.scheduled.borrow_mut().push(request);
        Ok(())
    }

    fn cancel(&self, id: Uuid) {
        self.cancelled.borrow_mut().push(id);
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 20, 9, 0, 0)
        .single()
        .expect("valid now")
}

fn session_with(center: &Rc<FakeCenter>) -> Session {
    Session::new(ReminderScheduler::new(center.clone(), chrono_tz::UTC))
}

fn draft(title: &str) -> TaskDraft {
    let mut draft = TaskDraft::new(now());
    draft.title = title.to_string();
    draft
}

fn reminder_draft(title: &str) -> TaskDraft {
    let mut draft = draft(title);
    draft.has_due = true;
    draft.due = now() + Duration::hours(5);
    draft.notify = true;
    draft
}

fn projected_titles(session: &Session) -> Vec<String> {
    session.projected().into_iter().map(|task| task.title).collect()
}

fn store_titles(session: &Session) -> Vec<String> {
    session
        .store()
        .tasks()
        .iter()
        .map(|task| task.title.clone())
        .collect()
}

fn offsets(values: &[usize]) -> BTreeSet<usize> {
    values.iter().copied().collect()
}

#[test]
fn completed_tasks_sink_and_delete_uses_projected_offsets() {
    let center = FakeCenter::new(PermissionStatus::Granted);
    let mut session = session_with(&center);
    for title in ["A", "B", "C"] {
        session.add(draft(title)).expect("added");
    }

    session.toggle(1).expect("toggle B");
    assert_eq!(projected_titles(&session), vec!["A", "C", "B"]);
    assert_eq!(store_titles(&session), vec!["A", "B", "C"]);

    let removed = session.delete(&offsets(&[2]));
    assert_eq!(removed.len(), 1);
    assert_eq!(store_titles(&session), vec!["A", "C"]);
}

#[test]
fn empty_title_is_not_added() {
    let center = FakeCenter::new(PermissionStatus::Granted);
    let mut session = session_with(&center);
    assert_eq!(session.add(draft("")), None);
    assert!(session.store().is_empty());

    let id = session.add(draft("Buy milk")).expect("added");
    let task = session.store().get(id).expect("stored");
    assert_eq!(task.notify, None);
    assert!(center.scheduled.borrow().is_empty());
}

#[test]
fn stale_offsets_are_ignored() {
    let center = FakeCenter::new(PermissionStatus::Granted);
    let mut session = session_with(&center);
    session.add(draft("Only")).expect("added");

    assert_eq!(session.toggle(4), None);
    assert_eq!(session.edit(4, now(), |d| d.title = "x".into()), None);
    assert!(session.delete(&offsets(&[9])).is_empty());
    session.move_tasks(&offsets(&[3]), 0);
    assert_eq!(store_titles(&session), vec!["Only"]);
}

#[test]
fn drag_among_open_tasks_updates_store_order() {
    let center = FakeCenter::new(PermissionStatus::Granted);
    let mut session = session_with(&center);
    for title in ["A", "B", "C", "D"] {
        session.add(draft(title)).expect("added");
    }
    session.toggle(1).expect("complete B");
    assert_eq!(projected_titles(&session), vec!["A", "C", "D", "B"]);

    // Drag D (projected 2) above A (projected 0).
    session.move_tasks(&offsets(&[2]), 0);
    assert_eq!(store_titles(&session), vec!["D", "A", "B", "C"]);
    assert_eq!(projected_titles(&session), vec!["D", "A", "C", "B"]);
}

#[test]
fn granted_permission_schedules_immediately() {
    let center = FakeCenter::new(PermissionStatus::Granted);
    let mut session = session_with(&center);
    let id = session.add(reminder_draft("Pay rent")).expect("added");

    assert_eq!(center.scheduled_ids(), vec![id]);
    let notices = session.take_notices();
    assert!(matches!(notices.as_slice(), [Notice::ReminderScheduled { task, .. }] if *task == id));
    assert!(session.reminders().is_scheduled(id));
}

#[test]
fn denied_permission_reverts_notify_and_prompts() {
    let center = FakeCenter::new(PermissionStatus::Denied);
    let mut session = session_with(&center);
    let id = session.add(reminder_draft("Pay rent")).expect("added");

    assert!(center.scheduled.borrow().is_empty());
    assert_eq!(session.store().get(id).expect("stored").notify, Some(false));
    assert_eq!(
        session.take_notices(),
        vec![Notice::NotifyReverted { task: id }, Notice::SettingsPrompt]
    );
}

#[test]
fn permission_answer_is_applied_when_pumped() {
    let center = FakeCenter::new(PermissionStatus::Undetermined);
    let mut session = session_with(&center);
    let id = session.add(reminder_draft("Call dentist")).expect("added");

    assert_eq!(session.take_notices(), vec![Notice::AwaitingPermission { task: id }]);
    assert_eq!(session.store().get(id).expect("stored").notify, Some(true));

    center.answer_all(false);
    // Nothing changes until the session drains the answer on its own thread.
    assert_eq!(session.store().get(id).expect("stored").notify, Some(true));

    session.pump();
    assert_eq!(session.store().get(id).expect("stored").notify, Some(false));
    assert_eq!(
        session.take_notices(),
        vec![Notice::NotifyReverted { task: id }, Notice::SettingsPrompt]
    );
    assert!(center.scheduled.borrow().is_empty());
}

#[test]
fn granted_answer_schedules_current_task_state() {
    let center = FakeCenter::new(PermissionStatus::Undetermined);
    let mut session = session_with(&center);
    let id = session.add(reminder_draft("Call dentist")).expect("added");

    session
        .edit(0, now(), |d| d.notes = "ask about cleaning".into())
        .expect("edited");
    assert_eq!(center.replies.borrow().len(), 1);

    center.answer_all(true);
    session.pump();

    let scheduled = center.scheduled.borrow();
    assert_eq!(scheduled.len(), 1);
    assert_eq!(scheduled[0].id, id);
    assert_eq!(scheduled[0].body, "ask about cleaning");
}

#[test]
fn answer_for_deleted_task_is_dropped() {
    let center = FakeCenter::new(PermissionStatus::Undetermined);
    let mut session = session_with(&center);
    session.add(reminder_draft("Short lived")).expect("added");
    session.delete(&offsets(&[0]));

    center.answer_all(false);
    session.pump();
    assert!(session.store().is_empty());
    assert!(
        session
            .take_notices()
            .iter()
            .all(|notice| !matches!(notice, Notice::SettingsPrompt))
    );
}

#[test]
fn editing_reminder_fields_reschedules_and_delete_cancels() {
    let center = FakeCenter::new(PermissionStatus::Granted);
    let mut session = session_with(&center);
    let id = session.add(reminder_draft("Standup")).expect("added");

    session.edit(0, now(), |d| d.priority = ticklist_core::task::Priority::High);
    assert_eq!(center.scheduled_ids(), vec![id]);
    assert!(center.cancelled.borrow().is_empty());

    session.edit(0, now(), |d| d.due = now() + Duration::days(1));
    assert_eq!(center.scheduled_ids(), vec![id, id]);
    assert_eq!(center.cancelled.borrow().as_slice(), &[id]);
    assert_eq!(
        center.scheduled.borrow()[1].fire_at.to_string(),
        "2026-05-21 09:00"
    );

    session.edit(0, now(), |d| d.has_due = false);
    assert_eq!(center.cancelled.borrow().len(), 2);
    assert!(!session.reminders().is_scheduled(id));

    session.edit(0, now(), |d| {
        d.has_due = true;
        d.notify = true;
    });
    assert!(session.reminders().is_scheduled(id));
    session.delete(&offsets(&[0]));
    assert_eq!(center.cancelled.borrow().len(), 3);
}

#[test]
fn task_without_due_date_never_schedules_even_with_notify() {
    let center = FakeCenter::new(PermissionStatus::Granted);
    let mut session = session_with(&center);
    let mut draft = draft("Read book");
    draft.notify = true;
    let id = session.add(draft).expect("added");

    let mut stored = session.store().get(id).cloned().expect("stored");
    stored.notify = Some(true);
    assert!(session.replace(stored));

    assert!(center.scheduled.borrow().is_empty());
    assert!(center.replies.borrow().is_empty());
}
