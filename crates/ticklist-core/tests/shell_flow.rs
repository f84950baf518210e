use chrono::{DateTime, Duration, TimeZone, Utc};
use ticklist_core::commands::{Flow, Shell};
use ticklist_core::config::Config;
use ticklist_core::render::Renderer;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 20, 9, 0, 0)
        .single()
        .expect("valid now")
}

fn shell_with(overrides: &[(&str, &str)]) -> Shell {
    let mut cfg = Config::default();
    cfg.apply_overrides(
        overrides
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string())),
    );
    Shell::new(&cfg, Renderer::plain(chrono_tz::UTC), chrono_tz::UTC).expect("shell")
}

fn run(shell: &mut Shell, line: &str) -> String {
    let mut out = Vec::new();
    let flow = shell.execute(line, now(), &mut out).expect("command");
    assert_eq!(flow, Flow::Continue);
    String::from_utf8(out).expect("utf8")
}

fn titles(shell: &Shell) -> Vec<String> {
    shell
        .session()
        .projected()
        .into_iter()
        .map(|task| task.title)
        .collect()
}

#[test]
fn add_toggle_and_list_keep_open_tasks_first() {
    let mut shell = shell_with(&[]);
    assert_eq!(run(&mut shell, "add Buy milk"), "Added task 0.\n");
    run(&mut shell, "add Walk dog pri:h");
    run(&mut shell, "add Call mom");

    assert_eq!(run(&mut shell, "toggle 0"), "Completed \"Buy milk\".\n");
    assert_eq!(titles(&shell), vec!["Walk dog", "Call mom", "Buy milk"]);

    let listing = run(&mut shell, "list");
    let rows: Vec<&str> = listing.lines().skip(2).collect();
    assert_eq!(rows.len(), 3);
    assert!(rows[0].starts_with("0 ") && rows[0].contains("Walk dog") && rows[0].contains("High"));
    assert!(rows[2].contains("[x]") && rows[2].contains("Buy milk"));

    assert_eq!(run(&mut shell, "tog 2"), "Reopened \"Buy milk\".\n");
    assert_eq!(titles(&shell), vec!["Buy milk", "Walk dog", "Call mom"]);
}

#[test]
fn empty_title_is_rejected() {
    let mut shell = shell_with(&[]);
    assert_eq!(
        run(&mut shell, "add pri:h"),
        "A title is required; nothing added.\n"
    );
    assert!(shell.session().store().is_empty());

    run(&mut shell, "add Draft");
    assert_eq!(
        run(&mut shell, "edit 0 title:\"   \""),
        "A title is required; edit discarded.\n"
    );
    assert_eq!(titles(&shell), vec!["Draft"]);
}

#[test]
fn delete_and_move_use_displayed_rows() {
    let mut shell = shell_with(&[]);
    for title in ["A", "B", "C"] {
        run(&mut shell, &format!("add {title}"));
    }
    run(&mut shell, "toggle 1");
    assert_eq!(titles(&shell), vec!["A", "C", "B"]);

    assert_eq!(run(&mut shell, "move 1 to 0"), "Moved 1 task(s).\n");
    assert_eq!(titles(&shell), vec!["C", "A", "B"]);
    assert_eq!(run(&mut shell, "move 0 to 1"), "Order unchanged.\n");

    assert_eq!(run(&mut shell, "delete 2"), "Deleted 1 task(s).\n");
    assert_eq!(titles(&shell), vec!["C", "A"]);
    assert_eq!(run(&mut shell, "delete 7"), "Deleted 0 task(s).\n");
    assert_eq!(run(&mut shell, "info 7"), "No task at 7.\n");
}

#[test]
fn first_reminder_asks_for_permission_then_schedules() {
    let mut shell = shell_with(&[]);
    let out = run(
        &mut shell,
        "add \"Pay rent\" due:2026-05-20T14:30 notes:\"landlord account\" notify:yes",
    );
    assert_eq!(
        out,
        "Added task 0.\nAsking for notification permission...\nReminder set for 2026-05-20 14:30.\n"
    );

    let listed = run(&mut shell, "reminders");
    assert!(listed.contains("2026-05-20 14:30") && listed.contains("Pay rent"));

    let mut alerts = Vec::new();
    assert_eq!(shell.deliver_due(now(), &mut alerts).expect("deliver"), 0);
    let later = now() + Duration::hours(6);
    assert_eq!(shell.deliver_due(later, &mut alerts).expect("deliver"), 1);
    assert_eq!(
        String::from_utf8(alerts).expect("utf8"),
        "Reminder: Pay rent - landlord account\n"
    );
    assert_eq!(run(&mut shell, "reminders"), "No reminders scheduled.\n");
}

#[test]
fn denied_permission_turns_notify_off() {
    let mut shell = shell_with(&[("rc.notify.permission", "denied")]);
    let out = run(&mut shell, "add Standup due:2026-05-21T10:00 notify:on");
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines[0], "Added task 0.");
    assert_eq!(lines[1], "Reminder turned off for \"Standup\".");
    assert!(lines[2].starts_with("Notifications are disabled."));

    let task = shell.session().task_at(0).expect("task");
    assert_eq!(task.notify, Some(false));
    assert_eq!(run(&mut shell, "reminders"), "No reminders scheduled.\n");
}

#[test]
fn refused_request_reverts_after_asking() {
    let mut shell = shell_with(&[("notify.grant", "no")]);
    let out = run(&mut shell, "add Standup due:tomorrow notify:yes");
    assert!(out.contains("Asking for notification permission..."));
    assert!(out.contains("Reminder turned off for \"Standup\"."));
    assert_eq!(shell.session().task_at(0).expect("task").notify, Some(false));
}

#[test]
fn deleting_a_task_drops_its_reminder() {
    let mut shell = shell_with(&[("notify.permission", "granted")]);
    run(&mut shell, "add Dentist due:2026-05-22T08:15 notify:yes");
    assert!(run(&mut shell, "reminders").contains("Dentist"));

    run(&mut shell, "delete 0");
    assert_eq!(run(&mut shell, "reminders"), "No reminders scheduled.\n");
}

#[test]
fn bad_lines_are_errors_and_quit_stops() {
    let mut shell = shell_with(&[]);
    let mut out = Vec::new();
    assert!(shell.execute("frobnicate", now(), &mut out).is_err());
    assert!(shell.execute("toggle one", now(), &mut out).is_err());
    assert!(shell.execute("add x due:whenever", now(), &mut out).is_err());
    assert!(shell.session().store().is_empty());

    assert_eq!(
        shell.execute("# just a comment", now(), &mut out).expect("comment"),
        Flow::Continue
    );
    assert_eq!(shell.execute("quit", now(), &mut out).expect("quit"), Flow::Quit);
}

#[test]
fn out_of_range_due_offset_is_rejected() {
    let mut shell = shell_with(&[]);
    run(&mut shell, "add Keep me");

    let mut out = Vec::new();
    let err = shell
        .execute("add Trip due:+100000000d", now(), &mut out)
        .expect_err("offset overflows");
    assert!(format!("{err:#}").contains("+100000000d"));
    assert_eq!(titles(&shell), vec!["Keep me"]);

    let err = shell
        .execute("edit 0 due:+9999999999999d", now(), &mut out)
        .expect_err("offset overflows");
    assert!(format!("{err:#}").contains("too large"));
    assert_eq!(shell.session().task_at(0).expect("task").due, None);
    assert_eq!(run(&mut shell, "add Trip due:+2d"), "Added task 1.\n");
}

#[test]
fn export_prints_store_order_as_json() {
    let mut shell = shell_with(&[]);
    run(&mut shell, "add First");
    run(&mut shell, "add Second color:green");
    run(&mut shell, "toggle 0");

    let json: serde_json::Value = serde_json::from_str(&run(&mut shell, "export")).expect("json");
    let tasks = json.as_array().expect("array");
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0]["title"], "First");
    assert_eq!(tasks[0]["completed"], true);
    assert_eq!(tasks[1]["color"], "green");
}
