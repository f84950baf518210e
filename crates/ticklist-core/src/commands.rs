use std::collections::BTreeSet;
use std::io::Write;
use std::rc::Rc;

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::cli::Invocation;
use crate::config::{Config, parse_bool};
use crate::datetime::parse_due_expr;
use crate::draft::TaskDraft;
use crate::notifier::TerminalNotificationCenter;
use crate::reminder::ReminderScheduler;
use crate::render::Renderer;
use crate::session::{Notice, Session};
use crate::task::{Priority, TaskColor};

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "add",
        "list",
        "toggle",
        "edit",
        "delete",
        "move",
        "info",
        "export",
        "reminders",
        "help",
        "quit",
        "exit",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Line-oriented front end over a [`Session`].
pub struct Shell {
    session: Session,
    center: Rc<TerminalNotificationCenter>,
    renderer: Renderer,
    tz: Tz,
    default_priority: Priority,
    default_color: TaskColor,
}

impl Shell {
    pub fn new(cfg: &Config, renderer: Renderer, tz: Tz) -> anyhow::Result<Self> {
        let center = Rc::new(TerminalNotificationCenter::from_config(cfg)?);
        let scheduler = ReminderScheduler::new(center.clone(), tz);
        Ok(Self {
            session: Session::new(scheduler),
            center,
            renderer,
            tz,
            default_priority: cfg.default_priority()?,
            default_color: cfg.default_color()?,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Runs one shell line. Problems with the line come back as errors; the
    /// caller reports them and keeps going.
    #[instrument(skip(self, now, out))]
    pub fn execute<W: Write>(
        &mut self,
        line: &str,
        now: DateTime<Utc>,
        out: &mut W,
    ) -> anyhow::Result<Flow> {
        let Some(inv) = Invocation::parse(line)? else {
            return Ok(Flow::Continue);
        };
        debug!(command = %inv.command, args = ?inv.args, "dispatching command");

        let flow = self.dispatch(&inv, now, out);
        self.session.pump();
        self.report_notices(out)?;
        flow
    }

    /// Prints every reminder whose fire time has passed.
    pub fn deliver_due<W: Write>(&mut self, now: DateTime<Utc>, out: &mut W) -> anyhow::Result<usize> {
        let fired = self.center.take_due(now, self.tz);
        for alarm in &fired {
            info!(id = %alarm.id, "reminder fired");
            self.renderer.print_alert(out, alarm)?;
        }
        Ok(fired.len())
    }

    fn dispatch<W: Write>(
        &mut self,
        inv: &Invocation,
        now: DateTime<Utc>,
        out: &mut W,
    ) -> anyhow::Result<Flow> {
        let args = inv.args.as_slice();
        match inv.command.as_str() {
            "add" => self.cmd_add(args, now, out)?,
            "list" => self.cmd_list(now, out)?,
            "toggle" => self.cmd_toggle(args, out)?,
            "edit" => self.cmd_edit(args, now, out)?,
            "delete" => self.cmd_delete(args, out)?,
            "move" => self.cmd_move(args, out)?,
            "info" => self.cmd_info(args, out)?,
            "export" => self.cmd_export(out)?,
            "reminders" => self.renderer.print_reminders(out, &self.center.pending())?,
            "help" => cmd_help(out)?,
            "quit" | "exit" => return Ok(Flow::Quit),
            other => return Err(anyhow!("unknown command: {other}")),
        }
        Ok(Flow::Continue)
    }

    #[instrument(skip(self, args, now, out))]
    fn cmd_add<W: Write>(&mut self, args: &[String], now: DateTime<Utc>, out: &mut W) -> anyhow::Result<()> {
        info!("command add");

        let (title, mods) = parse_title_and_mods(args, now, self.tz)?;
        let mut draft = TaskDraft::new(now);
        draft.priority = self.default_priority;
        draft.color = self.default_color;
        draft.title = title;
        apply_mods(&mut draft, &mods);

        if !draft.can_submit() {
            writeln!(out, "A title is required; nothing added.")?;
            return Ok(());
        }

        let Some(uuid) = self.session.add(draft) else {
            return Ok(());
        };
        let offset = self.offset_of(uuid).unwrap_or_default();
        writeln!(out, "Added task {offset}.")?;
        Ok(())
    }

    fn cmd_list<W: Write>(&mut self, now: DateTime<Utc>, out: &mut W) -> anyhow::Result<()> {
        self.renderer
            .print_task_table(out, &self.session.projected(), now)
    }

    #[instrument(skip(self, args, out))]
    fn cmd_toggle<W: Write>(&mut self, args: &[String], out: &mut W) -> anyhow::Result<()> {
        info!("command toggle");

        let offset = single_offset(args, "toggle")?;
        let Some(uuid) = self.session.toggle(offset) else {
            writeln!(out, "No task at {offset}.")?;
            return Ok(());
        };

        if let Some(task) = self.session.store().get(uuid) {
            let verb = if task.completed { "Completed" } else { "Reopened" };
            writeln!(out, "{verb} \"{}\".", task.title)?;
        }
        Ok(())
    }

    #[instrument(skip(self, args, now, out))]
    fn cmd_edit<W: Write>(&mut self, args: &[String], now: DateTime<Utc>, out: &mut W) -> anyhow::Result<()> {
        info!("command edit");

        let (first, rest) = args
            .split_first()
            .ok_or_else(|| anyhow!("edit requires an offset"))?;
        let offset = parse_offset(first)?;

        let mut mods = Vec::with_capacity(rest.len());
        for arg in rest {
            let one_mod = parse_one_mod(arg, now, self.tz)?
                .ok_or_else(|| anyhow!("edit expects key:value modifiers, got: {arg}"))?;
            mods.push(one_mod);
        }

        if self.session.task_at(offset).is_none() {
            writeln!(out, "No task at {offset}.")?;
            return Ok(());
        }

        let mut submittable = true;
        let edited = self.session.edit(offset, now, |draft| {
            apply_mods(draft, &mods);
            submittable = draft.can_submit();
        });

        match edited.and_then(|uuid| self.session.store().get(uuid)) {
            Some(task) => writeln!(out, "Updated \"{}\".", task.title)?,
            None if !submittable => writeln!(out, "A title is required; edit discarded.")?,
            None => writeln!(out, "Task {offset} was not updated.")?,
        }
        Ok(())
    }

    #[instrument(skip(self, args, out))]
    fn cmd_delete<W: Write>(&mut self, args: &[String], out: &mut W) -> anyhow::Result<()> {
        info!("command delete");

        if args.is_empty() {
            return Err(anyhow!("delete requires at least one offset"));
        }
        let offsets = parse_offsets(args)?;
        let removed = self.session.delete(&offsets);
        writeln!(out, "Deleted {} task(s).", removed.len())?;
        Ok(())
    }

    #[instrument(skip(self, args, out))]
    fn cmd_move<W: Write>(&mut self, args: &[String], out: &mut W) -> anyhow::Result<()> {
        info!("command move");

        let split = args
            .iter()
            .position(|arg| arg.eq_ignore_ascii_case("to"))
            .ok_or_else(|| anyhow!("usage: move <offset>... to <offset>"))?;
        let (sources, destination) = (&args[..split], &args[split + 1..]);
        if sources.is_empty() {
            return Err(anyhow!("move requires at least one source offset"));
        }
        let sources = parse_offsets(sources)?;
        let destination = single_offset(destination, "move ... to")?;

        let before = self.session.store().ids();
        self.session.move_tasks(&sources, destination);
        if self.session.store().ids() == before {
            writeln!(out, "Order unchanged.")?;
        } else {
            writeln!(out, "Moved {} task(s).", sources.len())?;
        }
        Ok(())
    }

    fn cmd_info<W: Write>(&mut self, args: &[String], out: &mut W) -> anyhow::Result<()> {
        let offset = single_offset(args, "info")?;
        match self.session.task_at(offset) {
            Some(task) => self.renderer.print_task_info(out, &task),
            None => {
                writeln!(out, "No task at {offset}.")?;
                Ok(())
            }
        }
    }

    fn cmd_export<W: Write>(&mut self, out: &mut W) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self.session.store().tasks())
            .context("failed to serialize tasks")?;
        writeln!(out, "{json}")?;
        Ok(())
    }

    fn offset_of(&self, uuid: Uuid) -> Option<usize> {
        self.session
            .projected()
            .iter()
            .position(|task| task.uuid == uuid)
    }

    fn report_notices<W: Write>(&mut self, out: &mut W) -> anyhow::Result<()> {
        for notice in self.session.take_notices() {
            match notice {
                Notice::ReminderScheduled { fire_at, .. } => {
                    writeln!(out, "Reminder set for {fire_at}.")?;
                }
                Notice::AwaitingPermission { .. } => {
                    writeln!(out, "Asking for notification permission...")?;
                }
                Notice::NotifyReverted { task } => {
                    let title = self
                        .session
                        .store()
                        .get(task)
                        .map(|task| task.title.clone())
                        .unwrap_or_default();
                    writeln!(out, "Reminder turned off for \"{title}\".")?;
                }
                Notice::SettingsPrompt => {
                    writeln!(
                        out,
                        "Notifications are disabled. Allow them in your system settings \
                         (or set notify.permission) to receive reminders."
                    )?;
                }
            }
        }
        Ok(())
    }
}

fn cmd_help<W: Write>(out: &mut W) -> anyhow::Result<()> {
    writeln!(out, "Commands (unique prefixes work):")?;
    writeln!(out, "  add <title> [due:<when>] [pri:<low|medium|high>] [color:<name>] [notes:<text>] [notify:<yes|no>]")?;
    writeln!(out, "  list                       show tasks, open ones first")?;
    writeln!(out, "  toggle <n>                 mark task n done / not done")?;
    writeln!(out, "  edit <n> <key:value>...    replace fields (title:, due:, pri:, color:, notes:, notify:)")?;
    writeln!(out, "  delete <n>...              remove tasks")?;
    writeln!(out, "  move <n>... to <m>         drag tasks above row m (past the end appends)")?;
    writeln!(out, "  info <n>                   show every field of a task")?;
    writeln!(out, "  export                     print all tasks as JSON")?;
    writeln!(out, "  reminders                  list scheduled reminders")?;
    writeln!(out, "  quit                       leave (tasks are not saved)")?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
enum Mod {
    Title(String),
    Due(Option<DateTime<Utc>>),
    Priority(Priority),
    Color(TaskColor),
    Notes(String),
    Notify(bool),
}

fn parse_title_and_mods(
    args: &[String],
    now: DateTime<Utc>,
    tz: Tz,
) -> anyhow::Result<(String, Vec<Mod>)> {
    let mut title_parts = Vec::new();
    let mut mods = Vec::new();

    let mut literal = false;
    for arg in args {
        if arg == "--" {
            literal = true;
            continue;
        }

        if !literal && let Some(one_mod) = parse_one_mod(arg, now, tz)? {
            mods.push(one_mod);
            continue;
        }

        title_parts.push(arg.clone());
    }

    Ok((title_parts.join(" "), mods))
}

fn parse_one_mod(tok: &str, now: DateTime<Utc>, tz: Tz) -> anyhow::Result<Option<Mod>> {
    let Some((key, value)) = tok.split_once(':') else {
        return Ok(None);
    };

    let key = key.to_ascii_lowercase();

    match key.as_str() {
        "title" => Ok(Some(Mod::Title(value.to_string()))),
        "due" if value.trim().is_empty() => Ok(Some(Mod::Due(None))),
        "due" => Ok(Some(Mod::Due(Some(parse_due_expr(value, now, tz)?)))),
        "pri" | "priority" => Ok(Some(Mod::Priority(value.parse()?))),
        "color" | "colour" => Ok(Some(Mod::Color(value.parse()?))),
        "notes" | "note" => Ok(Some(Mod::Notes(value.to_string()))),
        "notify" | "remind" => Ok(Some(Mod::Notify(parse_bool(value)))),
        _ => {
            warn!(token = %tok, "unrecognized modifier key; treating as text");
            Ok(None)
        }
    }
}

fn apply_mods(draft: &mut TaskDraft, mods: &[Mod]) {
    for one_mod in mods {
        match one_mod {
            Mod::Title(title) => draft.title = title.clone(),
            Mod::Due(Some(due)) => {
                draft.has_due = true;
                draft.due = *due;
            }
            Mod::Due(None) => draft.has_due = false,
            Mod::Priority(priority) => draft.priority = *priority,
            Mod::Color(color) => draft.color = *color,
            Mod::Notes(notes) => draft.notes = notes.clone(),
            Mod::Notify(notify) => draft.notify = *notify,
        }
    }
}

fn parse_offset(token: &str) -> anyhow::Result<usize> {
    token
        .trim()
        .parse::<usize>()
        .with_context(|| format!("expected a row number, got: {token}"))
}

fn parse_offsets(tokens: &[String]) -> anyhow::Result<BTreeSet<usize>> {
    tokens.iter().map(|token| parse_offset(token)).collect()
}

fn single_offset(args: &[String], command: &str) -> anyhow::Result<usize> {
    match args {
        [one] => parse_offset(one),
        _ => Err(anyhow!("{command} takes exactly one row number")),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{Mod, expand_command_abbrev, known_command_names, parse_title_and_mods};
    use crate::task::Priority;

    #[test]
    fn abbreviations_must_be_unique() {
        let known = known_command_names();
        assert_eq!(expand_command_abbrev("rem", &known), Some("reminders"));
        assert_eq!(expand_command_abbrev("list", &known), Some("list"));
        assert_eq!(expand_command_abbrev("e", &known), None);
    }

    #[test]
    fn title_keeps_unknown_colon_words() {
        let now = Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).single().expect("now");
        let args: Vec<String> = ["Standup", "at", "10:30", "pri:h", "--", "due:never"]
            .into_iter()
            .map(String::from)
            .collect();
        let (title, mods) = parse_title_and_mods(&args, now, chrono_tz::UTC).expect("parse");
        assert_eq!(title, "Standup at 10:30 due:never");
        assert_eq!(mods, vec![Mod::Priority(Priority::High)]);
    }

    #[test]
    fn bad_modifier_values_are_errors() {
        let now = Utc::now();
        let args = vec!["Thing".to_string(), "pri:urgent".to_string()];
        assert!(parse_title_and_mods(&args, now, chrono_tz::UTC).is_err());
    }
}
