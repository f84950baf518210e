use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime::format_due;
use crate::reminder::ReminderRequest;
use crate::task::Task;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    tz: Tz,
}

impl Renderer {
    pub fn new(cfg: &Config, tz: Tz) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self {
            color: color && io::stdout().is_terminal(),
            tz,
        })
    }

    pub fn plain(tz: Tz) -> Self {
        Self { color: false, tz }
    }

    #[tracing::instrument(skip(self, out, tasks, now))]
    pub fn print_task_table<W: Write>(
        &self,
        out: &mut W,
        tasks: &[Task],
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        if tasks.is_empty() {
            writeln!(out, "No tasks.")?;
            return Ok(());
        }

        let headers = vec![
            "#".to_string(),
            "Done".to_string(),
            "Title".to_string(),
            "Due".to_string(),
            "Priority".to_string(),
            "Remind".to_string(),
        ];

        let mut rows = Vec::with_capacity(tasks.len());

        for (offset, task) in tasks.iter().enumerate() {
            let done = if task.completed { "[x]" } else { "[ ]" };

            let title = if task.completed {
                self.paint(&task.title, "9;90")
            } else {
                self.paint(&task.title, task.color.ansi_code())
            };

            let due = task
                .due
                .map(|date| format_due(date, self.tz))
                .unwrap_or_default();
            let due = match task.due {
                Some(task_due) if task_due < now && !task.completed => self.paint(&due, "31"),
                _ => due,
            };

            let priority = self.paint(task.priority.label(), task.priority.ansi_code());

            let remind = match (task.due, task.notify) {
                (Some(_), Some(true)) => "on",
                (Some(_), Some(false)) => "off",
                _ => "",
            };

            rows.push(vec![
                self.paint(&offset.to_string(), "33"),
                done.to_string(),
                title,
                due,
                priority,
                remind.to_string(),
            ]);
        }

        write_table(out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, out, task))]
    pub fn print_task_info<W: Write>(&self, out: &mut W, task: &Task) -> anyhow::Result<()> {
        writeln!(out, "uuid      {}", task.uuid)?;
        writeln!(out, "title     {}", task.title)?;
        writeln!(out, "done      {}", if task.completed { "yes" } else { "no" })?;
        writeln!(out, "priority  {}", task.priority)?;
        writeln!(out, "color     {}", task.color)?;

        if let Some(due) = task.due {
            writeln!(out, "due       {}", format_due(due, self.tz))?;
        }
        if let Some(notify) = task.notify {
            writeln!(out, "remind    {}", if notify { "on" } else { "off" })?;
        }
        if let Some(notes) = &task.notes {
            writeln!(out, "notes     {notes}")?;
        }

        Ok(())
    }

    pub fn print_reminders<W: Write>(
        &self,
        out: &mut W,
        alarms: &[ReminderRequest],
    ) -> anyhow::Result<()> {
        if alarms.is_empty() {
            writeln!(out, "No reminders scheduled.")?;
            return Ok(());
        }

        let headers = vec!["Fires".to_string(), "Title".to_string(), "Body".to_string()];
        let rows = alarms
            .iter()
            .map(|alarm| {
                vec![
                    alarm.fire_at.to_string(),
                    alarm.title.clone(),
                    alarm.body.clone(),
                ]
            })
            .collect();
        write_table(out, headers, rows)
    }

    pub fn print_alert<W: Write>(&self, out: &mut W, alarm: &ReminderRequest) -> anyhow::Result<()> {
        let label = self.paint("Reminder:", "1;35");
        if alarm.body.is_empty() {
            writeln!(out, "{label} {}", alarm.title)?;
        } else {
            writeln!(out, "{label} {} - {}", alarm.title, alarm.body)?;
        }
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    writer: &mut W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
