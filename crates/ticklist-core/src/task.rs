use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn label(self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }

    /// SGR code used for the priority badge.
    pub fn ansi_code(self) -> &'static str {
        match self {
            Priority::Low => "34",
            Priority::Medium => "38;5;208",
            Priority::High => "31",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "l" | "low" => Ok(Priority::Low),
            "m" | "medium" => Ok(Priority::Medium),
            "h" | "high" => Ok(Priority::High),
            other => Err(anyhow!("invalid priority: {other} (expected low, medium or high)")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskColor {
    #[default]
    Blue,
    Red,
    Orange,
    Yellow,
    Green,
    Purple,
    Pink,
    Gray,
}

impl TaskColor {
    pub const ALL: [TaskColor; 8] = [
        TaskColor::Blue,
        TaskColor::Red,
        TaskColor::Orange,
        TaskColor::Yellow,
        TaskColor::Green,
        TaskColor::Purple,
        TaskColor::Pink,
        TaskColor::Gray,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TaskColor::Blue => "blue",
            TaskColor::Red => "red",
            TaskColor::Orange => "orange",
            TaskColor::Yellow => "yellow",
            TaskColor::Green => "green",
            TaskColor::Purple => "purple",
            TaskColor::Pink => "pink",
            TaskColor::Gray => "gray",
        }
    }

    pub fn ansi_code(self) -> &'static str {
        match self {
            TaskColor::Blue => "34",
            TaskColor::Red => "31",
            TaskColor::Orange => "38;5;208",
            TaskColor::Yellow => "33",
            TaskColor::Green => "32",
            TaskColor::Purple => "35",
            TaskColor::Pink => "38;5;205",
            TaskColor::Gray => "90",
        }
    }
}

impl fmt::Display for TaskColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TaskColor {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        let wanted = if wanted == "grey" { "gray".to_string() } else { wanted };
        TaskColor::ALL
            .into_iter()
            .find(|color| color.name() == wanted)
            .ok_or_else(|| anyhow!("invalid color: {wanted}"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub uuid: Uuid,

    pub title: String,

    #[serde(default)]
    pub completed: bool,

    #[serde(default)]
    pub due: Option<DateTime<Utc>>,

    #[serde(default)]
    pub notes: Option<String>,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub color: TaskColor,

    /// Only meaningful while `due` is set.
    #[serde(default)]
    pub notify: Option<bool>,
}

impl Task {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            title: title.into(),
            completed: false,
            due: None,
            notes: None,
            priority: Priority::default(),
            color: TaskColor::default(),
            notify: None,
        }
    }

    pub fn wants_reminder(&self) -> bool {
        self.due.is_some() && self.notify == Some(true)
    }

    pub fn toggled(&self) -> Self {
        let mut next = self.clone();
        next.completed = !next.completed;
        next
    }

    /// True when any field a scheduled reminder was built from differs.
    pub fn reminder_differs(&self, other: &Task) -> bool {
        self.due != other.due
            || self.title != other.title
            || self.notes != other.notes
            || self.wants_reminder() != other.wants_reminder()
    }
}
