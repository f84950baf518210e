use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  Duration,
  LocalResult,
  NaiveDate,
  NaiveDateTime,
  TimeZone,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;

use crate::config::Config;

const TIMEZONE_ENV_VAR: &str =
  "TICKLIST_TIMEZONE";

/// Picks the timezone due dates are
/// entered, shown, and fired in.
pub fn resolve_timezone(
  cfg: &Config
) -> Tz {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) = parse_timezone(
      &raw,
      TIMEZONE_ENV_VAR
    )
  {
    return tz;
  }

  if let Some(raw) = cfg.get("timezone")
    && let Some(tz) =
      parse_timezone(&raw, "config")
  {
    return tz;
  }

  tracing::debug!(
    "no timezone configured; using UTC"
  );
  chrono_tz::UTC
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

#[must_use]
pub fn format_due(
  due: DateTime<Utc>,
  tz: Tz
) -> String {
  due
    .with_timezone(&tz)
    .format("%Y-%m-%d %H:%M")
    .to_string()
}

pub(crate) fn to_utc_from_local(
  local_naive: NaiveDateTime,
  tz: Tz,
  context: &str
) -> anyhow::Result<DateTime<Utc>> {
  match tz.from_local_datetime(
    &local_naive
  ) {
    | LocalResult::Single(local_dt) => {
      Ok(local_dt.with_timezone(&Utc))
    }
    | LocalResult::Ambiguous(
      first,
      second
    ) => {
      tracing::warn!(
        context,
        first = %first,
        second = %second,
        "ambiguous local datetime; using earliest"
      );
      let chosen = if first <= second {
        first
      } else {
        second
      };
      Ok(chosen.with_timezone(&Utc))
    }
    | LocalResult::None => {
      Err(anyhow!(
        "local datetime does not \
         exist in configured \
         timezone: {context}"
      ))
    }
  }
}

fn local_midnight(
  date: NaiveDate,
  tz: Tz,
  context: &str
) -> anyhow::Result<DateTime<Utc>> {
  let midnight = date
    .and_hms_opt(0, 0, 0)
    .ok_or_else(|| {
      anyhow!(
        "failed to construct \
         midnight for {context}"
      )
    })?;
  to_utc_from_local(
    midnight, tz, context
  )
}

#[tracing::instrument(skip(now, tz), fields(input = input))]
pub fn parse_due_expr(
  input: &str,
  now: DateTime<Utc>,
  tz: Tz
) -> anyhow::Result<DateTime<Utc>> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();
  let local_now = now.with_timezone(&tz);

  match lower.as_str() {
    | "now" => return Ok(now),
    | "today" => {
      return local_midnight(
        local_now.date_naive(),
        tz,
        "today"
      );
    }
    | "tomorrow" => {
      let today = parse_due_expr(
        "today", now, tz
      )?;
      return Ok(
        today + Duration::days(1)
      );
    }
    | _ => {}
  }

  if let Some(target_weekday) =
    parse_weekday_name(&lower)
  {
    let target_date = next_weekday_date(
      local_now.date_naive(),
      target_weekday
    );
    return local_midnight(
      target_date,
      tz,
      "weekday-name"
    );
  }

  if let Some((hour, minute)) =
    parse_clock_time(token)
  {
    let mut day =
      local_now.date_naive();
    let candidate = day
      .and_hms_opt(hour, minute, 0)
      .ok_or_else(|| {
        anyhow!(
          "failed to construct clock \
           time candidate"
        )
      })?;
    if candidate
      <= local_now.naive_local()
    {
      day = day
        .checked_add_signed(
          Duration::days(1)
        )
        .ok_or_else(|| {
          anyhow!(
            "failed to advance to \
             next day"
          )
        })?;
    }
    let next_candidate = day
      .and_hms_opt(hour, minute, 0)
      .ok_or_else(|| {
        anyhow!(
          "failed to construct next \
           clock time candidate"
        )
      })?;
    return to_utc_from_local(
      next_candidate,
      tz,
      "clock-time"
    );
  }

  let rel_re = Regex::new(r"^\+(?P<num>\d+)(?P<unit>[dhm])$")
    .map_err(|e| anyhow!("internal regex compile failure: {e}"))?;

  if let Some(caps) =
    rel_re.captures(token)
  {
    let num: i64 = caps
      .name("num")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!(
          "missing relative amount"
        )
      })?
      .parse()
      .context(
        "invalid relative number"
      )?;
    let unit = caps
      .name("unit")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!("missing relative unit")
      })?;

    let duration = match unit {
      | "d" => Duration::try_days(num),
      | "h" => Duration::try_hours(num),
      | "m" => {
        Duration::try_minutes(num)
      }
      | _ => {
        return Err(anyhow!(
          "unknown relative unit: \
           {unit}"
        ));
      }
    }
    .ok_or_else(|| {
      anyhow!(
        "relative offset too large: \
         {input}"
      )
    })?;

    return now
      .checked_add_signed(duration)
      .ok_or_else(|| {
        anyhow!(
          "due date out of range: \
           {input}"
        )
      });
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(token)
  {
    return Ok(dt.with_timezone(&Utc));
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token, "%Y-%m-%d"
    )
  {
    return local_midnight(
      date, tz, "date"
    );
  }

  for fmt in
    ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
  {
    if let Ok(ndt) =
      NaiveDateTime::parse_from_str(
        token, fmt
      )
    {
      return to_utc_from_local(
        ndt, tz, fmt
      );
    }
  }

  Err(anyhow!(
    "unrecognized due date: {input}"
  ))
  .with_context(|| {
    "supported formats: \
     now/today/tomorrow, weekday \
     names (e.g. monday), clock times \
     (e.g. 3:30pm or 15:30), \
     +Nd/+Nh/+Nm, RFC3339, \
     YYYY-MM-DD, YYYY-MM-DDTHH:MM, \
     YYYY-MM-DD HH:MM"
  })
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token.trim() {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

fn next_weekday_date(
  from: NaiveDate,
  target: Weekday
) -> NaiveDate {
  let from_idx = from
    .weekday()
    .num_days_from_monday()
    as i64;
  let target_idx = target
    .num_days_from_monday()
    as i64;
  let mut delta =
    (7 + target_idx - from_idx) % 7;
  if delta == 0 {
    delta = 7;
  }
  from
    .checked_add_signed(Duration::days(
      delta
    ))
    .unwrap_or(from)
}

fn parse_clock_time(
  token: &str
) -> Option<(u32, u32)> {
  let clock_re = Regex::new(
    r"(?i)^(?P<hour>\d{1,2}):(?P<minute>\d{2})\s*(?P<ampm>[ap]m)?$",
  )
  .ok()?;
  let captures =
    clock_re.captures(token.trim())?;

  let raw_hour = captures
    .name("hour")?
    .as_str()
    .parse::<u32>()
    .ok()?;
  let minute = captures
    .name("minute")?
    .as_str()
    .parse::<u32>()
    .ok()?;
  if minute > 59 {
    return None;
  }

  let hour = if let Some(ampm_match) =
    captures.name("ampm")
  {
    if raw_hour == 0 || raw_hour > 12 {
      return None;
    }
    match ampm_match
      .as_str()
      .to_ascii_lowercase()
      .as_str()
    {
      | "am" => raw_hour % 12,
      | "pm" => raw_hour % 12 + 12,
      | _ => return None
    }
  } else {
    if raw_hour > 23 {
      return None;
    }
    raw_hour
  };

  Some((hour, minute))
}
