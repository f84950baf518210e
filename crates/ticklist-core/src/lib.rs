pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod draft;
pub mod gesture;
pub mod notifier;
pub mod ordering;
pub mod reminder;
pub mod render;
pub mod session;
pub mod store;
pub mod task;

use std::ffi::OsString;
use std::fs;
use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{
  debug,
  info,
  warn
};

use crate::commands::{
  Flow,
  Shell
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting ticklist shell"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let tz =
    datetime::resolve_timezone(&cfg);
  let renderer =
    render::Renderer::new(&cfg, tz)?;
  let mut shell =
    Shell::new(&cfg, renderer, tz)
      .context(
        "failed to start shell"
      )?;

  let stdout = io::stdout();
  let mut out = stdout.lock();

  if !cli.commands.is_empty() {
    for line in &cli.commands {
      if run_line(
        &mut shell, line, &mut out
      )? == Flow::Quit
      {
        break;
      }
    }
  } else if let Some(path) =
    cli.script.as_deref()
  {
    let text =
      fs::read_to_string(path)
        .with_context(|| {
          format!(
            "failed to read script {}",
            path.display()
          )
        })?;
    for line in text.lines() {
      if run_line(
        &mut shell, line, &mut out
      )? == Flow::Quit
      {
        break;
      }
    }
  } else {
    run_interactive(
      &mut shell,
      &cfg.prompt(),
      &mut out
    )?;
  }

  info!("done");
  Ok(())
}

fn run_interactive<W: Write>(
  shell: &mut Shell,
  prompt: &str,
  out: &mut W
) -> anyhow::Result<()> {
  let stdin = io::stdin();
  let interactive =
    stdin.is_terminal();

  loop {
    shell.deliver_due(Utc::now(), out)?;
    if interactive {
      write!(out, "{prompt}")?;
      out.flush()?;
    }

    let mut line = String::new();
    let read = stdin
      .lock()
      .read_line(&mut line)
      .context("failed to read stdin")?;
    if read == 0 {
      break;
    }

    if run_line(shell, &line, out)?
      == Flow::Quit
    {
      break;
    }
  }

  Ok(())
}

/// Runs one line; a bad line is reported
/// and the session carries on.
fn run_line<W: Write>(
  shell: &mut Shell,
  line: &str,
  out: &mut W
) -> anyhow::Result<Flow> {
  let now = Utc::now();
  shell.deliver_due(now, out)?;
  match shell.execute(line, now, out) {
    | Ok(flow) => Ok(flow),
    | Err(err) => {
      warn!(error = %err, line, "command failed");
      writeln!(out, "error: {err:#}")?;
      Ok(Flow::Continue)
    }
  }
}
