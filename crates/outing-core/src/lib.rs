pub mod calendar;
pub mod cli;
pub mod commands;
pub mod config;
pub mod creation;
pub mod datetime;
pub mod event;
pub mod finder;
pub mod geocode;
pub mod login;
pub mod markers;
pub mod normalize;
pub mod render;
pub mod selection;
pub mod view;

use std::ffi::OsString;

use clap::Parser;
use tracing::{
  debug,
  info
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
    "starting outing CLI"
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

  let mut renderer =
    render::Renderer::new(&cfg);
  let command = cli
    .command
    .unwrap_or(cli::Command::List);

  commands::dispatch(
    &cfg,
    &mut renderer,
    command,
    cli.events.as_deref()
  )?;

  info!("done");
  Ok(())
}
