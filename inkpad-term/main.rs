//! Command line driver for the inkpad editing core.
//!
//! `inkpad replay` runs a JSON script of editor actions against a document
//! and prints the resulting HTML. Uploaded images land in a local directory.

mod application;
mod cli;
mod handlers;
mod script;
mod uploads;

use anyhow::{
  Context,
  Result,
};
use inkpad_lib::config::Config;

use crate::{
  application::Application,
  cli::{
    CliOptions,
    Command,
  },
};

fn setup_logging(verbosity: u8) -> Result<()> {
  let mut base_config = fern::Dispatch::new();

  base_config = match verbosity {
    0 => base_config.level(log::LevelFilter::Warn),
    1 => base_config.level(log::LevelFilter::Info),
    2 => base_config.level(log::LevelFilter::Debug),
    _ => base_config.level(log::LevelFilter::Trace),
  };

  let file_config = fern::Dispatch::new()
    .format(|out, message, record| {
      out.finish(format_args!(
        "{} [{}] {}",
        record.target(),
        record.level(),
        message
      ))
    })
    .chain(fern::log_file(inkpad_loader::log_file())?);

  base_config.chain(file_config).apply()?;

  Ok(())
}

fn load_config() -> Result<Config> {
  // eyre reports from the loader carry their cause chain in `{:#}`
  let value = inkpad_loader::config::user_config().map_err(|err| anyhow::anyhow!("{err:#}"))?;
  Ok(Config::from_toml(value)?)
}

#[tokio::main]
async fn main() -> Result<()> {
  let options = CliOptions::parse()?;

  inkpad_loader::initialize_log_file(options.log_file.clone());
  inkpad_loader::initialize_config_file(options.config_file.clone());

  if let Some(parent) = inkpad_loader::log_file().parent() {
    std::fs::create_dir_all(parent).ok();
  }
  setup_logging(options.verbosity).context("failed to initialize logging")?;

  let config = match load_config() {
    Ok(config) => config,
    Err(err) => {
      eprintln!("Bad config: {err:#}");
      eprintln!("Falling back to the default config");
      log::warn!("bad config: {err:#}");
      Config::default()
    },
  };

  match options.command {
    Command::Config => {
      let rendered = toml::to_string(&config).context("failed to render config")?;
      print!("{rendered}");
    },
    Command::Replay(replay) => {
      let source = std::fs::read_to_string(&replay.script)
        .with_context(|| format!("failed to read {}", replay.script.display()))?;
      let actions = script::parse(&source)?;
      log::info!(
        "replaying {} actions from {}",
        actions.len(),
        replay.script.display()
      );

      let mut app = Application::new(config.editor, &replay)?;
      let content = app.replay(actions).await?;
      for notice in app.notices() {
        eprintln!("{:?}: {}", notice.severity, notice.text);
      }
      println!("{content}");
    },
  }

  Ok(())
}
