use std::path::PathBuf;

use anyhow::Result;
use clap::{
  ArgAction,
  Parser,
  Subcommand,
};

#[derive(Clone, Debug)]
pub struct CliOptions {
  pub verbosity:   u8,
  pub log_file:    Option<PathBuf>,
  pub config_file: Option<PathBuf>,
  pub command:     Command,
}

#[derive(Clone, Debug)]
pub enum Command {
  Replay(ReplayOptions),
  /// Print the effective editor config as TOML.
  Config,
}

#[derive(Clone, Debug)]
pub struct ReplayOptions {
  pub script:     PathBuf,
  pub content:    Option<PathBuf>,
  pub candidates: Option<PathBuf>,
  pub uploads:    PathBuf,
}

impl CliOptions {
  pub fn parse() -> Result<Self> {
    let raw = RawCli::parse();
    raw.try_into()
  }
}

#[derive(Parser, Debug)]
#[command(name = "inkpad", about, long_about = None, version)]
struct RawCli {
  /// Increase logging verbosity (repeat for more detail)
  #[arg(short = 'v', action = ArgAction::Count, global = true)]
  verbosity: u8,

  /// Save logs to a specific file
  #[arg(long = "log", value_name = "FILE", global = true)]
  log_file: Option<PathBuf>,

  /// Load configuration from a specific file
  #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
  config_file: Option<PathBuf>,

  #[command(subcommand)]
  command: RawCommand,
}

#[derive(Subcommand, Debug)]
enum RawCommand {
  /// Replay a JSON script of editor actions and print the final document
  Replay {
    /// The script: a JSON array of actions
    script: PathBuf,

    /// Initial document (an HTML fragment)
    #[arg(long, value_name = "FILE")]
    content: Option<PathBuf>,

    /// Macro candidates: a JSON array of {id, title, content}
    #[arg(long, value_name = "FILE")]
    candidates: Option<PathBuf>,

    /// Directory uploaded images are stored in
    #[arg(long, value_name = "DIR")]
    uploads: Option<PathBuf>,
  },
  /// Print the effective editor config
  Config,
}

impl TryFrom<RawCli> for CliOptions {
  type Error = anyhow::Error;

  fn try_from(raw: RawCli) -> Result<Self> {
    let command = match raw.command {
      RawCommand::Replay {
        script,
        content,
        candidates,
        uploads,
      } => {
        if !script.is_file() {
          anyhow::bail!("script '{}' does not exist", script.display());
        }
        Command::Replay(ReplayOptions {
          script,
          content,
          candidates,
          uploads: uploads.unwrap_or_else(|| inkpad_loader::cache_dir().join("uploads")),
        })
      },
      RawCommand::Config => Command::Config,
    };

    Ok(Self {
      verbosity: raw.verbosity,
      log_file: raw.log_file,
      config_file: raw.config_file,
      command,
    })
  }
}
