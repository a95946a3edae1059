mod cmd;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::{OpenArgs, cmd_info, cmd_open, cmd_run};
use dirlua_lib::config::ProviderKind;
use output::{OutputFormat, print_error};

/// dirlua - bind directory objects from Lua scripts
#[derive(Parser)]
#[command(name = "dirlua")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Directory provider (adsi or memory); overrides DIRLUA_PROVIDER
  #[arg(long, global = true, value_parser = parse_provider)]
  provider: Option<ProviderKind>,

  /// JSON directory file for the memory provider; overrides DIRLUA_DIRECTORY
  #[arg(long, global = true)]
  directory: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a Lua script with the `dir` global available
  Run {
    /// Path to the script
    script: PathBuf,
  },

  /// Bind a single object and report the wrapper it resolves to
  Open {
    /// Binding string, e.g. LDAP://server/CN=x,DC=y
    binding: String,

    /// Account to bind as
    #[arg(short, long)]
    user: Option<String>,

    /// Password for the account
    #[arg(short, long)]
    password: Option<String>,

    /// Authentication flag name or number; repeat to combine
    #[arg(short, long = "auth")]
    auth: Vec<String>,

    /// Requested capability (GenericObject, Container, DirectorySearch)
    #[arg(short, long)]
    capability: Option<String>,

    /// Bind on the calling thread instead of the blocking pool
    #[arg(long)]
    sync: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },

  /// Show the provider, platform and authentication flags
  Info {
    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },
}

fn parse_provider(s: &str) -> Result<ProviderKind, String> {
  s.parse().map_err(|e: dirlua_lib::config::ConfigError| e.to_string())
}

fn main() {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let overrides = cmd::Overrides {
    provider: cli.provider,
    directory: cli.directory,
  };

  let result = match cli.command {
    Commands::Run { script } => cmd_run(&overrides, &script),
    Commands::Open {
      binding,
      user,
      password,
      auth,
      capability,
      sync,
      output,
    } => cmd_open(
      &overrides,
      OpenArgs {
        binding,
        user,
        password,
        auth,
        capability,
        sync,
      },
      output,
    ),
    Commands::Info { output } => cmd_info(&overrides, output),
  };

  if let Err(err) = result {
    print_error(&format!("{:#}", err));
    std::process::exit(1);
  }
}
