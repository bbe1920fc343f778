// src/main.rs

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use rpm_divert::config::{DEFAULT_DATABASE_PATH, DEFAULT_LOG_LEVEL};
use rpm_divert::{Command, Config, DiversionAction};
use std::io;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// What to install at the source path once it has been diverted
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ActionArg {
    /// Leave the source path empty
    Nothing,
    /// Symlink the source path to the replacement
    Symlink,
    /// Copy the replacement to the source path
    Copy,
}

impl From<ActionArg> for DiversionAction {
    fn from(action: ActionArg) -> Self {
        match action {
            ActionArg::Nothing => DiversionAction::Nothing,
            ActionArg::Symlink => DiversionAction::Symlink,
            ActionArg::Copy => DiversionAction::Copy,
        }
    }
}

#[derive(Parser)]
#[command(name = "rpm-divert")]
#[command(author, version, about = "Divert files owned by other packages", long_about = None)]
struct Cli {
    /// Database path
    #[arg(short, long, global = true, default_value = DEFAULT_DATABASE_PATH)]
    db_path: PathBuf,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = DEFAULT_LOG_LEVEL)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a diversion to a package
    Add {
        /// Package owning the diversion
        package: String,
        /// File to divert
        source: PathBuf,
        /// Where the original file is moved to
        diversion: PathBuf,
        /// What to put in place of the diverted file
        #[arg(short, long, value_enum, default_value_t = ActionArg::Nothing)]
        action: ActionArg,
        /// Replacement file (required by symlink and copy)
        #[arg(short, long)]
        replacement: Option<PathBuf>,
    },
    /// Remove a diversion that is not applied
    Remove {
        /// Package owning the diversion
        package: String,
        /// Diverted file
        source: PathBuf,
    },
    /// Apply a diversion
    Apply {
        /// Package owning the diversion
        package: String,
        /// Diverted file (applies every diversion of the package if omitted)
        source: Option<PathBuf>,
        /// Create the directory of the diverted file if missing
        #[arg(short, long)]
        create_directory: bool,
    },
    /// Unapply a diversion, restoring the original file
    Unapply {
        /// Package owning the diversion
        package: String,
        /// Diverted file (unapplies every diversion of the package if omitted)
        source: Option<PathBuf>,
    },
    /// List diversions
    List {
        /// Package name (lists every package if omitted)
        package: Option<String>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::new(cli.db_path, cli.log_level);

    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(io::stderr)
        .init();

    let command = match cli.command {
        Some(Commands::Add {
            package,
            source,
            diversion,
            action,
            replacement,
        }) => Command::Add {
            package,
            source,
            diversion,
            action: action.into(),
            replacement,
        },
        Some(Commands::Remove { package, source }) => Command::Remove { package, source },
        Some(Commands::Apply {
            package,
            source,
            create_directory,
        }) => Command::Apply {
            package,
            source,
            create_directory,
        },
        Some(Commands::Unapply { package, source }) => Command::Unapply { package, source },
        Some(Commands::List { package }) => Command::List { package },
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(shell, &mut Cli::command(), "rpm-divert", &mut io::stdout());
            return Ok(());
        }
        None => {
            // No command provided, show help
            Cli::command().print_help()?;
            return Ok(());
        }
    };

    debug!(
        "Running {:?} against {}",
        command,
        config.database_path.display()
    );
    rpm_divert::run(&config, &command, &mut io::stdout().lock())?;

    Ok(())
}
