//! flowboard - run and manage workflow files from the command line

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use flowboard_http_adapter::{BackendConfig, HttpBackend};

use crate::commands::CliError;

/// Compile, run and store flowboard workflows
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a JSON backend configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL (overrides the config file and FLOWBOARD_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the node types offered by the backend
    Catalog,
    /// Print the execution descriptor of an exported workflow
    Compile { file: PathBuf },
    /// Execute an exported workflow and print the results
    Run { file: PathBuf },
    /// Save an exported workflow to the backend
    Push {
        file: PathBuf,
        /// Name to store it under (defaults to the file's name)
        #[arg(long)]
        name: Option<String>,
    },
    /// Load a stored workflow and export it to a file
    Pull {
        id: String,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// List workflows stored by the backend
    List,
}

async fn connect(cli: &Cli) -> Result<HttpBackend, CliError> {
    let config = BackendConfig::resolve(cli.config.as_deref())
        .await?
        .with_base_url_override(cli.api_url.clone());
    log::debug!("Using backend at {}", config.base_url);
    Ok(HttpBackend::new(config)?)
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    let mut out = std::io::stdout().lock();
    match &cli.command {
        Command::Compile { file } => commands::compile(file, &mut out).await,
        Command::Catalog => commands::catalog(&connect(&cli).await?, &mut out).await,
        Command::Run { file } => commands::run(file, &connect(&cli).await?, &mut out).await,
        Command::Push { file, name } => {
            commands::push(file, name.clone(), &connect(&cli).await?, &mut out).await
        }
        Command::Pull { id, output } => {
            commands::pull(id, output, &connect(&cli).await?, &mut out).await
        }
        Command::List => commands::list(&connect(&cli).await?, &mut out).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
