mod config;

use clap::{Args, Parser, Subcommand};
use config::{Config, ConfigError};
use registration::errors::{ApiError, RegistrationError};
use registration::registrar::Registrar;
use registration::types::RegistrationRequest;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "neuronio", about = "Newsletter registration and segmentation service")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Serve the registration endpoint and the admin listener
    Serve(ConfigArgs),
    /// Run a single registration from a JSON file and print the result
    Register {
        #[command(flatten)]
        config: ConfigArgs,
        #[arg(long)]
        request: PathBuf,
    },
    /// Load and validate the config, then exit
    CheckConfig(ConfigArgs),
}

#[derive(Args)]
struct ConfigArgs {
    #[arg(long, short)]
    config: Option<PathBuf>,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid config: {0}")]
    Validation(#[from] registration::config::ValidationError),
    #[error(transparent)]
    Service(#[from] registration::ServiceError),
    #[error("could not build API client: {0}")]
    Client(#[from] ApiError),
    #[error("registration failed: {0}")]
    Registration(#[from] RegistrationError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid request: {0}")]
    RequestFormat(#[from] serde_json::Error),
}

fn load_config(args: &ConfigArgs) -> Result<Config, ConfigError> {
    match &args.config {
        Some(path) => Config::from_file(path),
        None => Ok(Config::default()),
    }
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

fn runtime() -> Result<tokio::runtime::Runtime, std::io::Error> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("could not listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

fn serve(config: Config) -> Result<(), CliError> {
    runtime()?.block_on(registration::run(config.registration, shutdown_signal()))?;
    Ok(())
}

fn register(config: Config, request: &Path) -> Result<(), CliError> {
    let request: RegistrationRequest = serde_json::from_slice(&std::fs::read(request)?)?;
    config.registration.validate()?;

    runtime()?.block_on(async {
        let (registrar, worker) = Registrar::from_config(&config.registration)?;
        let result = registrar.register(request).await;
        // Let the remainder finish before the process exits
        worker.drain().await;

        println!("{}", serde_json::to_string_pretty(&result?)?);
        Ok::<(), CliError>(())
    })
}

fn check_config(config: &Config) -> Result<(), CliError> {
    let registration = &config.registration;
    registration.validate()?;

    let credential = match registration.remote.credential() {
        Some(_) => "configured",
        None => "missing",
    };
    println!(
        "config ok (API credential {credential}, env {})",
        registration.remote.api_key_env
    );
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let args = match &cli.command {
        CliCommand::Serve(args) | CliCommand::CheckConfig(args) => args,
        CliCommand::Register { config, .. } => config,
    };
    let config = match load_config(args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(config.log_level());

    let result = match &cli.command {
        CliCommand::Serve(_) => {
            tracing::info!("starting registration service");
            serve(config)
        }
        CliCommand::Register { request, .. } => register(config, request),
        CliCommand::CheckConfig(_) => check_config(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
