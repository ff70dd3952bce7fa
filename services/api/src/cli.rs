use crate::apply::{run_apply, ApplyArgs};
use crate::server;
use admissions::config::AppConfig;
use admissions::error::AppError;
use admissions::intake::{CsvTabularStore, TabularStore};
use admissions::telemetry;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "Admissions Intake",
    about = "Run the admissions intake service or submit an application from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Write the application sheet header if it is missing
    Setup,
    /// Walk through the application flow and submit it to the intake endpoint
    Apply(ApplyArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Setup => run_setup(),
        Command::Apply(args) => run_apply(args).await,
    }
}

fn run_setup() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let path = &config.intake.sheet_path;
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let sheet = CsvTabularStore::new(path.clone());
    if sheet.ensure_headers()? {
        println!("Wrote application sheet header to {}", path.display());
    } else {
        println!("Application sheet {} already initialised", path.display());
    }
    Ok(())
}
