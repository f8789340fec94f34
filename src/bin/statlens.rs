use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::{Diagnostic, IntoDiagnostic};
use thiserror::Error;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use statlens::client::{ApiClient, HttpApiClient};
use statlens::config::{ClientConfig, ConfigLoader, validate_base_url};
use statlens::domain::DatasetCode;
use statlens::error::StatlensError;
use statlens::output::{HumanOutput, JsonOutput, OutputMode};
use statlens::providers::ProviderRegistry;
use statlens::store::{DatasetStore, StoreState, View};

#[derive(Parser)]
#[command(name = "statlens")]
#[command(about = "Browse statistics datasets and their raw or processed data")]
#[command(version)]
struct Cli {
    /// API base URL, overrides STATLENS_API_URL and the config file
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "List datasets, or search them with --search")]
    Datasets(DatasetsArgs),
    #[command(about = "Show a dataset descriptor")]
    Dataset(CodeArgs),
    #[command(about = "Fetch raw data for a dataset")]
    Raw(CodeArgs),
    #[command(about = "Fetch processed data for a dataset")]
    Processed(CodeArgs),
    #[command(about = "Show upstream provider info for a dataset")]
    Info(CodeArgs),
    #[command(about = "List known data providers")]
    Providers,
    #[command(about = "Check that the API is up")]
    Health,
}

#[derive(Args)]
struct DatasetsArgs {
    #[arg(long)]
    search: Option<String>,

    #[arg(long)]
    limit: Option<u32>,
}

#[derive(Args)]
struct CodeArgs {
    code: String,
}

#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(statlens::view))]
struct ViewFailed {
    message: String,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<StatlensError>() {
            return ExitCode::from(map_exit_code(err));
        }
        if report.downcast_ref::<ViewFailed>().is_some() {
            return ExitCode::from(3);
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &StatlensError) -> u8 {
    match error {
        StatlensError::InvalidDatasetCode(_) | StatlensError::InvalidBaseUrl(_) => 2,
        StatlensError::Http { status: 404, .. } => 2,
        StatlensError::Http { .. } | StatlensError::Network { .. } | StatlensError::Parse(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    let mut config = ConfigLoader::resolve(cli.config.as_deref())?;
    if let Some(api_url) = &cli.api_url {
        config = ClientConfig {
            base_url: validate_base_url(api_url)?,
            ..config
        };
    }

    let client = HttpApiClient::new(&config)?;
    let store = DatasetStore::new(client);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .into_diagnostic()?;
    runtime.block_on(execute(cli.command, &store, &config, output_mode))
}

async fn execute(
    command: Commands,
    store: &DatasetStore<HttpApiClient>,
    config: &ClientConfig,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let mut registry = ProviderRegistry::builtin();
    match command {
        Commands::Datasets(args) => {
            match args.search {
                Some(query) => {
                    let limit = args.limit.unwrap_or(config.search_limit);
                    store.search_datasets(&query, limit).await;
                }
                None => store.fetch_dataset_list().await,
            }
            let state = settled(store, View::Listing)?;
            registry.annotate_counts(state.datasets());
            match output_mode {
                OutputMode::Json => JsonOutput::print(&state.datasets()).into_diagnostic()?,
                OutputMode::Human => HumanOutput::print_datasets(state.datasets(), &registry),
            }
        }
        Commands::Dataset(args) => {
            let code = args.code.parse::<DatasetCode>()?;
            store.select_dataset(code.as_str()).await;
            let state = settled(store, View::Current)?;
            if let Some(dataset) = &state.current.data {
                match output_mode {
                    OutputMode::Json => JsonOutput::print(dataset).into_diagnostic()?,
                    OutputMode::Human => HumanOutput::print_dataset(dataset),
                }
            }
        }
        Commands::Raw(args) => {
            let code = args.code.parse::<DatasetCode>()?;
            store.fetch_raw_data(code.as_str()).await;
            let state = settled(store, View::Raw)?;
            if let Some(data) = &state.raw.data {
                match output_mode {
                    OutputMode::Json => JsonOutput::print(data).into_diagnostic()?,
                    OutputMode::Human => HumanOutput::print_raw(data),
                }
            }
        }
        Commands::Processed(args) => {
            let code = args.code.parse::<DatasetCode>()?;
            store.fetch_processed_data(code.as_str()).await;
            let state = settled(store, View::Processed)?;
            if let Some(data) = &state.processed.data {
                match output_mode {
                    OutputMode::Json => JsonOutput::print(data).into_diagnostic()?,
                    OutputMode::Human => HumanOutput::print_processed(data),
                }
            }
        }
        Commands::Info(args) => {
            let code = args.code.parse::<DatasetCode>()?;
            let info = store.client().provider_info(&code).await?;
            match output_mode {
                OutputMode::Json => JsonOutput::print(&info).into_diagnostic()?,
                OutputMode::Human => HumanOutput::print_provider_info(&info),
            }
        }
        Commands::Providers => {
            store.fetch_dataset_list().await;
            let state = store.snapshot();
            match state.error(View::Listing) {
                Some(message) => warn!(%message, "dataset counts unavailable"),
                None => registry.annotate_counts(state.datasets()),
            }
            match output_mode {
                OutputMode::Json => JsonOutput::print(&registry.providers()).into_diagnostic()?,
                OutputMode::Human => HumanOutput::print_providers(&registry),
            }
        }
        Commands::Health => {
            let health = store.client().health_check().await?;
            match output_mode {
                OutputMode::Json => JsonOutput::print(&health).into_diagnostic()?,
                OutputMode::Human => HumanOutput::print_health(&health),
            }
        }
    }
    Ok(())
}

fn settled(store: &DatasetStore<HttpApiClient>, view: View) -> miette::Result<StoreState> {
    let state = store.snapshot();
    if let Some(message) = state.error(view) {
        return Err(ViewFailed {
            message: message.to_string(),
        }
        .into());
    }
    Ok(state)
}
