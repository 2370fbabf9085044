//! Paciolus statement preview
//!
//! Builds financial statements from lead-sheet groupings, either read from
//! disk or fetched from the backend, and exports them through the backend.

mod render;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use paciolus_client::{ApiClient, Method, RequestBody, RequestOptions};
use paciolus_core::statements::{FinancialStatements, LeadSheetGrouping, StatementBuilder};
use paciolus_shared::AppConfig;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use render::TextReport;

#[derive(Parser)]
#[command(name = "paciolus-preview", version)]
#[command(about = "Preview and export Paciolus financial statements")]
#[command(
    after_help = "Environment:\n  PACIOLUS_TOKEN            Bearer token for the backend\n  PACIOLUS__API__BASE_URL   Backend base URL"
)]
struct Cli {
    /// Bearer token for backend calls.
    #[arg(long, global = true, env = "PACIOLUS_TOKEN", hide_env_values = true)]
    token: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build statements from grouping files on disk.
    Build {
        /// Current-period lead-sheet grouping (JSON).
        #[arg(long)]
        current: PathBuf,
        /// Prior-period grouping; enables comparatives and the cash-flow statement.
        #[arg(long)]
        prior: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Fetch groupings for uploaded trial balances and build statements.
    Fetch {
        #[arg(long)]
        upload_id: String,
        #[arg(long)]
        prior_upload_id: Option<String>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Build statements and have the backend render them as a document.
    Export {
        #[arg(long)]
        current: PathBuf,
        #[arg(long)]
        prior: Option<PathBuf>,
        #[arg(long, value_enum)]
        format: ExportFormat,
        /// Directory the document is written to.
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    Pdf,
    Xlsx,
}

impl ExportFormat {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Xlsx => "xlsx",
        }
    }

    const fn default_filename(self) -> &'static str {
        match self {
            Self::Pdf => "financial-statements.pdf",
            Self::Xlsx => "financial-statements.xlsx",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing; stdout is reserved for statement output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "paciolus=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load().context("Failed to load configuration")?;

    match cli.command {
        Commands::Build {
            current,
            prior,
            format,
        } => {
            let statements = build_from_files(&current, prior.as_deref())?;
            print_statements(&statements, format)?;
        }
        Commands::Fetch {
            upload_id,
            prior_upload_id,
            format,
        } => {
            let client = connect(&config, cli.token)?;
            let (current, prior) = tokio::try_join!(
                fetch_grouping(&client, &upload_id),
                async {
                    match &prior_upload_id {
                        Some(id) => fetch_grouping(&client, id).await.map(Some),
                        None => Ok(None),
                    }
                }
            )?;
            let statements = StatementBuilder::build(&current, prior.as_ref());
            print_statements(&statements, format)?;
        }
        Commands::Export {
            current,
            prior,
            format,
            out,
        } => {
            let statements = build_from_files(&current, prior.as_deref())?;
            let client = connect(&config, cli.token)?;
            let path = export(&client, &statements, format, &out).await?;
            println!("{}", path.display());
        }
    }

    Ok(())
}

fn connect(config: &AppConfig, token: Option<String>) -> anyhow::Result<ApiClient> {
    let client = ApiClient::from_config(config).context("Failed to create API client")?;
    if let Some(token) = token {
        client.set_access_token(token);
    }
    info!(base_url = %client.base_url(), "API client ready");
    Ok(client)
}

fn load_grouping(path: &Path) -> anyhow::Result<LeadSheetGrouping> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a lead-sheet grouping", path.display()))
}

fn build_from_files(current: &Path, prior: Option<&Path>) -> anyhow::Result<FinancialStatements> {
    let current = load_grouping(current)?;
    let prior = prior.map(load_grouping).transpose()?;
    Ok(StatementBuilder::build(&current, prior.as_ref()))
}

async fn fetch_grouping(client: &ApiClient, upload_id: &str) -> anyhow::Result<LeadSheetGrouping> {
    client
        .get::<LeadSheetGrouping>(
            &format!("/audit/lead-sheets/{upload_id}"),
            RequestOptions::new(),
        )
        .await
        .into_result()
        .with_context(|| format!("Failed to fetch lead sheets for upload {upload_id}"))
}

async fn export(
    client: &ApiClient,
    statements: &FinancialStatements,
    format: ExportFormat,
    out: &Path,
) -> anyhow::Result<PathBuf> {
    let file = client
        .download(
            Method::POST,
            &format!("/export/financial-statements?format={}", format.as_str()),
            Some(RequestBody::json(statements)?),
            format.default_filename(),
            RequestOptions::new(),
        )
        .await
        .into_result()
        .context("Export failed")?;

    tokio::fs::create_dir_all(out)
        .await
        .with_context(|| format!("Failed to create {}", out.display()))?;
    let path = out.join(&file.filename);
    tokio::fs::write(&path, &file.bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!(path = %path.display(), size = file.bytes.len(), "Export written");
    Ok(path)
}

fn print_statements(statements: &FinancialStatements, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => print!("{}", TextReport(statements)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(statements)?),
    }
    Ok(())
}
