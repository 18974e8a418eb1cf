//! episciences-front - Episciences journal data layer
//!
//! Fetches raw records from the Episciences API, normalizes them into display
//! models, and lists the parameters a static site build needs.
//!
//! ## Usage
//!
//! ### CLI Mode
//! ```bash
//! NEXT_PUBLIC_JOURNAL_RVCODE=dmtcs episciences-front article 42
//! episciences-front --rvcode dmtcs static-params articles --format csv -o articles.csv
//! ```
//!
//! ### HTTP Server Mode
//! ```bash
//! episciences-front --rvcode dmtcs serve --port 3000
//! ```

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use episciences_front::{
    config::{Config, ENV_RVCODE},
    export::MetadataType,
    fetcher::ApiClient,
    page::{self, ArticlePage},
    static_params::{self, ParamKind, StaticParamsGenerator},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Episciences journal data layer
#[derive(Parser)]
#[command(name = "episciences-front")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Journal code (overrides NEXT_PUBLIC_JOURNAL_RVCODE)
    #[arg(long, global = true)]
    rvcode: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a normalized article with its citations
    Article {
        /// Paper ID
        id: String,

        /// UI language used for the related volume
        #[arg(long)]
        lang: Option<String>,
    },

    /// Print a normalized volume with its articles
    Volume {
        /// Volume ID
        id: String,

        #[arg(long)]
        lang: Option<String>,
    },

    /// Print a normalized section with its articles
    Section {
        /// Section ID
        id: String,
    },

    /// Search articles and print results with facets
    Search {
        /// Search terms
        terms: String,

        #[arg(long, default_value = "1")]
        page: u32,

        #[arg(long, default_value = "10")]
        per_page: u32,
    },

    /// Download a metadata export
    Export {
        /// Paper ID
        id: String,

        /// Format (bibtex, ris, tei, csl, ...)
        format: MetadataType,

        /// Output directory
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,
    },

    /// List static-generation parameters
    StaticParams {
        /// articles, volumes, sections, pages or languages
        kind: ParamKind,

        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run the JSON preview server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_writer(std::io::stderr);
    if cli.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let config = load_config(cli.rvcode.as_deref())?;
    let client = ApiClient::new(&config).context("Failed to create API client")?;

    match cli.command {
        Commands::Article { id, lang } => {
            let lang = lang.unwrap_or_else(|| config.languages.default.clone());
            let page = page::assemble_article_page(&client, &lang, &id).await;
            print_json(&page)
        }
        Commands::Volume { id, lang } => {
            let lang = lang.unwrap_or_else(|| config.languages.default.clone());
            let page = page::assemble_volume_page(&client, &lang, &id)
                .await
                .with_context(|| format!("Volume {} is unavailable", id))?;
            print_json(&page)
        }
        Commands::Section { id } => {
            let page = page::assemble_section_page(&client, &id)
                .await
                .with_context(|| format!("Section {} is unavailable", id))?;
            print_json(&page)
        }
        Commands::Search { terms, page, per_page } => {
            let results = page::search_page(&client, &terms, page, per_page)
                .await
                .context("Search failed")?;
            print_json(&results)
        }
        Commands::Export { id, format, output } => run_export(&client, &id, format, output).await,
        Commands::StaticParams { kind, format, output } => {
            run_static_params(&client, &config, kind, format, output).await
        }
        Commands::Serve { port, host } => run_server(config, client, host, port).await,
    }
}

/// Environment configuration, with the CLI journal code taking precedence
fn load_config(rvcode: Option<&str>) -> Result<Config> {
    Config::from_lookup(|key| match (key, rvcode) {
        (ENV_RVCODE, Some(code)) => Some(code.to_string()),
        _ => std::env::var(key).ok(),
    })
    .context("Invalid configuration")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let body = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", body);
    Ok(())
}

// ============================================================================
// Export & Static Params
// ============================================================================

async fn run_export(client: &ApiClient, id: &str, format: MetadataType, output_dir: PathBuf) -> Result<()> {
    let body = client
        .paper_export(id, format)
        .await
        .with_context(|| format!("Failed to export paper {} as {}", id, format.label()))?;

    std::fs::create_dir_all(&output_dir).context("Failed to create output directory")?;
    let path = output_dir.join(format.file_name(id));
    std::fs::write(&path, body).context("Failed to write export")?;

    info!(id, format = %format, path = %path.display(), "Saved export");
    println!("Saved: {}", path.display());
    Ok(())
}

async fn run_static_params(
    client: &ApiClient,
    config: &Config,
    kind: ParamKind,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> Result<()> {
    let generator = StaticParamsGenerator::new(client, &config.rebuild, &config.languages);
    let params = generator
        .generate(kind)
        .await
        .with_context(|| format!("Failed to list {} params", kind))?;

    match (output, format) {
        (Some(path), _) => {
            static_params::save_params(&path, &params).context("Failed to save params")?;
            println!("Saved: {}", path.display());
        }
        (None, OutputFormat::Csv) => {
            static_params::write_params_csv(std::io::stdout(), &params).context("Failed to write CSV")?;
        }
        (None, OutputFormat::Json) => print_json(&params)?,
    }
    Ok(())
}

// ============================================================================
// HTTP Server
// ============================================================================

struct AppState {
    config: Config,
    client: ApiClient,
}

async fn run_server(config: Config, client: ApiClient, host: String, port: u16) -> Result<()> {
    info!(host = %host, port = port, rvcode = %config.rvcode, "Starting HTTP server");
    println!("Starting server at http://{}:{}", host, port);

    let app_state = Arc::new(AppState { config, client });

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/{lang}/articles/{id}", get(article_handler))
        .route("/{lang}/volumes/{id}", get(volume_handler))
        .route("/{lang}/sections/{id}", get(section_handler))
        .route("/{lang}/search", get(search_handler))
        .route("/static-params/{kind}", get(static_params_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .context("Invalid host:port")?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn check_language(state: &AppState, lang: &str) -> Option<Response> {
    if state.config.languages.is_accepted(lang) {
        None
    } else {
        Some(error_response(
            StatusCode::NOT_FOUND,
            format!("Language '{}' is not accepted", lang),
        ))
    }
}

/// Health check endpoint
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "OK",
        "journal": state.config.rvcode,
        "time": Local::now().to_rfc3339(),
    }))
}

async fn article_handler(
    State(state): State<Arc<AppState>>,
    Path((lang, id)): Path<(String, String)>,
) -> Response {
    if let Some(rejection) = check_language(&state, &lang) {
        return rejection;
    }
    info!(id = %id, lang = %lang, "Article request");

    match page::assemble_article_page(&state.client, &lang, &id).await {
        page @ ArticlePage::Ready(_) => Json(page).into_response(),
        page @ ArticlePage::Unavailable { .. } => (StatusCode::NOT_FOUND, Json(page)).into_response(),
    }
}

async fn volume_handler(
    State(state): State<Arc<AppState>>,
    Path((lang, id)): Path<(String, String)>,
) -> Response {
    if let Some(rejection) = check_language(&state, &lang) {
        return rejection;
    }
    info!(id = %id, lang = %lang, "Volume request");

    match page::assemble_volume_page(&state.client, &lang, &id).await {
        Some(page) => Json(page).into_response(),
        None => error_response(StatusCode::NOT_FOUND, format!("Volume {} is unavailable", id)),
    }
}

async fn section_handler(
    State(state): State<Arc<AppState>>,
    Path((lang, id)): Path<(String, String)>,
) -> Response {
    if let Some(rejection) = check_language(&state, &lang) {
        return rejection;
    }
    info!(id = %id, lang = %lang, "Section request");

    match page::assemble_section_page(&state.client, &id).await {
        Some(page) => Json(page).into_response(),
        None => error_response(StatusCode::NOT_FOUND, format!("Section {} is unavailable", id)),
    }
}

/// Search query string
#[derive(Debug, Deserialize)]
struct SearchParams {
    terms: String,
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default = "default_per_page", rename = "itemsPerPage")]
    per_page: u32,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    10
}

async fn search_handler(
    State(state): State<Arc<AppState>>,
    Path(lang): Path<String>,
    Query(params): Query<SearchParams>,
) -> Response {
    if let Some(rejection) = check_language(&state, &lang) {
        return rejection;
    }
    info!(terms = %params.terms, page = params.page, "Search request");

    match page::search_page(&state.client, &params.terms, params.page, params.per_page).await {
        Ok(results) => Json(results).into_response(),
        Err(e) => {
            error!(error = %e, "Search failed");
            error_response(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}

async fn static_params_handler(State(state): State<Arc<AppState>>, Path(kind): Path<String>) -> Response {
    let kind: ParamKind = match kind.parse() {
        Ok(kind) => kind,
        Err(e) => return error_response(StatusCode::NOT_FOUND, e),
    };

    let generator = StaticParamsGenerator::new(&state.client, &state.config.rebuild, &state.config.languages);
    match generator.generate(kind).await {
        Ok(params) => Json(params).into_response(),
        Err(e) => {
            error!(kind = %kind, error = %e, "Static params failed");
            error_response(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}
