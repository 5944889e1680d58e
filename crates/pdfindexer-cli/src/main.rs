use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use pdfindexer_core::config::host_limits;
use pdfindexer_core::config_file::{ConfigFile, HostConfig, load_config, read_config};
use pdfindexer_core::{FileRef, IndexingConfig, MergePolicy, MethodId, PdfIndexer, Registry};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod output;

use output::ColorMode;

/// PDF text indexer - extract PDF text into search index values
#[derive(Parser, Debug)]
#[command(name = "pdfindexer", version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: Overrides,

    #[command(subcommand)]
    command: Command,
}

/// Settings that override the config file and environment.
#[derive(Args, Debug, Default, Clone)]
struct Overrides {
    /// Config file to use instead of the platform/CWD cascade
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Extraction method: disabled, mupdf or pdftotext
    #[arg(long, global = true)]
    method: Option<String>,

    /// Discard policy: append, discard_always or discard_if_extracted
    #[arg(long, global = true)]
    policy: Option<MergePolicy>,

    /// Host max execution time in seconds
    #[arg(long, global = true)]
    max_execution_time: Option<i64>,

    /// Host memory limit, e.g. 128M
    #[arg(long, global = true)]
    memory_limit: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute the index value for one or more files
    Index {
        /// Files to index
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Builtin index value (defaults to the file name)
        #[arg(long)]
        builtin: Option<String>,

        /// Print one JSON object per file
        #[arg(long)]
        json: bool,
    },

    /// List extraction methods and whether they are available
    Methods,

    /// Print the resolved time and memory budget
    Budget,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let file = load_settings(&cli.settings, |key| std::env::var(key).ok())?;
    let config = IndexingConfig::from_file(&file);
    let registry = build_registry(&config);
    let indexer = PdfIndexer::new(config, registry, host_limits(&file));

    let color = ColorMode(!cli.settings.no_color);
    let mut stdout = std::io::stdout();

    match cli.command {
        Command::Index {
            files,
            builtin,
            json,
        } => index(&indexer, &files, builtin.as_deref(), json, color, &mut stdout).await,
        Command::Methods => {
            let registry = indexer.registry();
            output::print_methods(
                &mut stdout,
                &registry.list_methods(),
                indexer.config().method,
                indexer.method(),
                &registry.notes(),
                color,
            )?;
            Ok(())
        }
        Command::Budget => {
            output::print_budget(&mut stdout, indexer.method(), indexer.budget(), color)?;
            Ok(())
        }
    }
}

/// Resolve the config file: CLI flags > environment > file > defaults.
fn load_settings(
    overrides: &Overrides,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<ConfigFile> {
    let mut file = match &overrides.config {
        Some(path) => read_config(path)?,
        None => load_config(),
    };

    if let Some(method) = overrides
        .method
        .clone()
        .or_else(|| env("PDFINDEXER_METHOD"))
    {
        file.indexing_method = Some(method);
    }
    if let Some(policy) = overrides.policy {
        file.discard_builtin_index = Some(policy);
    }

    let max_execution_time = overrides.max_execution_time.or_else(|| {
        env("MAX_EXECUTION_TIME").and_then(|v| match v.trim().parse() {
            Ok(secs) => Some(secs),
            Err(_) => {
                tracing::warn!(value = %v, "ignoring non-numeric MAX_EXECUTION_TIME");
                None
            }
        })
    });
    let memory_limit = overrides
        .memory_limit
        .clone()
        .or_else(|| env("MEMORY_LIMIT"));

    if max_execution_time.is_some() || memory_limit.is_some() {
        let host = file.host.get_or_insert_with(HostConfig::default);
        if max_execution_time.is_some() {
            host.max_execution_time = max_execution_time;
        }
        if memory_limit.is_some() {
            host.memory_limit = memory_limit;
        }
    }

    Ok(file)
}

fn build_registry(config: &IndexingConfig) -> Registry {
    let builder = Registry::builder();
    #[cfg(feature = "mupdf")]
    let builder = builder.in_process(
        MethodId::Mupdf,
        Arc::new(pdfindexer_mupdf::MupdfBackend::new()),
    );
    builder
        .external(MethodId::Pdftotext, Arc::new(config.pdftotext.backend()))
        .build()
}

async fn index(
    indexer: &PdfIndexer,
    files: &[PathBuf],
    builtin: Option<&str>,
    json: bool,
    color: ColorMode,
    w: &mut dyn Write,
) -> anyhow::Result<()> {
    if !indexer.is_active() {
        tracing::warn!("PDF extraction is disabled, builtin values are returned unchanged");
    }

    for path in files {
        let file = match FileRef::from_path(path) {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable file");
                continue;
            }
        };
        let builtin = builtin
            .map(str::to_string)
            .unwrap_or_else(|| default_builtin(path));

        let value = indexer.on_get_index_value(&file, &builtin).await;

        if json {
            let record = serde_json::json!({
                "path": path.display().to_string(),
                "method": indexer.method().as_str(),
                "value": value,
            });
            writeln!(w, "{}", record)?;
        } else {
            output::print_index_value(w, &path.display().to_string(), &value, color)?;
        }
    }
    Ok(())
}

/// The host's own index value for a file is its name.
fn default_builtin(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
