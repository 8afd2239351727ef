use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

use misboard::arrange_unplaced;
use misboard::backend::SchemaPayload;
use misboard::config::DesignerConfig;
use misboard::svg::SvgRenderer;

#[derive(Parser)]
#[command(author, version, about = "MIS schema designer tools")]
struct Cli {
    /// TOML settings file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Auto-arrange a stored schema model and print it as a save request
    Arrange {
        schema: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Render a stored schema model to SVG
    Render {
        schema: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Re-arrange even when every table has a stored position
        #[arg(long)]
        arrange: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level);

    let config = match &cli.config {
        Some(path) => DesignerConfig::load(path)?,
        None => DesignerConfig::default(),
    };

    match cli.command {
        Command::Arrange { schema, output } => {
            let mut editor = config.editor();
            arrange_unplaced(&mut editor, read_schema(&schema)?)?;
            editor.auto_arrange()?;
            let json = serde_json::to_string_pretty(&editor.export_model())?;
            write_output(output.as_deref(), &json)?;
        }
        Command::Render {
            schema,
            output,
            arrange,
        } => {
            let mut editor = config.editor();
            arrange_unplaced(&mut editor, read_schema(&schema)?)?;
            if arrange {
                editor.auto_arrange()?;
            }
            let svg = SvgRenderer::default().render(&editor);
            write_output(output.as_deref(), &svg)?;
        }
    }
    Ok(())
}

fn read_schema(path: &Path) -> Result<SchemaPayload> {
    let source =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let payload: SchemaPayload = serde_json::from_str(&source)
        .with_context(|| format!("{} is not a schema payload", path.display()))?;
    info!(tables = payload.tables.len(), joins = payload.joins.len(), "schema read");
    Ok(payload)
}

fn write_output(path: Option<&Path>, content: &str) -> Result<()> {
    match path {
        Some(path) => fs::write(path, content)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => print!("{}", content),
    }
    Ok(())
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_ref()
        .unwrap_or(&"warn".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level.to_string()))
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}
