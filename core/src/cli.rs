use crate::config::Config;
use crate::engine::{Engine, Status, Template, Val, VarPath, WriterSink};
use crate::host::{self, RenderHandle};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "rill")]
#[command(about = "Rill - A resumable streaming template renderer", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render a compiled template to stdout
    Render {
        /// Compiled template (JSON)
        template: PathBuf,

        /// Timed data script: [{"after_ms": 0, "path": "a.b", "value": ...}]
        #[arg(short = 'd', long = "data")]
        data: Option<PathBuf>,

        /// Template uses the compact array form
        #[arg(long)]
        compact: bool,

        /// Report variables still unresolved after this many milliseconds
        #[arg(long)]
        wait_timeout_ms: Option<u64>,

        /// Flush stdout after every chunk
        #[arg(long)]
        flush: bool,
    },
}

/// One step of a data script
///
/// `after_ms` is measured from the start of the render, not from the
/// previous step.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DataStep {
    #[serde(default)]
    pub after_ms: u64,
    pub path: VarPath,
    pub value: serde_json::Value,
}

/// Run the CLI by parsing process arguments
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli).await
}

/// Run the CLI with already-parsed arguments
pub async fn run_cli_with_args(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Render {
            template,
            data,
            compact,
            wait_timeout_ms,
            flush,
        } => {
            let config = Config::builder()
                .config_path(cli.config)
                .wait_timeout_ms(wait_timeout_ms)
                .flush_each_chunk(flush.then_some(true))
                .build()?;
            let template = load_template(&template, compact)?;
            let script = match data {
                Some(path) => load_script(&path)?,
                None => Vec::new(),
            };
            render(template, script, &config).await
        }
    }
}

pub fn load_template(path: &Path, compact: bool) -> Result<Template> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read template {}", path.display()))?;
    let template = if compact {
        Template::from_compact_json(&source)
    } else {
        Template::from_json(&source)
    };
    template.with_context(|| format!("Invalid template {}", path.display()))
}

pub fn load_script(path: &Path) -> Result<Vec<DataStep>> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read data script {}", path.display()))?;
    serde_json::from_str(&source)
        .with_context(|| format!("Invalid data script {}", path.display()))
}

/// Render to stdout while the script feeds data in the background
async fn render(template: Template, script: Vec<DataStep>, config: &Config) -> Result<()> {
    let (handle, mut commands) = host::channel();
    let player = tokio::spawn(play_script(handle, script));

    let stdout = std::io::stdout();
    let sink = WriterSink::new(stdout.lock()).flush_each_chunk(config.engine.flush_each_chunk);
    let mut engine = Engine::with_builtins(template).with_config(config.engine.clone());
    engine.attach_sink(sink)?;
    host::drive(&mut engine, &mut commands).await?;
    player.abort();

    match engine.status() {
        Status::Done => {
            info!("render finished");
            Ok(())
        }
        status => bail!("render did not finish: {:?}", status),
    }
}

async fn play_script(handle: RenderHandle, script: Vec<DataStep>) {
    let start = tokio::time::Instant::now();
    for step in script {
        tokio::time::sleep_until(start + Duration::from_millis(step.after_ms)).await;
        debug!(path = %step.path, after_ms = step.after_ms, "script step");
        if !handle.set(step.path, Val::from(step.value)) {
            break;
        }
    }
}
