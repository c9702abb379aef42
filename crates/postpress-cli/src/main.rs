use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use postpress_common::config::FileStore;
use postpress_common::telemetry::{self, TelemetryConfig};
use postpress_common::Config;
use postpress_renderer::language::HttpFetcher;
use postpress_renderer::{LanguageService, Pipeline, Theme, css};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(version, about = "postpress - blog post content pipeline", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Input HTML file to render
    input: Option<PathBuf>,

    /// Output file; stdout when omitted
    dest: Option<PathBuf>,

    /// Color theme (light or dark); overrides the config file
    #[arg(long)]
    theme: Option<Theme>,

    /// Path to a config file (.json or .toml)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Emit the syntax highlighting stylesheet
    Css {
        /// Stylesheet theme; both themes combined when omitted
        #[arg(long)]
        theme: Option<Theme>,

        /// Output file; stdout when omitted
        dest: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_miette();
    telemetry::init(TelemetryConfig::from_env("postpress-cli"));

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Css { theme, dest }) => {
            let stylesheet = match theme {
                Some(theme) => css::stylesheet(theme)?,
                None => css::combined_stylesheet()?,
            };
            emit(dest, &stylesheet)?;
        }
        None => {
            let input = cli.input.ok_or_else(|| {
                miette::miette!("Input file required. Usage: postpress <input.html> [dest]")
            })?;
            render(input, cli.dest, cli.theme, cli.config).await?;
        }
    }

    Ok(())
}

async fn render(
    input: PathBuf,
    dest: Option<PathBuf>,
    theme: Option<Theme>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = match config_path {
        Some(path) => Config::load(&FileStore::new(path)).await?,
        None => Config::default(),
    };
    let theme = match theme {
        Some(theme) => theme,
        None => config.theme.parse()?,
    };

    let raw = std::fs::read_to_string(&input).into_diagnostic()?;
    let service = LanguageService::new(config, Arc::new(HttpFetcher::new()));
    let mut pipeline = Pipeline::new(service);
    let outcome = pipeline.activate(&raw, theme).await;

    for degradation in &outcome.degradations {
        tracing::warn!(stage = ?degradation.stage, "{}", degradation.detail);
    }
    if !outcome.failed_languages.is_empty() {
        tracing::warn!(languages = ?outcome.failed_languages, "definitions failed to load");
    }

    emit(dest, &outcome.html)?;
    Ok(())
}

fn emit(dest: Option<PathBuf>, content: &str) -> Result<()> {
    match dest {
        Some(path) => std::fs::write(&path, content).into_diagnostic()?,
        None => print!("{content}"),
    }
    Ok(())
}

fn init_miette() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .with_cause_chain()
                .color(true)
                .context_lines(5)
                .tab_width(2)
                .break_words(true)
                .build(),
        )
    }))
    .expect("couldn't set the miette hook");
    miette::set_panic_hook();
}
