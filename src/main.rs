//! Mentat CLI: 自然言語コマンドをワークフローに振り分ける対話型アシスタント

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use mentat::backend::create_backend;
use mentat::cli::{Console, LlmTroubleshooter, Session};
use mentat::config::{AppConfig, Provider};
use mentat::engine::CommandRouter;
use mentat::logging;
use mentat::workflow::TwitterWorkflow;

/// 設定ファイルを省略したときに探すパス
const DEFAULT_CONFIG_PATH: &str = "mentat.toml";

/// Mentat: natural-language command router
#[derive(Parser)]
#[command(name = "mentat", version, about = "Mentat: natural-language command router")]
struct Cli {
    /// Path to the settings file (defaults to ./mentat.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// LLM provider (anthropic / openai)
    #[arg(long)]
    provider: Option<Provider>,

    /// Backend timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Log level or RUST_LOG-style directives
    #[arg(long)]
    log_level: Option<String>,

    /// Run a single command and exit
    /// Example: mentat -c "Post a tweet saying 'Hello, World!'"
    #[arg(short = 'c', long = "command")]
    command: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&cli)?;
    let _guard = logging::init(&config.logging)?;

    info!(
        provider = %config.backend.provider,
        model = %config.backend.resolved_model(),
        "starting mentat"
    );

    let backend = create_backend(&config.backend)?;
    let console = Arc::new(Console::stdio());
    let troubleshooter =
        LlmTroubleshooter::new(backend.clone(), config.backend.clone(), console.clone());

    let router = CommandRouter::builder(backend.clone())
        .backend_options(config.backend.clone())
        .parser_options(config.parser)
        .workflow(Arc::new(TwitterWorkflow::from_env(
            backend,
            config.backend.clone(),
        )?))
        .troubleshooter(Arc::new(troubleshooter))
        .build()?;

    let session = Session::new(Arc::new(router), console);
    match cli.command {
        Some(command) => {
            session.execute(&command).await?;
        }
        None => session.run().await?,
    }
    Ok(())
}

/// 設定ファイル → 環境変数 → コマンドライン引数の順に上書きする
fn load_config(cli: &Cli) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => AppConfig::from_file(DEFAULT_CONFIG_PATH)?,
        None => AppConfig::default(),
    }
    .with_env()?;

    if let Some(provider) = cli.provider {
        config.backend.provider = provider;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        if timeout_ms == 0 {
            return Err("--timeout-ms must be greater than 0".into());
        }
        config.backend.timeout_ms = timeout_ms;
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    Ok(config)
}
