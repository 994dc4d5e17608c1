use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use pager_core::{Controller, ModelConfig, PagedModel};
use tokio::time::sleep;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod harness;

use config::{load_settings, OutputFormat, Settings};
use harness::{LineRenderer, StringRangeProvider};

/// Drives one paging model through a scripted display session:
/// start, a few "load next page" steps, a refresh, then end.
#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value = "pager.toml")]
    config: PathBuf,
    #[arg(long)]
    page_size: Option<usize>,
    #[arg(long)]
    step_delay_ms: Option<u64>,
    #[arg(long)]
    fail_at_offset: Option<usize>,
    #[arg(long, value_enum)]
    output: Option<OutputFormat>,
    /// Number of "load next page" steps before the refresh.
    #[arg(long, default_value_t = 2)]
    next_pages: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut settings = load_settings(&args.config)
        .with_context(|| format!("failed to load settings from '{}'", args.config.display()))?;
    if let Some(v) = args.page_size {
        settings.set_page_size(v)?;
    }
    if let Some(v) = args.step_delay_ms {
        settings.step_delay = Duration::from_millis(v);
    }
    if args.fail_at_offset.is_some() {
        settings.fail_at_offset = args.fail_at_offset;
    }
    if let Some(v) = args.output {
        settings.output = v;
    }

    run_session(settings, args.next_pages).await
}

async fn run_session(settings: Settings, next_pages: usize) -> Result<()> {
    info!(
        page_size = settings.page_size.get(),
        step_delay = ?settings.step_delay,
        next_pages,
        "starting display session"
    );

    let provider = StringRangeProvider::new(settings.fetch_latency, settings.fail_at_offset);
    let model = Arc::new(PagedModel::with_config(
        provider,
        ModelConfig::with_page_size(settings.page_size),
    ));
    let renderer = Arc::new(LineRenderer::stdout(settings.output));
    let controller = Controller::new(Arc::clone(&model), renderer);

    controller.on_display_start();
    sleep(settings.step_delay).await;
    for _ in 0..next_pages {
        controller.load_next_page();
        sleep(settings.step_delay).await;
    }
    controller.refresh();
    sleep(settings.step_delay).await;
    controller.on_display_end();

    let cursor = model.cursor().await.context("paging model stopped early")?;
    info!(
        page = cursor.page(),
        offset = cursor.offset(),
        "display session finished"
    );
    Ok(())
}
