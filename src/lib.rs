pub mod cli;
pub mod commands;
pub mod panel;
mod state;

pub use commands::{
    AppConfig, ConfigError, FileInfo, FileRuleGroupStore, LocalBackend, SearchSettings,
};
pub use panel::{RunOutcome, SearchPanel};
pub use state::{AppState, Document, LineEnding};

use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use panel::PanelMode;

fn init_tracing(log_level: Option<&str>) {
    let filter = match log_level {
        Some(directive) => EnvFilter::try_new(directive).ok(),
        None => EnvFilter::try_from_default_env().ok(),
    }
    .unwrap_or_else(|| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_settings(config_path: &std::path::Path) -> SearchSettings {
    match commands::load_config(config_path) {
        Ok(config) => config.search,
        Err(err) => {
            tracing::warn!(path = %config_path.display(), "ignoring unreadable config: {err}");
            SearchSettings::default()
        }
    }
}

async fn run_cli(args: cli::Args) -> anyhow::Result<()> {
    let config_path = match args.config.clone() {
        Some(path) => path,
        None => commands::config_file_path()?,
    };
    let settings = load_settings(&config_path);

    let backend = LocalBackend::new();
    let info = backend
        .open_file(&args.path)
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("failed to open {}", args.path.display()))?;
    tracing::info!(
        path = %info.path,
        encoding = %info.encoding,
        line_ending = %info.line_ending,
        line_count = info.line_count,
        "opened document"
    );

    let panel = SearchPanel::new(
        Arc::new(backend.clone()),
        Arc::new(FileRuleGroupStore::new(config_path)),
        settings,
    );
    panel.activate_tab(info.id.clone());
    panel.open_panel(if args.replace.is_some() {
        PanelMode::Replace
    } else {
        PanelMode::Find
    });
    panel.set_search_mode(args.mode.into());
    panel.set_case_sensitive(args.case_sensitive);
    panel.set_result_filter_keyword(args.filter.clone().unwrap_or_default());
    panel.set_keyword(args.keyword.clone());
    panel.set_visible_rows(args.limit);

    if let Some(replacement) = args.replace {
        panel.set_replace_value(replacement);
        let replaced = panel.replace_all().await?;
        println!("{}", panel.status_line());

        if args.write && replaced > 0 {
            backend.save(&info.id).map_err(anyhow::Error::msg)?;
            tracing::info!(path = %info.path, replaced, "saved document");
        }
        return Ok(());
    }

    panel.search().await;
    while panel.search_results().len() < args.limit && panel.has_more_search_results() {
        if panel.load_more_search().await != RunOutcome::Applied {
            break;
        }
    }

    if let Some(err) = panel.error() {
        return Err(err.into());
    }

    for item in panel.search_results().iter().take(args.limit) {
        println!("{}:{}: {}", item.line, item.column, item.line_text);
    }
    println!("{}", panel.status_line());

    Ok(())
}

pub fn run() -> anyhow::Result<()> {
    let args = cli::parse();
    init_tracing(args.log_level.as_deref());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(run_cli(args))
}
