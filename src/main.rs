use anyhow::{Context, Result};
use eduview::{
    view::{DocumentTableView, HostDocument, LogTableView, RenderTarget},
    Config, Coordinator, DataSource, TriggerMode,
};
use reqwest::Client;
use std::sync::{Arc, Mutex};
use tokio::{
    fs,
    io::{AsyncBufReadExt, BufReader},
};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    std::panic::set_hook(Box::new(|info| {
        error!("panic: {}", info);
    }));

    // ─── 2) configure ────────────────────────────────────────────────
    let config = Config::from_env()?;
    info!(
        url = %config.data_url,
        delay_ms = config.delay.as_millis() as u64,
        trigger = ?config.trigger,
        "configured"
    );

    // ─── 3) load host document ───────────────────────────────────────
    let html = fs::read_to_string(&config.template)
        .await
        .with_context(|| format!("reading template {:?}", config.template))?;
    let document = HostDocument::parse(&html)
        .with_context(|| format!("parsing template {:?}", config.template))?;

    // ─── 4) wire model, views, coordinator ───────────────────────────
    let source = Arc::new(DataSource::new(
        Client::new(),
        config.data_url.clone(),
        config.delay,
    ));
    let mut table_view =
        DocumentTableView::new(Arc::new(Mutex::new(document)), source.delay());
    if let Some(out) = &config.output {
        table_view = table_view.with_snapshot(out);
    }
    let table_view = Arc::new(table_view);
    let views: Vec<Arc<dyn RenderTarget>> = vec![
        table_view.clone() as Arc<dyn RenderTarget>,
        Arc::new(LogTableView::new()) as Arc<dyn RenderTarget>,
    ];
    let coordinator = Coordinator::new(source, views);

    // ─── 5) run ──────────────────────────────────────────────────────
    coordinator.start(config.trigger).await;

    if config.trigger == TriggerMode::OnDemand {
        info!("press Enter to load, Ctrl-D to quit");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while lines.next_line().await?.is_some() {
            table_view.press_trigger();
        }
        coordinator.settle().await;
    }

    info!("all done");
    Ok(())
}
