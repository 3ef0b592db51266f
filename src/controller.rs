// src/controller.rs

use anyhow::{bail, Result};
use std::{
    str::FromStr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard, Weak,
    },
};
use tokio::{runtime::Handle, task::JoinHandle};
use tracing::{debug, error, info, warn};

use crate::model::{DataSource, Dataset};
use crate::view::{RenderTarget, TriggerHandler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
}

/// How loads are started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerMode {
    /// Load once as soon as the coordinator starts.
    #[default]
    Auto,
    /// Load each time a view's trigger control is used.
    OnDemand,
}

impl FromStr for TriggerMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(TriggerMode::Auto),
            "button" | "on-demand" | "ondemand" => Ok(TriggerMode::OnDemand),
            other => bail!("unknown trigger mode {:?} (expected auto or button)", other),
        }
    }
}

/// Outcome of one render cycle across all views.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RenderSummary {
    pub rendered: usize,
    pub failed: usize,
}

/// Wires triggers to fetches and fetch completion to the views.
///
/// Loads are not serialized: triggering while a fetch is in flight starts a
/// second fetch, and each one renders every view when it completes.
pub struct Coordinator {
    source: Arc<DataSource>,
    views: Arc<[Arc<dyn RenderTarget>]>,
    in_flight: AtomicUsize,
    /// Loads spawned by trigger handlers, kept so `settle` can await them.
    triggered: Mutex<Vec<JoinHandle<()>>>,
}

impl Coordinator {
    /// Build the coordinator and register it as `source`'s completion callback.
    pub fn new(source: Arc<DataSource>, views: Vec<Arc<dyn RenderTarget>>) -> Arc<Self> {
        let views: Arc<[Arc<dyn RenderTarget>]> = views.into();
        let for_callback = Arc::clone(&views);
        source.register_completion_callback(move |dataset| {
            let views = Arc::clone(&for_callback);
            async move {
                render_all(&views, Arc::new(dataset)).await;
            }
        });
        Arc::new(Self {
            source,
            views,
            in_flight: AtomicUsize::new(0),
            triggered: Mutex::new(Vec::new()),
        })
    }

    pub fn state(&self) -> LoadState {
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            LoadState::Loading
        } else {
            LoadState::Idle
        }
    }

    /// Begin operation. `Auto` loads once now; `OnDemand` binds every view's
    /// trigger to a load and returns without loading.
    pub async fn start(self: &Arc<Self>, mode: TriggerMode) {
        info!(?mode, views = self.views.len(), "starting coordinator");
        match mode {
            TriggerMode::Auto => self.load().await,
            TriggerMode::OnDemand => {
                let handle = Handle::current();
                for view in self.views.iter() {
                    view.bind_trigger(load_trigger(Arc::downgrade(self), handle.clone()));
                }
            }
        }
    }

    /// Show the loading state on every view, then fetch.
    pub async fn load(&self) {
        if self.in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
            warn!("load triggered while another fetch is in flight");
        }
        for view in self.views.iter() {
            view.init_loading_state();
        }
        self.source.fetch_dataset().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    /// Wait for every load started by a trigger so far, including loads
    /// triggered while waiting.
    pub async fn settle(&self) {
        loop {
            let pending = std::mem::take(&mut *self.triggered_loads());
            if pending.is_empty() {
                return;
            }
            debug!(count = pending.len(), "awaiting triggered loads");
            for handle in pending {
                if let Err(e) = handle.await {
                    error!(error = %e, "triggered load panicked");
                }
            }
        }
    }

    fn triggered_loads(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.triggered.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Render `dataset` on every view; the same path the data source callback takes.
    pub async fn on_dataset_ready(&self, dataset: Dataset) -> RenderSummary {
        render_all(&self.views, Arc::new(dataset)).await
    }
}

fn load_trigger(coordinator: Weak<Coordinator>, handle: Handle) -> TriggerHandler {
    Arc::new(move || match coordinator.upgrade() {
        Some(c) => {
            let task = handle.spawn({
                let c = Arc::clone(&c);
                async move { c.load().await }
            });
            let mut triggered = c.triggered_loads();
            triggered.retain(|h| !h.is_finished());
            triggered.push(task);
        }
        None => debug!("trigger fired after coordinator was dropped"),
    })
}

/// Start every render before awaiting any, then wait for all of them.
/// A failing or panicking view is logged and counted; it never stops the others.
async fn render_all(views: &[Arc<dyn RenderTarget>], dataset: Arc<Dataset>) -> RenderSummary {
    let handles: Vec<_> = views
        .iter()
        .map(|view| {
            let view = Arc::clone(view);
            let dataset = Arc::clone(&dataset);
            let name = view.name().to_string();
            (name, tokio::spawn(async move { view.render(dataset).await }))
        })
        .collect();

    let mut summary = RenderSummary::default();
    for (name, handle) in handles {
        match handle.await {
            Ok(Ok(())) => {
                debug!(view = %name, "rendered");
                summary.rendered += 1;
            }
            Ok(Err(e)) => {
                error!(view = %name, error = %format!("{:#}", e), "render failed");
                summary.failed += 1;
            }
            Err(e) => {
                error!(view = %name, error = %e, "render task panicked");
                summary.failed += 1;
            }
        }
    }
    info!(
        rendered = summary.rendered,
        failed = summary.failed,
        "render cycle settled"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{init_logging, sample_dataset, serve, unused_url, SAMPLE_JSON};
    use crate::view::{document::TEMPLATE, DocumentTableView, HostDocument};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use reqwest::Client;
    use std::{io, time::Duration};
    use tokio::time::{sleep, timeout};
    use tracing_subscriber::fmt;
    use url::Url;

    #[derive(Clone, Copy)]
    enum Behaviour {
        Ok,
        Fail,
        Panic,
    }

    type Events = Arc<Mutex<Vec<String>>>;

    struct RecordingView {
        name: String,
        behaviour: Behaviour,
        events: Events,
    }

    impl RecordingView {
        fn new(name: &str, behaviour: Behaviour, events: &Events) -> Arc<dyn RenderTarget> {
            Arc::new(Self {
                name: name.to_string(),
                behaviour,
                events: Arc::clone(events),
            })
        }

        fn push(&self, what: &str) {
            self.events
                .lock()
                .unwrap()
                .push(format!("{}:{}", what, self.name));
        }
    }

    #[async_trait]
    impl RenderTarget for RecordingView {
        fn name(&self) -> &str {
            &self.name
        }

        fn init_loading_state(&self) {
            self.push("init");
        }

        fn bind_trigger(&self, _handler: TriggerHandler) {
            self.push("bind");
        }

        async fn render(&self, _dataset: Arc<Dataset>) -> Result<()> {
            self.push("render");
            match self.behaviour {
                Behaviour::Ok => Ok(()),
                Behaviour::Fail => Err(anyhow!("broken on purpose")),
                Behaviour::Panic => panic!("view exploded"),
            }
        }
    }

    fn events() -> Events {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn taken(events: &Events) -> Vec<String> {
        events.lock().unwrap().clone()
    }

    fn count(events: &Events, entry: &str) -> usize {
        taken(events).iter().filter(|e| *e == entry).count()
    }

    fn coordinator(url: Url, delay: Duration, views: Vec<Arc<dyn RenderTarget>>) -> Arc<Coordinator> {
        let source = Arc::new(DataSource::new(Client::new(), url, delay));
        Coordinator::new(source, views)
    }

    async fn wait_for(events: &Events, entry: &str, n: usize) {
        timeout(Duration::from_secs(5), async {
            while count(events, entry) < n {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("timed out waiting for views");
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
        }
    }

    #[test]
    fn parses_trigger_modes() {
        assert_eq!("auto".parse::<TriggerMode>().unwrap(), TriggerMode::Auto);
        assert_eq!(" Button ".parse::<TriggerMode>().unwrap(), TriggerMode::OnDemand);
        assert!("sometimes".parse::<TriggerMode>().is_err());
    }

    #[tokio::test]
    async fn load_inits_every_view_then_renders_each_once() {
        init_logging();
        let ev = events();
        let url = serve(200, SAMPLE_JSON).await;
        let c = coordinator(
            url,
            Duration::from_millis(50),
            vec![
                RecordingView::new("a", Behaviour::Ok, &ev),
                RecordingView::new("b", Behaviour::Ok, &ev),
            ],
        );
        assert_eq!(c.state(), LoadState::Idle);

        c.start(TriggerMode::Auto).await;

        let log = taken(&ev);
        assert_eq!(log.len(), 4, "{:?}", log);
        assert_eq!(&log[..2], ["init:a", "init:b"]);
        assert_eq!(count(&ev, "render:a"), 1);
        assert_eq!(count(&ev, "render:b"), 1);
        assert_eq!(c.state(), LoadState::Idle);
    }

    #[tokio::test]
    async fn failing_views_do_not_block_siblings() {
        let buf = LogBuffer::default();
        let writer = buf.clone();
        let subscriber = fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let ev = events();
        let c = coordinator(
            unused_url().await,
            Duration::ZERO,
            vec![
                RecordingView::new("broken", Behaviour::Fail, &ev),
                RecordingView::new("exploding", Behaviour::Panic, &ev),
                RecordingView::new("healthy", Behaviour::Ok, &ev),
            ],
        );

        let summary = c.on_dataset_ready(sample_dataset()).await;

        assert_eq!(summary, RenderSummary { rendered: 1, failed: 2 });
        assert_eq!(count(&ev, "render:healthy"), 1);
        let logs = buf.contents();
        assert!(logs.contains("render failed"), "{}", logs);
        assert!(logs.contains("view=broken"), "{}", logs);
        assert!(logs.contains("render task panicked"), "{}", logs);
        assert!(logs.contains("view=exploding"), "{}", logs);
    }

    #[tokio::test]
    async fn fetch_failure_renders_nothing() {
        init_logging();
        let ev = events();
        let url = serve(404, "missing").await;
        let c = coordinator(
            url,
            Duration::ZERO,
            vec![RecordingView::new("a", Behaviour::Ok, &ev)],
        );

        c.load().await;

        assert_eq!(taken(&ev), vec!["init:a"]);
        assert_eq!(c.state(), LoadState::Idle);
    }

    #[tokio::test]
    async fn on_demand_waits_for_trigger() {
        init_logging();
        let ev = events();
        let url = serve(200, SAMPLE_JSON).await;
        let doc = HostDocument::parse(TEMPLATE).unwrap();
        let document_view = Arc::new(DocumentTableView::new(
            Arc::new(Mutex::new(doc)),
            Duration::ZERO,
        ));
        let c = coordinator(
            url,
            Duration::ZERO,
            vec![
                document_view.clone() as Arc<dyn RenderTarget>,
                RecordingView::new("rec", Behaviour::Ok, &ev),
            ],
        );

        c.start(TriggerMode::OnDemand).await;
        assert_eq!(taken(&ev), vec!["bind:rec"]);
        assert!(document_view.document().lock().unwrap().table.body.is_empty());

        assert!(document_view.press_trigger());
        wait_for(&ev, "render:rec", 1).await;
        // Both views settle in the same cycle; give the document a moment too.
        timeout(Duration::from_secs(5), async {
            while document_view.document().lock().unwrap().table.body.len() != 2 {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        assert!(document_view.press_trigger());
        wait_for(&ev, "render:rec", 2).await;
        assert_eq!(count(&ev, "init:rec"), 2);
    }

    #[tokio::test]
    async fn settle_awaits_every_triggered_load() {
        let ev = events();
        let url = serve(200, SAMPLE_JSON).await;
        let doc = HostDocument::parse(TEMPLATE).unwrap();
        let document_view = Arc::new(DocumentTableView::new(
            Arc::new(Mutex::new(doc)),
            Duration::ZERO,
        ));
        let c = coordinator(
            url,
            Duration::from_millis(100),
            vec![
                document_view.clone() as Arc<dyn RenderTarget>,
                RecordingView::new("rec", Behaviour::Ok, &ev),
            ],
        );
        c.start(TriggerMode::OnDemand).await;

        // No yield between pressing and settling: the loads have not started yet.
        assert!(document_view.press_trigger());
        assert!(document_view.press_trigger());
        c.settle().await;

        assert_eq!(count(&ev, "init:rec"), 2);
        assert_eq!(count(&ev, "render:rec"), 2);
        assert_eq!(c.state(), LoadState::Idle);
        assert_eq!(document_view.document().lock().unwrap().table.body.len(), 2);

        // Nothing pending returns at once.
        timeout(Duration::from_millis(100), c.settle())
            .await
            .expect("settle with nothing pending should not block");
    }

    #[tokio::test]
    async fn retrigger_during_fetch_is_not_guarded() {
        let ev = events();
        let url = serve(200, SAMPLE_JSON).await;
        let c = coordinator(
            url,
            Duration::from_millis(200),
            vec![RecordingView::new("a", Behaviour::Ok, &ev)],
        );

        let first = tokio::spawn({
            let c = c.clone();
            async move { c.load().await }
        });
        let second = tokio::spawn({
            let c = c.clone();
            async move { c.load().await }
        });
        sleep(Duration::from_millis(50)).await;
        assert_eq!(c.state(), LoadState::Loading);

        first.await.unwrap();
        second.await.unwrap();

        assert_eq!(count(&ev, "init:a"), 2);
        assert_eq!(count(&ev, "render:a"), 2);
        assert_eq!(c.state(), LoadState::Idle);
    }

    #[tokio::test]
    async fn trigger_after_drop_does_nothing() {
        let doc = HostDocument::parse(TEMPLATE).unwrap();
        let view = Arc::new(DocumentTableView::new(
            Arc::new(Mutex::new(doc)),
            Duration::ZERO,
        ));
        let c = coordinator(
            unused_url().await,
            Duration::ZERO,
            vec![view.clone() as Arc<dyn RenderTarget>],
        );
        c.start(TriggerMode::OnDemand).await;
        drop(c);

        assert!(view.press_trigger());
        sleep(Duration::from_millis(20)).await;
        assert!(view.document().lock().unwrap().loading.hidden);
    }
}
