// src/view/table.rs

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::{
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};
use tokio::fs;
use tracing::{debug, info, warn};

use super::{document::HostDocument, RenderTarget, TriggerHandler};
use crate::model::Dataset;

/// Class toggled on the container after each render to run the CSS transition.
pub const TRANSITION_CLASS: &str = "fade-in";

/// Renders the dataset as an HTML table inside the host document.
pub struct DocumentTableView {
    document: Arc<Mutex<HostDocument>>,
    delay: Duration,
    snapshot: Option<PathBuf>,
    handler: Mutex<Option<TriggerHandler>>,
}

impl DocumentTableView {
    pub fn new(document: Arc<Mutex<HostDocument>>, delay: Duration) -> Self {
        Self {
            document,
            delay,
            snapshot: None,
            handler: Mutex::new(None),
        }
    }

    /// Also write the document to `path` after every render.
    pub fn with_snapshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot = Some(path.into());
        self
    }

    pub fn document(&self) -> Arc<Mutex<HostDocument>> {
        Arc::clone(&self.document)
    }

    /// Simulate a user activating the trigger control.
    /// Returns false when nothing is bound.
    pub fn press_trigger(&self) -> bool {
        let handler = self
            .handler
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        match handler {
            Some(h) => {
                debug!("trigger pressed");
                h();
                true
            }
            None => {
                warn!("trigger pressed but no handler is bound");
                false
            }
        }
    }

    fn doc(&self) -> MutexGuard<'_, HostDocument> {
        self.document.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl RenderTarget for DocumentTableView {
    fn name(&self) -> &str {
        "document"
    }

    fn init_loading_state(&self) {
        let mut doc = self.doc();
        doc.loading.show();
        if !self.delay.is_zero() {
            doc.delay_note.set_text(format!(
                "Simulating a {} second delay...",
                self.delay.as_secs_f64()
            ));
            doc.delay_note.show();
        }
    }

    fn bind_trigger(&self, handler: TriggerHandler) {
        *self.handler.lock().unwrap_or_else(|e| e.into_inner()) = Some(handler);
    }

    async fn render(&self, dataset: Arc<Dataset>) -> Result<()> {
        let snapshot = {
            let mut doc = self.doc();
            doc.loading.hide();
            doc.trigger.hide();
            doc.delay_note.hide();

            doc.table.caption = dataset.title.clone();
            doc.table.head = vec![dataset.headers.clone()];
            doc.table.body = dataset.rows().collect();

            let when = dataset
                .last_request_display()
                .unwrap_or_else(|| "never".to_string());
            doc.last_request.set_text(format!("Last request: {}", when));

            let on = doc.container.toggle_class(TRANSITION_CLASS);
            debug!(class = TRANSITION_CLASS, on, "toggled transition");

            self.snapshot.as_ref().map(|path| (path.clone(), doc.to_html()))
        };

        if let Some((path, html)) = snapshot {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("creating {:?}", parent))?;
            }
            fs::write(&path, html)
                .await
                .with_context(|| format!("writing document snapshot {:?}", path))?;
            info!(path = %path.display(), "wrote document snapshot");
        }
        Ok(())
    }
}
