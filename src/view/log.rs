// src/view/log.rs

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use super::{RenderTarget, TriggerHandler};
use crate::model::Dataset;

/// Append-only text output for diagnostics.
pub trait DiagnosticSink: Send + Sync {
    fn write(&self, text: &str);
}

/// Sends diagnostics to the tracing subscriber at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn write(&self, text: &str) {
        info!("{}", text);
    }
}

/// Writes the dataset to the diagnostic stream as a Markdown table.
pub struct LogTableView<S = TracingSink> {
    sink: S,
}

impl LogTableView<TracingSink> {
    pub fn new() -> Self {
        Self { sink: TracingSink }
    }
}

impl Default for LogTableView<TracingSink> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: DiagnosticSink> LogTableView<S> {
    pub fn with_sink(sink: S) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl<S: DiagnosticSink> RenderTarget for LogTableView<S> {
    fn name(&self) -> &str {
        "log"
    }

    fn init_loading_state(&self) {
        self.sink.write("Loading education data...");
    }

    fn bind_trigger(&self, _handler: TriggerHandler) {
        debug!("log view has no trigger control; binding ignored");
    }

    async fn render(&self, dataset: Arc<Dataset>) -> Result<()> {
        self.sink.write(&format!(
            "{} (Markdown)\n\n{}",
            dataset.title,
            markdown_table(&dataset)
        ));
        Ok(())
    }
}

/// Format `dataset` as a Markdown table, one line per row, no trailing newline.
///
/// Separator dashes match each header's character count.
pub fn markdown_table(dataset: &Dataset) -> String {
    let separator: Vec<String> = dataset
        .headers
        .iter()
        .map(|h| "-".repeat(h.chars().count()))
        .collect();

    let mut lines = Vec::with_capacity(dataset.data.len() + 2);
    lines.push(markdown_line(&dataset.headers));
    lines.push(markdown_line(&separator));
    lines.extend(dataset.rows().map(|row| markdown_line(&row)));
    lines.join("\n")
}

fn markdown_line(cells: &[String]) -> String {
    format!("| {} |", cells.join(" | "))
}
