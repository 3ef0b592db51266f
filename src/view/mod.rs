// src/view/mod.rs

pub mod document;
pub mod log;
pub mod table;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::model::Dataset;

pub use document::HostDocument;
pub use log::{markdown_table, DiagnosticSink, LogTableView, TracingSink};
pub use table::DocumentTableView;

/// Invoked with no arguments each time a view's trigger control is used.
pub type TriggerHandler = Arc<dyn Fn() + Send + Sync>;

/// Something that can present a [`Dataset`].
///
/// Implementations keep no state derived from a dataset between renders;
/// everything they show comes from the dataset passed to `render`.
#[async_trait]
pub trait RenderTarget: Send + Sync {
    /// Short name used in log lines.
    fn name(&self) -> &str;

    /// Show that a load is in progress.
    fn init_loading_state(&self);

    /// Attach `handler` to this view's trigger control, replacing any earlier one.
    /// Views without a control ignore it.
    fn bind_trigger(&self, handler: TriggerHandler);

    /// Present `dataset`. The dataset is shared with the other views and must not be changed.
    async fn render(&self, dataset: Arc<Dataset>) -> Result<()>;
}
