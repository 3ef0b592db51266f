pub mod config;
pub mod controller;
pub mod model;
pub mod view;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::Config;
pub use controller::{Coordinator, LoadState, RenderSummary, TriggerMode};
pub use model::{DataSource, Dataset};
