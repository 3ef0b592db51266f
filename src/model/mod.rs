pub mod dataset;
pub mod source;

pub use dataset::{display_value, Dataset, Record};
pub use source::{CompletionCallback, DataSource};
