// src/model/dataset.rs

use chrono::{DateTime, Local};
use serde::Deserialize;
use serde_json::{Map, Value};

/// One row of the table. Key order is the column order.
pub type Record = Map<String, Value>;

/// The education history as served, plus the time it was retrieved.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub title: String,
    pub headers: Vec<String>,
    pub data: Vec<Record>,
    /// Set by the data source on every successful fetch. Any value in the
    /// payload is ignored.
    #[serde(default, skip_deserializing)]
    pub last_request: Option<DateTime<Local>>,
}

impl Dataset {
    /// Display values of every record, in insertion order.
    pub fn rows(&self) -> impl Iterator<Item = Vec<String>> + '_ {
        self.data
            .iter()
            .map(|record| record.values().map(display_value).collect())
    }

    /// `last_request` formatted for humans, e.g. `12:00:00 PM`.
    pub fn last_request_display(&self) -> Option<String> {
        self.last_request
            .map(|ts| ts.format(TIME_FORMAT).to_string())
    }
}

const TIME_FORMAT: &str = "%-I:%M:%S %p";

/// Text shown in a cell for a JSON value.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
