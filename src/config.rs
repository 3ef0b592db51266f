// src/config.rs

use anyhow::{Context, Result};
use std::{env, path::PathBuf, time::Duration};
use url::Url;

use crate::controller::TriggerMode;

pub const DEFAULT_DATA_URL: &str = "http://127.0.0.1:8000/data/education.json";
pub const DEFAULT_TEMPLATE: &str = "static/index.html";
pub const DEFAULT_OUTPUT: &str = "out/index.html";

/// Runtime settings, read from `EDU_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Where the dataset is fetched from (`EDU_DATA_URL`).
    pub data_url: Url,
    /// Simulated latency after the response arrives (`EDU_DELAY_MS`, 0 disables).
    pub delay: Duration,
    /// Host document template (`EDU_TEMPLATE`).
    pub template: PathBuf,
    /// Where the rendered document is written (`EDU_OUTPUT`, empty disables).
    pub output: Option<PathBuf>,
    /// `auto` or `button` (`EDU_TRIGGER`).
    pub trigger: TriggerMode,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset keys fall back to the defaults.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let raw_url = get("EDU_DATA_URL").unwrap_or_else(|| DEFAULT_DATA_URL.to_string());
        let data_url =
            Url::parse(&raw_url).with_context(|| format!("parsing EDU_DATA_URL {:?}", raw_url))?;

        let delay_ms = match get("EDU_DELAY_MS") {
            Some(v) => v
                .trim()
                .parse::<u64>()
                .with_context(|| format!("parsing EDU_DELAY_MS {:?}", v))?,
            None => 0,
        };

        let template = get("EDU_TEMPLATE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATE));

        let output = match get("EDU_OUTPUT") {
            Some(v) if v.trim().is_empty() => None,
            Some(v) => Some(PathBuf::from(v)),
            None => Some(PathBuf::from(DEFAULT_OUTPUT)),
        };

        let trigger = match get("EDU_TRIGGER") {
            Some(v) => v.parse().context("parsing EDU_TRIGGER")?,
            None => TriggerMode::default(),
        };

        Ok(Self {
            data_url,
            delay: Duration::from_millis(delay_ms),
            template,
            output,
            trigger,
        })
    }
}
