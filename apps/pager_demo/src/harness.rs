//! Stand-in provider and renderer used to drive a display session from the
//! command line.

use std::{
    io::{self, Write},
    sync::Mutex,
    time::Duration,
};

use async_trait::async_trait;
use pager_core::{DataProvider, FetchResult, Renderer};
use serde::Serialize;
use shared::{
    domain::{Identifiable, ItemId},
    error::FetchError,
};
use tracing::{info, warn};

use crate::config::OutputFormat;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Label {
    pub id: ItemId,
    pub text: String,
}

impl Identifiable for Label {
    type Id = ItemId;

    fn id(&self) -> ItemId {
        self.id
    }
}

/// Serves consecutive numbered labels, optionally failing at one offset.
pub struct StringRangeProvider {
    latency: Duration,
    fail_at_offset: Option<usize>,
}

impl StringRangeProvider {
    pub fn new(latency: Duration, fail_at_offset: Option<usize>) -> Self {
        Self {
            latency,
            fail_at_offset,
        }
    }
}

#[async_trait]
impl DataProvider for StringRangeProvider {
    type Item = Label;

    async fn retrieve(&self, count: usize, offset: usize) -> FetchResult<Label> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.fail_at_offset == Some(offset) {
            return Err(FetchError::new(format!("no rows available at offset {offset}")));
        }
        Ok((offset..offset.saturating_add(count))
            .map(|n| Label {
                id: ItemId(n as u64),
                text: format!("row {n}"),
            })
            .collect())
    }
}

/// Writes one line per rendered label.
pub struct LineRenderer<W> {
    format: OutputFormat,
    out: Mutex<W>,
}

impl LineRenderer<io::Stdout> {
    pub fn stdout(format: OutputFormat) -> Self {
        Self::with_writer(format, io::stdout())
    }
}

impl<W: Write + Send + 'static> LineRenderer<W> {
    pub fn with_writer(format: OutputFormat, out: W) -> Self {
        Self {
            format,
            out: Mutex::new(out),
        }
    }

    fn line(&self, label: &Label) -> io::Result<String> {
        match self.format {
            OutputFormat::Text => Ok(format!("{}: {}", label.id, label.text)),
            OutputFormat::Json => serde_json::to_string(label).map_err(io::Error::from),
        }
    }
}

impl<W: Write + Send + 'static> Renderer for LineRenderer<W> {
    type Item = Label;

    fn render(&self, item: &Label) {
        let written = self.line(item).and_then(|line| {
            let mut out = self
                .out
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            writeln!(out, "{line}")
        });
        if let Err(err) = written {
            warn!(item = %item.id, %err, "failed to render item");
        }
    }

    fn display_loading(&self) {
        info!("loading page");
    }

    fn display_empty(&self) {
        info!("nothing to display");
    }
}

#[cfg(test)]
#[path = "tests/harness_tests.rs"]
mod tests;
