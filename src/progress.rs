//! Scrape progress on stderr.
//!
//! Stdout carries the end-of-run summary only, so progress lines never
//! interleave with output that scripts parse.

use serde_json::{json, Value};
use std::io::Write;

use crate::models::UpsertState;

#[derive(Clone, Debug)]
pub enum ScrapeProgressEvent {
    /// A listing page is about to be requested.
    Page { page: u32 },
    /// An item was upserted.
    Item {
        n: u64,
        unique_id: String,
        state: UpsertState,
    },
    /// An item was counted as an error and skipped.
    ItemFailed {
        n: u64,
        unique_id: String,
        error: String,
    },
}

impl ScrapeProgressEvent {
    /// One human-readable line, without the trailing newline.
    pub fn human_line(&self) -> String {
        match self {
            ScrapeProgressEvent::Page { page } => format!("page {:>3}", page),
            ScrapeProgressEvent::Item {
                n,
                unique_id,
                state,
            } => format!("  #{:<4} {:<8} {}", n, state.to_string(), unique_id),
            ScrapeProgressEvent::ItemFailed {
                n,
                unique_id,
                error,
            } => format!("  #{:<4} {:<8} {} ({})", n, "ERROR", unique_id, error),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ScrapeProgressEvent::Page { page } => json!({ "event": "page", "page": page }),
            ScrapeProgressEvent::Item {
                n,
                unique_id,
                state,
            } => json!({ "event": "item", "n": n, "unique_id": unique_id, "state": state }),
            ScrapeProgressEvent::ItemFailed {
                n,
                unique_id,
                error,
            } => json!({
                "event": "item",
                "n": n,
                "unique_id": unique_id,
                "state": "ERROR",
                "error": error
            }),
        }
    }
}

pub trait ScrapeProgressReporter: Send + Sync {
    fn report(&self, event: ScrapeProgressEvent);
}

pub struct StderrProgress;

impl ScrapeProgressReporter for StderrProgress {
    fn report(&self, event: ScrapeProgressEvent) {
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "{}", event.human_line());
    }
}

/// JSON lines on stderr.
pub struct JsonProgress;

impl ScrapeProgressReporter for JsonProgress {
    fn report(&self, event: ScrapeProgressEvent) {
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "{}", event.to_json());
    }
}

pub struct NoProgress;

impl ScrapeProgressReporter for NoProgress {
    fn report(&self, _event: ScrapeProgressEvent) {}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Human progress when stderr is a terminal, otherwise none.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ScrapeProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
