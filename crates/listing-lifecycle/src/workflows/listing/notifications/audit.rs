use std::fmt::Debug;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::info;

use super::{ChangeObserver, ObserverError};
use crate::workflows::listing::domain::Listing;
use crate::workflows::listing::lifecycle::ListingState;

/// Timestamped audit line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub recorded_at: DateTime<Utc>,
    pub message: String,
}

impl AuditEntry {
    pub fn render(&self) -> String {
        format!(
            "[{}] {}",
            self.recorded_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.message
        )
    }
}

/// Append-only destination for audit entries.
pub trait AuditSink: Debug + Send + Sync {
    fn name(&self) -> &str;
    fn append(&self, entry: &AuditEntry) -> io::Result<()>;
}

/// Console sink backed by the tracing subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn name(&self) -> &str {
        "console"
    }

    fn append(&self, entry: &AuditEntry) -> io::Result<()> {
        info!(target: "listing_audit", recorded_at = %entry.recorded_at, "{}", entry.message);
        Ok(())
    }
}

/// Appends rendered entries to a file, creating it on first write.
#[derive(Debug)]
pub struct FileAuditSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }
}

impl AuditSink for FileAuditSink {
    fn name(&self) -> &str {
        "file"
    }

    fn append(&self, entry: &AuditEntry) -> io::Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", entry.render())
    }
}

/// Records every transition as `Listing <id> moved from <old> to <new>`.
///
/// Sink failures are reported on stderr and never returned to the caller.
#[derive(Debug, Clone)]
pub struct AuditObserver {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl AuditObserver {
    pub fn new(sinks: Vec<Arc<dyn AuditSink>>) -> Self {
        Self { sinks }
    }

    pub fn message(listing: &Listing, from: ListingState, to: ListingState) -> String {
        format!("Listing {} moved from {from} to {to}", listing.id())
    }
}

impl ChangeObserver for AuditObserver {
    fn on_state_changed(
        &self,
        listing: &Listing,
        from: ListingState,
        to: ListingState,
    ) -> Result<(), ObserverError> {
        let entry = AuditEntry {
            recorded_at: Utc::now(),
            message: Self::message(listing, from, to),
        };

        for sink in &self.sinks {
            if let Err(err) = sink.append(&entry) {
                eprintln!("audit sink '{}' failed: {err}", sink.name());
            }
        }
        Ok(())
    }
}
