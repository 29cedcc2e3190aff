//! Append-only record of everything the pipeline skipped, retried or gave up on.
//!
//! Every entry is emitted through `tracing` and kept in memory in arrival
//! order. When a mirror file is attached each entry is also appended to it as
//! one `;`-separated line.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticKind {
    RowSkipped,
    MalformedGeometry,
    OverlapRejected,
    SplitFailed { tolerance: f64 },
    RetrySucceeded { tolerance: f64 },
    RetryAbandoned { ceiling: f64 },
    GeometryUnresolved,
    UnsortedInput,
    DuplicateObservation,
    SinkUnavailable,
}

impl DiagnosticKind {
    pub fn label(&self) -> &'static str {
        match self {
            DiagnosticKind::RowSkipped => "row_skipped",
            DiagnosticKind::MalformedGeometry => "malformed_geometry",
            DiagnosticKind::OverlapRejected => "overlap_rejected",
            DiagnosticKind::SplitFailed { .. } => "split_failed",
            DiagnosticKind::RetrySucceeded { .. } => "retry_succeeded",
            DiagnosticKind::RetryAbandoned { .. } => "retry_abandoned",
            DiagnosticKind::GeometryUnresolved => "geometry_unresolved",
            DiagnosticKind::UnsortedInput => "unsorted_input",
            DiagnosticKind::DuplicateObservation => "duplicate_observation",
            DiagnosticKind::SinkUnavailable => "sink_unavailable",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::SplitFailed { tolerance }
            | DiagnosticKind::RetrySucceeded { tolerance } => {
                write!(f, "{}@{}", self.label(), tolerance)
            }
            DiagnosticKind::RetryAbandoned { ceiling } => {
                write!(f, "{}@{}", self.label(), ceiling)
            }
            _ => f.write_str(self.label()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Parent id, node id or path the entry is about.
    pub subject: String,
    pub message: String,
}

#[derive(Default)]
pub struct DiagnosticLog {
    entries: Vec<Diagnostic>,
    mirror: Option<BufWriter<File>>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens (or creates) `path` for appending and mirrors every later entry into it.
    pub fn with_mirror(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            entries: Vec::new(),
            mirror: Some(BufWriter::new(file)),
        })
    }

    pub fn record(
        &mut self,
        kind: DiagnosticKind,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) {
        let entry = Diagnostic {
            kind,
            subject: subject.into(),
            message: message.into(),
        };
        warn!(kind = %entry.kind, subject = %entry.subject, "{}", entry.message);

        if let Some(mirror) = self.mirror.as_mut() {
            let line = format!(
                "{};{};{};{}\n",
                chrono::Utc::now().to_rfc3339(),
                entry.kind,
                entry.subject,
                entry.message
            );
            if let Err(e) = mirror.write_all(line.as_bytes()) {
                warn!("Diagnostic mirror stopped accepting writes: {}", e);
                self.mirror = None;
            }
        }

        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, label: &str) -> usize {
        self.entries
            .iter()
            .filter(|e| e.kind.label() == label)
            .count()
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        match self.mirror.as_mut() {
            Some(mirror) => mirror.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for DiagnosticLog {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!("Could not flush diagnostic mirror: {}", e);
        }
    }
}

impl fmt::Debug for DiagnosticLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagnosticLog")
            .field("entries", &self.entries)
            .field("mirrored", &self.mirror.is_some())
            .finish()
    }
}
