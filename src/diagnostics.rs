//! Structured, leveled diagnostic events.
//!
//! Each pipeline component records what it had to skip or distrust into a
//! [`Diagnostics`] collector owned by the caller. Events are also forwarded to
//! the `log` facade so command-line users see them without extra wiring.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warning,
}

/// The component that emitted an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Container,
    Parser,
    Normalizer,
    Coordinates,
    Text,
    Builder,
    Verifier,
}

/// What went wrong, independent of where.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Segment missing, IFD truncated, or an offset points outside the data.
    Structural,
    /// A single field could not be decoded (malformed DMS, zero denominator, bad UTF-16).
    ValueDecode,
    /// Re-parsed coordinates differ from what was written.
    VerificationMismatch,
    /// Informational only.
    Note,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub stage: Stage,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.stage, self.message)
    }
}

/// Collector for diagnostic events, in emission order.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    events: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        severity: Severity,
        stage: Stage,
        kind: DiagnosticKind,
        message: impl Into<String>,
    ) {
        let event = Diagnostic {
            severity,
            stage,
            kind,
            message: message.into(),
        };
        match severity {
            Severity::Debug => log::debug!("{event}"),
            Severity::Info => log::info!("{event}"),
            Severity::Warning => log::warn!("{event}"),
        }
        self.events.push(event);
    }

    pub fn warn(&mut self, stage: Stage, kind: DiagnosticKind, message: impl Into<String>) {
        self.record(Severity::Warning, stage, kind, message);
    }

    pub fn note(&mut self, stage: Stage, message: impl Into<String>) {
        self.record(Severity::Debug, stage, DiagnosticKind::Note, message);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.events.iter()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.events
            .iter()
            .filter(|e| e.severity == Severity::Warning)
    }

    pub fn has_kind(&self, kind: DiagnosticKind) -> bool {
        self.events.iter().any(|e| e.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.events
    }
}
