//! Whole-document rewriting: locate, compile, splice.

use crate::config::CompilerConfig;
use crate::document::{self, Located};
use crate::{join_sequence, join_set};
use filterjoin_dsl::{JoinError, JoinLabel, JoinSequenceSpec, JoinSetSpec, JoinSpec};
use serde::Serialize;
use serde_json::Value;

/// What a rewrite (or a verification pass) touched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RewriteReport {
    pub join_sets: usize,
    pub join_sequences: usize,
    /// Filter clauses written back into the document.
    pub clauses: usize,
}

impl RewriteReport {
    pub fn specs(&self) -> usize {
        self.join_sets + self.join_sequences
    }

    fn record(&mut self, label: JoinLabel, clauses: usize) {
        match label {
            JoinLabel::JoinSet => self.join_sets += 1,
            JoinLabel::JoinSequence => self.join_sequences += 1,
        }
        self.clauses += clauses;
    }

    pub fn merge(&mut self, other: &RewriteReport) {
        self.join_sets += other.join_sets;
        self.join_sequences += other.join_sequences;
        self.clauses += other.clauses;
    }
}

/// Entry point for compiling join specifications.
///
/// Holds nothing but configuration, so one instance can serve any number of
/// requests concurrently.
#[derive(Debug, Clone, Default)]
pub struct JoinCompiler {
    config: CompilerConfig,
}

impl JoinCompiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn compile_join_set(&self, spec: &JoinSetSpec) -> Result<Vec<Value>, JoinError> {
        join_set::compile(spec, &self.config)
    }

    pub fn compile_join_sequence(&self, spec: &JoinSequenceSpec) -> Result<Vec<Value>, JoinError> {
        join_sequence::compile(spec, &self.config)
    }

    pub fn compile_spec(&self, spec: &JoinSpec) -> Result<Vec<Value>, JoinError> {
        match spec {
            JoinSpec::Set(spec) => self.compile_join_set(spec),
            JoinSpec::Sequence(spec) => self.compile_join_sequence(spec),
        }
    }

    /// Rewrites every join specification in `document` in place.
    ///
    /// Occurrences are handled in reverse document order: nested
    /// specifications (say, inside an endpoint's `queries`) are compiled before
    /// the specification hosting them, and splicing into an array only shifts
    /// siblings that have already been handled.
    pub fn compile_document(&self, document: &mut Value) -> Result<RewriteReport, JoinError> {
        let located = document::locate(document, &JoinLabel::ALL)?;
        let mut report = RewriteReport::default();

        for occurrence in located.iter().rev() {
            let spec = parse_occurrence(document, occurrence)?;
            let clauses = self.compile_spec(&spec)?;
            report.record(occurrence.label, clauses.len());
            document::splice(document, occurrence, clauses)?;
        }

        if report.specs() > 0 {
            tracing::debug!(
                join_sets = report.join_sets,
                join_sequences = report.join_sequences,
                clauses = report.clauses,
                "rewrote document"
            );
        }
        Ok(report)
    }

    /// Parses and validates every join specification without touching the
    /// document. Specifications nested in another are checked on their own.
    pub fn verify_document(&self, document: &Value) -> Result<RewriteReport, JoinError> {
        let mut report = RewriteReport::default();
        for occurrence in document::locate(document, &JoinLabel::ALL)? {
            let spec = parse_occurrence(document, &occurrence)?;
            if let JoinSpec::Set(set) = &spec {
                if set.queries.contains_key(&set.focus) {
                    return Err(JoinError::IllegalRootFilters {
                        index: set.focus.clone(),
                    });
                }
            }
            report.record(occurrence.label, 0);
        }
        Ok(report)
    }
}

fn parse_occurrence(document: &Value, occurrence: &Located) -> Result<JoinSpec, JoinError> {
    let at = occurrence.spec_pointer();
    let value = at.resolve(document).ok_or_else(|| JoinError::MalformedShape {
        at: occurrence.at.clone(),
        reason: format!("no `{}` object at this location", occurrence.label),
    })?;
    JoinSpec::parse(occurrence.label, value, &at)
}
