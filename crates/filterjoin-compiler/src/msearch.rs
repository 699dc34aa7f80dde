//! Multi-search request bodies.
//!
//! A multi-search body is newline-delimited JSON where header lines and
//! search bodies alternate. Headers pass through as written, minus
//! surrounding whitespace; every search body is rewritten with
//! [`JoinCompiler::compile_document`]. Blank lines are skipped.

use crate::error::CompileError;
use crate::rewrite::{JoinCompiler, RewriteReport};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsearchRewrite {
    /// Rewritten body, newline-terminated.
    pub body: String,
    pub searches: usize,
    pub report: RewriteReport,
}

impl JoinCompiler {
    pub fn rewrite_msearch(&self, body: &str) -> Result<MsearchRewrite, CompileError> {
        let mut out = String::with_capacity(body.len());
        let mut report = RewriteReport::default();
        let mut searches = 0;
        let mut pending_header: Option<usize> = None;

        for (i, raw) in body.lines().enumerate() {
            let line = i + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }

            if pending_header.is_none() {
                pending_header = Some(line);
                out.push_str(trimmed);
                out.push('\n');
                continue;
            }
            pending_header = None;

            let mut document: Value = serde_json::from_str(trimmed).map_err(|err| CompileError::InvalidJson {
                line,
                message: err.to_string(),
            })?;
            let rewritten = self
                .compile_document(&mut document)
                .map_err(|source| CompileError::Line { line, source })?;
            report.merge(&rewritten);
            searches += 1;

            out.push_str(&document.to_string());
            out.push('\n');
        }

        if let Some(line) = pending_header {
            return Err(CompileError::InvalidJson {
                line,
                message: "header line is not followed by a search body".to_string(),
            });
        }

        tracing::debug!(searches, specs = report.specs(), "rewrote multi-search body");
        Ok(MsearchRewrite {
            body: out,
            searches,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filterjoin_dsl::JoinError;
    use serde_json::json;

    #[test]
    fn test_rewrites_bodies_only() {
        let body = concat!(
            "{\"index\":\"articles\"}\n",
            "{\"query\":{\"bool\":{\"filter\":[{\"join_sequence\":[{\"relation\":[{\"indices\":[\"companies\"],\"path\":\"id\"},{\"indices\":[\"articles\"],\"path\":\"company\"}]}]}]}}}\n",
            "\n",
            "{}\n",
            "{\"query\":{\"match_all\":{}}}\n",
        );
        let rewrite = JoinCompiler::default().rewrite_msearch(body).unwrap();
        assert_eq!(rewrite.searches, 2);
        assert_eq!(rewrite.report.join_sequences, 1);

        let lines: Vec<&str> = rewrite.body.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "{\"index\":\"articles\"}");
        assert_eq!(lines[2], "{}");

        let first: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(
            first["query"]["bool"]["filter"][0]["filterjoin"]["company"]["indices"],
            json!(["companies"])
        );
        assert!(rewrite.body.ends_with('\n'));
    }

    #[test]
    fn test_reports_line_numbers() {
        let err = JoinCompiler::default()
            .rewrite_msearch("{}\n{\"query\":\n")
            .unwrap_err();
        assert!(matches!(err, CompileError::InvalidJson { line: 2, .. }));

        let err = JoinCompiler::default()
            .rewrite_msearch("{}\n{}\n{}\n{\"join_sequence\":{}}\n")
            .unwrap_err();
        match err {
            CompileError::Line { line, source } => {
                assert_eq!(line, 4);
                assert!(matches!(source, JoinError::MalformedShape { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = JoinCompiler::default().rewrite_msearch("{}\n{}\n{}\n").unwrap_err();
        assert!(matches!(err, CompileError::InvalidJson { line: 3, .. }));
    }
}
