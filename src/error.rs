//! Error types for parsing and translation.

use thiserror::Error;

use crate::ast::ParsedQuery;

/// Everything that can stop a translation.
///
/// The `Unsupported*` variants name the construct that has no JSON-RQL
/// counterpart. `Parse` and `Compaction` are failures of the collaborators
/// (the SPARQL parser and the triple compactor), forwarded as-is.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Parse error: {0}")]
    Parse(#[from] spargebra::SparqlSyntaxError),

    #[error("Compaction error: {0}")]
    Compaction(String),

    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Unsupported aggregate: {0}")]
    UnsupportedAggregate(String),

    #[error("Unsupported expression: {0}")]
    UnsupportedExpression(String),

    #[error("Unsupported pattern: {0}")]
    UnsupportedPattern(String),

    #[error("Unsupported property path: {0}")]
    UnsupportedPath(String),
}

/// Failure of the top-level entry point.
///
/// Carries the parsed query whenever parsing got that far, so callers can
/// see which clause could not be translated.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct TranslateError {
    #[source]
    pub error: Error,
    pub parsed: Option<Box<ParsedQuery>>,
}

impl TranslateError {
    pub(crate) fn unparsed(error: Error) -> Self {
        Self { error, parsed: None }
    }

    pub(crate) fn with_query(error: Error, parsed: ParsedQuery) -> Self {
        Self {
            error,
            parsed: Some(Box::new(parsed)),
        }
    }
}
