//! Prologue recovery.
//!
//! `spargebra` resolves prefixed names while parsing and keeps no record of
//! the declarations, so they are read back from the query text here. The
//! same goes for a `*` projection, which the algebra expands into a variable
//! list.

use std::sync::LazyLock;

use regex::Regex;

use crate::ast::Prefixes;

static PROLOGUE_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\s+|#[^\n]*|(?i:BASE)\s*<[^>]*>|(?i:PREFIX)\s*([\p{L}][\w.\-]*)?:\s*<([^>]*)>)")
        .expect("prologue regex is valid")
});

static STAR_PROJECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i:SELECT|DESCRIBE)\s+(?:(?i:DISTINCT|REDUCED)\s+)?\*")
        .expect("projection regex is valid")
});

/// Prefix declarations of the query prologue, label → namespace IRI.
///
/// Scanning stops at the first token that is not part of the prologue. A
/// label declared twice keeps its last IRI.
pub fn prefixes(text: &str) -> Prefixes {
    scan(text).0
}

/// Whether the query form projects `*` (`SELECT *`, `DESCRIBE *`).
pub fn projects_all(text: &str) -> bool {
    STAR_PROJECTION.is_match(scan(text).1)
}

fn scan(text: &str) -> (Prefixes, &str) {
    let mut prefixes = Prefixes::new();
    let mut rest = text;
    while let Some(captures) = PROLOGUE_ITEM.captures(rest) {
        let Some(item) = captures.get(0) else { break };
        if let Some(iri) = captures.get(2) {
            let label = captures.get(1).map_or("", |m| m.as_str());
            prefixes.insert(label.to_owned(), iri.as_str().to_owned());
        }
        rest = &rest[item.end()..];
    }
    (prefixes, rest)
}
