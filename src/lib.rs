//! SPARQL to JSON-RQL Translator - Library
//!
//! Parses a SPARQL query with `spargebra`, lowers the algebra back into a
//! clause-ordered syntax tree and writes that tree out as a JSON-RQL
//! document. The library is also compiled to WebAssembly for use from
//! JavaScript/TypeScript.
//!
//! ```
//! let translation = sparql_jrql::to_json_rql("SELECT ?s WHERE { ?s a <http://ex/Type> }").unwrap();
//! assert_eq!(
//!     translation.document,
//!     serde_json::json!({ "@select": "?s", "@where": { "@id": "?s", "@type": "http://ex/Type" } })
//! );
//! ```

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::wasm_bindgen;

use serde::Serialize;
use serde_json::Value;
use spargebra::SparqlParser;
use tracing::debug;

pub mod ast;
pub mod compact;
pub mod error;
pub mod hiding;
pub mod lower;
pub mod operators;
pub mod prologue;
pub mod translate;
mod expression;
mod pattern;
mod query;
mod util;

pub use ast::ParsedQuery;
pub use error::{Error, TranslateError};
pub use translate::Translator;

// =============================================================================
// OPTIONS AND RESULTS
// =============================================================================

/// Options for the translation
#[derive(Clone, Debug)]
pub struct TranslateOptions {
    /// Write `xsd:integer`, `xsd:boolean` and `xsd:double` literals as JSON
    /// numbers and booleans instead of `{"@value", "@type"}` objects.
    pub native_types: bool,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self { native_types: true }
    }
}

/// A successful translation: the JSON-RQL document and the tree it came from.
#[derive(Clone, Debug, Serialize)]
pub struct Translation {
    pub document: Value,
    pub parsed: ParsedQuery,
}

// =============================================================================
// CORE TRANSLATE FUNCTIONS
// =============================================================================

/// Parse SPARQL text into the clause-ordered tree.
pub fn parse(text: &str) -> Result<ParsedQuery, Error> {
    let prefixes = prologue::prefixes(text);
    let algebra = SparqlParser::new().parse_query(text)?;
    lower::query(&algebra, prefixes, prologue::projects_all(text))
}

/// Translate an already parsed query into a JSON-RQL document.
pub fn translate(parsed: &ParsedQuery) -> Result<Value, Error> {
    translate_with_options(parsed, &TranslateOptions::default())
}

pub fn translate_with_options(parsed: &ParsedQuery, options: &TranslateOptions) -> Result<Value, Error> {
    Translator::with_options(&parsed.prefixes, options).document(parsed)
}

/// Translate SPARQL text into a JSON-RQL document.
///
/// On failure after parsing, the error carries the parsed query so the
/// caller can see what could not be translated.
pub fn to_json_rql(text: &str) -> Result<Translation, TranslateError> {
    to_json_rql_with_options(text, &TranslateOptions::default())
}

pub fn to_json_rql_with_options(
    text: &str,
    options: &TranslateOptions,
) -> Result<Translation, TranslateError> {
    let parsed = parse(text).map_err(TranslateError::unparsed)?;
    debug!(query_type = ?parsed.query_type, "translating query");
    match translate_with_options(&parsed, options) {
        Ok(document) => Ok(Translation { document, parsed }),
        Err(error) => Err(TranslateError::with_query(error, parsed)),
    }
}

// =============================================================================
// WASM BINDINGS
// =============================================================================

#[cfg(target_arch = "wasm32")]
#[derive(Serialize)]
struct WasmError {
    error: String,
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(js_name = to_json_rql)]
pub fn to_json_rql_wasm(query: &str) -> String {
    let result = match to_json_rql(query) {
        Ok(translation) => serde_json::to_string(&translation.document),
        Err(e) => serde_json::to_string(&WasmError {
            error: e.to_string(),
        }),
    };
    result.unwrap_or_else(|e| format!(r#"{{"error":"{e}"}}"#))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_select_with_type() {
        let translation = to_json_rql("SELECT ?s WHERE { ?s a <http://ex/Type> }").unwrap();
        assert_eq!(
            translation.document,
            json!({ "@select": "?s", "@where": { "@id": "?s", "@type": "http://ex/Type" } })
        );
    }

    #[test]
    fn test_prefixes_become_context_and_filter_is_inlined() {
        let translation = to_json_rql(
            r#"PREFIX ex: <http://example.org/>
               SELECT ?s WHERE { ?s ex:name ?name FILTER(?name = "Alice") }"#,
        )
        .unwrap();
        assert_eq!(
            translation.document,
            json!({
                "@context": { "ex": "http://example.org/" },
                "@select": "?s",
                "@where": { "@id": "?s", "ex:name": { "@id": "?name", "@eq": "Alice" } }
            })
        );
    }

    #[test]
    fn test_variable_predicate_and_flat_conjunction() {
        let translation = to_json_rql(
            "SELECT * WHERE { ?s ?p ?o FILTER(?a && ?b && ?c && ?d) }",
        )
        .unwrap();
        assert_eq!(
            translation.document,
            json!({
                "@select": "*",
                "@where": {
                    "@graph": { "@id": "?s", "?p": "?o" },
                    "@filter": { "@and": ["?a", "?b", "?c", "?d"] }
                }
            })
        );
        assert!(!translation.document.to_string().contains("json-rql.org"));
    }

    #[test]
    fn test_optionals() {
        let two = to_json_rql(
            "PREFIX ex: <http://example.org/> SELECT * WHERE { ?s ex:p ?o \
             OPTIONAL { ?s ex:q ?x } OPTIONAL { ?s ex:r ?y } }",
        )
        .unwrap();
        assert_eq!(
            two.document["@where"]["@optional"],
            json!([{ "@id": "?s", "ex:q": "?x" }, { "@id": "?s", "ex:r": "?y" }])
        );

        let one = to_json_rql(
            "PREFIX ex: <http://example.org/> SELECT * WHERE { ?s ex:p ?o \
             OPTIONAL { ?s ex:q ?x . ?s ex:r ?y } }",
        )
        .unwrap();
        assert_eq!(
            one.document["@where"]["@optional"],
            json!({ "@id": "?s", "ex:q": "?x", "ex:r": "?y" })
        );
    }

    #[test]
    fn test_values_omit_undef() {
        let translation =
            to_json_rql("SELECT * WHERE { VALUES (?x ?y) { (1 UNDEF) (2 3) } }").unwrap();
        assert_eq!(
            translation.document["@where"],
            json!({ "@values": [{ "?x": 1 }, { "?x": 2, "?y": 3 }] })
        );
    }

    #[test]
    fn test_path_sequence_nests_nodes() {
        let translation = to_json_rql(
            "PREFIX ex: <http://example.org/> SELECT ?o WHERE { ?s ex:a/ex:b ?o }",
        )
        .unwrap();
        assert_eq!(
            translation.document["@where"],
            json!({ "@id": "?s", "ex:a": { "ex:b": "?o" } })
        );
    }

    #[test]
    fn test_aggregate_projection() {
        let translation = to_json_rql(
            "PREFIX ex: <http://example.org/> \
             SELECT ?s (COUNT(?o) AS ?n) WHERE { ?s ex:p ?o } GROUP BY ?s ORDER BY DESC(?n)",
        )
        .unwrap();
        let document = &translation.document;
        assert_eq!(document["@select"], json!(["?s", { "?n": { "@count": "?o" } }]));
        assert_eq!(document["@groupBy"], json!("?s"));
        assert_eq!(document["@orderBy"], json!({ "@descending": "?n" }));
    }

    #[test]
    fn test_typed_literals_option() {
        let options = TranslateOptions {
            native_types: false,
        };
        let translation = to_json_rql_with_options(
            "SELECT ?s WHERE { ?s <http://ex/age> 42 }",
            &options,
        )
        .unwrap();
        assert_eq!(
            translation.document["@where"],
            json!({
                "@id": "?s",
                "http://ex/age": {
                    "@value": "42",
                    "@type": "http://www.w3.org/2001/XMLSchema#integer"
                }
            })
        );
    }

    #[test]
    fn test_unsupported_pattern_keeps_parsed_query() {
        let err = to_json_rql("SELECT * WHERE { ?s ?p ?o MINUS { ?s a ?t } }").unwrap_err();
        assert!(matches!(&err.error, Error::UnsupportedPattern(kind) if kind == "minus"));
        assert_eq!(err.to_string(), "Unsupported pattern: minus");
        assert!(err.parsed.is_some());
    }

    #[test]
    fn test_unary_minus_is_unsupported() {
        let err = to_json_rql("SELECT * WHERE { ?s ?p ?o FILTER(-?o < 0) }").unwrap_err();
        assert!(matches!(&err.error, Error::UnsupportedOperator(token) if token == "UMINUS"));
        assert!(err.parsed.is_some());
    }

    #[test]
    fn test_unions_in_one_group_are_joined() {
        let translation = to_json_rql(
            "PREFIX ex: <http://example.org/> SELECT * WHERE { \
             { ?s ex:a ?o } UNION { ?s ex:b ?o } \
             { ?s ex:c ?x } UNION { ?s ex:d ?x } }",
        )
        .unwrap();
        assert_eq!(
            translation.document["@where"],
            json!([
                { "@union": [{ "@id": "?s", "ex:c": "?x" }, { "@id": "?s", "ex:d": "?x" }] },
                { "@union": [{ "@id": "?s", "ex:a": "?o" }, { "@id": "?s", "ex:b": "?o" }] }
            ])
        );
    }

    #[test]
    fn test_values_blocks_in_one_group_are_joined() {
        let translation =
            to_json_rql("SELECT * WHERE { VALUES ?x { 1 2 } VALUES ?y { 3 } }").unwrap();
        assert_eq!(
            translation.document["@where"],
            json!([
                { "@values": [{ "?y": 3 }] },
                { "@values": [{ "?x": 1 }, { "?x": 2 }] }
            ])
        );
    }

    #[test]
    fn test_variable_like_string_literal() {
        let translation = to_json_rql(
            r#"PREFIX ex: <http://example.org/>
               SELECT ?s WHERE { ?s ex:name "?x" . ?s ex:p ?y FILTER(?x > 1) }"#,
        )
        .unwrap();
        assert_eq!(
            translation.document["@where"],
            json!({
                "@graph": { "@id": "?s", "ex:name": { "@value": "?x" }, "ex:p": "?y" },
                "@filter": { "@gt": ["?x", 1] }
            })
        );
    }

    #[test]
    fn test_prefix_over_hidden_namespace() {
        let translation = to_json_rql(
            "PREFIX jr: <http://json-rql.org/> \
             SELECT ?s WHERE { ?s jr:p ?o FILTER(?o > 1 && ?s != ?o) }",
        )
        .unwrap();
        assert_eq!(
            translation.document,
            json!({
                "@context": { "jr": "http://json-rql.org/" },
                "@select": "?s",
                "@where": {
                    "@graph": { "@id": "?s", "jr:p": "?o" },
                    "@filter": { "@and": [{ "@gt": ["?o", 1] }, { "@ne": ["?s", "?o"] }] }
                }
            })
        );

        let translation = to_json_rql(
            "PREFIX v: <http://json-rql.org/var#> SELECT ?s WHERE { ?s ?p ?o }",
        )
        .unwrap();
        assert_eq!(translation.document["@select"], json!("?s"));
        assert_eq!(translation.document["@where"], json!({ "@id": "?s", "?p": "?o" }));
    }

    #[test]
    fn test_aggregate_modifiers_fail() {
        let err = to_json_rql(
            "SELECT (COUNT(DISTINCT ?o) AS ?n) WHERE { ?s ?p ?o }",
        )
        .unwrap_err();
        assert!(matches!(&err.error, Error::UnsupportedAggregate(token) if token == "count distinct"));
        assert!(err.parsed.is_some());

        let err = to_json_rql(
            r#"SELECT (GROUP_CONCAT(?o; SEPARATOR="|") AS ?c) WHERE { ?s ?p ?o }"#,
        )
        .unwrap_err();
        assert!(
            matches!(&err.error, Error::UnsupportedAggregate(token) if token == "group_concat separator")
        );
    }

    #[test]
    fn test_empty_where_is_kept() {
        let translation = to_json_rql("SELECT * WHERE {}").unwrap();
        assert_eq!(translation.document, json!({ "@select": "*", "@where": [] }));
    }

    #[test]
    fn test_parse_error_has_no_parsed_query() {
        let err = to_json_rql("SELECT WHERE {").unwrap_err();
        assert!(matches!(err.error, Error::Parse(_)));
        assert!(err.parsed.is_none());
    }

    #[test]
    fn test_translate_parsed_query() {
        let parsed = parse("ASK { <http://ex/a> <http://ex/p> true }").unwrap();
        assert_eq!(
            translate(&parsed).unwrap(),
            json!({ "@where": { "@id": "http://ex/a", "http://ex/p": true } })
        );
    }
}
