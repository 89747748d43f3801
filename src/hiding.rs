//! Variable hiding.
//!
//! The compactor only understands IRIs, blank nodes and literals. Variables
//! are smuggled through it as IRIs in a reserved namespace and turned back
//! into `?name` tokens afterwards.

use serde_json::{Map, Value};

use crate::ast::Term;

pub const HIDDEN_VARIABLE_NS: &str = "http://json-rql.org/var#";

/// Encode a variable as an IRI; other terms are returned unchanged.
pub fn hide(term: &Term) -> Term {
    match term {
        Term::Variable(name) => Term::Iri(format!("{HIDDEN_VARIABLE_NS}{name}")),
        other => other.clone(),
    }
}

fn unhide_str(s: &str) -> Option<String> {
    s.strip_prefix(HIDDEN_VARIABLE_NS)
        .filter(|name| !name.is_empty())
        .map(|name| format!("?{name}"))
}

/// Replace every hidden variable in a compacted document with `?name`.
///
/// Keys are rewritten as well as values, and a node reference
/// `{"@id": <hidden>}` collapses to the plain `?name` string.
pub fn unhide(value: Value) -> Value {
    match value {
        Value::String(s) => match unhide_str(&s) {
            Some(var) => Value::String(var),
            None => Value::String(s),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(unhide).collect()),
        Value::Object(object) => {
            if object.len() == 1 {
                if let Some(Value::String(id)) = object.get("@id") {
                    if let Some(var) = unhide_str(id) {
                        return Value::String(var);
                    }
                }
            }
            let mut out = Map::with_capacity(object.len());
            for (key, value) in object {
                if key == "@value" {
                    out.insert(key, value);
                    continue;
                }
                let key = unhide_str(&key).unwrap_or(key);
                out.insert(key, unhide(value));
            }
            Value::Object(out)
        }
        other => other,
    }
}
