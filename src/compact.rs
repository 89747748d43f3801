//! Triple compaction.
//!
//! Turns a set of triples into a compacted JSON-LD document: one node object
//! per subject, IRIs shortened with the query prefixes, literals written as
//! native JSON where the datatype allows it. Nodes are kept flat (no
//! embedding); a single node is returned bare, several under `@graph`.

use oxsdatatypes::{Boolean, Double, Integer};
use serde_json::{Map, Number, Value, json};
use tracing::trace;

use crate::ast::{Literal, Prefixes, Term, Triple};
use crate::error::Error;
use crate::hiding::HIDDEN_VARIABLE_NS;
use crate::util;

const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
const XSD: &str = "http://www.w3.org/2001/XMLSchema#";

/// Compact `triples` using `prefixes`, with native literal types.
pub fn compact(triples: &[Triple], prefixes: &Prefixes) -> Result<Value, Error> {
    Compactor::new(prefixes).compact(triples)
}

/// Prefix table plus literal options, built once per translation.
#[derive(Clone, Debug)]
pub struct Compactor {
    /// (namespace IRI, prefix label), longest namespace first.
    namespaces: Vec<(String, String)>,
    native_types: bool,
}

impl Compactor {
    pub fn new(prefixes: &Prefixes) -> Self {
        Self::with_native_types(prefixes, true)
    }

    pub fn with_native_types(prefixes: &Prefixes, native_types: bool) -> Self {
        let mut namespaces: Vec<(String, String)> = prefixes
            .iter()
            .filter(|(_, iri)| !iri.is_empty())
            .map(|(label, iri)| (iri.clone(), label.clone()))
            .collect();
        namespaces.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.1.cmp(&b.1)));
        Self {
            namespaces,
            native_types,
        }
    }

    /// Shorten an IRI to `prefix:local` using the most specific namespace.
    /// Hidden variables are never shortened.
    pub fn compact_iri(&self, iri: &str) -> String {
        if iri.starts_with(HIDDEN_VARIABLE_NS) {
            return iri.to_owned();
        }
        for (namespace, label) in &self.namespaces {
            if let Some(local) = iri.strip_prefix(namespace.as_str()) {
                if !local.is_empty() {
                    return format!("{label}:{local}");
                }
            }
        }
        iri.to_owned()
    }

    pub fn compact(&self, triples: &[Triple]) -> Result<Value, Error> {
        let mut nodes: Vec<(String, Map<String, Value>)> = Vec::new();

        for triple in triples {
            let id = self.node_id(&triple.subject)?;
            let index = match nodes.iter().position(|(node, _)| *node == id) {
                Some(index) => index,
                None => {
                    nodes.push((id, Map::new()));
                    nodes.len() - 1
                }
            };

            let predicate = match &triple.predicate {
                Term::Iri(iri) => iri,
                other => {
                    return Err(Error::Compaction(format!(
                        "predicate must be an IRI, found {other:?}"
                    )));
                }
            };

            let is_type = predicate == RDF_TYPE
                && matches!(triple.object, Term::Iri(_) | Term::BlankNode(_));
            let (key, value) = if is_type {
                ("@type".to_owned(), Value::String(self.node_id(&triple.object)?))
            } else {
                (self.compact_iri(predicate), self.object(&triple.object)?)
            };
            add_value(&mut nodes[index].1, key, value);
        }

        trace!(triples = triples.len(), nodes = nodes.len(), "compacted triples");

        let mut nodes: Vec<Value> = nodes
            .into_iter()
            .map(|(id, properties)| {
                let mut node = Map::new();
                node.insert("@id".to_owned(), Value::String(id));
                node.extend(properties);
                Value::Object(node)
            })
            .collect();

        Ok(match nodes.len() {
            0 => Value::Object(Map::new()),
            1 => nodes.remove(0),
            _ => json!({ "@graph": nodes }),
        })
    }

    fn node_id(&self, term: &Term) -> Result<String, Error> {
        match term {
            Term::Iri(iri) => Ok(self.compact_iri(iri)),
            Term::BlankNode(label) => Ok(format!("_:{label}")),
            Term::Variable(name) => Err(Error::Compaction(format!(
                "variable ?{name} cannot be used as a node identifier"
            ))),
            Term::Literal(literal) => Err(Error::Compaction(format!(
                "literal \"{}\" cannot be used as a node identifier",
                literal.value
            ))),
            Term::Wildcard => Err(Error::Compaction(
                "wildcard cannot be used as a node identifier".into(),
            )),
        }
    }

    fn object(&self, term: &Term) -> Result<Value, Error> {
        match term {
            Term::Literal(literal) => Ok(self.literal(literal)),
            other => Ok(json!({ "@id": self.node_id(other)? })),
        }
    }

    fn literal(&self, literal: &Literal) -> Value {
        if let Some(language) = &literal.language {
            return json!({ "@value": literal.value, "@language": language });
        }
        if literal.datatype.is_empty() {
            return plain(&literal.value);
        }

        match literal.datatype.strip_prefix(XSD) {
            Some("string") => return plain(&literal.value),
            Some("boolean") if self.native_types => {
                if let Ok(b) = literal.value.parse::<Boolean>() {
                    return Value::Bool(b.into());
                }
            }
            Some("integer") if self.native_types => {
                if let Ok(i) = literal.value.parse::<Integer>() {
                    return Value::from(i64::from(i));
                }
            }
            Some("double") if self.native_types => {
                if let Ok(d) = literal.value.parse::<Double>() {
                    if let Some(n) = Number::from_f64(f64::from(d)) {
                        return Value::Number(n);
                    }
                }
            }
            _ => {}
        }

        json!({ "@value": literal.value, "@type": self.compact_iri(&literal.datatype) })
    }
}

/// A plain string, kept in a value object when it would read as a variable.
fn plain(value: &str) -> Value {
    let string = Value::String(value.to_owned());
    if util::is_var(&string) || value.starts_with(HIDDEN_VARIABLE_NS) {
        json!({ "@value": string })
    } else {
        string
    }
}

/// Add a property value, turning the property into an array on repeats.
fn add_value(node: &mut Map<String, Value>, key: String, value: Value) {
    match node.get_mut(&key) {
        None => {
            node.insert(key, value);
        }
        Some(Value::Array(values)) => {
            if !values.contains(&value) {
                values.push(value);
            }
        }
        Some(existing) => {
            if *existing != value {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
        }
    }
}
