//! Graph pattern translation.
//!
//! A group of clauses is split by clause kind, each kind is translated on its
//! own, and the results are folded into one JSON-RQL pattern object. Every
//! kind must succeed before anything is combined; the first error wins.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value, json};
use tracing::{debug, trace};

use crate::ast::{Expression, ParsedQuery, Pattern, Triple, ValuesRow};
use crate::error::Error;
use crate::hiding;
use crate::translate::Translator;
use crate::util;

/// Clauses of one group, split by kind, in source order within each kind.
#[derive(Default)]
struct Partition<'p> {
    triples: Vec<&'p Triple>,
    binds: Vec<(&'p str, &'p Expression)>,
    filters: Vec<&'p Expression>,
    optionals: Vec<&'p [Pattern]>,
    branches: Vec<&'p Pattern>,
    groups: Vec<&'p [Pattern]>,
    values: Vec<&'p ValuesRow>,
    queries: Vec<&'p ParsedQuery>,
    has_union: bool,
    has_values: bool,
}

impl<'p> Partition<'p> {
    fn of(clauses: &'p [Pattern]) -> Result<Self, Error> {
        let mut partition = Self::default();
        for clause in clauses {
            match clause {
                Pattern::Bgp(triples) => partition.triples.extend(triples),
                Pattern::Bind {
                    variable,
                    expression,
                } => partition.binds.push((variable.as_str(), expression)),
                Pattern::Filter(expression) => partition.filters.push(expression),
                Pattern::Optional(patterns) => partition.optionals.push(patterns),
                // A second UNION or VALUES joins with the first, so it
                // becomes a sub-group of its own.
                Pattern::Union(_) | Pattern::Values(_) if partition.holds(clause) => {
                    partition.groups.push(std::slice::from_ref(clause));
                }
                Pattern::Union(branches) => {
                    partition.has_union = true;
                    partition.branches.extend(branches);
                }
                Pattern::Group(patterns) => partition.groups.push(patterns),
                Pattern::Values(rows) => {
                    partition.has_values = true;
                    partition.values.extend(rows);
                }
                Pattern::Query(query) => partition.queries.push(query),
                Pattern::Minus(_) | Pattern::Graph { .. } | Pattern::Service { .. } => {
                    return Err(Error::UnsupportedPattern(clause.kind().to_owned()));
                }
            }
        }
        Ok(partition)
    }

    /// Whether a clause of the same kind has already been taken.
    fn holds(&self, clause: &Pattern) -> bool {
        match clause {
            Pattern::Union(_) => self.has_union,
            Pattern::Values(_) => self.has_values,
            _ => false,
        }
    }
}

impl Translator<'_> {
    /// Translate the clauses of one group into a JSON-RQL pattern.
    pub fn group(&self, clauses: &[Pattern]) -> Result<Value, Error> {
        let partition = Partition::of(clauses)?;
        debug!(
            clauses = clauses.len(),
            groups = partition.groups.len(),
            queries = partition.queries.len(),
            "translating group"
        );

        let groups = partition
            .groups
            .iter()
            .map(|patterns| self.group(patterns))
            .collect::<Result<Vec<_>, _>>()?;
        let queries = partition
            .queries
            .iter()
            .map(|query| self.query(query))
            .collect::<Result<Vec<_>, _>>()?;
        let pattern = self.pattern_object(&partition)?;

        let mut contributors = groups;
        contributors.extend(queries);
        if !matches!(&pattern, Value::Object(object) if object.is_empty()) {
            contributors.push(pattern);
        }
        Ok(util::mini(contributors))
    }

    fn pattern_object(&self, partition: &Partition<'_>) -> Result<Value, Error> {
        let mut object = Map::new();

        if !partition.triples.is_empty() {
            let triples: Vec<Triple> = partition.triples.iter().map(|&t| t.clone()).collect();
            object.insert("@graph".into(), self.triples(&triples)?);
        }

        if !partition.binds.is_empty() {
            let mut binds = Map::new();
            for (variable, expression) in &partition.binds {
                binds.insert(util::var(variable), self.expression(expression)?);
            }
            object.insert("@bind".into(), Value::Object(binds));
        }

        let mut filters = partition
            .filters
            .iter()
            .map(|expression| self.expression(expression))
            .collect::<Result<Vec<_>, _>>()?;

        if !partition.optionals.is_empty() {
            let optionals = partition
                .optionals
                .iter()
                .map(|patterns| self.group(patterns))
                .collect::<Result<Vec<_>, _>>()?;
            object.insert("@optional".into(), util::mini(optionals));
        }

        if partition.has_union {
            let branches = partition
                .branches
                .iter()
                .map(|branch| match branch {
                    Pattern::Group(patterns) => self.group(patterns),
                    other => self.group(std::slice::from_ref(*other)),
                })
                .collect::<Result<Vec<_>, _>>()?;
            object.insert("@union".into(), Value::Array(branches));
        }

        if partition.has_values {
            object.insert("@values".into(), self.values(partition.values.iter().copied())?);
        }

        if let Some(graph) = object.get_mut("@graph") {
            if !filters.is_empty() {
                filters = inline_filters(graph, filters);
            }
        }
        if !filters.is_empty() {
            object.insert("@filter".into(), util::mini(filters));
        }

        if object.len() == 1 {
            if let Some(graph) = object.remove("@graph") {
                return Ok(graph);
            }
        }
        Ok(Value::Object(object))
    }

    /// Triples as JSON-RQL subjects: compacted, blank nodes folded in, variables restored.
    pub(crate) fn triples(&self, triples: &[Triple]) -> Result<Value, Error> {
        let hidden: Vec<Triple> = triples
            .iter()
            .map(|t| {
                Triple::new(
                    hiding::hide(&t.subject),
                    hiding::hide(&t.predicate),
                    hiding::hide(&t.object),
                )
            })
            .collect();

        let nodes = match self.compactor.compact(&hidden)? {
            Value::Object(mut document) => match document.remove("@graph") {
                Some(Value::Array(nodes)) => nodes,
                Some(other) => vec![other],
                None if document.is_empty() => Vec::new(),
                None => vec![Value::Object(document)],
            },
            other => vec![other],
        };
        Ok(hiding::unhide(inline_graph(nodes)))
    }

    /// VALUES rows, leaving UNDEF cells out of each row.
    pub(crate) fn values<'r>(
        &self,
        rows: impl IntoIterator<Item = &'r ValuesRow>,
    ) -> Result<Value, Error> {
        let mut out = Vec::new();
        for row in rows {
            let mut object = Map::new();
            for (variable, term) in row {
                if let Some(term) = term {
                    object.insert(util::var(variable), self.term(term)?);
                }
            }
            out.push(Value::Object(object));
        }
        Ok(Value::Array(out))
    }
}

// =============================================================================
// GRAPH INLINING
// =============================================================================

/// Fold blank nodes that are referenced exactly once into their referrer.
fn inline_graph(nodes: Vec<Value>) -> Value {
    let mut references: HashMap<String, usize> = HashMap::new();
    for node in &nodes {
        count_blank_references(node, &mut references);
    }

    let positions: HashMap<String, usize> = nodes
        .iter()
        .enumerate()
        .filter_map(|(index, node)| blank_id(node).map(|id| (id.to_owned(), index)))
        .collect();
    let embeddable: HashSet<String> = positions
        .keys()
        .filter(|id| references.get(*id) == Some(&1))
        .cloned()
        .collect();

    let mut inliner = GraphInliner {
        slots: nodes.into_iter().map(Some).collect(),
        positions,
        embeddable,
    };

    let mut roots = Vec::new();
    for index in 0..inliner.slots.len() {
        let is_root = inliner.slots[index]
            .as_ref()
            .is_some_and(|node| !blank_id(node).is_some_and(|id| inliner.embeddable.contains(id)));
        if is_root {
            if let Some(node) = inliner.slots[index].take() {
                roots.push(inliner.embed(node));
            }
        }
    }
    // Whatever is left only referenced itself in a cycle.
    for index in 0..inliner.slots.len() {
        if let Some(node) = inliner.slots[index].take() {
            roots.push(inliner.embed(node));
        }
    }
    util::mini(roots)
}

struct GraphInliner {
    slots: Vec<Option<Value>>,
    positions: HashMap<String, usize>,
    embeddable: HashSet<String>,
}

impl GraphInliner {
    fn embed(&mut self, value: Value) -> Value {
        match value {
            Value::Array(items) => Value::Array(items.into_iter().map(|v| self.embed(v)).collect()),
            Value::Object(object) => {
                if let Some(id) = reference_id(&object) {
                    if self.embeddable.contains(id) {
                        let slot = self.positions.get(id).copied();
                        if let Some(mut node) = slot.and_then(|index| self.slots[index].take()) {
                            if let Value::Object(properties) = &mut node {
                                properties.remove("@id");
                            }
                            return self.embed(node);
                        }
                    }
                    return Value::Object(object);
                }
                let mut out = Map::with_capacity(object.len());
                for (key, value) in object {
                    let value = if key == "@id" { value } else { self.embed(value) };
                    out.insert(key, value);
                }
                Value::Object(out)
            }
            other => other,
        }
    }
}

fn blank_id(node: &Value) -> Option<&str> {
    node.get("@id")
        .and_then(Value::as_str)
        .filter(|id| id.starts_with("_:"))
}

/// The target of a node reference `{"@id": …}`.
fn reference_id(object: &Map<String, Value>) -> Option<&str> {
    if object.len() == 1 {
        object.get("@id").and_then(Value::as_str)
    } else {
        None
    }
}

fn count_blank_references(value: &Value, references: &mut HashMap<String, usize>) {
    match value {
        Value::Array(items) => {
            for item in items {
                count_blank_references(item, references);
            }
        }
        Value::Object(object) => {
            if let Some(id) = reference_id(object) {
                if id.starts_with("_:") {
                    *references.entry(id.to_owned()).or_default() += 1;
                }
                return;
            }
            for (key, value) in object {
                if key != "@id" {
                    count_blank_references(value, references);
                }
            }
        }
        _ => {}
    }
}

// =============================================================================
// FILTER INLINING
// =============================================================================

/// Move filters of the form `{ "@op": ["?v", operand] }` into the single
/// object slot holding `?v`. Returns the filters that could not be moved.
fn inline_filters(graph: &mut Value, filters: Vec<Value>) -> Vec<Value> {
    let mut remaining = Vec::new();
    for filter in filters {
        match inlinable(&filter) {
            Some((variable, operator, operand)) if count_slots(graph, &variable) == 1 => {
                trace!(%variable, %operator, "inlining filter");
                let mut inline = Some(json!({ "@id": variable.clone(), operator: operand }));
                visit_slots(graph, &mut |slot| {
                    if slot.as_str() == Some(variable.as_str()) {
                        if let Some(inline) = inline.take() {
                            *slot = inline;
                        }
                    }
                });
            }
            _ => remaining.push(filter),
        }
    }
    remaining
}

/// (variable, operator, operand) of a filter that constrains one variable.
fn inlinable(filter: &Value) -> Option<(String, String, Value)> {
    let operator = util::only_key(filter)?;
    if !operator.starts_with('@') {
        return None;
    }
    let Value::Array(args) = &filter[operator] else {
        return None;
    };
    let [subject, operand] = args.as_slice() else {
        return None;
    };
    if !util::is_var(subject) || util::mentions_var(operand) {
        return None;
    }
    Some((subject.as_str()?.to_owned(), operator.to_owned(), operand.clone()))
}

fn count_slots(graph: &mut Value, variable: &str) -> usize {
    let mut count = 0;
    visit_slots(graph, &mut |slot| {
        if slot.as_str() == Some(variable) {
            count += 1;
        }
    });
    count
}

/// Visit every scalar property value of every node in `value`.
fn visit_slots(value: &mut Value, visit: &mut dyn FnMut(&mut Value)) {
    match value {
        Value::Array(items) => {
            for item in items {
                visit_slots(item, visit);
            }
        }
        Value::Object(node) => {
            for (key, value) in node.iter_mut() {
                if key != "@id" && key != "@type" {
                    visit_property(value, visit);
                }
            }
        }
        _ => {}
    }
}

fn visit_property(value: &mut Value, visit: &mut dyn FnMut(&mut Value)) {
    match value {
        Value::Array(items) => {
            for item in items {
                visit_property(item, visit);
            }
        }
        // Literal values are never variable slots.
        Value::Object(object) if object.contains_key("@value") => {}
        Value::Object(_) => visit_slots(value, visit),
        other => visit(other),
    }
}
