//! Query clause assembly.

use serde_json::{Map, Value};
use tracing::debug;

use crate::ast::{Expression, Ordering, ParsedQuery, Projection, QueryType};
use crate::error::Error;
use crate::translate::Translator;
use crate::util;

impl Translator<'_> {
    /// Translate a whole query, without `@context`.
    ///
    /// Sub-selects inside a WHERE group come through here as well.
    pub fn query(&self, query: &ParsedQuery) -> Result<Value, Error> {
        debug!(query_type = ?query.query_type, distinct = query.distinct, "assembling query");
        let mut document = Map::new();

        match query.query_type {
            QueryType::Construct => {
                let template = query.template.as_deref().unwrap_or_default();
                document.insert("@construct".into(), self.triples(template)?);
            }
            QueryType::Select => {
                let key = if query.distinct { "@distinct" } else { "@select" };
                let projection = query
                    .variables
                    .iter()
                    .map(|projection| self.projection(projection))
                    .collect::<Result<Vec<_>, _>>()?;
                document.insert(key.into(), util::mini(projection));
            }
            QueryType::Describe => {
                let described = query
                    .variables
                    .iter()
                    .map(|projection| self.projection(projection))
                    .collect::<Result<Vec<_>, _>>()?;
                document.insert("@describe".into(), util::mini(described));
            }
            QueryType::Ask => {}
        }

        if let Some(clauses) = &query.where_clause {
            document.insert("@where".into(), self.group(clauses)?);
        }
        if let Some(order) = &query.order {
            let order = order
                .iter()
                .map(|ordering| self.ordering(ordering))
                .collect::<Result<Vec<_>, _>>()?;
            document.insert("@orderBy".into(), util::mini(order));
        }
        if let Some(group) = &query.group {
            document.insert("@groupBy".into(), self.expressions(group)?);
        }
        if let Some(having) = &query.having {
            document.insert("@having".into(), self.expressions(having)?);
        }
        if let Some(limit) = query.limit {
            document.insert("@limit".into(), Value::from(limit));
        }
        if let Some(offset) = query.offset {
            document.insert("@offset".into(), Value::from(offset));
        }
        if let Some(rows) = &query.values {
            document.insert("@values".into(), self.values(rows)?);
        }

        Ok(Value::Object(document))
    }

    /// The top-level document: the query plus `@context` for declared prefixes.
    pub fn document(&self, query: &ParsedQuery) -> Result<Value, Error> {
        let mut document = self.query(query)?;
        if !self.prefixes.is_empty() {
            let context: Map<String, Value> = self
                .prefixes
                .iter()
                .map(|(label, iri)| (label.clone(), Value::String(iri.clone())))
                .collect();
            if let Value::Object(object) = &mut document {
                object.insert("@context".into(), Value::Object(context));
            }
        }
        Ok(document)
    }

    fn projection(&self, projection: &Projection) -> Result<Value, Error> {
        match projection {
            Projection::Term(term) => self.term(term),
            Projection::Expression {
                expression,
                variable,
            } => Ok(util::kvo(util::var(variable), self.expression(expression)?)),
        }
    }

    fn ordering(&self, ordering: &Ordering) -> Result<Value, Error> {
        if ordering.descending {
            self.expression(&Expression::operation(
                "descending",
                vec![ordering.expression.clone()],
            ))
        } else {
            self.expression(&ordering.expression)
        }
    }

    fn expressions(&self, expressions: &[Expression]) -> Result<Value, Error> {
        let values = expressions
            .iter()
            .map(|expression| self.expression(expression))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(util::mini(values))
    }
}
