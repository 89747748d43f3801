//! Lowering of `spargebra` algebra into the clause-ordered [`ParsedQuery`].
//!
//! The algebra nests solution modifiers around the WHERE pattern in a fixed
//! order (slice, distinct, project, order, select expressions, having,
//! group), so the query clauses are recovered by peeling those layers off
//! from the outside in. What remains is walked into clauses in source order.

use std::collections::HashMap;

use spargebra::Query;
use spargebra::algebra::{
    AggregateExpression, AggregateFunction, Expression as Algebra, Function, GraphPattern,
    OrderExpression, PropertyPathExpression,
};
use spargebra::term::{GroundTerm, NamedNodePattern, TermPattern, TriplePattern, Variable};
use tracing::debug;

use crate::ast::{
    Expression, Literal, Ordering, ParsedQuery, Pattern, Prefixes, Projection, QueryType, Term,
    Triple, ValuesRow,
};
use crate::error::Error;

/// Lower a parsed query. `projects_all` restores a `*` projection.
pub fn query(query: &Query, prefixes: Prefixes, projects_all: bool) -> Result<ParsedQuery, Error> {
    let mut lowerer = Lowerer::default();
    let mut parsed = match query {
        Query::Select { pattern, .. } => {
            lowerer.solution(pattern, QueryType::Select, projects_all)?
        }
        Query::Construct {
            template, pattern, ..
        } => {
            let mut parsed = lowerer.solution(pattern, QueryType::Construct, false)?;
            parsed.template = Some(
                template
                    .iter()
                    .map(triple)
                    .collect::<Result<Vec<_>, _>>()?,
            );
            parsed
        }
        Query::Describe { pattern, .. } => {
            lowerer.solution(pattern, QueryType::Describe, projects_all)?
        }
        Query::Ask { pattern, .. } => lowerer.solution(pattern, QueryType::Ask, false)?,
    };

    parsed.prefixes = prefixes;
    debug!(
        query_type = ?parsed.query_type,
        clauses = parsed.where_clause.as_ref().map_or(0, Vec::len),
        "lowered query"
    );
    Ok(parsed)
}

#[derive(Default)]
struct Lowerer {
    /// Placeholder variable → the aggregate it stands for.
    aggregates: HashMap<String, AggregateExpression>,
    /// Counter for blank nodes joining the steps of a path sequence.
    path_nodes: usize,
}

impl Lowerer {
    // =========================================================================
    // SOLUTION MODIFIERS
    // =========================================================================

    /// Peel the solution modifiers off `pattern`. With `star`, the projection
    /// is `*` and every layer below it belongs to the WHERE clause.
    fn solution(
        &mut self,
        pattern: &GraphPattern,
        query_type: QueryType,
        star: bool,
    ) -> Result<ParsedQuery, Error> {
        let mut parsed = ParsedQuery::new(query_type);
        let mut node = pattern;

        if let GraphPattern::Slice {
            inner,
            start,
            length,
        } = node
        {
            parsed.offset = (*start > 0).then_some(*start);
            parsed.limit = *length;
            node = inner;
        }

        match node {
            GraphPattern::Distinct { inner } => {
                parsed.distinct = true;
                node = inner;
            }
            // REDUCED only permits duplicate removal; there is nothing to write.
            GraphPattern::Reduced { inner } => node = inner,
            _ => {}
        }

        let mut projected: Option<&[Variable]> = None;
        if let GraphPattern::Project { inner, variables } = node {
            projected = Some(variables);
            node = inner;
        }

        let mut order: &[OrderExpression] = &[];
        if let GraphPattern::OrderBy { inner, expression } = node {
            order = expression;
            node = inner;
        }

        let mut selected: Vec<(&Variable, &Algebra)> = Vec::new();
        if let Some(variables) = projected.filter(|_| !star) {
            while let GraphPattern::Extend {
                inner,
                variable,
                expression,
            } = node
            {
                if !variables.contains(variable) || selected.iter().any(|(v, _)| *v == variable) {
                    break;
                }
                selected.push((variable, expression));
                node = inner;
            }
            selected.reverse();
        }

        let mut having = None;
        if let GraphPattern::Filter { expr, inner } = node {
            if matches!(inner.as_ref(), GraphPattern::Group { .. }) {
                having = Some(expr);
                node = inner;
            }
        }

        let mut grouping: Vec<(&Variable, Option<&Algebra>)> = Vec::new();
        if let GraphPattern::Group {
            inner,
            variables,
            aggregates,
        } = node
        {
            for (variable, aggregate) in aggregates {
                self.aggregates
                    .insert(variable.as_str().to_owned(), aggregate.clone());
            }
            node = inner;

            // GROUP BY (expr AS ?v) binds ?v just below the grouping.
            let mut keyed: HashMap<&Variable, &Algebra> = HashMap::new();
            while let GraphPattern::Extend {
                inner,
                variable,
                expression,
            } = node
            {
                if !variables.contains(variable) || keyed.contains_key(variable) {
                    break;
                }
                keyed.insert(variable, expression);
                node = inner;
            }
            grouping = variables
                .iter()
                .map(|variable| (variable, keyed.get(variable).copied()))
                .collect();
        }

        let clauses = self.patterns(node)?;
        // DESCRIBE may leave out WHERE entirely; every other form has one.
        parsed.where_clause =
            (query_type != QueryType::Describe || !clauses.is_empty()).then_some(clauses);

        if star {
            parsed.variables = vec![Projection::Term(Term::Wildcard)];
        } else if let Some(variables) = projected {
            let mut projection = Vec::with_capacity(variables.len());
            for variable in variables {
                let expression = selected
                    .iter()
                    .find(|(v, _)| *v == variable)
                    .map(|(_, expression)| self.expression(expression))
                    .transpose()?;
                projection.push(match expression {
                    Some(Expression::Term(term)) if query_type == QueryType::Describe => {
                        Projection::Term(term)
                    }
                    Some(expression) => Projection::Expression {
                        expression,
                        variable: variable.as_str().to_owned(),
                    },
                    None => Projection::Term(Term::variable(variable.as_str())),
                });
            }
            parsed.variables = projection;
        }

        if !grouping.is_empty() {
            let mut group = Vec::with_capacity(grouping.len());
            for (variable, expression) in grouping {
                group.push(match expression {
                    Some(expression) => self.expression(expression)?,
                    None => Expression::variable(variable.as_str()),
                });
            }
            parsed.group = Some(group);
        }

        if let Some(expression) = having {
            parsed.having = Some(vec![self.expression(expression)?]);
        }

        if !order.is_empty() {
            let mut orderings = Vec::with_capacity(order.len());
            for ordering in order {
                orderings.push(match ordering {
                    OrderExpression::Asc(expression) => Ordering {
                        expression: self.expression(expression)?,
                        descending: false,
                    },
                    OrderExpression::Desc(expression) => Ordering {
                        expression: self.expression(expression)?,
                        descending: true,
                    },
                });
            }
            parsed.order = Some(orderings);
        }

        Ok(parsed)
    }

    // =========================================================================
    // GRAPH PATTERNS
    // =========================================================================

    fn patterns(&mut self, pattern: &GraphPattern) -> Result<Vec<Pattern>, Error> {
        match pattern {
            GraphPattern::Bgp { patterns } => {
                if patterns.is_empty() {
                    return Ok(Vec::new());
                }
                let triples = patterns.iter().map(triple).collect::<Result<Vec<_>, _>>()?;
                Ok(vec![Pattern::Bgp(triples)])
            }

            GraphPattern::Path {
                subject,
                path,
                object,
            } => self.path(&term(subject)?, path, &term(object)?),

            GraphPattern::Join { left, right } => {
                let mut clauses = self.leading(left)?;
                clauses.extend(self.nested(right)?);
                Ok(clauses)
            }

            GraphPattern::LeftJoin {
                left,
                right,
                expression,
            } => {
                let mut clauses = self.leading(left)?;
                let mut optional = self.patterns(right)?;
                if let Some(expression) = expression {
                    optional.push(Pattern::Filter(self.expression(expression)?));
                }
                clauses.push(Pattern::Optional(optional));
                Ok(clauses)
            }

            GraphPattern::Filter { expr, inner } => {
                let mut clauses = self.patterns(inner)?;
                clauses.push(Pattern::Filter(self.expression(expr)?));
                Ok(clauses)
            }

            GraphPattern::Union { .. } => {
                let mut branches = Vec::new();
                self.collect_branches(pattern, &mut branches)?;
                Ok(vec![Pattern::Union(branches)])
            }

            GraphPattern::Extend {
                inner,
                variable,
                expression,
            } => {
                let mut clauses = self.leading(inner)?;
                clauses.push(Pattern::Bind {
                    variable: variable.as_str().to_owned(),
                    expression: self.expression(expression)?,
                });
                Ok(clauses)
            }

            GraphPattern::Minus { left, right } => {
                let mut clauses = self.leading(left)?;
                clauses.push(Pattern::Minus(self.patterns(right)?));
                Ok(clauses)
            }

            GraphPattern::Values {
                variables,
                bindings,
            } => Ok(vec![Pattern::Values(values(variables, bindings)?)]),

            GraphPattern::Graph { name, inner } => Ok(vec![Pattern::Graph {
                name: named_node_pattern(name),
                patterns: self.patterns(inner)?,
            }]),

            GraphPattern::Service {
                name,
                inner,
                silent,
            } => Ok(vec![Pattern::Service {
                name: named_node_pattern(name),
                patterns: self.patterns(inner)?,
                silent: *silent,
            }]),

            GraphPattern::OrderBy { .. }
            | GraphPattern::Project { .. }
            | GraphPattern::Distinct { .. }
            | GraphPattern::Reduced { .. }
            | GraphPattern::Slice { .. }
            | GraphPattern::Group { .. } => Ok(vec![Pattern::Query(Box::new(
                self.solution(pattern, QueryType::Select, false)?,
            ))]),

            #[allow(unreachable_patterns)]
            other => Err(Error::UnsupportedPattern(other.to_string())),
        }
    }

    /// Clauses accumulated before a join, optional, bind or minus.
    ///
    /// Filters are moved to the end of their group by the parser, so a filter
    /// in this position closes a nested group.
    fn leading(&mut self, pattern: &GraphPattern) -> Result<Vec<Pattern>, Error> {
        match pattern {
            GraphPattern::Filter { .. } => Ok(vec![Pattern::Group(self.patterns(pattern)?)]),
            other => self.patterns(other),
        }
    }

    /// The right-hand side of a join: anything that is not a plain pattern
    /// came from a nested group.
    fn nested(&mut self, pattern: &GraphPattern) -> Result<Vec<Pattern>, Error> {
        match pattern {
            GraphPattern::Filter { .. }
            | GraphPattern::LeftJoin { .. }
            | GraphPattern::Extend { .. }
            | GraphPattern::Minus { .. } => Ok(vec![Pattern::Group(self.patterns(pattern)?)]),
            other => self.patterns(other),
        }
    }

    fn collect_branches(&mut self, pattern: &GraphPattern, out: &mut Vec<Pattern>) -> Result<(), Error> {
        match pattern {
            GraphPattern::Union { left, right } => {
                self.collect_branches(left, out)?;
                self.collect_branches(right, out)?;
            }
            _ => out.push(Pattern::Group(self.patterns(pattern)?)),
        }
        Ok(())
    }

    // =========================================================================
    // PROPERTY PATHS
    // =========================================================================

    fn path_node(&mut self) -> Term {
        let id = self.path_nodes;
        self.path_nodes += 1;
        Term::BlankNode(format!("path{id}"))
    }

    fn path(
        &mut self,
        subject: &Term,
        path: &PropertyPathExpression,
        object: &Term,
    ) -> Result<Vec<Pattern>, Error> {
        match path {
            PropertyPathExpression::NamedNode(predicate) => Ok(vec![Pattern::Bgp(vec![Triple::new(
                subject.clone(),
                Term::iri(predicate.as_str()),
                object.clone(),
            )])]),
            PropertyPathExpression::Reverse(inner) => self.path(object, inner, subject),
            PropertyPathExpression::Sequence(first, second) => {
                let middle = self.path_node();
                let mut clauses = self.path(subject, first, &middle)?;
                clauses.extend(self.path(&middle, second, object)?);
                Ok(clauses)
            }
            PropertyPathExpression::Alternative(..) => {
                let mut branches = Vec::new();
                self.collect_alternatives(subject, path, object, &mut branches)?;
                Ok(vec![Pattern::Union(branches)])
            }
            other => Err(Error::UnsupportedPath(other.to_string())),
        }
    }

    fn collect_alternatives(
        &mut self,
        subject: &Term,
        path: &PropertyPathExpression,
        object: &Term,
        out: &mut Vec<Pattern>,
    ) -> Result<(), Error> {
        match path {
            PropertyPathExpression::Alternative(left, right) => {
                self.collect_alternatives(subject, left, object, out)?;
                self.collect_alternatives(subject, right, object, out)?;
            }
            other => out.push(Pattern::Group(self.path(subject, other, object)?)),
        }
        Ok(())
    }

    // =========================================================================
    // EXPRESSIONS
    // =========================================================================

    fn apply(&mut self, operator: &str, args: &[&Algebra]) -> Result<Expression, Error> {
        let args = args
            .iter()
            .map(|arg| self.expression(arg))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Expression::operation(operator, args))
    }

    fn expression(&mut self, expression: &Algebra) -> Result<Expression, Error> {
        match expression {
            Algebra::NamedNode(node) => Ok(Expression::Term(Term::iri(node.as_str()))),
            Algebra::Literal(value) => Ok(Expression::Term(Term::Literal(literal(value)))),
            Algebra::Variable(variable) => match self.aggregates.get(variable.as_str()).cloned() {
                Some(aggregate) => self.aggregate(&aggregate),
                None => Ok(Expression::variable(variable.as_str())),
            },
            Algebra::Or(a, b) => self.apply("||", &[&**a, &**b]),
            Algebra::And(a, b) => self.apply("&&", &[&**a, &**b]),
            Algebra::Equal(a, b) => self.apply("=", &[&**a, &**b]),
            Algebra::SameTerm(a, b) => self.apply("sameterm", &[&**a, &**b]),
            Algebra::Greater(a, b) => self.apply(">", &[&**a, &**b]),
            Algebra::GreaterOrEqual(a, b) => self.apply(">=", &[&**a, &**b]),
            Algebra::Less(a, b) => self.apply("<", &[&**a, &**b]),
            Algebra::LessOrEqual(a, b) => self.apply("<=", &[&**a, &**b]),
            Algebra::In(needle, list) => {
                let mut args = vec![self.expression(needle)?];
                let items = list
                    .iter()
                    .map(|item| self.expression(item))
                    .collect::<Result<Vec<_>, _>>()?;
                if items.iter().all(|item| matches!(item, Expression::Term(_))) {
                    let terms = items
                        .into_iter()
                        .filter_map(|item| match item {
                            Expression::Term(term) => Some(term),
                            _ => None,
                        })
                        .collect();
                    args.push(Expression::Terms(terms));
                } else {
                    args.extend(items);
                }
                Ok(Expression::operation("in", args))
            }
            Algebra::Add(a, b) => self.apply("+", &[&**a, &**b]),
            Algebra::Subtract(a, b) => self.apply("-", &[&**a, &**b]),
            Algebra::Multiply(a, b) => self.apply("*", &[&**a, &**b]),
            Algebra::Divide(a, b) => self.apply("/", &[&**a, &**b]),
            Algebra::UnaryPlus(a) => self.apply("UPLUS", &[&**a]),
            Algebra::UnaryMinus(a) => self.apply("UMINUS", &[&**a]),
            Algebra::Not(inner) => match inner.as_ref() {
                Algebra::Equal(a, b) => self.apply("!=", &[&**a, &**b]),
                other => self.apply("!", &[other]),
            },
            Algebra::Exists(pattern) => {
                let group = Pattern::Group(self.patterns(pattern)?);
                Ok(Expression::operation(
                    "exists",
                    vec![Expression::Pattern(Box::new(group))],
                ))
            }
            Algebra::Bound(variable) => Ok(Expression::operation(
                "bound",
                vec![Expression::variable(variable.as_str())],
            )),
            Algebra::If(a, b, c) => self.apply("if", &[&**a, &**b, &**c]),
            Algebra::Coalesce(args) => {
                let args: Vec<&Algebra> = args.iter().collect();
                self.apply("coalesce", &args)
            }
            Algebra::FunctionCall(Function::Custom(iri), args) => {
                let args = args
                    .iter()
                    .map(|arg| self.expression(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Expression::FunctionCall {
                    function: iri.as_str().to_owned(),
                    args,
                })
            }
            Algebra::FunctionCall(builtin, args) => {
                let args: Vec<&Algebra> = args.iter().collect();
                self.apply(&builtin_token(builtin), &args)
            }
            #[allow(unreachable_patterns)]
            other => Err(Error::UnsupportedExpression(other.to_string())),
        }
    }

    fn aggregate(&mut self, aggregate: &AggregateExpression) -> Result<Expression, Error> {
        match aggregate {
            AggregateExpression::CountSolutions { distinct } => Ok(Expression::Aggregate {
                aggregation: "count".into(),
                expression: Box::new(Expression::Term(Term::Wildcard)),
                distinct: *distinct,
                separator: None,
            }),
            AggregateExpression::FunctionCall {
                name,
                expr,
                distinct,
            } => {
                let (aggregation, separator) = match name {
                    AggregateFunction::Count => ("count".to_owned(), None),
                    AggregateFunction::Sum => ("sum".to_owned(), None),
                    AggregateFunction::Avg => ("avg".to_owned(), None),
                    AggregateFunction::Min => ("min".to_owned(), None),
                    AggregateFunction::Max => ("max".to_owned(), None),
                    AggregateFunction::Sample => ("sample".to_owned(), None),
                    AggregateFunction::GroupConcat { separator } => {
                        ("group_concat".to_owned(), separator.clone())
                    }
                    AggregateFunction::Custom(iri) => (iri.as_str().to_owned(), None),
                };
                Ok(Expression::Aggregate {
                    aggregation,
                    expression: Box::new(self.expression(expr)?),
                    distinct: *distinct,
                    separator,
                })
            }
        }
    }
}

/// The lower-case SPARQL keyword of a built-in function.
fn builtin_token(function: &Function) -> String {
    let token = match function {
        Function::Str => "str",
        Function::Lang => "lang",
        Function::LangMatches => "langmatches",
        Function::Datatype => "datatype",
        Function::Iri => "iri",
        Function::BNode => "bnode",
        Function::Rand => "rand",
        Function::Abs => "abs",
        Function::Ceil => "ceil",
        Function::Floor => "floor",
        Function::Round => "round",
        Function::Concat => "concat",
        Function::SubStr => "substr",
        Function::StrLen => "strlen",
        Function::Replace => "replace",
        Function::UCase => "ucase",
        Function::LCase => "lcase",
        Function::EncodeForUri => "encode_for_uri",
        Function::Contains => "contains",
        Function::StrStarts => "strstarts",
        Function::StrEnds => "strends",
        Function::StrBefore => "strbefore",
        Function::StrAfter => "strafter",
        Function::Year => "year",
        Function::Month => "month",
        Function::Day => "day",
        Function::Hours => "hours",
        Function::Minutes => "minutes",
        Function::Seconds => "seconds",
        Function::Timezone => "timezone",
        Function::Tz => "tz",
        Function::Now => "now",
        Function::Uuid => "uuid",
        Function::StrUuid => "struuid",
        Function::Md5 => "md5",
        Function::Sha1 => "sha1",
        Function::Sha256 => "sha256",
        Function::Sha384 => "sha384",
        Function::Sha512 => "sha512",
        Function::StrLang => "strlang",
        Function::StrDt => "strdt",
        Function::IsIri => "isiri",
        Function::IsBlank => "isblank",
        Function::IsLiteral => "isliteral",
        Function::IsNumeric => "isnumeric",
        Function::Regex => "regex",
        #[allow(unreachable_patterns)]
        other => return format!("{other:?}").to_lowercase(),
    };
    token.to_owned()
}

// =============================================================================
// TERMS
// =============================================================================

fn literal(literal: &spargebra::term::Literal) -> Literal {
    Literal {
        value: literal.value().to_owned(),
        datatype: literal.datatype().as_str().to_owned(),
        language: literal.language().map(str::to_owned),
    }
}

fn term(term: &TermPattern) -> Result<Term, Error> {
    match term {
        TermPattern::NamedNode(node) => Ok(Term::iri(node.as_str())),
        TermPattern::BlankNode(node) => Ok(Term::BlankNode(node.as_str().to_owned())),
        TermPattern::Literal(value) => Ok(Term::Literal(literal(value))),
        TermPattern::Variable(variable) => Ok(Term::variable(variable.as_str())),
        #[allow(unreachable_patterns)]
        other => Err(Error::UnsupportedPattern(other.to_string())),
    }
}

fn named_node_pattern(name: &NamedNodePattern) -> Term {
    match name {
        NamedNodePattern::NamedNode(node) => Term::iri(node.as_str()),
        NamedNodePattern::Variable(variable) => Term::variable(variable.as_str()),
    }
}

fn ground_term(term: &GroundTerm) -> Result<Term, Error> {
    match term {
        GroundTerm::NamedNode(node) => Ok(Term::iri(node.as_str())),
        GroundTerm::Literal(value) => Ok(Term::Literal(literal(value))),
        #[allow(unreachable_patterns)]
        other => Err(Error::UnsupportedPattern(other.to_string())),
    }
}

fn triple(pattern: &TriplePattern) -> Result<Triple, Error> {
    Ok(Triple::new(
        term(&pattern.subject)?,
        named_node_pattern(&pattern.predicate),
        term(&pattern.object)?,
    ))
}

fn values(variables: &[Variable], bindings: &[Vec<Option<GroundTerm>>]) -> Result<Vec<ValuesRow>, Error> {
    bindings
        .iter()
        .map(|row| {
            variables
                .iter()
                .zip(row)
                .map(|(variable, cell)| {
                    Ok((
                        variable.as_str().to_owned(),
                        cell.as_ref().map(ground_term).transpose()?,
                    ))
                })
                .collect()
        })
        .collect()
}
