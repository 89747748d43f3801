//! Clause-ordered SPARQL syntax tree.
//!
//! This is the shape the translator consumes: one node per syntactic clause,
//! in source order, the way a SPARQL text is written rather than the way the
//! algebra evaluates it. [`crate::lower`] builds it from `spargebra` output.

use std::collections::BTreeMap;

use serde::Serialize;

/// Prefix label → namespace IRI.
pub type Prefixes = BTreeMap<String, String>;

/// One row of a VALUES block. `None` is an UNDEF cell.
pub type ValuesRow = BTreeMap<String, Option<Term>>;

// =============================================================================
// TERMS
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Term {
    Iri(String),
    BlankNode(String),
    Literal(Literal),
    /// Variable name without the leading `?`.
    Variable(String),
    /// `*` in `SELECT *` or `COUNT(*)`.
    Wildcard,
}

impl Term {
    pub fn variable(name: impl Into<String>) -> Self {
        Term::Variable(name.into())
    }

    pub fn iri(iri: impl Into<String>) -> Self {
        Term::Iri(iri.into())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Literal {
    pub value: String,
    pub datatype: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Triple {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
}

impl Triple {
    pub fn new(subject: Term, predicate: Term, object: Term) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }
}

// =============================================================================
// EXPRESSIONS
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Expression {
    /// Operator or built-in call, named by its SPARQL token (`&&`, `str`, …).
    Operation {
        operator: String,
        args: Vec<Expression>,
    },
    /// Call of an extension function identified by IRI.
    FunctionCall {
        function: String,
        args: Vec<Expression>,
    },
    Aggregate {
        aggregation: String,
        expression: Box<Expression>,
        distinct: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        separator: Option<String>,
    },
    Term(Term),
    /// A bare term list, as in the right-hand side of `IN`.
    Terms(Vec<Term>),
    /// A graph pattern used as an operand, as in `EXISTS { … }`.
    Pattern(Box<Pattern>),
}

impl Expression {
    pub fn operation(operator: impl Into<String>, args: Vec<Expression>) -> Self {
        Expression::Operation {
            operator: operator.into(),
            args,
        }
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Expression::Term(Term::variable(name))
    }
}

// =============================================================================
// GRAPH PATTERNS
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Pattern {
    Bgp(Vec<Triple>),
    Bind {
        variable: String,
        expression: Expression,
    },
    Filter(Expression),
    Optional(Vec<Pattern>),
    /// Alternatives; each branch is usually a [`Pattern::Group`].
    Union(Vec<Pattern>),
    Group(Vec<Pattern>),
    Values(Vec<ValuesRow>),
    Query(Box<ParsedQuery>),
    Minus(Vec<Pattern>),
    Graph {
        name: Term,
        patterns: Vec<Pattern>,
    },
    Service {
        name: Term,
        patterns: Vec<Pattern>,
        silent: bool,
    },
}

impl Pattern {
    /// Clause keyword, used to name the clause in errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Pattern::Bgp(_) => "bgp",
            Pattern::Bind { .. } => "bind",
            Pattern::Filter(_) => "filter",
            Pattern::Optional(_) => "optional",
            Pattern::Union(_) => "union",
            Pattern::Group(_) => "group",
            Pattern::Values(_) => "values",
            Pattern::Query(_) => "query",
            Pattern::Minus(_) => "minus",
            Pattern::Graph { .. } => "graph",
            Pattern::Service { .. } => "service",
        }
    }
}

// =============================================================================
// QUERIES
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueryType {
    Select,
    Construct,
    Describe,
    Ask,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Projection {
    Term(Term),
    Expression {
        expression: Expression,
        variable: String,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Ordering {
    pub expression: Expression,
    pub descending: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedQuery {
    pub query_type: QueryType,
    pub distinct: bool,
    pub variables: Vec<Projection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<Vec<Triple>>,
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<Vec<Pattern>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<Vec<Expression>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub having: Option<Vec<Expression>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<Vec<Ordering>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<ValuesRow>>,
    pub prefixes: Prefixes,
}

impl ParsedQuery {
    pub fn new(query_type: QueryType) -> Self {
        Self {
            query_type,
            distinct: false,
            variables: Vec::new(),
            template: None,
            where_clause: None,
            group: None,
            having: None,
            order: None,
            limit: None,
            offset: None,
            values: None,
            prefixes: Prefixes::new(),
        }
    }
}
