//! JSON-RQL operator table.
//!
//! Each entry pairs a JSON-RQL operator key with the SPARQL token the parser
//! uses for it. Associative operators are written as one flat application in
//! JSON-RQL, so nested applications of the same operator get spliced.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Operator {
    pub json_rql: &'static str,
    pub sparql: &'static str,
    pub associative: bool,
}

const fn op(json_rql: &'static str, sparql: &'static str) -> Operator {
    Operator {
        json_rql,
        sparql,
        associative: false,
    }
}

const fn assoc(json_rql: &'static str, sparql: &'static str) -> Operator {
    Operator {
        json_rql,
        sparql,
        associative: true,
    }
}

pub static OPERATORS: &[Operator] = &[
    // Logic and comparison
    assoc("@and", "&&"),
    assoc("@or", "||"),
    op("@eq", "="),
    op("@ne", "!="),
    op("@lt", "<"),
    op("@gt", ">"),
    op("@lte", "<="),
    op("@gte", ">="),
    op("@not", "!"),
    op("@in", "in"),
    // Arithmetic
    assoc("@plus", "+"),
    op("@minus", "-"),
    assoc("@times", "*"),
    op("@divide", "/"),
    // Functional forms
    op("@exists", "exists"),
    op("@bound", "bound"),
    op("@if", "if"),
    op("@coalesce", "coalesce"),
    op("@sameTerm", "sameterm"),
    // Terms
    op("@isIRI", "isiri"),
    op("@isURI", "isuri"),
    op("@isBlank", "isblank"),
    op("@isLiteral", "isliteral"),
    op("@isNumeric", "isnumeric"),
    op("@str", "str"),
    op("@lang", "lang"),
    op("@datatype", "datatype"),
    op("@iri", "iri"),
    op("@uri", "uri"),
    op("@bnode", "bnode"),
    op("@strdt", "strdt"),
    op("@strlang", "strlang"),
    op("@uuid", "uuid"),
    op("@struuid", "struuid"),
    // Strings
    op("@strlen", "strlen"),
    op("@substr", "substr"),
    op("@ucase", "ucase"),
    op("@lcase", "lcase"),
    op("@strstarts", "strstarts"),
    op("@strends", "strends"),
    op("@contains", "contains"),
    op("@strbefore", "strbefore"),
    op("@strafter", "strafter"),
    op("@encode_for_uri", "encode_for_uri"),
    assoc("@concat", "concat"),
    op("@langmatches", "langmatches"),
    op("@regex", "regex"),
    op("@replace", "replace"),
    // Numerics
    op("@abs", "abs"),
    op("@round", "round"),
    op("@ceil", "ceil"),
    op("@floor", "floor"),
    op("@rand", "rand"),
    // Dates and times
    op("@now", "now"),
    op("@year", "year"),
    op("@month", "month"),
    op("@day", "day"),
    op("@hours", "hours"),
    op("@minutes", "minutes"),
    op("@seconds", "seconds"),
    op("@timezone", "timezone"),
    op("@tz", "tz"),
    // Hashes
    op("@md5", "md5"),
    op("@sha1", "sha1"),
    op("@sha256", "sha256"),
    op("@sha384", "sha384"),
    op("@sha512", "sha512"),
    // Aggregates
    op("@count", "count"),
    op("@sum", "sum"),
    op("@min", "min"),
    op("@max", "max"),
    op("@avg", "avg"),
    op("@sample", "sample"),
    op("@group_concat", "group_concat"),
    // Ordering
    op("@descending", "descending"),
];

/// Look up an operator by its SPARQL token.
pub fn by_sparql(token: &str) -> Option<&'static Operator> {
    OPERATORS.iter().find(|o| o.sparql == token)
}

/// Look up an operator by its JSON-RQL key.
pub fn by_json_rql(name: &str) -> Option<&'static Operator> {
    OPERATORS.iter().find(|o| o.json_rql == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use test_case::test_case;

    #[test_case("&&", "@and", true ; "and")]
    #[test_case("||", "@or", true ; "or")]
    #[test_case("+", "@plus", true ; "plus")]
    #[test_case("*", "@times", true ; "times")]
    #[test_case("concat", "@concat", true ; "concat")]
    #[test_case("-", "@minus", false ; "minus")]
    #[test_case("!=", "@ne", false ; "not_equal")]
    #[test_case("group_concat", "@group_concat", false ; "group_concat")]
    fn test_reverse_lookup(token: &str, name: &str, associative: bool) {
        let operator = by_sparql(token).expect("operator should be in the table");
        assert_eq!(operator.json_rql, name);
        assert_eq!(operator.associative, associative);
    }

    #[test]
    fn test_forward_lookup() {
        assert_eq!(by_json_rql("@sameTerm").map(|o| o.sparql), Some("sameterm"));
        assert!(by_json_rql("sameTerm").is_none());
    }

    #[test]
    fn test_unknown_tokens_miss() {
        assert!(by_sparql("UMINUS").is_none());
        assert!(by_sparql("<<").is_none());
        assert!(by_sparql("").is_none());
    }

    #[test]
    fn test_tokens_and_names_are_unique() {
        let tokens: HashSet<_> = OPERATORS.iter().map(|o| o.sparql).collect();
        let names: HashSet<_> = OPERATORS.iter().map(|o| o.json_rql).collect();
        assert_eq!(tokens.len(), OPERATORS.len());
        assert_eq!(names.len(), OPERATORS.len());
        assert!(OPERATORS.iter().all(|o| o.json_rql.starts_with('@')));
    }
}
