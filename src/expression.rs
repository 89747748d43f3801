//! Expression translation.

use serde_json::{Value, json};

use crate::ast::{Expression, Pattern, Term, Triple};
use crate::error::Error;
use crate::hiding;
use crate::operators;
use crate::translate::Translator;
use crate::util;

// Placeholder nodes for running single terms through the compactor.
const TEMP_SUBJECT: &str = "http://json-rql.org/subject";
const TEMP_PREDICATE: &str = "http://json-rql.org/predicate";
const TEMP_OBJECT: &str = "http://json-rql.org/object";

impl Translator<'_> {
    pub fn expression(&self, expression: &Expression) -> Result<Value, Error> {
        match expression {
            Expression::Term(term) => self.term(term),
            Expression::Terms(terms) => self.terms(terms),
            Expression::Operation { operator, args } => {
                let operator = operators::by_sparql(operator)
                    .ok_or_else(|| Error::UnsupportedOperator(operator.clone()))?;
                self.operation(operator.json_rql, operator.associative, args)
            }
            Expression::FunctionCall { function, args } => {
                let name = self.function_name(function)?;
                let associative = operators::by_json_rql(&name).is_some_and(|o| o.associative);
                self.operation(&name, associative, args)
            }
            Expression::Aggregate {
                aggregation,
                expression,
                distinct,
                separator,
            } => {
                // JSON-RQL aggregates take one operand and nothing else.
                if *distinct {
                    return Err(Error::UnsupportedAggregate(format!("{aggregation} distinct")));
                }
                if separator.is_some() {
                    return Err(Error::UnsupportedAggregate(format!("{aggregation} separator")));
                }
                let operator = operators::by_sparql(aggregation)
                    .ok_or_else(|| Error::UnsupportedAggregate(aggregation.clone()))?;
                self.operation(
                    operator.json_rql,
                    operator.associative,
                    std::slice::from_ref(expression.as_ref()),
                )
            }
            Expression::Pattern(pattern) => match pattern.as_ref() {
                Pattern::Group(patterns) => self.group(patterns),
                other => Err(Error::UnsupportedExpression(other.kind().to_owned())),
            },
        }
    }

    pub(crate) fn term(&self, term: &Term) -> Result<Value, Error> {
        match term {
            Term::Wildcard => Ok(Value::String("*".into())),
            other => self.terms(std::slice::from_ref(other)),
        }
    }

    /// Compact raw terms by hanging them off a placeholder node.
    fn terms(&self, terms: &[Term]) -> Result<Value, Error> {
        if terms.is_empty() {
            return Ok(Value::Array(Vec::new()));
        }
        let triples: Vec<Triple> = terms
            .iter()
            .map(|term| {
                Triple::new(
                    Term::iri(TEMP_SUBJECT),
                    Term::iri(TEMP_PREDICATE),
                    hiding::hide(term),
                )
            })
            .collect();

        let mut document = self.compactor.compact(&triples)?;
        let key = self.compactor.compact_iri(TEMP_PREDICATE);
        let value = document
            .as_object_mut()
            .and_then(|node| node.remove(&key))
            .ok_or_else(|| Error::Compaction(format!("no value compacted for {key}")))?;
        Ok(hiding::unhide(value))
    }

    /// Compacted form of a function IRI, read back from the key it compacts to.
    fn function_name(&self, function: &str) -> Result<String, Error> {
        let triple = Triple::new(
            Term::iri(TEMP_SUBJECT),
            Term::iri(function),
            Term::iri(TEMP_OBJECT),
        );
        let document = self.compactor.compact(std::slice::from_ref(&triple))?;
        let target = json!({ "@id": self.compactor.compact_iri(TEMP_OBJECT) });
        document
            .as_object()
            .and_then(|node| {
                node.iter()
                    .find(|(key, value)| key.as_str() != "@id" && **value == target)
            })
            .map(|(key, _)| key.clone())
            .ok_or_else(|| Error::Compaction(format!("function <{function}> has no compacted key")))
    }

    fn operation(&self, name: &str, associative: bool, args: &[Expression]) -> Result<Value, Error> {
        let mut operands = Vec::with_capacity(args.len());
        for arg in args {
            let mut value = self.expression(arg)?;
            // Arguments are already flat, so one splice flattens any depth.
            match associative.then(|| take_operands(&mut value, name)).flatten() {
                Some(nested) => operands.extend(nested),
                None => operands.push(value),
            }
        }
        Ok(util::kvo(name, util::mini(operands)))
    }
}

/// Operands of `value` if it is an application of `name`.
fn take_operands(value: &mut Value, name: &str) -> Option<Vec<Value>> {
    if util::only_key(value) != Some(name) {
        return None;
    }
    match value.as_object_mut()?.remove(name)? {
        Value::Array(items) => Some(items),
        single => Some(vec![single]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Literal, Prefixes};

    const XSD: &str = "http://www.w3.org/2001/XMLSchema#";

    fn prefixes() -> Prefixes {
        let mut prefixes = Prefixes::new();
        prefixes.insert("ex".into(), "http://example.org/".into());
        prefixes
    }

    fn var(name: &str) -> Expression {
        Expression::variable(name)
    }

    fn int(value: i64) -> Expression {
        Expression::Term(Term::Literal(Literal {
            value: value.to_string(),
            datatype: format!("{XSD}integer"),
            language: None,
        }))
    }

    fn and(a: Expression, b: Expression) -> Expression {
        Expression::operation("&&", vec![a, b])
    }

    #[test]
    fn test_terms() {
        let prefixes = prefixes();
        let translator = Translator::new(&prefixes);
        assert_eq!(translator.expression(&var("x")).unwrap(), json!("?x"));
        assert_eq!(translator.expression(&int(5)).unwrap(), json!(5));
        assert_eq!(
            translator
                .expression(&Expression::Term(Term::iri("http://example.org/a")))
                .unwrap(),
            json!({ "@id": "ex:a" })
        );
        assert_eq!(
            translator
                .expression(&Expression::Term(Term::Wildcard))
                .unwrap(),
            json!("*")
        );
    }

    #[test]
    fn test_term_list() {
        let prefixes = prefixes();
        let translator = Translator::new(&prefixes);
        let list = Expression::Terms(vec![
            Term::iri("http://example.org/a"),
            Term::variable("y"),
        ]);
        assert_eq!(
            translator.expression(&list).unwrap(),
            json!([{ "@id": "ex:a" }, "?y"])
        );
        assert_eq!(
            translator.expression(&Expression::Terms(vec![])).unwrap(),
            json!([])
        );
    }

    #[test]
    fn test_binary_operation() {
        let prefixes = prefixes();
        let translator = Translator::new(&prefixes);
        let expr = Expression::operation(">", vec![var("x"), int(5)]);
        assert_eq!(translator.expression(&expr).unwrap(), json!({ "@gt": ["?x", 5] }));
    }

    #[test]
    fn test_unary_operation_is_bare() {
        let prefixes = prefixes();
        let translator = Translator::new(&prefixes);
        let expr = Expression::operation("bound", vec![var("x")]);
        assert_eq!(translator.expression(&expr).unwrap(), json!({ "@bound": "?x" }));
    }

    #[test]
    fn test_associative_chain_flattens_right_nested() {
        let prefixes = prefixes();
        let translator = Translator::new(&prefixes);
        let expr = and(var("a"), and(var("b"), and(var("c"), var("d"))));
        assert_eq!(
            translator.expression(&expr).unwrap(),
            json!({ "@and": ["?a", "?b", "?c", "?d"] })
        );
    }

    #[test]
    fn test_associative_chain_flattens_left_nested() {
        let prefixes = prefixes();
        let translator = Translator::new(&prefixes);
        let expr = and(and(and(var("a"), var("b")), var("c")), var("d"));
        assert_eq!(
            translator.expression(&expr).unwrap(),
            json!({ "@and": ["?a", "?b", "?c", "?d"] })
        );
    }

    #[test]
    fn test_mixed_operators_stay_nested() {
        let prefixes = prefixes();
        let translator = Translator::new(&prefixes);
        let expr = and(
            var("a"),
            Expression::operation("||", vec![var("b"), var("c")]),
        );
        assert_eq!(
            translator.expression(&expr).unwrap(),
            json!({ "@and": ["?a", { "@or": ["?b", "?c"] }] })
        );

        let expr = Expression::operation(
            "-",
            vec![var("a"), Expression::operation("-", vec![var("b"), var("c")])],
        );
        assert_eq!(
            translator.expression(&expr).unwrap(),
            json!({ "@minus": ["?a", { "@minus": ["?b", "?c"] }] })
        );
    }

    #[test]
    fn test_unsupported_operator_names_token() {
        let prefixes = prefixes();
        let translator = Translator::new(&prefixes);
        let expr = and(var("a"), Expression::operation("<<", vec![var("b"), int(2)]));
        match translator.expression(&expr) {
            Err(Error::UnsupportedOperator(token)) => assert_eq!(token, "<<"),
            other => panic!("expected unsupported operator, got {other:?}"),
        }
    }

    #[test]
    fn test_aggregates() {
        let prefixes = prefixes();
        let translator = Translator::new(&prefixes);
        let count = Expression::Aggregate {
            aggregation: "count".into(),
            expression: Box::new(Expression::Term(Term::Wildcard)),
            distinct: false,
            separator: None,
        };
        assert_eq!(translator.expression(&count).unwrap(), json!({ "@count": "*" }));

        let median = Expression::Aggregate {
            aggregation: "http://example.org/median".into(),
            expression: Box::new(var("x")),
            distinct: false,
            separator: None,
        };
        match translator.expression(&median) {
            Err(Error::UnsupportedAggregate(token)) => {
                assert_eq!(token, "http://example.org/median")
            }
            other => panic!("expected unsupported aggregate, got {other:?}"),
        }
    }

    #[test]
    fn test_aggregate_modifiers_are_unsupported() {
        let prefixes = prefixes();
        let translator = Translator::new(&prefixes);
        let count = Expression::Aggregate {
            aggregation: "count".into(),
            expression: Box::new(var("o")),
            distinct: true,
            separator: None,
        };
        match translator.expression(&count) {
            Err(Error::UnsupportedAggregate(token)) => assert_eq!(token, "count distinct"),
            other => panic!("expected unsupported aggregate, got {other:?}"),
        }

        let concat = Expression::Aggregate {
            aggregation: "group_concat".into(),
            expression: Box::new(var("o")),
            distinct: false,
            separator: Some("|".into()),
        };
        match translator.expression(&concat) {
            Err(Error::UnsupportedAggregate(token)) => {
                assert_eq!(token, "group_concat separator")
            }
            other => panic!("expected unsupported aggregate, got {other:?}"),
        }
    }

    #[test]
    fn test_function_call_uses_compacted_iri() {
        let prefixes = prefixes();
        let translator = Translator::new(&prefixes);
        let call = Expression::FunctionCall {
            function: "http://example.org/distance".into(),
            args: vec![var("a"), int(1)],
        };
        assert_eq!(
            translator.expression(&call).unwrap(),
            json!({ "ex:distance": ["?a", 1] })
        );

        let call = Expression::FunctionCall {
            function: "http://other.org/fn".into(),
            args: vec![var("a")],
        };
        assert_eq!(
            translator.expression(&call).unwrap(),
            json!({ "http://other.org/fn": "?a" })
        );
    }

    #[test]
    fn test_exists_takes_a_group() {
        let prefixes = prefixes();
        let translator = Translator::new(&prefixes);
        let group = Pattern::Group(vec![Pattern::Bgp(vec![Triple::new(
            Term::variable("s"),
            Term::iri("http://example.org/p"),
            Term::variable("o"),
        )])]);
        let exists = Expression::operation("exists", vec![Expression::Pattern(Box::new(group))]);
        assert_eq!(
            translator.expression(&exists).unwrap(),
            json!({ "@exists": { "@id": "?s", "ex:p": "?o" } })
        );
    }

    #[test]
    fn test_other_pattern_operand_is_unsupported() {
        let prefixes = prefixes();
        let translator = Translator::new(&prefixes);
        let operand = Expression::Pattern(Box::new(Pattern::Optional(vec![])));
        match translator.expression(&operand) {
            Err(Error::UnsupportedExpression(kind)) => assert_eq!(kind, "optional"),
            other => panic!("expected unsupported expression, got {other:?}"),
        }
    }
}
