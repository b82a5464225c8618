//! Structured predicates for conditional steps
//!
//! Conditions are data, not expressions: a comparison of two values (either
//! of which may be a `$` reference) under a fixed operator, or an `all`/`any`
//! composite of nested conditions. Keeping the grammar closed means the
//! validator can check conditions statically and pipeline authors cannot
//! smuggle arbitrary code into a definition.

use crate::core::context::ContextManager;
use crate::error::ContextError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comparison operator of a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    Exists,
    NotExists,
    Truthy,
}

/// A structured predicate evaluated against the context
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    /// True iff every nested condition is true
    All { all: Vec<Condition> },
    /// True iff at least one nested condition is true
    Any { any: Vec<Condition> },
    /// A single comparison; `right` is ignored by unary operators
    Compare {
        left: Value,
        op: Operator,
        #[serde(default)]
        right: Value,
    },
}

impl Condition {
    /// Evaluate the condition against the given context.
    ///
    /// References inside `left`/`right` are resolved first; a reference to
    /// an undefined variable fails the evaluation except under `exists` /
    /// `not_exists`, where absence is the question being asked.
    pub fn evaluate(&self, ctx: &ContextManager) -> Result<bool, ContextError> {
        match self {
            Condition::All { all } => {
                for condition in all {
                    if !condition.evaluate(ctx)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Condition::Any { any } => {
                for condition in any {
                    if condition.evaluate(ctx)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Condition::Compare { left, op, right } => match op {
                Operator::Exists => Ok(ctx.resolve_value(left).is_ok()),
                Operator::NotExists => Ok(ctx.resolve_value(left).is_err()),
                Operator::Truthy => Ok(is_truthy(&ctx.resolve_value(left)?)),
                _ => {
                    let left = ctx.resolve_value(left)?;
                    let right = ctx.resolve_value(right)?;
                    Ok(compare(&left, *op, &right))
                }
            },
        }
    }
}

fn compare(left: &Value, op: Operator, right: &Value) -> bool {
    match op {
        Operator::Eq => left == right,
        Operator::Ne => left != right,
        Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
            ordered_compare(left, op, right)
        }
        Operator::Contains => contains(left, right),
        // unary operators handled by the caller
        _ => false,
    }
}

fn ordered_compare(left: &Value, op: Operator, right: &Value) -> bool {
    let ordering = match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            let (a, b) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
            a.partial_cmp(&b)
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    };

    match ordering {
        Some(ordering) => match op {
            Operator::Gt => ordering.is_gt(),
            Operator::Gte => ordering.is_ge(),
            Operator::Lt => ordering.is_lt(),
            Operator::Lte => ordering.is_le(),
            _ => false,
        },
        None => false,
    }
}

fn contains(haystack: &Value, needle: &Value) -> bool {
    match haystack {
        Value::String(s) => needle.as_str().is_some_and(|n| s.contains(n)),
        Value::Array(items) => items.contains(needle),
        Value::Object(map) => needle.as_str().is_some_and(|n| map.contains_key(n)),
        _ => false,
    }
}

/// Loose truthiness: null, false, 0, "", [] and {} are false
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx_with(pairs: &[(&str, Value)]) -> ContextManager {
        let mut ctx = ContextManager::new();
        for (name, value) in pairs {
            ctx.set(name, value.clone());
        }
        ctx
    }

    fn parse(raw: Value) -> Condition {
        serde_json::from_value(raw).expect("condition should parse")
    }

    #[test]
    fn test_eq_with_reference() {
        let ctx = ctx_with(&[("status", json!("publish"))]);
        let condition = parse(json!({"left": "$status", "op": "eq", "right": "publish"}));
        assert!(condition.evaluate(&ctx).unwrap());

        let condition = parse(json!({"left": "$status", "op": "ne", "right": "draft"}));
        assert!(condition.evaluate(&ctx).unwrap());
    }

    #[test]
    fn test_numeric_ordering() {
        let ctx = ctx_with(&[("count", json!(5))]);
        assert!(parse(json!({"left": "$count", "op": "gt", "right": 3}))
            .evaluate(&ctx)
            .unwrap());
        assert!(parse(json!({"left": "$count", "op": "lte", "right": 5}))
            .evaluate(&ctx)
            .unwrap());
        assert!(!parse(json!({"left": "$count", "op": "lt", "right": 5}))
            .evaluate(&ctx)
            .unwrap());
    }

    #[test]
    fn test_ordering_across_types_is_false() {
        let ctx = ctx_with(&[("count", json!(5))]);
        let condition = parse(json!({"left": "$count", "op": "gt", "right": "3"}));
        assert!(!condition.evaluate(&ctx).unwrap());
    }

    #[test]
    fn test_contains() {
        let ctx = ctx_with(&[
            ("title", json!("Hello World")),
            ("tags", json!(["news", "tech"])),
        ]);
        assert!(parse(json!({"left": "$title", "op": "contains", "right": "World"}))
            .evaluate(&ctx)
            .unwrap());
        assert!(parse(json!({"left": "$tags", "op": "contains", "right": "tech"}))
            .evaluate(&ctx)
            .unwrap());
        assert!(!parse(json!({"left": "$tags", "op": "contains", "right": "sports"}))
            .evaluate(&ctx)
            .unwrap());
    }

    #[test]
    fn test_exists() {
        let ctx = ctx_with(&[("present", json!(1))]);
        assert!(parse(json!({"left": "$present", "op": "exists"}))
            .evaluate(&ctx)
            .unwrap());
        assert!(parse(json!({"left": "$absent", "op": "not_exists"}))
            .evaluate(&ctx)
            .unwrap());
        assert!(!parse(json!({"left": "$absent", "op": "exists"}))
            .evaluate(&ctx)
            .unwrap());
    }

    #[test]
    fn test_truthy() {
        let ctx = ctx_with(&[("empty", json!("")), ("full", json!("x"))]);
        assert!(!parse(json!({"left": "$empty", "op": "truthy"}))
            .evaluate(&ctx)
            .unwrap());
        assert!(parse(json!({"left": "$full", "op": "truthy"}))
            .evaluate(&ctx)
            .unwrap());
    }

    #[test]
    fn test_undefined_reference_fails_comparison() {
        let ctx = ContextManager::new();
        let condition = parse(json!({"left": "$missing", "op": "eq", "right": 1}));
        assert!(condition.evaluate(&ctx).is_err());
    }

    #[test]
    fn test_all_any_composites() {
        let ctx = ctx_with(&[("a", json!(1)), ("b", json!(2))]);

        let condition = parse(json!({"all": [
            {"left": "$a", "op": "eq", "right": 1},
            {"left": "$b", "op": "eq", "right": 2}
        ]}));
        assert!(condition.evaluate(&ctx).unwrap());

        let condition = parse(json!({"any": [
            {"left": "$a", "op": "eq", "right": 99},
            {"left": "$b", "op": "eq", "right": 2}
        ]}));
        assert!(condition.evaluate(&ctx).unwrap());

        let condition = parse(json!({"all": [
            {"left": "$a", "op": "eq", "right": 1},
            {"left": "$b", "op": "eq", "right": 99}
        ]}));
        assert!(!condition.evaluate(&ctx).unwrap());
    }
}
