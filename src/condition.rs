use serde_json::Value;

use crate::ast::{Condition, Operator};
use crate::error::{SiftError, SiftResult};
use crate::resolver::{resolve, ParamScope};
use crate::storage::Observer;

/// A backend-facing condition with resolved values and observer-translated
/// field names.
///
/// Built conditions are immutable: the combinators consume `self` and
/// return a new value, so a condition handed out (or derived from a cached
/// statement) can never be corrupted by a later caller. Double negation
/// collapses here, and only here.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum NativeCondition {
    Leaf {
        field: String,
        operator: Operator,
        value: Value,
    },
    Not(Box<NativeCondition>),
    And(Vec<NativeCondition>),
    Or(Vec<NativeCondition>),
}

impl NativeCondition {
    pub fn and(self, other: NativeCondition) -> NativeCondition {
        match self {
            NativeCondition::And(mut operands) => {
                operands.push(other);
                NativeCondition::And(operands)
            }
            first => NativeCondition::And(vec![first, other]),
        }
    }

    pub fn or(self, other: NativeCondition) -> NativeCondition {
        match self {
            NativeCondition::Or(mut operands) => {
                operands.push(other);
                NativeCondition::Or(operands)
            }
            first => NativeCondition::Or(vec![first, other]),
        }
    }

    /// Negate, collapsing double negation back to the original condition.
    pub fn negate(self) -> NativeCondition {
        match self {
            NativeCondition::Not(inner) => *inner,
            other => NativeCondition::Not(Box::new(other)),
        }
    }
}

/// Walk an AST condition into a native condition.
pub fn build(
    condition: &Condition,
    entity: &str,
    observer: &dyn Observer,
    scope: &mut ParamScope<'_>,
) -> SiftResult<NativeCondition> {
    match condition {
        Condition::Leaf {
            field,
            operator,
            value,
        } => {
            let resolved = resolve(value, scope)?;
            validate_operand(*operator, &resolved, scope)?;
            Ok(NativeCondition::Leaf {
                field: observer.fire_field(entity, field),
                operator: *operator,
                value: resolved,
            })
        }
        Condition::Not(operand) => Ok(build(operand, entity, observer, scope)?.negate()),
        Condition::And(operands) => fold(operands, entity, observer, scope, NativeCondition::and),
        Condition::Or(operands) => fold(operands, entity, observer, scope, NativeCondition::or),
    }
}

fn fold(
    operands: &[Condition],
    entity: &str,
    observer: &dyn Observer,
    scope: &mut ParamScope<'_>,
    combine: fn(NativeCondition, NativeCondition) -> NativeCondition,
) -> SiftResult<NativeCondition> {
    let mut iter = operands.iter();
    let first = iter.next().ok_or_else(|| {
        SiftError::Parse("A boolean combinator requires at least one operand".to_string())
    })?;

    // Left-to-right fold; a single operand degenerates to itself
    let mut result = build(first, entity, observer, scope)?;
    for operand in iter {
        result = combine(result, build(operand, entity, observer, scope)?);
    }
    Ok(result)
}

/// BETWEEN needs exactly two values, IN needs an array. Null placeholders
/// from the declaring pass are checked later, once real values are bound.
fn validate_operand(
    operator: Operator,
    resolved: &Value,
    scope: &ParamScope<'_>,
) -> SiftResult<()> {
    if scope.is_declaring() && resolved.is_null() {
        return Ok(());
    }

    match operator {
        Operator::Between => match resolved {
            Value::Array(elements) if elements.len() == 2 => Ok(()),
            Value::Array(elements) => Err(SiftError::Arity(format!(
                "BETWEEN requires exactly two values, got {}",
                elements.len()
            ))),
            other => Err(SiftError::Arity(format!(
                "BETWEEN requires an array of two values, got {}",
                other
            ))),
        },
        Operator::In => match resolved {
            Value::Array(_) => Ok(()),
            other => Err(SiftError::Type(format!(
                "IN requires an iterable value, got {}",
                other
            ))),
        },
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::QueryValue;
    use crate::storage::IdentityObserver;
    use serde_json::json;

    fn build_forbidden(condition: &Condition) -> SiftResult<NativeCondition> {
        build(condition, "God", &IdentityObserver, &mut ParamScope::Forbidden)
    }

    fn leaf(field: &str, operator: Operator, value: QueryValue) -> Condition {
        Condition::Leaf {
            field: field.to_string(),
            operator,
            value,
        }
    }

    #[test]
    fn test_leaf_build() {
        let built = build_forbidden(&leaf(
            "name",
            Operator::Eq,
            QueryValue::Text("Diana".to_string()),
        ))
        .unwrap();

        assert_eq!(
            built,
            NativeCondition::Leaf {
                field: "name".to_string(),
                operator: Operator::Eq,
                value: json!("Diana"),
            }
        );
    }

    #[test]
    fn test_double_negation_collapses_at_native_layer() {
        let built = build_forbidden(&leaf(
            "name",
            Operator::Eq,
            QueryValue::Text("x".to_string()),
        ))
        .unwrap();

        let negated = built.clone().negate();
        assert_eq!(negated, NativeCondition::Not(Box::new(built.clone())));
        assert_eq!(negated.negate(), built);
    }

    #[test]
    fn test_not_condition_builds_negation() {
        let condition = Condition::Not(Box::new(leaf(
            "name",
            Operator::Eq,
            QueryValue::Text("x".to_string()),
        )));
        let built = build_forbidden(&condition).unwrap();
        assert!(matches!(built, NativeCondition::Not(_)));

        // NOT NOT at the AST stays two nodes, but building collapses them
        let double = Condition::Not(Box::new(condition));
        let built = build_forbidden(&double).unwrap();
        assert!(matches!(built, NativeCondition::Leaf { .. }));
    }

    #[test]
    fn test_and_fold_order() {
        let condition = Condition::And(vec![
            leaf("a", Operator::Eq, QueryValue::Number(1.into())),
            leaf("b", Operator::Eq, QueryValue::Number(2.into())),
            leaf("c", Operator::Eq, QueryValue::Number(3.into())),
        ]);
        let built = build_forbidden(&condition).unwrap();

        if let NativeCondition::And(operands) = built {
            assert_eq!(operands.len(), 3);
            let fields: Vec<_> = operands
                .iter()
                .map(|c| match c {
                    NativeCondition::Leaf { field, .. } => field.as_str(),
                    _ => panic!("Expected leaf"),
                })
                .collect();
            assert_eq!(fields, vec!["a", "b", "c"]);
        } else {
            panic!("Expected And");
        }
    }

    #[test]
    fn test_single_operand_degenerates() {
        let condition = Condition::Or(vec![leaf(
            "a",
            Operator::Eq,
            QueryValue::Number(1.into()),
        )]);
        let built = build_forbidden(&condition).unwrap();
        assert!(matches!(built, NativeCondition::Leaf { .. }));
    }

    #[test]
    fn test_between_arity() {
        let two = leaf(
            "age",
            Operator::Between,
            QueryValue::Array(vec![
                QueryValue::Number(1.into()),
                QueryValue::Number(2.into()),
            ]),
        );
        assert!(build_forbidden(&two).is_ok());

        let three = leaf(
            "age",
            Operator::Between,
            QueryValue::Array(vec![
                QueryValue::Number(1.into()),
                QueryValue::Number(2.into()),
                QueryValue::Number(3.into()),
            ]),
        );
        assert!(matches!(
            build_forbidden(&three).unwrap_err(),
            SiftError::Arity(_)
        ));
    }

    #[test]
    fn test_in_requires_array() {
        let bad = leaf("age", Operator::In, QueryValue::Number(1.into()));
        assert!(matches!(
            build_forbidden(&bad).unwrap_err(),
            SiftError::Type(_)
        ));
    }

    #[test]
    fn test_observer_translates_field() {
        struct Renamer;
        impl Observer for Renamer {
            fn fire_field(&self, _entity: &str, field: &str) -> String {
                format!("_{}", field)
            }
        }

        let built = build(
            &leaf("name", Operator::Eq, QueryValue::Text("x".to_string())),
            "God",
            &Renamer,
            &mut ParamScope::Forbidden,
        )
        .unwrap();

        assert!(matches!(
            built,
            NativeCondition::Leaf { ref field, .. } if field == "_name"
        ));
    }
}
