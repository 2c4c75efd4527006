use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};
use tracing::trace;

use crate::ast::QueryValue;
use crate::error::{SiftError, SiftResult};
use crate::params::Params;

/// How `@name` parameters behave during resolution.
///
/// The immediate query path forbids them, the prepare pass declares them,
/// and execution of a bound statement substitutes their values.
pub enum ParamScope<'a> {
    /// Immediate execution: any parameter is an error
    Forbidden,
    /// Prepare pass: register names, yield a null placeholder
    Declaring(&'a mut Params),
    /// Execution of a bound statement: substitute bound values
    Binding(&'a Params),
}

impl ParamScope<'_> {
    pub fn is_declaring(&self) -> bool {
        matches!(self, ParamScope::Declaring(_))
    }
}

/// Recursively turn a parsed value into a concrete runtime value.
pub fn resolve(value: &QueryValue, scope: &mut ParamScope<'_>) -> SiftResult<Value> {
    match value {
        QueryValue::Number(n) => Ok(Value::Number(n.clone())),
        QueryValue::Text(s) => Ok(Value::String(s.clone())),
        QueryValue::Bool(b) => Ok(Value::Bool(*b)),
        QueryValue::Parameter(name) => match scope {
            ParamScope::Forbidden => Err(SiftError::Parse(format!(
                "Parameter '@{}' is not allowed here; use prepare() to run a parameterized query",
                name
            ))),
            ParamScope::Declaring(params) => {
                trace!(parameter = %name, "declaring parameter");
                params.declare(name);
                Ok(Value::Null)
            }
            ParamScope::Binding(params) => params.get(name).cloned().ok_or_else(|| {
                SiftError::Parse(format!("Parameter '@{}' has no bound value", name))
            }),
        },
        QueryValue::Array(elements) => {
            let mut resolved = Vec::with_capacity(elements.len());
            for element in elements {
                resolved.push(resolve(element, scope)?);
            }
            Ok(Value::Array(resolved))
        }
        QueryValue::Object(pairs) => {
            let mut map = Map::with_capacity(pairs.len());
            for (name, value) in pairs {
                map.insert(name.clone(), resolve(value, scope)?);
            }
            Ok(Value::Object(map))
        }
        QueryValue::FunctionCall { name, args } => resolve_function(name, args, scope),
    }
}

fn resolve_function(
    name: &str,
    args: &[QueryValue],
    scope: &mut ParamScope<'_>,
) -> SiftResult<Value> {
    if !name.eq_ignore_ascii_case("convert") {
        return Err(SiftError::Parse(format!(
            "Unsupported function '{}' with {} argument(s); only convert(value, type) is available",
            name,
            args.len()
        )));
    }
    if args.len() != 2 {
        return Err(SiftError::Arity(format!(
            "convert() takes exactly two arguments (value, type), got {}",
            args.len()
        )));
    }

    let value = resolve(&args[0], scope)?;
    let target = match resolve(&args[1], scope)? {
        Value::String(target) => target,
        other => {
            return Err(SiftError::Type(format!(
                "convert() target type must be a name, got {}",
                other
            )))
        }
    };

    // The declaring pass carries null placeholders for parameters; coercion
    // of the real value happens at execution time.
    if scope.is_declaring() && value.is_null() {
        return Ok(Value::Null);
    }

    convert(value, &target)
}

/// Coerce a resolved value to the runtime type named by `target`.
fn convert(value: Value, target: &str) -> SiftResult<Value> {
    match target.to_ascii_lowercase().as_str() {
        "string" | "text" => Ok(Value::String(as_text(&value))),
        "integer" | "long" => to_integer(value),
        "number" | "double" => to_double(value),
        "boolean" => to_boolean(value),
        "date" => to_date(value),
        other => Err(SiftError::Type(format!(
            "Unknown convert() target type '{}'; expected string, integer, number, boolean or date",
            other
        ))),
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn to_integer(value: Value) -> SiftResult<Value> {
    let parsed = match &value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    };
    parsed
        .map(|n| Value::Number(n.into()))
        .ok_or_else(|| SiftError::Type(format!("Cannot convert {} to integer", value)))
}

fn to_double(value: Value) -> SiftResult<Value> {
    let parsed = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| SiftError::Type(format!("Cannot convert {} to number", value)))
}

fn to_boolean(value: Value) -> SiftResult<Value> {
    match &value {
        Value::Bool(b) => Ok(Value::Bool(*b)),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(SiftError::Type(format!(
                "Cannot convert \"{}\" to boolean",
                s
            ))),
        },
        _ => Err(SiftError::Type(format!(
            "Cannot convert {} to boolean",
            value
        ))),
    }
}

/// Dates normalize to an RFC 3339 string; accepts RFC 3339 timestamps,
/// plain `YYYY-MM-DD` dates and millisecond epoch numbers.
fn to_date(value: Value) -> SiftResult<Value> {
    match &value {
        Value::String(s) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Ok(Value::String(dt.with_timezone(&Utc).to_rfc3339()));
            }
            if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                if let Some(dt) = date.and_hms_opt(0, 0, 0) {
                    return Ok(Value::String(dt.and_utc().to_rfc3339()));
                }
            }
            Err(SiftError::Type(format!("Cannot convert \"{}\" to date", s)))
        }
        Value::Number(n) => {
            let millis = n
                .as_i64()
                .ok_or_else(|| SiftError::Type(format!("Cannot convert {} to date", n)))?;
            DateTime::<Utc>::from_timestamp_millis(millis)
                .map(|dt| Value::String(dt.to_rfc3339()))
                .ok_or_else(|| SiftError::Type(format!("Timestamp out of range: {}", millis)))
        }
        _ => Err(SiftError::Type(format!("Cannot convert {} to date", value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn forbidden(value: &QueryValue) -> SiftResult<Value> {
        resolve(value, &mut ParamScope::Forbidden)
    }

    #[test]
    fn test_resolve_literals() {
        assert_eq!(
            forbidden(&QueryValue::Text("Diana".to_string())).unwrap(),
            json!("Diana")
        );
        assert_eq!(
            forbidden(&QueryValue::Number(10.into())).unwrap(),
            json!(10)
        );
        assert_eq!(forbidden(&QueryValue::Bool(true)).unwrap(), json!(true));
    }

    #[test]
    fn test_resolve_array_and_object() {
        let value = QueryValue::Array(vec![
            QueryValue::Number(1.into()),
            QueryValue::Text("two".to_string()),
        ]);
        assert_eq!(forbidden(&value).unwrap(), json!([1, "two"]));

        let value = QueryValue::Object(vec![(
            "address".to_string(),
            QueryValue::Object(vec![(
                "city".to_string(),
                QueryValue::Text("Olympus".to_string()),
            )]),
        )]);
        assert_eq!(
            forbidden(&value).unwrap(),
            json!({"address": {"city": "Olympus"}})
        );
    }

    #[test]
    fn test_parameter_forbidden_points_to_prepare() {
        let err = forbidden(&QueryValue::Parameter("name".to_string())).unwrap_err();
        assert!(err.to_string().contains("prepare"));
    }

    #[test]
    fn test_parameter_declaring_and_binding() {
        let mut params = Params::new();
        let value = QueryValue::Parameter("name".to_string());

        let placeholder =
            resolve(&value, &mut ParamScope::Declaring(&mut params)).unwrap();
        assert_eq!(placeholder, Value::Null);
        assert_eq!(params.names(), &["name".to_string()]);

        params.bind("name", json!("Diana")).unwrap();
        let bound = resolve(&value, &mut ParamScope::Binding(&params)).unwrap();
        assert_eq!(bound, json!("Diana"));
    }

    #[test]
    fn test_unknown_function_names_function_and_args() {
        let value = QueryValue::FunctionCall {
            name: "uppercase".to_string(),
            args: vec![QueryValue::Text("x".to_string())],
        };
        let err = forbidden(&value).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("uppercase"));
        assert!(message.contains("1 argument"));
    }

    #[test]
    fn test_convert_targets() {
        let call = |value: QueryValue, target: &str| {
            forbidden(&QueryValue::FunctionCall {
                name: "convert".to_string(),
                args: vec![value, QueryValue::Text(target.to_string())],
            })
        };

        assert_eq!(
            call(QueryValue::Number(42.into()), "string").unwrap(),
            json!("42")
        );
        assert_eq!(
            call(QueryValue::Text("42".to_string()), "integer").unwrap(),
            json!(42)
        );
        assert_eq!(
            call(QueryValue::Text("2.5".to_string()), "double").unwrap(),
            json!(2.5)
        );
        assert_eq!(
            call(QueryValue::Text("true".to_string()), "boolean").unwrap(),
            json!(true)
        );
        assert_eq!(
            call(QueryValue::Text("2018-01-10".to_string()), "date").unwrap(),
            json!("2018-01-10T00:00:00+00:00")
        );
    }

    #[test]
    fn test_convert_failures() {
        let call = |value: QueryValue, target: &str| {
            forbidden(&QueryValue::FunctionCall {
                name: "convert".to_string(),
                args: vec![value, QueryValue::Text(target.to_string())],
            })
        };

        assert!(call(QueryValue::Text("abc".to_string()), "integer").is_err());
        assert!(call(QueryValue::Text("maybe".to_string()), "boolean").is_err());
        assert!(call(QueryValue::Text("not-a-date".to_string()), "date").is_err());
        assert!(call(QueryValue::Number(1.into()), "uuid").is_err());
    }

    #[test]
    fn test_convert_arity() {
        let value = QueryValue::FunctionCall {
            name: "convert".to_string(),
            args: vec![QueryValue::Number(1.into())],
        };
        assert!(matches!(
            forbidden(&value).unwrap_err(),
            SiftError::Arity(_)
        ));
    }
}
