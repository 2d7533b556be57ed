//! Checks a candidate against the discovered schemas and builds the typed call.

use crate::error::ValidationError;
use crate::types::{
    Arguments, BinaryArgs, ExpressionArgs, ParamType, ToolCall, ToolInvocationCandidate,
    ToolSchema, ToolValue, ValidatedInvocation,
};
use serde_json::Value;
use tracing::debug;

/// Validate a candidate. Never executes anything.
pub fn validate(
    candidate: &ToolInvocationCandidate,
    schemas: &[ToolSchema],
) -> Result<ValidatedInvocation, ValidationError> {
    let schema = schemas
        .iter()
        .find(|s| s.name == candidate.tool_name)
        .ok_or_else(|| ValidationError::UnknownTool(candidate.tool_name.clone()))?;

    let missing: Vec<String> = schema
        .parameters
        .iter()
        .filter(|p| p.required && is_absent(candidate.arguments.get(&p.name)))
        .map(|p| p.name.clone())
        .collect();
    if !missing.is_empty() {
        return Err(ValidationError::MissingParameter(missing));
    }

    let mut arguments = Arguments::new();
    for param in &schema.parameters {
        let Some(raw) = candidate.arguments.get(&param.name) else {
            continue;
        };
        if raw.is_null() {
            continue;
        }
        let value = coerce(raw, param.param_type).ok_or_else(|| ValidationError::TypeMismatch {
            name: param.name.clone(),
            expected: param.param_type,
            got: describe(raw),
        })?;
        arguments.insert(param.name.clone(), value);
    }

    for extra in candidate
        .arguments
        .keys()
        .filter(|k| schema.param(k).is_none())
    {
        debug!("Dropping undeclared argument '{}' for {}", extra, schema.name);
    }

    Ok(ValidatedInvocation {
        call: typed_call(&schema.name, arguments),
        source_span: candidate.source_span.clone(),
    })
}

fn is_absent(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

/// Coerce a raw JSON value to the declared type where unambiguous.
fn coerce(raw: &Value, expected: ParamType) -> Option<ToolValue> {
    match (expected, raw) {
        (ParamType::Number, Value::Number(n)) => n.as_f64().map(ToolValue::Number),
        (ParamType::Number, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(ToolValue::Number),
        (ParamType::String, Value::String(s)) => Some(ToolValue::String(s.clone())),
        (ParamType::String, Value::Number(n)) => Some(ToolValue::String(n.to_string())),
        _ => None,
    }
}

fn describe(raw: &Value) -> String {
    match raw {
        Value::Null => "null".into(),
        Value::Bool(b) => format!("boolean {}", b),
        Value::Number(n) => format!("number {}", n),
        Value::String(s) => format!("string \"{}\"", s),
        Value::Array(_) => "array".into(),
        Value::Object(_) => "object".into(),
    }
}

/// Map validated arguments onto the closed call type. Built-in names whose
/// registry schema differs from the built-in record fall back to `Other`.
fn typed_call(name: &str, arguments: Arguments) -> ToolCall {
    let number = |key: &str| arguments.get(key).and_then(ToolValue::as_f64);
    let known = match name {
        "add_numbers" => number("a")
            .zip(number("b"))
            .map(|(a, b)| ToolCall::AddNumbers(BinaryArgs { a, b })),
        "multiply_numbers" => number("a")
            .zip(number("b"))
            .map(|(a, b)| ToolCall::MultiplyNumbers(BinaryArgs { a, b })),
        "calculate_expression" => arguments
            .get("expression")
            .and_then(ToolValue::as_str)
            .map(|e| {
                ToolCall::CalculateExpression(ExpressionArgs {
                    expression: e.to_string(),
                })
            }),
        _ => None,
    };
    known.unwrap_or_else(|| ToolCall::Other {
        name: name.to_string(),
        arguments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ParamSpec;
    use serde_json::{json, Map};

    fn schemas() -> Vec<ToolSchema> {
        vec![
            ToolSchema {
                name: "add_numbers".into(),
                description: String::new(),
                parameters: vec![
                    ParamSpec::required("a", ParamType::Number, ""),
                    ParamSpec::required("b", ParamType::Number, ""),
                ],
            },
            ToolSchema {
                name: "calculate_expression".into(),
                description: String::new(),
                parameters: vec![ParamSpec::required("expression", ParamType::String, "")],
            },
            ToolSchema {
                name: "greet".into(),
                description: String::new(),
                parameters: vec![
                    ParamSpec::required("who", ParamType::String, ""),
                    ParamSpec {
                        name: "times".into(),
                        param_type: ParamType::Number,
                        required: false,
                        description: String::new(),
                    },
                ],
            },
        ]
    }

    fn candidate(tool: &str, args: Value) -> ToolInvocationCandidate {
        let arguments: Map<String, Value> = match args {
            Value::Object(m) => m,
            _ => Map::new(),
        };
        ToolInvocationCandidate {
            tool_name: tool.into(),
            arguments,
            source_span: String::new(),
        }
    }

    #[test]
    fn builds_typed_add() {
        let v = validate(&candidate("add_numbers", json!({"a": 5, "b": 3})), &schemas()).unwrap();
        assert_eq!(v.call, ToolCall::AddNumbers(BinaryArgs { a: 5.0, b: 3.0 }));
    }

    #[test]
    fn numeric_strings_are_coerced() {
        let v = validate(&candidate("add_numbers", json!({"a": "5", "b": " 2.5 "})), &schemas()).unwrap();
        assert_eq!(v.call, ToolCall::AddNumbers(BinaryArgs { a: 5.0, b: 2.5 }));
    }

    #[test]
    fn numbers_become_expression_strings() {
        let v = validate(&candidate("calculate_expression", json!({"expression": 42})), &schemas()).unwrap();
        assert_eq!(
            v.call,
            ToolCall::CalculateExpression(ExpressionArgs {
                expression: "42".into()
            })
        );
    }

    #[test]
    fn unknown_tool() {
        let err = validate(&candidate("sqrt", json!({"x": 4})), &schemas()).unwrap_err();
        assert_eq!(err, ValidationError::UnknownTool("sqrt".into()));
    }

    #[test]
    fn every_missing_parameter_is_named() {
        let err = validate(&candidate("add_numbers", json!({})), &schemas()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingParameter(vec!["a".into(), "b".into()])
        );

        let err = validate(&candidate("add_numbers", json!({"b": null})), &schemas()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingParameter(vec!["a".into(), "b".into()])
        );
    }

    #[test]
    fn uncoercible_value_is_a_mismatch() {
        let err = validate(&candidate("add_numbers", json!({"a": "five", "b": 3})), &schemas()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::TypeMismatch {
                name: "a".into(),
                expected: ParamType::Number,
                got: "string \"five\"".into(),
            }
        );

        let err = validate(&candidate("calculate_expression", json!({"expression": true})), &schemas())
            .unwrap_err();
        assert!(matches!(err, ValidationError::TypeMismatch { .. }));
    }

    #[test]
    fn optional_and_extra_arguments() {
        let v = validate(
            &candidate("greet", json!({"who": "ann", "times": "2", "loud": true})),
            &schemas(),
        )
        .unwrap();
        match v.call {
            ToolCall::Other { name, arguments } => {
                assert_eq!(name, "greet");
                assert_eq!(arguments["times"], ToolValue::Number(2.0));
                assert!(!arguments.contains_key("loud"));
            }
            other => panic!("expected Other, got {other:?}"),
        }
    }

    #[test]
    fn builtin_name_with_foreign_schema_falls_back() {
        let foreign = vec![ToolSchema {
            name: "add_numbers".into(),
            description: String::new(),
            parameters: vec![ParamSpec::required("values", ParamType::String, "")],
        }];
        let v = validate(&candidate("add_numbers", json!({"values": "1,2"})), &foreign).unwrap();
        assert!(matches!(v.call, ToolCall::Other { .. }));
    }
}
