//! Built-in arithmetic tools and the in-process registry that serves them.

use super::expression;
use super::traits::{Tool, ToolRegistry};
use crate::error::ToolError;
use crate::types::{Arguments, ParamSpec, ParamType, ToolSchema, ToolValue};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

fn number_arg(args: &Arguments, name: &str) -> Result<f64, ToolError> {
    args.get(name)
        .and_then(ToolValue::as_f64)
        .ok_or_else(|| ToolError::MissingArgument(name.into()))
}

fn string_arg<'a>(args: &'a Arguments, name: &str) -> Result<&'a str, ToolError> {
    args.get(name)
        .and_then(ToolValue::as_str)
        .ok_or_else(|| ToolError::MissingArgument(name.into()))
}

fn binary_schema(name: &str, description: &str) -> ToolSchema {
    ToolSchema {
        name: name.into(),
        description: description.into(),
        parameters: vec![
            ParamSpec::required("a", ParamType::Number, "First number"),
            ParamSpec::required("b", ParamType::Number, "Second number"),
        ],
    }
}

/// `add_numbers(a, b)`.
pub struct AddNumbers;

#[async_trait]
impl Tool for AddNumbers {
    fn name(&self) -> &str {
        "add_numbers"
    }

    fn description(&self) -> &str {
        "Calculate the sum of two numbers. Only use when the user explicitly asks for addition."
    }

    fn schema(&self) -> ToolSchema {
        binary_schema(self.name(), self.description())
    }

    async fn execute(&self, args: &Arguments) -> Result<ToolValue, ToolError> {
        let a = number_arg(args, "a")?;
        let b = number_arg(args, "b")?;
        info!("add_numbers(a={}, b={})", a, b);
        Ok(ToolValue::Number(a + b))
    }
}

/// `multiply_numbers(a, b)`.
pub struct MultiplyNumbers;

#[async_trait]
impl Tool for MultiplyNumbers {
    fn name(&self) -> &str {
        "multiply_numbers"
    }

    fn description(&self) -> &str {
        "Calculate the product of two numbers. Only use when the user explicitly asks for multiplication."
    }

    fn schema(&self) -> ToolSchema {
        binary_schema(self.name(), self.description())
    }

    async fn execute(&self, args: &Arguments) -> Result<ToolValue, ToolError> {
        let a = number_arg(args, "a")?;
        let b = number_arg(args, "b")?;
        info!("multiply_numbers(a={}, b={})", a, b);
        Ok(ToolValue::Number(a * b))
    }
}

/// `calculate_expression(expression)`.
pub struct CalculateExpression;

#[async_trait]
impl Tool for CalculateExpression {
    fn name(&self) -> &str {
        "calculate_expression"
    }

    fn description(&self) -> &str {
        "Calculate a mathematical expression containing only numbers, + - * /, and parentheses, e.g. '2+3*4'."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().into(),
            description: self.description().into(),
            parameters: vec![ParamSpec::required(
                "expression",
                ParamType::String,
                "Mathematical expression, e.g. '2+3*4' or '10/2'",
            )],
        }
    }

    async fn execute(&self, args: &Arguments) -> Result<ToolValue, ToolError> {
        let expr = string_arg(args, "expression")?;
        info!("calculate_expression(expression='{}')", expr);
        match expression::evaluate(expr) {
            Ok(value) => Ok(ToolValue::Number(value)),
            Err(e) => {
                error!("calculate_expression failed: {}", e);
                Err(e)
            }
        }
    }
}

/// In-process registry over a fixed tool set.
#[derive(Clone)]
pub struct BuiltinRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl BuiltinRegistry {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
        Self { tools }
    }

    /// The three arithmetic tools.
    pub fn arithmetic() -> Self {
        Self::new(vec![
            Arc::new(AddNumbers),
            Arc::new(MultiplyNumbers),
            Arc::new(CalculateExpression),
        ])
    }
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::arithmetic()
    }
}

#[async_trait]
impl ToolRegistry for BuiltinRegistry {
    async fn discover(&self) -> Result<Vec<ToolSchema>> {
        Ok(self.tools.iter().map(|t| t.schema()).collect())
    }

    async fn invoke(&self, name: &str, args: &Arguments) -> Result<ToolValue, ToolError> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| ToolError::UnknownTool(name.into()))?;
        tool.execute(args).await
    }
}
