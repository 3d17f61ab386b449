//! Embedded expression language
//!
//! Macro expressions are written in a small XPath-flavoured language and
//! evaluated against a JSON object:
//!
//! ```text
//! 'macro 1 text'
//! concat('input number: ', $number)
//! openvpms:get(., 'displayName')
//! $number * 2 + 1
//! macro:eval('@today')
//! ```
//!
//! Variables (`$name`) and host functions are resolved through an
//! [`Environment`], which is how macros see their numeric prefix, caller
//! variables and each other.

mod ast;
mod eval;
mod parser;
pub mod value;

pub use ast::{BinaryOp, Expr};
pub use eval::{Environment, Evaluator};
pub use parser::{parse_expression, MAX_DEPTH};

use serde_json::Value;

use crate::error::ExpressionError;

/// A parsed expression together with its source text
#[derive(Debug, Clone)]
pub struct Expression {
    source: String,
    ast: Expr,
}

impl Expression {
    /// Parse `source`
    pub fn parse(source: impl Into<String>) -> Result<Self, ExpressionError> {
        let source = source.into();
        let ast = parse_expression(&source)?;
        Ok(Self { source, ast })
    }

    /// The source text
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ast(&self) -> &Expr {
        &self.ast
    }

    /// Evaluate against `context`
    pub fn evaluate(
        &self,
        context: &Value,
        env: &dyn Environment,
    ) -> Result<Value, ExpressionError> {
        Evaluator::new(env).evaluate(&self.ast, context)
    }
}
