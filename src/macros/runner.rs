//! Macro runners
//!
//! [`Runner`] evaluates a macro within a [`MacroContext`]. Expression
//! macros produce the string value of their expression; report macros
//! render the object their expression selects through a document template.

use once_cell::sync::Lazy;
use once_cell::unsync::OnceCell;
use regex::Regex;
use serde_json::Value;

use super::context::MacroContext;
use super::definition::{ExpressionMacro, MacroDefinition, MacroKind, ReportMacro};
use super::token::Token;
use crate::error::{ExpressionError, MacroError};
use crate::expr::value::{to_string, to_text, type_name};
use crate::expr::{Environment, Expression};
use crate::store::OutputFormat;

static TRAILING_SPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]+(\r?\n)").expect("valid trailing space pattern"));
static LEADING_BLANK_LINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[ \t]*\r?\n)+").expect("valid leading blank line pattern"));
static TRAILING_BLANK_LINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\r?\n[ \t]*)+$").expect("valid trailing blank line pattern"));

/// Evaluates macros of one kind
pub enum Runner {
    Expression(ExpressionRunner),
    Report(ReportRunner),
}

impl Runner {
    pub fn new(kind: MacroKind) -> Self {
        match kind {
            MacroKind::Expression => Runner::Expression(ExpressionRunner::default()),
            MacroKind::Report => Runner::Report(ReportRunner::default()),
        }
    }

    pub fn run(
        &self,
        context: &MacroContext<'_>,
        definition: &MacroDefinition,
        number: Option<&str>,
    ) -> Result<Option<String>, MacroError> {
        match (self, definition) {
            (Runner::Expression(runner), MacroDefinition::Expression(m)) => {
                runner.run(context, m, number)
            }
            (Runner::Report(runner), MacroDefinition::Report(m)) => runner.run(context, m, number),
            _ => Err(MacroError::definition(
                definition.code(),
                "macro run with a runner of another kind",
            )),
        }
    }
}

/// Runs expression macros
#[derive(Default)]
pub struct ExpressionRunner {
    /// The object expressions are evaluated against, bound on first use
    object: OnceCell<Value>,
}

impl ExpressionRunner {
    pub fn run(
        &self,
        context: &MacroContext<'_>,
        definition: &ExpressionMacro,
        number: Option<&str>,
    ) -> Result<Option<String>, MacroError> {
        let value = self.evaluate(context, definition.code(), definition.expression(), number)?;
        Ok(to_text(&value))
    }

    /// Evaluate `expression` for macro `code`
    pub fn evaluate(
        &self,
        context: &MacroContext<'_>,
        code: &str,
        expression: &Expression,
        number: Option<&str>,
    ) -> Result<Value, MacroError> {
        let object = self.object.get_or_init(|| context.object().clone());
        let env = MacroEnvironment { context, number };
        expression
            .evaluate(object, &env)
            .map_err(|e| match e {
                ExpressionError::Macro(inner) => *inner,
                source => MacroError::Evaluation {
                    code: code.to_string(),
                    expression: expression.source().to_string(),
                    source,
                },
            })
    }
}

/// Runs report macros
#[derive(Default)]
pub struct ReportRunner {
    expression: ExpressionRunner,
}

impl ReportRunner {
    pub fn run(
        &self,
        context: &MacroContext<'_>,
        definition: &ReportMacro,
        number: Option<&str>,
    ) -> Result<Option<String>, MacroError> {
        let code = definition.code();
        let expression = definition.expression();
        let object = self.expression.evaluate(context, code, expression, number)?;
        if !object.is_object() {
            return Err(MacroError::InvalidReportObject {
                code: code.to_string(),
                expression: expression.source().to_string(),
                found: type_name(&object).to_string(),
            });
        }

        let missing = || MacroError::MissingTemplate {
            code: code.to_string(),
        };
        let template = definition.template().ok_or_else(missing)?;
        let document = template
            .document(context.factory().resolver())
            .map_err(|source| MacroError::Template {
                code: code.to_string(),
                source,
            })?
            .ok_or_else(missing)?;

        let output = context
            .factory()
            .renderer()
            .render(&object, &document, OutputFormat::Text)
            .map_err(|source| MacroError::Render {
                code: code.to_string(),
                source,
            })?;
        let text = String::from_utf8(output).map_err(|source| MacroError::Decode {
            code: code.to_string(),
            source,
        })?;
        Ok(Some(normalize(&text)))
    }
}

/// Strip trailing spaces before newlines, and leading and trailing blank lines
fn normalize(text: &str) -> String {
    let text = TRAILING_SPACE.replace_all(text, "$1");
    let text = LEADING_BLANK_LINES.replace(&text, "");
    TRAILING_BLANK_LINES.replace(&text, "").into_owned()
}

/// Resolves variables and host functions for one macro evaluation
///
/// `$name` resolves to a caller variable, then to the macro registered as
/// `name`, then to `$number`.
struct MacroEnvironment<'c, 'a> {
    context: &'c MacroContext<'a>,
    number: Option<&'c str>,
}

impl MacroEnvironment<'_, '_> {
    /// `macro:eval(code[, object])`
    fn eval(&self, args: &[Value]) -> Result<Value, ExpressionError> {
        let (code, object) = match args {
            [code] => (to_string(code), None),
            [code, object] => (to_string(code), Some(object)),
            _ => {
                return Err(ExpressionError::InvalidArguments {
                    function: "macro:eval".to_string(),
                    message: format!("expected 1 or 2 arguments, got {}", args.len()),
                })
            }
        };
        let token = Token::parse(&code);
        let result = match object {
            Some(object) => self
                .context
                .child(object.clone())
                .run_code(token.token, token.numeric_prefix)?,
            None => self.context.run_code(token.token, token.numeric_prefix)?,
        };
        Ok(result.map(Value::String).unwrap_or(Value::Null))
    }
}

impl Environment for MacroEnvironment<'_, '_> {
    fn variable(&self, name: &str) -> Result<Option<Value>, ExpressionError> {
        if let Some(value) = self.context.variables().get(name) {
            return Ok(Some(value));
        }
        if self.context.exists(name) {
            let result = self.context.run_code(name, None)?;
            return Ok(Some(result.map(Value::String).unwrap_or(Value::Null)));
        }
        if name == "number" {
            return Ok(Some(
                self.number
                    .map(|n| Value::String(n.to_string()))
                    .unwrap_or(Value::Null),
            ));
        }
        Ok(None)
    }

    fn call(
        &self,
        prefix: Option<&str>,
        name: &str,
        args: &[Value],
    ) -> Option<Result<Value, ExpressionError>> {
        match (prefix, name) {
            (Some("macro"), "eval") => Some(self.eval(args)),
            _ => None,
        }
    }
}
