//! Error types for macro loading and evaluation
//!
//! Failures fall into two camps. Definition errors are raised while turning
//! lookup records into macros and are never seen by callers of `run`; the
//! record is logged and skipped. Everything else is raised while a macro is
//! being evaluated: `run` propagates it, `run_all` logs it and keeps the
//! original text.

use std::string::FromUtf8Error;

use thiserror::Error;

use crate::store::{RenderError, StoreError};

/// Errors raised by the macro engine
#[derive(Error, Debug)]
pub enum MacroError {
    /// A lookup record could not be turned into a macro
    #[error("Invalid macro '{code}': {message}")]
    Definition { code: String, message: String },

    /// A macro invoked itself, directly or through other macros
    #[error("Macro {code} called recursively from {chain}")]
    Recursive { code: String, chain: String },

    /// The macro expression failed to evaluate
    #[error("Failed to evaluate expression '{expression}' for macro {code}: {source}")]
    Evaluation {
        code: String,
        expression: String,
        #[source]
        source: ExpressionError,
    },

    /// A report macro expression produced something other than a single object
    #[error(
        "Expression '{expression}' for macro {code} must evaluate to a single object, found {found}"
    )]
    InvalidReportObject {
        code: String,
        expression: String,
        found: String,
    },

    /// A report macro has no usable document template
    #[error("Macro {code} has no document template")]
    MissingTemplate { code: String },

    /// The document template could not be read
    #[error("Failed to read document template for macro {code}: {source}")]
    Template {
        code: String,
        #[source]
        source: StoreError,
    },

    /// The document renderer failed
    #[error("Failed to render report for macro {code}: {source}")]
    Render {
        code: String,
        #[source]
        source: RenderError,
    },

    /// Rendered report output was not valid UTF-8
    #[error("Report output for macro {code} is not valid UTF-8: {source}")]
    Decode {
        code: String,
        #[source]
        source: FromUtf8Error,
    },

    /// The macro source could not be read
    #[error("Failed to load macros: {0}")]
    Source(#[from] StoreError),
}

impl MacroError {
    /// Create a definition error
    pub fn definition(code: impl Into<String>, message: impl Into<String>) -> Self {
        MacroError::Definition {
            code: code.into(),
            message: message.into(),
        }
    }

    /// True for errors raised while building macros from records
    pub fn is_definition_error(&self) -> bool {
        matches!(self, MacroError::Definition { .. })
    }

    /// True for errors raised while evaluating a macro.
    ///
    /// These are the failures `run_all` absorbs.
    pub fn is_evaluation_error(&self) -> bool {
        !matches!(
            self,
            MacroError::Definition { .. } | MacroError::Source(_)
        )
    }
}

/// Errors raised by the expression language
#[derive(Error, Debug)]
pub enum ExpressionError {
    #[error("Syntax error in '{expression}': {message}")]
    Parse { expression: String, message: String },

    #[error("Undefined variable: ${0}")]
    UndefinedVariable(String),

    #[error("Unknown function: {0}()")]
    UnknownFunction(String),

    #[error("Invalid arguments to {function}(): {message}")]
    InvalidArguments { function: String, message: String },

    #[error("No such node: {0}")]
    NoSuchNode(String),

    #[error("Type error: {0}")]
    Type(String),

    /// A macro invoked from inside the expression failed.
    ///
    /// Carried unchanged so the outer macro reports the original failure.
    #[error(transparent)]
    Macro(Box<MacroError>),
}

impl From<MacroError> for ExpressionError {
    fn from(error: MacroError) -> Self {
        ExpressionError::Macro(Box::new(error))
    }
}
