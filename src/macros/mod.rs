//! Macro expansion
//!
//! Macros are short codes typed into free text, e.g. `@today` or
//! `2@dose`. [`LookupMacros`] holds the registered macros and expands them,
//! either one at a time ([`LookupMacros::run`]) or throughout a body of text
//! ([`LookupMacros::run_all`]).
//!
//! ## Module Structure
//!
//! - `token` - splits text into fragments and numeric prefixes
//! - `definition` - expression and report macros, built from lookup records
//! - `variables` - caller variables and their scope
//! - `context` - per-call state and recursion detection
//! - `runner` - evaluates expression and report macros
//! - `registry` - the macro table, kept in step with the macro source
//! - `splice` - text substitution with cursor tracking

pub mod context;
pub mod definition;
pub mod registry;
pub mod runner;
pub mod splice;
pub mod token;
pub mod variables;

pub use context::MacroContext;
pub use definition::{
    DocumentTemplate, ExpressionMacro, MacroDefinition, MacroFactory, MacroKind, ReportMacro,
};
pub use registry::{LookupMacros, MacroTable};
pub use splice::Position;
pub use token::{tokenize, Token};
pub use variables::{MapVariables, VariableScope, Variables};

use serde_json::Value;

use crate::error::MacroError;

/// Caller-facing macro operations
pub trait Macros {
    /// Determine if a macro exists
    fn exists(&self, code: &str) -> bool;

    /// Run a macro. `None` if it doesn't exist or evaluates to nothing
    fn run(&self, text: &str, object: Option<&Value>) -> Result<Option<String>, MacroError>;

    /// Run a macro with caller variables
    fn run_with(
        &self,
        text: &str,
        object: Option<&Value>,
        variables: &dyn Variables,
    ) -> Result<Option<String>, MacroError>;

    /// Replace every macro in `text` with its value
    fn run_all(&self, text: &str, object: Option<&Value>) -> String;

    /// Replace every macro in `text`, with caller variables and cursor tracking
    fn run_all_with(
        &self,
        text: &str,
        object: Option<&Value>,
        variables: Option<&dyn Variables>,
        position: Option<&mut Position>,
    ) -> String;
}
