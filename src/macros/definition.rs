//! Macro definitions
//!
//! A [`MacroDefinition`] is built from a [`LookupRecord`] by the
//! [`MacroFactory`]. Expression macros evaluate their expression and return
//! the result as text. Report macros evaluate their expression to an object
//! and render it through a document template.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::MacroArchetypes;
use crate::error::MacroError;
use crate::expr::Expression;
use crate::store::{
    Document, DocumentRenderer, LookupRecord, ObjectResolver, Reference, StoreError,
};

/// Discriminates the macro variants. Runners are cached per kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MacroKind {
    Expression,
    Report,
}

/// A macro that evaluates an expression
#[derive(Debug, Clone)]
pub struct ExpressionMacro {
    code: String,
    name: String,
    expression: Expression,
}

impl ExpressionMacro {
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        expression: &str,
    ) -> Result<Self, MacroError> {
        let code = code.into();
        let expression = parse(&code, expression)?;
        Ok(Self {
            code,
            name: name.into(),
            expression,
        })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }
}

/// A macro that renders the object its expression selects
#[derive(Debug, Clone)]
pub struct ReportMacro {
    code: String,
    name: String,
    expression: Expression,
    template: Option<DocumentTemplate>,
}

impl ReportMacro {
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        expression: &str,
        template: Option<DocumentTemplate>,
    ) -> Result<Self, MacroError> {
        let code = code.into();
        let expression = parse(&code, expression)?;
        Ok(Self {
            code,
            name: name.into(),
            expression,
            template,
        })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    /// The document template, if the report reference resolved
    pub fn template(&self) -> Option<&DocumentTemplate> {
        self.template.as_ref()
    }
}

fn parse(code: &str, expression: &str) -> Result<Expression, MacroError> {
    if code.is_empty() {
        return Err(MacroError::definition(code, "macro has no code"));
    }
    if expression.trim().is_empty() {
        return Err(MacroError::definition(code, "macro has no expression"));
    }
    Expression::parse(expression).map_err(|e| MacroError::definition(code, e.to_string()))
}

/// A registered macro
#[derive(Debug, Clone)]
pub enum MacroDefinition {
    Expression(ExpressionMacro),
    Report(ReportMacro),
}

impl MacroDefinition {
    /// The code that invokes the macro
    pub fn code(&self) -> &str {
        match self {
            MacroDefinition::Expression(m) => m.code(),
            MacroDefinition::Report(m) => m.code(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            MacroDefinition::Expression(m) => m.name(),
            MacroDefinition::Report(m) => m.name(),
        }
    }

    pub fn expression(&self) -> &Expression {
        match self {
            MacroDefinition::Expression(m) => m.expression(),
            MacroDefinition::Report(m) => m.expression(),
        }
    }

    pub fn kind(&self) -> MacroKind {
        match self {
            MacroDefinition::Expression(_) => MacroKind::Expression,
            MacroDefinition::Report(_) => MacroKind::Report,
        }
    }
}

/// A resolved document template entity
///
/// The entity refers to its content through a `document` reference, which
/// is only resolved when the template is used.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentTemplate {
    reference: Reference,
    entity: Value,
}

impl DocumentTemplate {
    pub fn new(reference: Reference, entity: Value) -> Self {
        Self { reference, entity }
    }

    pub fn reference(&self) -> &Reference {
        &self.reference
    }

    /// The template name, if the entity has one
    pub fn name(&self) -> Option<&str> {
        self.entity.get("name").and_then(Value::as_str)
    }

    /// Resolve the template's document. `Ok(None)` if it has none.
    ///
    /// A document reference that resolves to nothing is [`StoreError::NotFound`].
    pub fn document(&self, resolver: &dyn ObjectResolver) -> Result<Option<Document>, StoreError> {
        let Some(field) = self.entity.get("document") else {
            return Ok(None);
        };
        let reference: Reference = serde_json::from_value(field.clone()).map_err(|e| {
            StoreError::Backend(format!(
                "invalid document reference in {}: {}",
                self.reference, e
            ))
        })?;
        match resolver.resolve(&reference)? {
            Some(object) => Document::from_object(&object).map(Some),
            None => Err(StoreError::NotFound(reference.to_string())),
        }
    }
}

/// Builds definitions from lookup records and holds the collaborators runners need
pub struct MacroFactory {
    resolver: Arc<dyn ObjectResolver>,
    renderer: Arc<dyn DocumentRenderer>,
    archetypes: MacroArchetypes,
}

impl MacroFactory {
    pub fn new(
        resolver: Arc<dyn ObjectResolver>,
        renderer: Arc<dyn DocumentRenderer>,
        archetypes: MacroArchetypes,
    ) -> Self {
        Self {
            resolver,
            renderer,
            archetypes,
        }
    }

    pub fn archetypes(&self) -> &MacroArchetypes {
        &self.archetypes
    }

    pub fn resolver(&self) -> &dyn ObjectResolver {
        self.resolver.as_ref()
    }

    pub fn renderer(&self) -> &dyn DocumentRenderer {
        self.renderer.as_ref()
    }

    /// Create a definition from `record`
    pub fn create(&self, record: &LookupRecord) -> Result<MacroDefinition, MacroError> {
        let expression = record.expression.as_deref().unwrap_or_default();

        if record.archetype == self.archetypes.expression {
            debug!("Creating expression macro {}", record.code);
            ExpressionMacro::new(&record.code, &record.name, expression)
                .map(MacroDefinition::Expression)
        } else if record.archetype == self.archetypes.report {
            debug!("Creating report macro {}", record.code);
            let template = record
                .report
                .as_ref()
                .and_then(|reference| self.template(&record.code, reference));
            ReportMacro::new(&record.code, &record.name, expression, template)
                .map(MacroDefinition::Report)
        } else {
            Err(MacroError::definition(
                &record.code,
                format!("unsupported archetype {}", record.archetype),
            ))
        }
    }

    fn template(&self, code: &str, reference: &Reference) -> Option<DocumentTemplate> {
        match self.resolver.resolve(reference) {
            Ok(Some(entity)) => Some(DocumentTemplate::new(reference.clone(), entity)),
            Ok(None) => {
                warn!("Document template {} for macro {} not found", reference, code);
                None
            }
            Err(e) => {
                warn!(
                    "Failed to resolve document template {} for macro {}: {}",
                    reference, code, e
                );
                None
            }
        }
    }
}
