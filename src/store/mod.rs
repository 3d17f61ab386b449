//! External collaborators of the macro engine
//!
//! The engine never talks to a database or a reporting system directly.
//! It consumes:
//! - a [`LookupSource`] supplying macro lookup records and change notifications
//! - an [`ObjectResolver`] turning references into objects
//! - a [`DocumentRenderer`] that renders an object through a document template
//!
//! [`InMemoryLookupStore`] and [`HandlebarsRenderer`] are self-contained
//! implementations used by the CLI and the tests.

pub mod memory;
pub mod render;

pub use memory::InMemoryLookupStore;
pub use render::HandlebarsRenderer;

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Identifies an object held by an [`ObjectResolver`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub archetype: String,
    pub id: String,
}

impl Reference {
    pub fn new(archetype: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            archetype: archetype.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.archetype, self.id)
    }
}

/// A macro lookup record as held by the macro source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupRecord {
    /// Record kind, e.g. `lookup.macro`
    pub archetype: String,

    /// The macro code, as typed in text
    pub code: String,

    #[serde(default)]
    pub name: String,

    #[serde(default = "default_active")]
    pub active: bool,

    /// The macro expression
    #[serde(default)]
    pub expression: Option<String>,

    /// Document template reference, for report macros
    #[serde(default)]
    pub report: Option<Reference>,
}

fn default_active() -> bool {
    true
}

impl LookupRecord {
    /// Create an active record with an expression
    pub fn new(
        archetype: impl Into<String>,
        code: impl Into<String>,
        expression: impl Into<String>,
    ) -> Self {
        let code = code.into();
        Self {
            archetype: archetype.into(),
            name: code.clone(),
            code,
            active: true,
            expression: Some(expression.into()),
            report: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_report(mut self, report: Reference) -> Self {
        self.report = Some(report);
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }
}

/// Errors from the macro source or object resolver
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Store error: {0}")]
    Backend(String),
}

/// Identifies a registered listener
pub type ListenerId = u64;

/// Receives change notifications for lookup records
pub trait LookupListener: Send + Sync {
    /// A record was created or updated
    fn saved(&self, record: &LookupRecord);

    /// A record was deleted
    fn removed(&self, record: &LookupRecord);
}

/// Supplies macro lookup records
pub trait LookupSource: Send + Sync {
    /// All records of `archetype`, active or not
    fn lookups(&self, archetype: &str) -> Result<Vec<LookupRecord>, StoreError>;

    /// Subscribe to changes of records of `archetype`
    fn add_listener(&self, archetype: &str, listener: Arc<dyn LookupListener>) -> ListenerId;

    /// Unsubscribe a listener registered with [`LookupSource::add_listener`]
    fn remove_listener(&self, archetype: &str, id: ListenerId);
}

/// Resolves references to objects
pub trait ObjectResolver: Send + Sync {
    /// Returns `None` if nothing is stored under `reference`
    fn resolve(&self, reference: &Reference) -> Result<Option<Value>, StoreError>;
}

/// Output formats a renderer may be asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Html,
}

impl OutputFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Text => "text/plain",
            OutputFormat::Html => "text/html",
        }
    }
}

/// Document content backing a template
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub name: String,
    pub mime_type: String,
    pub content: Vec<u8>,
}

impl Document {
    /// Build from a stored document object: `{name, mimeType, content}`
    pub fn from_object(object: &Value) -> Result<Self, StoreError> {
        let content = object
            .get("content")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::Backend("document has no content".to_string()))?;
        let field = |name: &str| {
            object
                .get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_default()
        };
        Ok(Self {
            name: field("name"),
            mime_type: field("mimeType"),
            content: content.as_bytes().to_vec(),
        })
    }
}

/// Errors from a [`DocumentRenderer`]
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Template error: {0}")]
    Template(String),

    #[error("Invalid document encoding: {0}")]
    Encoding(String),
}

/// Renders an object through a document template
pub trait DocumentRenderer: Send + Sync {
    fn render(
        &self,
        object: &Value,
        document: &Document,
        format: OutputFormat,
    ) -> Result<Vec<u8>, RenderError>;
}

/// Read a lock, recovering the data if a writer panicked
pub(crate) fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

/// Write a lock, recovering the data if a writer panicked
pub(crate) fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
