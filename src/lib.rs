//! OpenVPMS Macros - text macro expansion
//!
//! Expands short macro codes typed into free text. Macros are defined by
//! lookup records held in an external store and are either expressions
//! evaluated against an object, or reports rendered through a document
//! template.
//!
//! ## Architecture
//! Text -> Tokenizer -> Registry lookup -> Context (recursion guard)
//! -> Runner (expression | report) -> Splicer (cursor tracking)
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use openvpms_macro::config::MacroArchetypes;
//! use openvpms_macro::macros::{LookupMacros, MacroFactory};
//! use openvpms_macro::store::{HandlebarsRenderer, InMemoryLookupStore, LookupRecord};
//! use serde_json::json;
//!
//! let store = Arc::new(InMemoryLookupStore::new());
//! store.save(LookupRecord::new("lookup.macro", "@name", "openvpms:get(., 'name')"));
//! store.save(LookupRecord::new("lookup.macro", "@plus1", "$number + 1"));
//!
//! let factory = MacroFactory::new(
//!     store.clone(),
//!     Arc::new(HandlebarsRenderer::new()),
//!     MacroArchetypes::default(),
//! );
//! let macros = LookupMacros::new(store, factory).unwrap();
//!
//! let patient = json!({"name": "Fido"});
//! assert_eq!(macros.run_all("@name is 3@plus1", Some(&patient)), "Fido is 4");
//! ```

// Error types
pub mod error;

// Embedded expression language
pub mod expr;

// Tokenizer, definitions, evaluation and the registry
pub mod macros;

// External collaborators: macro source, object resolver, document renderer
pub mod store;

// Settings and tracing
pub mod config;

pub use config::{MacroArchetypes, MacroConfig};
pub use error::{ExpressionError, MacroError};
pub use macros::{LookupMacros, MacroFactory, Macros, MapVariables, Position, Variables};
