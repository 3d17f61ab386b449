//! Macro registry
//!
//! [`LookupMacros`] loads macro definitions from a [`LookupSource`] and keeps
//! them in step with it: the source notifies the registry whenever a macro
//! record is saved or removed. Lookups clone the definition out of the map,
//! so no lock is held while a macro runs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::context::{MacroContext, RunningStack};
use super::definition::{MacroDefinition, MacroFactory};
use super::splice::{splice, Position};
use super::token::Token;
use super::variables::{VariableScope, Variables};
use super::Macros;
use crate::error::MacroError;
use crate::store::{read_lock, write_lock, ListenerId, LookupListener, LookupRecord, LookupSource};

/// Macro definitions keyed on code
pub struct MacroTable {
    macros: RwLock<HashMap<String, Arc<MacroDefinition>>>,
    factory: MacroFactory,
}

impl MacroTable {
    pub(crate) fn new(factory: MacroFactory) -> Self {
        Self {
            macros: RwLock::new(HashMap::new()),
            factory,
        }
    }

    pub fn get(&self, code: &str) -> Option<Arc<MacroDefinition>> {
        read_lock(&self.macros).get(code).cloned()
    }

    pub fn contains(&self, code: &str) -> bool {
        read_lock(&self.macros).contains_key(code)
    }

    pub fn factory(&self) -> &MacroFactory {
        &self.factory
    }

    pub fn len(&self) -> usize {
        read_lock(&self.macros).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered codes, sorted
    pub fn codes(&self) -> Vec<String> {
        let mut codes: Vec<_> = read_lock(&self.macros).keys().cloned().collect();
        codes.sort();
        codes
    }

    /// Register the macro for `record`. A malformed record is logged, and
    /// evicts any macro previously registered under its code
    pub(crate) fn add(&self, record: &LookupRecord) -> bool {
        match self.factory.create(record) {
            Ok(definition) => {
                debug!("Registered macro {}", record.code);
                write_lock(&self.macros).insert(record.code.clone(), Arc::new(definition));
                true
            }
            Err(e) => {
                warn!("Skipping macro {}: {}", record.code, e);
                self.remove(&record.code);
                false
            }
        }
    }

    fn remove(&self, code: &str) {
        if write_lock(&self.macros).remove(code).is_some() {
            debug!("Unregistered macro {}", code);
        }
    }
}

impl LookupListener for MacroTable {
    fn saved(&self, record: &LookupRecord) {
        if record.active {
            self.add(record);
        } else {
            self.remove(&record.code);
        }
    }

    fn removed(&self, record: &LookupRecord) {
        self.remove(&record.code);
    }
}

/// Macros backed by lookup records
pub struct LookupMacros {
    table: Arc<MacroTable>,
    source: Arc<dyn LookupSource>,
    listeners: Mutex<Vec<(String, ListenerId)>>,
}

impl LookupMacros {
    /// Load the active macros of both archetypes from `source` and subscribe to changes.
    ///
    /// Fails only if `source` cannot supply the records. Malformed records are skipped.
    pub fn new(source: Arc<dyn LookupSource>, factory: MacroFactory) -> Result<Self, MacroError> {
        let table = Arc::new(MacroTable::new(factory));
        let archetypes = table.factory().archetypes().clone();

        for archetype in archetypes.all() {
            let records = source.lookups(archetype)?;
            for record in records.iter().filter(|r| r.active) {
                table.add(record);
            }
        }

        let listener: Arc<dyn LookupListener> = table.clone();
        let listeners = archetypes
            .all()
            .into_iter()
            .map(|archetype| {
                let id = source.add_listener(archetype, Arc::clone(&listener));
                (archetype.to_string(), id)
            })
            .collect();

        info!("Loaded {} macros", table.len());
        Ok(Self {
            table,
            source,
            listeners: Mutex::new(listeners),
        })
    }

    /// Number of registered macros
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Registered macro codes, sorted
    pub fn codes(&self) -> Vec<String> {
        self.table.codes()
    }

    /// Determine if a macro exists
    pub fn exists(&self, code: &str) -> bool {
        self.table.contains(code)
    }

    /// Run a macro.
    ///
    /// `text` is a macro code, optionally preceded by a number which the
    /// macro sees as `$number`, e.g. `3@plus1`.
    ///
    /// Returns `None` if no macro is registered for the code, or the macro
    /// evaluates to nothing.
    pub fn run(&self, text: &str, object: Option<&Value>) -> Result<Option<String>, MacroError> {
        self.run_scoped(text, object, &VariableScope::new())
    }

    /// Run a macro with caller variables, visible to any macro it invokes
    pub fn run_with(
        &self,
        text: &str,
        object: Option<&Value>,
        variables: &dyn Variables,
    ) -> Result<Option<String>, MacroError> {
        self.run_scoped(text, object, &VariableScope::with(variables))
    }

    /// Run a macro within an existing variable scope
    pub fn run_scoped(
        &self,
        text: &str,
        object: Option<&Value>,
        variables: &VariableScope<'_>,
    ) -> Result<Option<String>, MacroError> {
        let token = Token::parse(text);
        let Some(definition) = self.table.get(token.token) else {
            return Ok(None);
        };
        let running = RunningStack::default();
        let context = MacroContext::new(&self.table, object, variables, &running);
        let result = context.run(&definition, token.numeric_prefix)?;
        Ok(result.filter(|value| !value.is_empty()))
    }

    /// Replace every macro in `text` with its value
    pub fn run_all(&self, text: &str, object: Option<&Value>) -> String {
        self.run_all_scoped(text, object, &VariableScope::new(), None)
    }

    /// Replace every macro in `text` with its value, adjusting `position`
    /// to follow the text it pointed at
    pub fn run_all_with(
        &self,
        text: &str,
        object: Option<&Value>,
        variables: Option<&dyn Variables>,
        position: Option<&mut Position>,
    ) -> String {
        let scope = variables.map(VariableScope::with).unwrap_or_default();
        self.run_all_scoped(text, object, &scope, position)
    }

    /// Replace every macro in `text` within an existing variable scope.
    ///
    /// A macro that fails is logged and left as it was typed.
    pub fn run_all_scoped(
        &self,
        text: &str,
        object: Option<&Value>,
        variables: &VariableScope<'_>,
        position: Option<&mut Position>,
    ) -> String {
        let running = RunningStack::default();
        let context = MacroContext::new(&self.table, object, variables, &running);

        splice(text, position, |token| {
            let (definition, punctuation) = self.resolve(token)?;
            match context.run(&definition, token.numeric_prefix) {
                Ok(value) => {
                    let mut value = value.unwrap_or_default();
                    value.push_str(punctuation);
                    Some(value)
                }
                Err(e) if e.is_evaluation_error() => {
                    warn!("Failed to expand {}: {}", token.text, e);
                    None
                }
                Err(e) => {
                    error!("Unexpected failure expanding {}: {}", token.text, e);
                    None
                }
            }
        })
    }

    /// The macro a fragment names, and any sentence punctuation following its code.
    ///
    /// An exact match wins over a match with the punctuation stripped.
    fn resolve<'t>(&self, token: &Token<'t>) -> Option<(Arc<MacroDefinition>, &'t str)> {
        if let Some(definition) = self.table.get(token.token) {
            return Some((definition, ""));
        }
        let (code, punctuation) = token.strip_punctuation()?;
        self.table.get(code).map(|definition| (definition, punctuation))
    }

    /// Unsubscribe from the macro source. Further changes are not seen
    pub fn dispose(&self) {
        let listeners = std::mem::take(
            &mut *self
                .listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for (archetype, id) in listeners {
            self.source.remove_listener(&archetype, id);
        }
    }
}

impl Drop for LookupMacros {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl Macros for LookupMacros {
    fn exists(&self, code: &str) -> bool {
        LookupMacros::exists(self, code)
    }

    fn run(&self, text: &str, object: Option<&Value>) -> Result<Option<String>, MacroError> {
        LookupMacros::run(self, text, object)
    }

    fn run_with(
        &self,
        text: &str,
        object: Option<&Value>,
        variables: &dyn Variables,
    ) -> Result<Option<String>, MacroError> {
        LookupMacros::run_with(self, text, object, variables)
    }

    fn run_all(&self, text: &str, object: Option<&Value>) -> String {
        LookupMacros::run_all(self, text, object)
    }

    fn run_all_with(
        &self,
        text: &str,
        object: Option<&Value>,
        variables: Option<&dyn Variables>,
        position: Option<&mut Position>,
    ) -> String {
        LookupMacros::run_all_with(self, text, object, variables, position)
    }
}
