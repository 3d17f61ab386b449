//! Evaluation context
//!
//! A [`MacroContext`] lives for one top-level `run` or `run_all` call. It
//! binds the target object and caller variables, keeps the stack of macros
//! currently running so recursion can be detected, and caches one
//! [`Runner`] per macro kind.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::{Map, Value};
use tracing::debug;

use super::definition::{MacroDefinition, MacroFactory, MacroKind};
use super::registry::MacroTable;
use super::runner::Runner;
use super::variables::VariableScope;
use crate::error::MacroError;

/// Codes of the macros currently being evaluated, oldest first
pub(crate) type RunningStack = RefCell<Vec<String>>;

/// Per-call evaluation state
pub struct MacroContext<'a> {
    table: &'a MacroTable,
    object: Value,
    variables: &'a VariableScope<'a>,
    running: &'a RunningStack,
    runners: RefCell<HashMap<MacroKind, Rc<Runner>>>,
}

impl<'a> MacroContext<'a> {
    /// Create a context. A missing object is replaced by an empty one
    pub(crate) fn new(
        table: &'a MacroTable,
        object: Option<&Value>,
        variables: &'a VariableScope<'a>,
        running: &'a RunningStack,
    ) -> Self {
        Self {
            table,
            object: object
                .cloned()
                .unwrap_or_else(|| Value::Object(Map::new())),
            variables,
            running,
            runners: RefCell::new(HashMap::new()),
        }
    }

    /// A context over `object` sharing this context's variables and recursion stack
    pub fn child(&self, object: Value) -> MacroContext<'a> {
        MacroContext {
            table: self.table,
            object,
            variables: self.variables,
            running: self.running,
            runners: RefCell::new(HashMap::new()),
        }
    }

    /// The object macros are evaluated against
    pub fn object(&self) -> &Value {
        &self.object
    }

    pub fn variables(&self) -> &VariableScope<'a> {
        self.variables
    }

    pub fn factory(&self) -> &MacroFactory {
        self.table.factory()
    }

    /// True if a macro is registered under `code`
    pub fn exists(&self, code: &str) -> bool {
        self.table.contains(code)
    }

    /// Run the macro registered under `code`. `Ok(None)` if there is none
    pub fn run_code(&self, code: &str, number: Option<&str>) -> Result<Option<String>, MacroError> {
        match self.table.get(code) {
            Some(definition) => self.run(&definition, number),
            None => Ok(None),
        }
    }

    /// Run `definition`, with `number` bound to `$number`
    pub fn run(
        &self,
        definition: &MacroDefinition,
        number: Option<&str>,
    ) -> Result<Option<String>, MacroError> {
        let _guard = self.enter(definition.code())?;
        debug!("Running macro {}", definition.code());
        self.runner(definition.kind()).run(self, definition, number)
    }

    /// The runner for `kind`, created on first use
    fn runner(&self, kind: MacroKind) -> Rc<Runner> {
        let mut runners = self.runners.borrow_mut();
        Rc::clone(
            runners
                .entry(kind)
                .or_insert_with(|| Rc::new(Runner::new(kind))),
        )
    }

    fn enter(&self, code: &str) -> Result<RunningGuard<'a>, MacroError> {
        let mut running = self.running.borrow_mut();
        if running.iter().any(|c| c == code) {
            return Err(MacroError::Recursive {
                code: code.to_string(),
                chain: running.join(" => "),
            });
        }
        running.push(code.to_string());
        Ok(RunningGuard {
            running: self.running,
        })
    }
}

/// Pops the running stack when dropped
struct RunningGuard<'a> {
    running: &'a RunningStack,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.running.borrow_mut().pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MacroArchetypes;
    use crate::macros::variables::MapVariables;
    use crate::store::{HandlebarsRenderer, InMemoryLookupStore, LookupRecord};
    use serde_json::json;
    use std::sync::Arc;

    fn table(records: &[(&str, &str)]) -> MacroTable {
        let store = Arc::new(InMemoryLookupStore::new());
        let factory = MacroFactory::new(
            store,
            Arc::new(HandlebarsRenderer::new()),
            MacroArchetypes::default(),
        );
        let table = MacroTable::new(factory);
        for (code, expression) in records {
            table.add(&LookupRecord::new("lookup.macro", *code, *expression));
        }
        table
    }

    #[test]
    fn test_run_code() {
        let table = table(&[("macro1", "'macro 1 text'"), ("plus1", "$number + 1")]);
        let scope = VariableScope::new();
        let running = RunningStack::default();
        let context = MacroContext::new(&table, None, &scope, &running);

        assert_eq!(
            context.run_code("macro1", None).unwrap(),
            Some("macro 1 text".to_string())
        );
        assert_eq!(
            context.run_code("plus1", Some("3")).unwrap(),
            Some("4".to_string())
        );
        assert_eq!(context.run_code("missing", None).unwrap(), None);
        assert!(running.borrow().is_empty());
    }

    #[test]
    fn test_recursion_reports_chain() {
        let table = table(&[
            ("recursivemacro1", "$recursivemacro2"),
            ("recursivemacro2", "$recursivemacro1"),
        ]);
        let scope = VariableScope::new();
        let running = RunningStack::default();
        let context = MacroContext::new(&table, None, &scope, &running);

        let err = context.run_code("recursivemacro1", None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Macro recursivemacro1 called recursively from recursivemacro1 => recursivemacro2"
        );
        assert!(running.borrow().is_empty());
    }

    #[test]
    fn test_child_shares_scope() {
        let table = table(&[("name", "openvpms:get(., 'name')"), ("greet", "$greeting")]);
        let variables = MapVariables::new().with("greeting", "hello");
        let scope = VariableScope::with(&variables);
        let running = RunningStack::default();
        let context = MacroContext::new(&table, Some(&json!({"name": "Fido"})), &scope, &running);

        let child = context.child(json!({"name": "Rex"}));
        assert_eq!(child.run_code("name", None).unwrap(), Some("Rex".to_string()));
        assert_eq!(child.run_code("greet", None).unwrap(), Some("hello".to_string()));
        assert_eq!(context.run_code("name", None).unwrap(), Some("Fido".to_string()));
    }

    #[test]
    fn test_missing_object_is_empty() {
        let table = table(&[]);
        let scope = VariableScope::new();
        let running = RunningStack::default();
        let context = MacroContext::new(&table, None, &scope, &running);
        assert_eq!(context.object(), &json!({}));
    }
}
