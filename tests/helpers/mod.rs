//! Shared fixtures for the macro integration tests

#![allow(dead_code)]

use std::sync::Arc;

use openvpms_macro::config::MacroArchetypes;
use openvpms_macro::macros::{LookupMacros, MacroFactory};
use openvpms_macro::store::{HandlebarsRenderer, InMemoryLookupStore, LookupRecord, Reference};
use serde_json::{json, Value};

pub const EXPRESSION: &str = "lookup.macro";
pub const REPORT: &str = "lookup.macroReport";

/// A store and the registry listening to it
pub struct Harness {
    pub store: Arc<InMemoryLookupStore>,
    pub macros: LookupMacros,
}

impl Harness {
    /// A registry over the given expression macros
    pub fn with_macros(macros: &[(&str, &str)]) -> Self {
        let store = Arc::new(InMemoryLookupStore::new());
        for (code, expression) in macros {
            store.save(LookupRecord::new(EXPRESSION, *code, *expression));
        }
        Self::over(store)
    }

    /// A registry over an existing store
    pub fn over(store: Arc<InMemoryLookupStore>) -> Self {
        let factory = MacroFactory::new(
            store.clone(),
            Arc::new(HandlebarsRenderer::new()),
            MacroArchetypes::default(),
        );
        let macros = LookupMacros::new(store.clone(), factory).expect("registry loads");
        Self { store, macros }
    }

    /// Save an expression macro through the store
    pub fn save(&self, code: &str, expression: &str) {
        self.store.save(LookupRecord::new(EXPRESSION, code, expression));
    }
}

/// The macros every registry test starts from
pub fn standard_macros() -> Harness {
    Harness::with_macros(&[
        ("macro1", "'macro 1 text'"),
        ("@macro2", "concat('one', 'two', 'three')"),
        ("displayName", "openvpms:get(., 'displayName')"),
        ("exceptionMacro", "openvpms:get(., 'invalidnode')"),
        ("nested", "concat('nested test: ', $macro1)"),
        ("numbertest", "concat('input number: ', $number)"),
        ("variableTest", "$variable"),
        ("recursivemacro1", "$recursivemacro2"),
        ("recursivemacro2", "$recursivemacro1"),
    ])
}

pub fn customer() -> Value {
    json!({
        "archetype": "party.customerperson",
        "displayName": "Customer",
        "firstName": "J",
        "lastName": "Smith"
    })
}

pub fn patient() -> Value {
    json!({
        "archetype": "party.patientpet",
        "name": "Fido",
        "species": "Canine",
        "weight": { "value": 12.5, "units": "kg" },
        "owner": customer()
    })
}

/// Store a document template whose content is `content`, returning its reference
pub fn add_template(store: &InMemoryLookupStore, id: &str, content: &str) -> Reference {
    let template = Reference::new("entity.documentTemplate", id);
    store.insert_object(
        template.clone(),
        json!({
            "name": id,
            "document": { "archetype": "document.other", "id": id }
        }),
    );
    store.insert_object(
        Reference::new("document.other", id),
        json!({
            "name": format!("{}.hbs", id),
            "mimeType": "text/plain",
            "content": content
        }),
    );
    template
}

/// Save a report macro rendering `template`
pub fn add_report(store: &InMemoryLookupStore, code: &str, expression: &str, template: Reference) {
    store.save(LookupRecord::new(REPORT, code, expression).with_report(template));
}
