//! Report macros: an expression selects an object which is rendered through
//! a document template

mod helpers;

use std::sync::Arc;

use helpers::{add_report, add_template, patient, Harness, REPORT};
use openvpms_macro::config::MacroArchetypes;
use openvpms_macro::macros::{LookupMacros, MacroFactory};
use openvpms_macro::store::{
    Document, DocumentRenderer, InMemoryLookupStore, LookupRecord, OutputFormat, Reference,
    RenderError, StoreError,
};
use openvpms_macro::MacroError;
use pretty_assertions::assert_eq;
use serde_json::Value;

fn store() -> Arc<InMemoryLookupStore> {
    Arc::new(InMemoryLookupStore::new())
}

#[test]
fn test_report_renders_object() {
    let store = store();
    let template = add_template(&store, "summary", "Patient: {{name}} ({{species}})");
    add_report(&store, "@summary", ".", template);
    let h = Harness::over(store);

    assert_eq!(
        h.macros.run("@summary", Some(&patient())).unwrap(),
        Some("Patient: Fido (Canine)".to_string())
    );
}

#[test]
fn test_report_of_selected_object() {
    let store = store();
    let template = add_template(&store, "owner", "{{lastName}}, {{firstName}}");
    add_report(&store, "@owner", "owner", template);
    let h = Harness::over(store);

    assert_eq!(
        h.macros.run_all("Owner: @owner", Some(&patient())),
        "Owner: Smith, J"
    );
}

#[test]
fn test_report_output_is_not_escaped() {
    let store = store();
    let template = add_template(&store, "plain", "{{name}}");
    add_report(&store, "@plain", ".", template);
    let h = Harness::over(store);

    let object = serde_json::json!({"name": "Fido & <Rex>"});
    assert_eq!(
        h.macros.run("@plain", Some(&object)).unwrap(),
        Some("Fido & <Rex>".to_string())
    );
}

#[test]
fn test_report_whitespace_is_normalized() {
    let store = store();
    let template = add_template(
        &store,
        "weight",
        "\n\n{{name}}   \nWeight: {{weight.value}} {{weight.units}}\t\n\n\n",
    );
    add_report(&store, "@weight", ".", template);
    let h = Harness::over(store);

    assert_eq!(
        h.macros.run("@weight", Some(&patient())).unwrap(),
        Some("Fido\nWeight: 12.5 kg".to_string())
    );
}

#[test]
fn test_report_requires_single_object() {
    let store = store();
    let template = add_template(&store, "summary", "{{name}}");
    add_report(&store, "@name", "name", template.clone());
    add_report(&store, "@nothing", "missing", template);
    let h = Harness::over(store);
    let patient = patient();

    let err = h.macros.run("@name", Some(&patient)).unwrap_err();
    match err {
        MacroError::InvalidReportObject {
            code,
            expression,
            found,
        } => {
            assert_eq!(code, "@name");
            assert_eq!(expression, "name");
            assert_eq!(found, "string");
        }
        other => panic!("expected invalid report object, got {}", other),
    }

    let err = h.macros.run("@nothing", Some(&patient)).unwrap_err();
    assert!(matches!(err, MacroError::InvalidReportObject { ref found, .. } if found == "null"));

    // soft failure in batch expansion
    assert_eq!(h.macros.run_all("A @name B", Some(&patient)), "A @name B");
}

#[test]
fn test_report_without_template() {
    let store = store();
    store.save(LookupRecord::new(REPORT, "@none", "."));
    add_report(
        &store,
        "@unresolved",
        ".",
        Reference::new("entity.documentTemplate", "missing"),
    );
    let h = Harness::over(store);
    let patient = patient();

    assert!(h.macros.exists("@none"));
    assert!(matches!(
        h.macros.run("@none", Some(&patient)).unwrap_err(),
        MacroError::MissingTemplate { .. }
    ));
    assert!(matches!(
        h.macros.run("@unresolved", Some(&patient)).unwrap_err(),
        MacroError::MissingTemplate { .. }
    ));
}

#[test]
fn test_report_with_unreadable_document() {
    let store = store();
    let template = Reference::new("entity.documentTemplate", "broken");
    store.insert_object(
        template.clone(),
        serde_json::json!({"name": "broken", "document": {"archetype": "document.other", "id": "broken"}}),
    );
    store.insert_object(
        Reference::new("document.other", "broken"),
        serde_json::json!({"name": "broken.hbs"}),
    );
    add_report(&store, "@broken", ".", template);
    let h = Harness::over(store);

    assert!(matches!(
        h.macros.run("@broken", Some(&patient())).unwrap_err(),
        MacroError::Template { .. }
    ));
}

#[test]
fn test_report_render_failure() {
    let store = store();
    let template = add_template(&store, "bad", "{{#each}}");
    add_report(&store, "@bad", ".", template);
    let h = Harness::over(store);

    assert!(matches!(
        h.macros.run("@bad", Some(&patient())).unwrap_err(),
        MacroError::Render { .. }
    ));
}

#[test]
fn test_report_from_expression_macro() {
    let store = store();
    let template = add_template(&store, "summary", "{{name}} the {{lowercase species}}");
    add_report(&store, "@summary", ".", template);
    store.save(LookupRecord::new(
        helpers::EXPRESSION,
        "@intro",
        "concat('Seen: ', macro:eval('@summary'))",
    ));
    let h = Harness::over(store);

    assert_eq!(
        h.macros.run("@intro", Some(&patient())).unwrap(),
        Some("Seen: Fido the canine".to_string())
    );
}

#[test]
fn test_report_with_dangling_document() {
    let store = store();
    let template = Reference::new("entity.documentTemplate", "dangling");
    store.insert_object(
        template.clone(),
        serde_json::json!({"name": "dangling", "document": {"archetype": "document.other", "id": "gone"}}),
    );
    add_report(&store, "@dangling", ".", template);
    let h = Harness::over(store);

    let err = h.macros.run("@dangling", Some(&patient())).unwrap_err();
    assert!(matches!(
        err,
        MacroError::Template { source: StoreError::NotFound(ref what), .. } if what == "document.other:gone"
    ));
    assert_eq!(h.macros.run_all("a @dangling b", Some(&patient())), "a @dangling b");
}

/// Renders every document to bytes that are not UTF-8
struct BinaryRenderer;

impl DocumentRenderer for BinaryRenderer {
    fn render(&self, _: &Value, _: &Document, _: OutputFormat) -> Result<Vec<u8>, RenderError> {
        Ok(vec![0xff, 0xfe])
    }
}

#[test]
fn test_report_output_not_utf8() {
    let store = store();
    let template = add_template(&store, "binary", "{{name}}");
    add_report(&store, "@r", ".", template);
    let factory = MacroFactory::new(
        store.clone(),
        Arc::new(BinaryRenderer),
        MacroArchetypes::default(),
    );
    let macros = LookupMacros::new(store, factory).unwrap();
    let patient = patient();

    let err = macros.run("@r", Some(&patient)).unwrap_err();
    assert!(matches!(err, MacroError::Decode { ref code, .. } if code == "@r"));
    assert!(err.to_string().starts_with("Report output for macro @r is not valid UTF-8"));

    assert_eq!(macros.run_all("a @r b", Some(&patient)), "a @r b");
}
