//! Handlebars document renderer
//!
//! Renders document templates whose content is a Handlebars template. Plain
//! text output disables HTML escaping; HTML output keeps it.

use handlebars::{no_escape, Handlebars};
use serde_json::Value;
use tracing::debug;

use super::{Document, DocumentRenderer, OutputFormat, RenderError};

/// [`DocumentRenderer`] backed by Handlebars
pub struct HandlebarsRenderer {
    text: Handlebars<'static>,
    html: Handlebars<'static>,
}

impl Default for HandlebarsRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlebarsRenderer {
    pub fn new() -> Self {
        let mut text = Handlebars::new();
        text.register_escape_fn(no_escape);
        register_helpers(&mut text);

        let mut html = Handlebars::new();
        register_helpers(&mut html);

        Self { text, html }
    }

    fn registry(&self, format: OutputFormat) -> &Handlebars<'static> {
        match format {
            OutputFormat::Text => &self.text,
            OutputFormat::Html => &self.html,
        }
    }

    /// Render template source directly
    pub fn render_template(
        &self,
        template: &str,
        object: &Value,
        format: OutputFormat,
    ) -> Result<String, RenderError> {
        self.registry(format)
            .render_template(template, object)
            .map_err(|e| RenderError::Template(e.to_string()))
    }
}

impl DocumentRenderer for HandlebarsRenderer {
    fn render(
        &self,
        object: &Value,
        document: &Document,
        format: OutputFormat,
    ) -> Result<Vec<u8>, RenderError> {
        debug!(
            "Rendering {} ({}) as {}",
            document.name,
            document.mime_type,
            format.mime_type()
        );
        let template = std::str::from_utf8(&document.content)
            .map_err(|e| RenderError::Encoding(e.to_string()))?;
        self.render_template(template, object, format)
            .map(String::into_bytes)
    }
}

fn register_helpers(handlebars: &mut Handlebars<'static>) {
    handlebars.register_helper("uppercase", Box::new(uppercase_helper));
    handlebars.register_helper("lowercase", Box::new(lowercase_helper));
    handlebars.register_helper("default", Box::new(default_helper));
}

// Handlebars helpers

fn param_text(h: &handlebars::Helper, index: usize) -> String {
    match h.param(index).map(|v| v.value()) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn uppercase_helper(
    h: &handlebars::Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    out.write(&param_text(h, 0).to_uppercase())?;
    Ok(())
}

fn lowercase_helper(
    h: &handlebars::Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    out.write(&param_text(h, 0).to_lowercase())?;
    Ok(())
}

/// `{{default value "fallback"}}`: the value, or the fallback when it is empty
fn default_helper(
    h: &handlebars::Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    let value = param_text(h, 0);
    if value.is_empty() {
        out.write(&param_text(h, 1))?;
    } else {
        out.write(&value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(content: &str) -> Document {
        Document {
            name: "test.hbs".to_string(),
            mime_type: "text/plain".to_string(),
            content: content.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_text_is_not_escaped() {
        let renderer = HandlebarsRenderer::new();
        let object = json!({"name": "Fido & <Rex>"});

        let text = renderer
            .render(&object, &document("Patient: {{name}}"), OutputFormat::Text)
            .unwrap();
        assert_eq!(String::from_utf8(text).unwrap(), "Patient: Fido & <Rex>");

        let html = renderer
            .render(&object, &document("{{name}}"), OutputFormat::Html)
            .unwrap();
        assert_eq!(String::from_utf8(html).unwrap(), "Fido &amp; &lt;Rex&gt;");
    }

    #[test]
    fn test_helpers() {
        let renderer = HandlebarsRenderer::new();
        let object = json!({"species": "Canine", "colour": ""});
        let result = renderer
            .render_template(
                "{{uppercase species}} {{lowercase species}} {{default colour \"unknown\"}}",
                &object,
                OutputFormat::Text,
            )
            .unwrap();
        assert_eq!(result, "CANINE canine unknown");
    }

    #[test]
    fn test_invalid_template() {
        let renderer = HandlebarsRenderer::new();
        let result = renderer.render(&json!({}), &document("{{#if}}"), OutputFormat::Text);
        assert!(matches!(result, Err(RenderError::Template(_))));
    }

    #[test]
    fn test_invalid_encoding() {
        let renderer = HandlebarsRenderer::new();
        let document = Document {
            name: "bad".to_string(),
            mime_type: "text/plain".to_string(),
            content: vec![0xff, 0xfe],
        };
        let result = renderer.render(&json!({}), &document, OutputFormat::Text);
        assert!(matches!(result, Err(RenderError::Encoding(_))));
    }
}
