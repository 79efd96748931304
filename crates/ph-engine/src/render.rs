use crate::validate::is_contained;
use ph_core::error::EngineError;
use ph_core::types::{SkilletMetadata, Snippet};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tera::{Context, Tera};

/// Renders every snippet that has a body, keyed by snippet name.
///
/// Snippet bodies are Jinja-style templates. Variable defaults apply first
/// and `context` overrides them. A declared variable without a default
/// renders empty; a name that is neither declared nor supplied is an error.
pub fn render_snippets(
    definition: &SkilletMetadata,
    context: &BTreeMap<String, Value>,
) -> Result<BTreeMap<String, String>, EngineError> {
    let values = template_context(definition, context);
    let mut rendered = BTreeMap::new();
    for snippet in &definition.snippets {
        let Some(template) = snippet_body(&definition.source_path, snippet)? else {
            continue;
        };
        let output = Tera::one_off(&template, &values, false).map_err(|err| EngineError::Render {
            snippet: snippet.name.clone(),
            message: describe(&err),
        })?;
        rendered.insert(snippet.name.clone(), output);
    }
    Ok(rendered)
}

fn template_context(definition: &SkilletMetadata, overrides: &BTreeMap<String, Value>) -> Context {
    let mut values = Context::new();
    for variable in &definition.variables {
        values.insert(variable.name.as_str(), &variable.default);
    }
    for (name, value) in overrides {
        values.insert(name.as_str(), value);
    }
    values
}

// tera keeps the useful part (which variable, which line) in the source chain.
fn describe(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn snippet_body(source_path: &Path, snippet: &Snippet) -> Result<Option<String>, EngineError> {
    if let Some(file) = &snippet.file {
        if !is_contained(Path::new(file)) {
            return Err(EngineError::Render {
                snippet: snippet.name.clone(),
                message: format!("file {file} points outside the skillet"),
            });
        }
        let body = fs::read_to_string(source_path.join(file)).map_err(|err| EngineError::Render {
            snippet: snippet.name.clone(),
            message: format!("cannot read {file}: {err}"),
        })?;
        return Ok(Some(body));
    }
    Ok(snippet.element.clone().or_else(|| snippet.cmd.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::load_definition;
    use serde_json::json;

    fn inline(yaml_tail: &str) -> (tempfile::TempDir, SkilletMetadata) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(".meta-cnc.yaml"),
            format!("name: sk\ntype: panos\n{yaml_tail}"),
        )
        .unwrap();
        let definition = load_definition(dir.path(), ".meta-cnc.yaml").unwrap();
        (dir, definition)
    }

    #[test]
    fn control_flow_and_filters_render() {
        let (_dir, definition) = inline(concat!(
            "variables:\n",
            "  - name: hostname\n    default: fw1\n",
            "  - name: servers\n    default: [a, b]\n",
            "snippets:\n",
            "  - name: host\n    element: \"{% if hostname %}<h>{{ hostname | upper }}</h>{% endif %}\"\n",
            "  - name: dns\n    element: \"{% for s in servers %}<s>{{ s }}</s>{% endfor %}\"\n",
        ));
        let rendered = render_snippets(&definition, &BTreeMap::new()).unwrap();
        assert_eq!(rendered["host"], "<h>FW1</h>");
        assert_eq!(rendered["dns"], "<s>a</s><s>b</s>");

        let context = BTreeMap::from([("hostname".to_string(), json!(""))]);
        assert_eq!(render_snippets(&definition, &context).unwrap()["host"], "");
    }

    #[test]
    fn declared_variables_without_defaults_render_empty() {
        let (_dir, definition) = inline(
            "variables:\n  - name: banner\nsnippets:\n  - name: motd\n    element: \"<m>{{ banner }}</m>\"\n",
        );
        let rendered = render_snippets(&definition, &BTreeMap::new()).unwrap();
        assert_eq!(rendered["motd"], "<m></m>");
    }

    #[test]
    fn undeclared_variables_fail_the_snippet() {
        let (_dir, definition) =
            inline("snippets:\n  - name: motd\n    element: \"{{ nope }}\"\n");
        assert!(matches!(
            render_snippets(&definition, &BTreeMap::new()),
            Err(EngineError::Render { snippet, message }) if snippet == "motd" && message.contains("nope")
        ));
    }

    #[test]
    fn context_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("host.xml"), "<hostname>{{ hostname }}</hostname>").unwrap();
        fs::write(
            dir.path().join(".meta-cnc.yaml"),
            "name: sk\ntype: panos\nvariables:\n  - name: hostname\n    default: fw1\nsnippets:\n  - name: host\n    file: host.xml\n  - name: inline\n    element: <dns>{{ hostname }}</dns>\n  - name: empty\n",
        )
        .unwrap();
        let definition = load_definition(dir.path(), ".meta-cnc.yaml").unwrap();

        let defaults = render_snippets(&definition, &BTreeMap::new()).unwrap();
        assert_eq!(defaults["host"], "<hostname>fw1</hostname>");
        assert!(!defaults.contains_key("empty"));

        let context = BTreeMap::from([("hostname".to_string(), json!("edge"))]);
        let rendered = render_snippets(&definition, &context).unwrap();
        assert_eq!(rendered["inline"], "<dns>edge</dns>");
    }

    #[test]
    fn missing_snippet_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(".meta-cnc.yaml"),
            "name: sk\ntype: panos\nsnippets:\n  - name: host\n    file: gone.xml\n",
        )
        .unwrap();
        let definition = load_definition(dir.path(), ".meta-cnc.yaml").unwrap();
        assert!(matches!(
            render_snippets(&definition, &BTreeMap::new()),
            Err(EngineError::Render { snippet, .. }) if snippet == "host"
        ));
    }
}
