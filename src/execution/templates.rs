//! Template rendering for command arguments and notification messages
//!
//! Templates use handlebars syntax. Two helper sets are exposed:
//! - argument templates get `request`, which looks a key up in the caller's values
//!   (`{{request "id"}}`); a missing key renders as an empty string
//! - message templates additionally get `StdOut` and `StdErr`, bound to the
//!   trimmed output captured from the finished command
//!
//! Rendering is strict: any name that is neither a registered helper nor a
//! template built-in is an error, so `{{StdOut}}` in an argument template fails
//! the build instead of rendering empty.

use handlebars::{
    Context, Handlebars, Helper, HelperDef, HelperResult, JsonRender, Output, RenderContext,
    RenderErrorReason,
};
use tracing::debug;

use crate::types::{TemplateError, ValueLookup};

/// `{{request "key"}}`
struct RequestHelper<'a> {
    values: &'a dyn ValueLookup,
}

impl HelperDef for RequestHelper<'_> {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let key = h
            .param(0)
            .ok_or(RenderErrorReason::ParamNotFoundForIndex("request", 0))?
            .value()
            .render();

        if let Some(value) = self.values.get(&key) {
            out.write(&value)?;
        }
        Ok(())
    }
}

/// Zero-argument helper writing a fixed string
struct CapturedHelper<'a> {
    value: &'a str,
}

impl HelperDef for CapturedHelper<'_> {
    fn call<'reg: 'rc, 'rc>(
        &self,
        _: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        out.write(self.value)?;
        Ok(())
    }
}

fn base_registry(values: &dyn ValueLookup) -> Handlebars<'_> {
    let mut handlebars = Handlebars::new();
    // Rendered text goes to argv and chat messages, not HTML
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars.set_strict_mode(true);
    handlebars.register_helper("request", Box::new(RequestHelper { values }));
    handlebars
}

/// Render a single argument template against the caller's values
pub fn render_arg_template(
    template: &str,
    values: &dyn ValueLookup,
) -> Result<String, TemplateError> {
    let handlebars = base_registry(values);
    Ok(handlebars.render_template(template, &())?)
}

/// Render every argument template, preserving order. The first failure aborts.
pub fn render_arg_templates(
    templates: &[String],
    values: &dyn ValueLookup,
) -> Result<Vec<String>, TemplateError> {
    let handlebars = base_registry(values);

    let mut rendered = Vec::with_capacity(templates.len());
    for template in templates {
        rendered.push(handlebars.render_template(template, &())?);
    }

    debug!(original = ?templates, rendered = ?rendered, "Rendered argument templates");
    Ok(rendered)
}

/// Render a success or error message template after the command has finished
pub fn render_message_template(
    template: &str,
    values: &dyn ValueLookup,
    stdout: &str,
    stderr: &str,
) -> Result<String, TemplateError> {
    let stdout = stdout.trim();
    let stderr = stderr.trim();

    let mut handlebars = base_registry(values);
    handlebars.register_helper("StdOut", Box::new(CapturedHelper { value: stdout }));
    handlebars.register_helper("StdErr", Box::new(CapturedHelper { value: stderr }));

    Ok(handlebars.render_template(template, &())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn values() -> HashMap<String, String> {
        let mut values = HashMap::new();
        values.insert("id".to_string(), "42".to_string());
        values.insert("user".to_string(), "o'brien <admin>".to_string());
        values
    }

    #[test]
    fn test_request_lookup() {
        assert_eq!(render_arg_template("{{request \"id\"}}", &values()).unwrap(), "42");
    }

    #[test]
    fn test_missing_key_renders_empty() {
        assert_eq!(render_arg_template("{{request \"nope\"}}", &values()).unwrap(), "");
        assert_eq!(
            render_arg_template("--id={{request \"nope\"}}", &values()).unwrap(),
            "--id="
        );
    }

    #[test]
    fn test_values_are_not_html_escaped() {
        assert_eq!(
            render_arg_template("{{request \"user\"}}", &values()).unwrap(),
            "o'brien <admin>"
        );
    }

    #[test]
    fn test_plain_argument_passes_through() {
        assert_eq!(render_arg_template("--verbose", &values()).unwrap(), "--verbose");
    }

    #[test]
    fn test_malformed_template_fails() {
        assert!(render_arg_template("{{request \"id\"", &values()).is_err());
        assert!(render_arg_template("{{#if}}", &values()).is_err());
    }

    #[test]
    fn test_request_without_key_fails() {
        assert!(render_arg_template("{{request}}", &values()).is_err());
    }

    #[test]
    fn test_render_arg_templates_preserves_order() {
        let templates = vec![
            "run".to_string(),
            "--id".to_string(),
            "{{request \"id\"}}".to_string(),
        ];
        let rendered = render_arg_templates(&templates, &values()).unwrap();
        assert_eq!(rendered, vec!["run", "--id", "42"]);
    }

    #[test]
    fn test_render_arg_templates_stops_at_first_error() {
        let templates = vec!["ok".to_string(), "{{broken".to_string()];
        assert!(render_arg_templates(&templates, &values()).is_err());
    }

    #[test]
    fn test_message_template_with_captured_output() {
        let message = render_message_template(
            "Job {{request \"id\"}} said: {{StdOut}} / {{StdErr}}",
            &values(),
            "  hello\n",
            "\nwarn ",
        )
        .unwrap();
        assert_eq!(message, "Job 42 said: hello / warn");
    }

    #[test]
    fn test_std_helpers_unavailable_for_arguments() {
        assert!(render_arg_template("{{StdOut}}", &values()).is_err());
        assert!(render_arg_template("--err={{StdErr}}", &values()).is_err());
    }

    #[test]
    fn test_unknown_name_fails_in_message_mode() {
        assert!(render_message_template("{{Stdout}}", &values(), "out", "").is_err());
    }
}
