//! Template evaluation for descriptor values.

use minijinja::value::ValueKind;
use minijinja::{Environment, UndefinedBehavior, Value};

/// Renders `{{ ... }}` templates in env values, volumes, users and commands
/// against a server's configuration object.
///
/// Undefined paths render as empty strings. Two filters are available:
/// `mount_as(target)` turns a host path into `source:target`, and `volume`
/// turns it into `source:source`.
pub struct TemplateRenderer {
    environment: Environment<'static>,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TemplateRenderer {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.debug_struct("TemplateRenderer").finish_non_exhaustive()
    }
}

impl TemplateRenderer {
    /// Creates a renderer with the descriptor filters installed.
    #[must_use]
    pub fn new() -> Self {
        let mut environment = Environment::new();
        environment.set_undefined_behavior(UndefinedBehavior::Chainable);
        environment.add_filter("mount_as", mount_as);
        environment.add_filter("volume", volume);
        Self { environment }
    }

    /// Returns whether `value` contains template markers.
    #[must_use]
    pub fn is_template(value: &str) -> bool {
        value.contains("{{") && value.contains("}}")
    }

    /// Renders one value to a string; text without markers is returned as is.
    ///
    /// # Errors
    ///
    /// Returns the renderer error for malformed templates.
    pub fn render(
        &self,
        template: &str,
        config: &serde_json::Value,
    ) -> Result<String, minijinja::Error> {
        if !Self::is_template(template) {
            return Ok(template.to_owned());
        }
        self.environment.render_str(template, config)
    }

    /// Renders a list of values.
    ///
    /// An entry consisting of a single `{{ expression }}` that evaluates to
    /// a sequence expands into one entry per item.
    ///
    /// # Errors
    ///
    /// Returns the renderer error for the first malformed template.
    pub fn render_list(
        &self,
        templates: &[String],
        config: &serde_json::Value,
    ) -> Result<Vec<String>, minijinja::Error> {
        let mut rendered = Vec::with_capacity(templates.len());
        for template in templates {
            if let Some(source) = single_expression(template) {
                let value = self.environment.compile_expression(source)?.eval(config)?;
                rendered.extend(flatten(&value));
            } else {
                rendered.push(self.render(template, config)?);
            }
        }
        Ok(rendered)
    }
}

fn single_expression(template: &str) -> Option<&str> {
    let inner = template.trim().strip_prefix("{{")?.strip_suffix("}}")?;
    (!inner.contains("{{") && !inner.contains("}}")).then_some(inner)
}

fn flatten(value: &Value) -> Vec<String> {
    if value.kind() == ValueKind::Seq
        && let Ok(items) = value.try_iter()
    {
        return items.map(|item| display(&item)).collect();
    }
    vec![display(value)]
}

fn display(value: &Value) -> String {
    if value.is_undefined() || value.is_none() {
        String::new()
    } else {
        value.to_string()
    }
}

fn mount_as(value: &Value, target: &str) -> String {
    let source = if value.kind() == ValueKind::Seq {
        display(&value.get_item_by_index(0).unwrap_or_default())
    } else {
        display(value)
    };
    if source.is_empty() {
        return String::new();
    }
    format!("{source}:{}", target.trim())
}

fn volume(value: &Value) -> Value {
    let bind = |source: String| {
        if source.is_empty() {
            source
        } else {
            format!("{source}:{source}")
        }
    };
    if value.kind() == ValueKind::Seq
        && let Ok(items) = value.try_iter()
    {
        let mounts: Vec<String> = items.map(|item| bind(display(&item))).collect();
        return Value::from(mounts);
    }
    Value::from(bind(display(value)))
}
