//! Template rendering for event content, rule text and sink arguments.
//!
//! Templates use MiniJinja syntax (`{{ repository.name }}`) and are
//! rendered against the parsed event object. Rendering is opaque text
//! substitution: the output of a rule template is only interpreted later
//! by the rule evaluator.

use minijinja::Environment;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("failed to render template '{template}': {source}")]
pub struct TemplateError {
    pub template: String,
    #[source]
    pub source: minijinja::Error,
}

/// Renders ad-hoc templates against a context value.
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_keep_trailing_newline(true);
        Self { env }
    }

    /// Render `template` with `context` as its root object.
    pub fn render<S: Serialize>(&self, context: &S, template: &str) -> Result<String, TemplateError> {
        let output = self
            .env
            .render_str(template, context)
            .map_err(|source| TemplateError {
                template: template.to_string(),
                source,
            })?;
        tracing::trace!(template, output = %output, "Template rendered");
        Ok(output)
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateEngine").finish_non_exhaustive()
    }
}
