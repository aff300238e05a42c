//! Prompt templates for RAG queries

use crate::errors::RaglineError;
use crate::errors::Result;
use crate::models::Document;

/// The default grounded-answer template
pub const DEFAULT_PROMPT_TEMPLATE: &str = "\
Given the following information, answer the question.

Context:
{{documents}}

Question: {{question}}
Answer:
";

/// Template slots a prompt may reference
const ALLOWED_VARIABLES: [&str; 2] = ["documents", "question"];

/// Renders a templated prompt from retrieved documents and the question.
///
/// Placeholders use `{{name}}` syntax and are validated at construction:
/// only `documents` and `question` are recognized slots. Rendering is
/// deterministic; identical inputs produce byte-identical output.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    template: String,
}

impl PromptBuilder {
    /// Validate the template and create a builder.
    ///
    /// # Errors
    /// `Template` when the template references an unknown variable.
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        for variable in extract_variables(&template) {
            if !ALLOWED_VARIABLES.contains(&variable.as_str()) {
                return Err(RaglineError::template(format!(
                    "unknown template variable '{variable}' (allowed: documents, question)"
                )));
            }
        }
        Ok(Self { template })
    }

    /// Builder over the crate's default template
    pub fn default_template() -> Self {
        Self {
            template: DEFAULT_PROMPT_TEMPLATE.to_string(),
        }
    }

    /// Render the prompt. Document contents are concatenated in the order
    /// given, separated by a single newline.
    pub fn build(&self, documents: &[Document], question: &str) -> String {
        let context = documents
            .iter()
            .map(|doc| doc.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        self.template
            .replace("{{documents}}", &context)
            .replace("{{question}}", question)
    }

    /// The raw template text
    pub fn template(&self) -> &str {
        &self.template
    }
}

/// Extract `{{name}}` variable names from a template.
///
/// Names are taken verbatim, so `{{ question }}` is a distinct (and
/// unknown) variable; `build` only ever substitutes the exact tokens that
/// passed validation.
fn extract_variables(template: &str) -> Vec<String> {
    let mut variables = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        rest = &rest[start + 2..];
        if let Some(end) = rest.find("}}") {
            variables.push(rest[..end].to_string());
            rest = &rest[end + 2..];
        } else {
            break;
        }
    }
    variables
}
