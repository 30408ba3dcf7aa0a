//! Prompt construction.
//!
//! The built-in prompt wraps the goal and the body in triple-backtick
//! delimiters. Backticks already present in either text are passed through
//! untouched, so a body containing ```` ``` ```` can blur the boundaries seen by
//! the model; this is reported with a warning but never rewritten.

use crate::error::{Error, Result};
use serde::Serialize;
use std::path::Path;
use tera::{Context, Tera};
use tracing::{debug, warn};

const DELIMITER: &str = "```";
const GOAL_PREAMBLE: &str = "with the following goal (delimited by triple backticks): ";
const BODY_PREAMBLE: &str =
    "process the following text with specified goal(delimited by triple backticks): ";
const CUSTOM_TEMPLATE: &str = "custom_prompt";

/// Number of characters the built-in template adds around goal and body.
pub const TEMPLATE_OVERHEAD: usize =
    GOAL_PREAMBLE.len() + BODY_PREAMBLE.len() + 4 * DELIMITER.len();

/// Builds the delimited prompt sent to the model.
///
/// Pure and deterministic: the output is the fixed template with `goal` and
/// `body` inserted verbatim.
///
/// # Examples
///
/// ```
/// use engineered_prompts::build_prompt;
///
/// let prompt = build_prompt("summarize in 2 sentences", "The quick brown fox...");
/// assert!(prompt.starts_with(
///     "with the following goal (delimited by triple backticks): ```summarize in 2 sentences```"
/// ));
/// ```
#[must_use]
pub fn build_prompt(goal: &str, body: &str) -> String {
    let mut prompt = String::with_capacity(TEMPLATE_OVERHEAD + goal.len() + body.len());
    prompt.push_str(GOAL_PREAMBLE);
    prompt.push_str(DELIMITER);
    prompt.push_str(goal);
    prompt.push_str(DELIMITER);
    prompt.push_str(BODY_PREAMBLE);
    prompt.push_str(DELIMITER);
    prompt.push_str(body);
    prompt.push_str(DELIMITER);
    prompt
}

#[derive(Serialize)]
struct PromptContext<'a> {
    goal: &'a str,
    body: &'a str,
}

/// Template used to combine a goal and a body into a prompt.
#[derive(Debug, Clone, Default)]
pub enum PromptTemplate {
    /// The built-in delimited template, see [`build_prompt`]
    #[default]
    Builtin,
    /// A user-supplied Tera template with `goal` and `body` variables
    Custom(Box<Tera>),
}

impl PromptTemplate {
    /// Loads a custom template from disk, or the built-in one when `path` is `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the template cannot be read or does not compile.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::Builtin);
        };

        let source = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_source(&source).map_err(|e| match e {
            Error::Template { message, .. } => Error::template(path.display().to_string(), message),
            other => other,
        })
    }

    /// Compiles a custom template from its source text.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is not valid Tera syntax.
    pub fn from_source(source: &str) -> Result<Self> {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![]);
        tera.add_raw_template(CUSTOM_TEMPLATE, source)
            .map_err(|e| Error::template(CUSTOM_TEMPLATE, e.to_string()))?;
        Ok(Self::Custom(Box::new(tera)))
    }

    /// Renders the prompt for a goal and a body.
    ///
    /// # Errors
    ///
    /// Returns an error if a custom template fails to render.
    pub fn render(&self, goal: &str, body: &str) -> Result<String> {
        warn_on_delimiters(goal, body);

        match self {
            Self::Builtin => Ok(build_prompt(goal, body)),
            Self::Custom(tera) => {
                let context = Context::from_serialize(PromptContext { goal, body })?;
                let prompt = tera
                    .render(CUSTOM_TEMPLATE, &context)
                    .map_err(|e| Error::template(CUSTOM_TEMPLATE, e.to_string()))?;
                debug!("Rendered custom prompt template ({} bytes)", prompt.len());
                Ok(prompt)
            }
        }
    }
}

fn warn_on_delimiters(goal: &str, body: &str) {
    if goal.contains(DELIMITER) {
        warn!("Goal text contains triple backticks; the model may misread the goal boundary");
    }
    if body.contains(DELIMITER) {
        warn!("Input text contains triple backticks; the model may misread the text boundary");
    }
}
