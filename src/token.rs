//! Prompt size estimates.
//!
//! A prompt larger than the model's context window is only rejected by the
//! provider after the whole body has been uploaded. Estimating the size first
//! lets a run warn before the call, and tells the user whether the goal or the
//! input is what makes the prompt large.

use crate::client::ModelId;
use serde::Serialize;
use std::sync::Arc;

const CHARS_PER_TOKEN: usize = 4;

/// Known context windows, most specific prefix first.
const CONTEXT_WINDOWS: &[(&str, usize)] = &[
    ("gpt-4.1", 1_047_576),
    ("gpt-4o", 128_000),
    ("gpt-4-turbo", 128_000),
    ("gpt-4-32k", 32_768),
    ("gpt-4", 8_192),
    ("gpt-3.5-turbo-instruct", 4_096),
    ("gpt-3.5-turbo", 16_385),
];

/// Estimation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenizerKind {
    /// One token per four characters
    Chars,
    /// Word-piece approximation: long words split, punctuation counted apart
    Words,
}

impl TokenizerKind {
    /// Creates an estimator of this kind.
    #[must_use]
    pub fn create(self) -> Arc<dyn TokenEstimator> {
        match self {
            Self::Chars => Arc::new(CharEstimator),
            Self::Words => Arc::new(WordPieceEstimator),
        }
    }
}

/// Estimates how many tokens a provider will count for a text.
pub trait TokenEstimator: Send + Sync {
    /// Estimated token count of `text`.
    fn estimate(&self, text: &str) -> usize;
}

#[derive(Debug, Clone, Copy)]
struct CharEstimator;

impl TokenEstimator for CharEstimator {
    fn estimate(&self, text: &str) -> usize {
        text.chars().count().div_ceil(CHARS_PER_TOKEN)
    }
}

/// Counts each run of letters and digits as one token per started group of
/// four characters, and every other non-space character as its own token.
/// Code and delimiter-heavy prompts come out larger than with [`CharEstimator`].
#[derive(Debug, Clone, Copy)]
struct WordPieceEstimator;

impl TokenEstimator for WordPieceEstimator {
    fn estimate(&self, text: &str) -> usize {
        let mut tokens = 0;
        let mut run = 0usize;

        for c in text.chars() {
            if c.is_alphanumeric() {
                run += 1;
                continue;
            }
            tokens += run.div_ceil(CHARS_PER_TOKEN);
            run = 0;
            if !c.is_whitespace() || c == '\n' {
                tokens += 1;
            }
        }

        tokens + run.div_ceil(CHARS_PER_TOKEN)
    }
}

/// Estimated size of one prompt, split by where the tokens come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PromptSize {
    /// Tokens of the goal text
    pub goal: usize,
    /// Tokens of the input text
    pub body: usize,
    /// Tokens of the rendered prompt, delimiters included
    pub total: usize,
}

impl PromptSize {
    /// Measures a rendered prompt and the two texts it was built from.
    #[must_use]
    pub fn measure(estimator: &dyn TokenEstimator, goal: &str, body: &str, prompt: &str) -> Self {
        Self {
            goal: estimator.estimate(goal),
            body: estimator.estimate(body),
            total: estimator.estimate(prompt),
        }
    }

    /// Context window of `model` if the prompt is estimated not to fit in it.
    #[must_use]
    pub fn exceeded_window(&self, model: &ModelId) -> Option<usize> {
        context_window(model).filter(|&window| self.total > window)
    }
}

/// Context window of a known model family, in tokens.
///
/// Dated snapshots (`gpt-4o-2024-08-06`) match their family. Unknown models
/// return `None` and are never warned about.
#[must_use]
pub fn context_window(model: &ModelId) -> Option<usize> {
    CONTEXT_WINDOWS
        .iter()
        .find(|(prefix, _)| model.as_str().starts_with(prefix))
        .map(|&(_, window)| window)
}
