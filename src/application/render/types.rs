use std::{fmt, str::FromStr};

use thiserror::Error;

/// How a math expression is laid out by the math engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathMode {
    /// Rendered within the running text flow.
    Inline,
    /// Rendered as a standalone block.
    Display,
}

impl MathMode {
    pub fn is_display(self) -> bool {
        matches!(self, MathMode::Display)
    }
}

impl fmt::Display for MathMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MathMode::Inline => f.write_str("inline"),
            MathMode::Display => f.write_str("display"),
        }
    }
}

/// Markup flavour produced by KaTeX.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MathOutput {
    Html,
    Mathml,
    #[default]
    HtmlAndMathml,
}

#[derive(Debug, Error)]
#[error("unknown math output `{0}` (expected html, mathml or htmlAndMathml)")]
pub struct ParseMathOutputError(String);

impl FromStr for MathOutput {
    type Err = ParseMathOutputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "html" => Ok(MathOutput::Html),
            "mathml" => Ok(MathOutput::Mathml),
            "htmlandmathml" | "html-and-mathml" | "both" => Ok(MathOutput::HtmlAndMathml),
            _ => Err(ParseMathOutputError(s.to_string())),
        }
    }
}

/// Result of running the segmenter/renderer over a piece of markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMath {
    /// Markup with every math occurrence replaced by the engine's output.
    pub rendered: String,
    /// Number of substitutions performed, across display and inline patterns.
    pub match_count: usize,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("KaTeX rejected {mode} math `{expression}`: {message}")]
    Katex {
        expression: String,
        mode: MathMode,
        message: String,
    },
    #[error("failed to build KaTeX options: {message}")]
    Options { message: String },
}

impl RenderError {
    pub fn katex(expression: &str, mode: MathMode, message: impl Into<String>) -> Self {
        Self::Katex {
            expression: expression.to_string(),
            mode,
            message: message.into(),
        }
    }

    /// The math source that the engine refused, when there is one.
    pub fn expression(&self) -> Option<&str> {
        match self {
            RenderError::Katex { expression, .. } => Some(expression.as_str()),
            RenderError::Options { .. } => None,
        }
    }
}

/// Renders one math source string into markup. Implementations must not
/// substitute fallback text on failure; rejected input is an error.
pub trait MathRenderer {
    fn render(&self, source: &str, mode: MathMode) -> Result<String, RenderError>;
}
