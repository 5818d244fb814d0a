//! Resolved rendering options.
//!
//! Callers describe what they want changed with [`RenderOverrides`]; every
//! field that is present replaces its default wholesale. [`RenderOptions`] is
//! built once per run and never mutated afterwards.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::application::render::{
    DEFAULT_DISPLAY_PATTERN, DEFAULT_IGNORE_PATTERN, DEFAULT_INLINE_PATTERN, MathOutput,
    PatternError, PatternSet,
};
use crate::infra::encoding::TextEncoding;

pub const DEFAULT_SELECTOR: &str = "h1, h2, h3, h4, h5, h6, p, ul, ol, blockquote, table, dl";
pub const DEFAULT_SOURCES: [&str; 2] = ["**/*.html", "!node_modules/**"];
pub const DEFAULT_ROOT: &str = ".";

/// Caller-supplied overrides. `None` keeps the default.
#[derive(Debug, Clone, Default)]
pub struct RenderOverrides {
    pub ignore_pattern: Option<String>,
    /// Tag names whose bodies are protected. Supersedes `ignore_pattern`.
    pub ignore_tags: Option<Vec<String>>,
    pub display_pattern: Option<String>,
    pub inline_pattern: Option<String>,
    pub selector: Option<String>,
    pub encoding: Option<TextEncoding>,
    pub sources: Option<Vec<String>>,
    pub root: Option<PathBuf>,
    pub log: Option<bool>,
    pub output: Option<MathOutput>,
}

#[derive(Debug, Error)]
pub enum OptionsError {
    #[error(transparent)]
    Pattern(#[from] PatternError),
    #[error("invalid element selector `{selector}`: {message}")]
    Selector { selector: String, message: String },
}

#[derive(Debug, Clone)]
pub struct RenderOptions {
    patterns: PatternSet,
    selector: String,
    encoding: TextEncoding,
    sources: Vec<String>,
    root: PathBuf,
    log: bool,
    output: MathOutput,
}

impl RenderOptions {
    pub fn resolve(overrides: RenderOverrides) -> Result<Self, OptionsError> {
        let RenderOverrides {
            ignore_pattern,
            ignore_tags,
            display_pattern,
            inline_pattern,
            selector,
            encoding,
            sources,
            root,
            log,
            output,
        } = overrides;

        let ignore = match ignore_tags {
            Some(tags) => PatternSet::ignore_tags_pattern(&tags)?,
            None => ignore_pattern.unwrap_or_else(|| DEFAULT_IGNORE_PATTERN.to_string()),
        };
        let display = display_pattern.unwrap_or_else(|| DEFAULT_DISPLAY_PATTERN.to_string());
        let inline = inline_pattern.unwrap_or_else(|| DEFAULT_INLINE_PATTERN.to_string());
        let patterns = PatternSet::new(&ignore, &display, &inline)?;

        let selector = selector.unwrap_or_else(|| DEFAULT_SELECTOR.to_string());
        validate_selector(&selector)?;

        Ok(Self {
            patterns,
            selector,
            encoding: encoding.unwrap_or_default(),
            sources: sources.unwrap_or_else(default_sources),
            root: root.unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT)),
            log: log.unwrap_or(false),
            output: output.unwrap_or_default(),
        })
    }

    pub fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    /// CSS selector for the elements whose inner markup may be rewritten.
    pub fn selector(&self) -> &str {
        &self.selector
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn log(&self) -> bool {
        self.log
    }

    pub fn output(&self) -> MathOutput {
        self.output
    }
}

fn default_sources() -> Vec<String> {
    DEFAULT_SOURCES.iter().map(|s| (*s).to_string()).collect()
}

fn validate_selector(selector: &str) -> Result<(), OptionsError> {
    if selector.trim().is_empty() {
        return Err(OptionsError::Selector {
            selector: selector.to_string(),
            message: "selector is empty".to_string(),
        });
    }
    selector
        .parse::<lol_html::Selector>()
        .map(|_| ())
        .map_err(|err| OptionsError::Selector {
            selector: selector.to_string(),
            message: err.to_string(),
        })
}
