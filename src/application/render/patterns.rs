use regex::{Regex, RegexBuilder};
use thiserror::Error;

pub const DEFAULT_IGNORE_PATTERN: &str = r"<code\b[^>]*>.*?</code>|<pre\b[^>]*>.*?</pre>";
pub const DEFAULT_DISPLAY_PATTERN: &str = r"\$\$(.*?)\$\$";
pub const DEFAULT_INLINE_PATTERN: &str = r"\$(.*?)\$";

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("invalid {role} pattern `{pattern}`: {source}")]
    Syntax {
        role: &'static str,
        pattern: String,
        #[source]
        source: Box<regex::Error>,
    },
    #[error("{role} pattern `{pattern}` must capture the math source in a group")]
    MissingCapture { role: &'static str, pattern: String },
    #[error("the ignore tag list is empty")]
    NoIgnoreTags,
}

/// The three match rules driving substitution.
///
/// The ignore pattern is applied first; its spans are never offered to the
/// display or inline pattern. Display is resolved before inline so that a
/// doubled delimiter is not read as two adjacent inline ones.
#[derive(Debug, Clone)]
pub struct PatternSet {
    ignore: Regex,
    display: Regex,
    inline: Regex,
}

impl PatternSet {
    /// Code and preformatted blocks protected, `$$…$$` display, `$…$` inline.
    pub fn defaults() -> Result<Self, PatternError> {
        Self::new(
            DEFAULT_IGNORE_PATTERN,
            DEFAULT_DISPLAY_PATTERN,
            DEFAULT_INLINE_PATTERN,
        )
    }

    pub fn new(ignore: &str, display: &str, inline: &str) -> Result<Self, PatternError> {
        Ok(Self {
            ignore: compile_role("ignore", ignore)?,
            display: compile_math_role("display", display)?,
            inline: compile_math_role("inline", inline)?,
        })
    }

    /// Build an ignore pattern protecting the body of every listed tag. Each
    /// alternative closes on the same tag it opened with.
    pub fn ignore_tags_pattern<S: AsRef<str>>(tags: &[S]) -> Result<String, PatternError> {
        let alternatives: Vec<String> = tags
            .iter()
            .map(|tag| tag.as_ref().trim())
            .filter(|tag| !tag.is_empty())
            .map(|tag| {
                let tag = regex::escape(tag);
                format!(r"<{tag}\b[^>]*>.*?</{tag}>")
            })
            .collect();

        if alternatives.is_empty() {
            return Err(PatternError::NoIgnoreTags);
        }

        Ok(alternatives.join("|"))
    }

    pub fn ignore(&self) -> &Regex {
        &self.ignore
    }

    pub fn display(&self) -> &Regex {
        &self.display
    }

    pub fn inline(&self) -> &Regex {
        &self.inline
    }

    /// Split `text` into alternating candidate and protected spans.
    ///
    /// Concatenating the spans in order yields `text` again. Zero-length ignore
    /// matches are skipped and no empty span is produced.
    pub fn segment<'t>(&self, text: &'t str) -> Vec<Span<'t>> {
        let mut spans = Vec::new();
        let mut last = 0;

        for found in self.ignore.find_iter(text) {
            if found.is_empty() {
                continue;
            }
            if found.start() > last {
                spans.push(Span::Candidate(&text[last..found.start()]));
            }
            spans.push(Span::Protected(found.as_str()));
            last = found.end();
        }

        if last < text.len() {
            spans.push(Span::Candidate(&text[last..]));
        }

        spans
    }
}

/// A slice of element markup, tagged by whether math may be rendered in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Span<'t> {
    /// Matched by the ignore pattern; copied verbatim.
    Protected(&'t str),
    /// Scanned for display and inline math.
    Candidate(&'t str),
}

impl<'t> Span<'t> {
    pub fn as_str(&self) -> &'t str {
        match self {
            Span::Protected(text) | Span::Candidate(text) => text,
        }
    }
}

fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).dot_matches_new_line(true).build()
}

fn compile_role(role: &'static str, pattern: &str) -> Result<Regex, PatternError> {
    compile(pattern).map_err(|err| PatternError::Syntax {
        role,
        pattern: pattern.to_string(),
        source: Box::new(err),
    })
}

fn compile_math_role(role: &'static str, pattern: &str) -> Result<Regex, PatternError> {
    let regex = compile_role(role, pattern)?;
    // Group 0 is the whole match.
    if regex.captures_len() < 2 {
        return Err(PatternError::MissingCapture {
            role,
            pattern: pattern.to_string(),
        });
    }
    Ok(regex)
}
