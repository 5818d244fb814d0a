//! Math segmentation and rendering.
//!
//! Rendering is a pure function over a string: the markup is cut into
//! protected and candidate spans, candidate spans have their display and then
//! inline math replaced by engine output, and the spans are joined back in
//! their original order. A rejected expression fails the whole call; nothing
//! is substituted silently.

mod math;
mod patterns;
mod types;

use std::borrow::Cow;

use regex::Regex;

pub use math::KatexRenderer;
pub use patterns::{
    DEFAULT_DISPLAY_PATTERN, DEFAULT_IGNORE_PATTERN, DEFAULT_INLINE_PATTERN, PatternError,
    PatternSet, Span,
};
pub use types::{
    MathMode, MathOutput, MathRenderer, ParseMathOutputError, RenderError, RenderedMath,
};

/// Replace every display and inline math occurrence outside protected spans.
pub fn render_math<R>(
    text: &str,
    patterns: &PatternSet,
    engine: &R,
) -> Result<RenderedMath, RenderError>
where
    R: MathRenderer + ?Sized,
{
    let mut match_count = 0;
    let mut rendered = String::with_capacity(text.len());

    for span in patterns.segment(text) {
        match span {
            Span::Protected(protected) => rendered.push_str(protected),
            Span::Candidate(candidate) => {
                let display = substitute(
                    candidate,
                    patterns.display(),
                    MathMode::Display,
                    engine,
                    &mut match_count,
                )?;
                let inline = substitute(
                    &display,
                    patterns.inline(),
                    MathMode::Inline,
                    engine,
                    &mut match_count,
                )?;
                rendered.push_str(&inline);
            }
        }
    }

    Ok(RenderedMath {
        rendered,
        match_count,
    })
}

fn substitute<'t, R>(
    text: &'t str,
    pattern: &Regex,
    mode: MathMode,
    engine: &R,
    match_count: &mut usize,
) -> Result<Cow<'t, str>, RenderError>
where
    R: MathRenderer + ?Sized,
{
    let mut output: Option<String> = None;
    let mut last = 0;

    for captures in pattern.captures_iter(text) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        let source = captures.get(1).map_or("", |group| group.as_str());
        let markup = engine.render(source, mode)?;

        let buffer = output.get_or_insert_with(|| String::with_capacity(text.len()));
        buffer.push_str(&text[last..whole.start()]);
        buffer.push_str(&markup);
        last = whole.end();
        *match_count += 1;
    }

    match output {
        Some(mut buffer) => {
            buffer.push_str(&text[last..]);
            Ok(Cow::Owned(buffer))
        }
        None => Ok(Cow::Borrowed(text)),
    }
}
