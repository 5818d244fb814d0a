//! Per-document math substitution scoped to selected elements.
//!
//! `lol_html` rewrites in a single streaming pass and cannot hand back an
//! element's inner markup, so the pass only brackets the inner markup of every
//! selected element with comment sentinels. The outermost bracketed regions
//! are then cut out, rendered and spliced back; everything else is copied from
//! the input byte for byte.
//!
//! The closing sentinel only lands when the element has a literal end tag.
//! For elements whose end tag is implied (`<p>a<p>b`, `<li>` runs, a trailing
//! `<p>` at end of file) the region is closed where an HTML parser would
//! close the element.

use std::{cell::RefCell, rc::Rc};

use lol_html::{RewriteStrSettings, element, html_content::ContentType, rewrite_str};
use thiserror::Error;
use tracing::trace;
use uuid::Uuid;

use crate::application::{
    options::RenderOptions,
    render::{MathRenderer, RenderError, render_math},
};

const SENTINEL_PREFIX: &str = "katexify";

/// Start tags that end an open paragraph.
const PARAGRAPH_CLOSERS: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "details",
    "dialog",
    "div",
    "dl",
    "fieldset",
    "figcaption",
    "figure",
    "footer",
    "form",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "hgroup",
    "hr",
    "main",
    "menu",
    "nav",
    "ol",
    "p",
    "pre",
    "section",
    "table",
    "ul",
];

const HEADINGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title", "xmp"];

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to scan markup: {message}")]
    Rewrite { message: String },
    #[error(transparent)]
    Render(#[from] RenderError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedHtml {
    pub html: String,
    pub match_count: usize,
}

/// Render math inside every element matched by the configured selector.
///
/// A selected element nested in another selected element is handled as part
/// of its ancestor. When nothing is substituted the input comes back
/// unchanged.
pub fn parse_html<R>(
    html: &str,
    options: &RenderOptions,
    engine: &R,
) -> Result<ParsedHtml, DocumentError>
where
    R: MathRenderer + ?Sized,
{
    let sentinels = Sentinels::new();
    let Marked { text: marked, tags } = sentinels.mark(html, options.selector())?;
    let markers = sentinels.scan(&marked);

    if markers.is_empty() {
        return Ok(unchanged(html));
    }

    let mut output = String::with_capacity(marked.len());
    let mut match_count = 0;
    let mut cursor = 0;

    for (index, marker) in markers.iter().enumerate() {
        // Already consumed by an enclosing region.
        if marker.start < cursor {
            continue;
        }
        output.push_str(&marked[cursor..marker.start]);
        cursor = marker.end;

        if marker.kind == MarkerKind::Close {
            continue;
        }

        let closing = markers[index + 1..]
            .iter()
            .find(|other| other.kind == MarkerKind::Close && other.id == marker.id);
        let (inner_end, resume) = match closing {
            Some(closing) => (closing.start, closing.end),
            None => {
                let tag = tags.get(marker.id).map(String::as_str).unwrap_or_default();
                let end = marker.end + implied_end(&marked[marker.end..], tag);
                (end, end)
            }
        };

        let inner = sentinels.strip(&marked[marker.end..inner_end]);
        let rendered = render_math(&inner, options.patterns(), engine)?;
        if rendered.match_count > 0 {
            trace!(
                element = marker.id,
                matches = rendered.match_count,
                implied_end = closing.is_none(),
                "rendered element"
            );
            match_count += rendered.match_count;
            output.push_str(&rendered.rendered);
        } else {
            output.push_str(&inner);
        }

        cursor = resume;
    }
    output.push_str(&sentinels.strip(&marked[cursor..]));

    if match_count == 0 {
        return Ok(unchanged(html));
    }

    Ok(ParsedHtml {
        html: output,
        match_count,
    })
}

fn unchanged(html: &str) -> ParsedHtml {
    ParsedHtml {
        html: html.to_string(),
        match_count: 0,
    }
}

/// Byte offset in `text` where an element named `tag`, opened just before
/// `text`, ends when its end tag is omitted: at a start tag that implicitly
/// closes it, at the end tag of an enclosing element, or at end of input.
fn implied_end(text: &str, tag: &str) -> usize {
    let mut open: Vec<String> = Vec::new();
    let mut pos = 0;

    while let Some(offset) = text[pos..].find('<') {
        let start = pos + offset;
        let rest = &text[start..];

        if rest.starts_with("<!--") {
            match rest.find("-->") {
                Some(end) => pos = start + end + 3,
                None => return text.len(),
            }
            continue;
        }

        let Some(token) = TagToken::parse(rest) else {
            pos = start + 1;
            continue;
        };
        pos = start + token.len;

        if token.closing {
            match open.iter().rposition(|name| *name == token.name) {
                Some(depth) => open.truncate(depth),
                None => return start,
            }
            continue;
        }

        if closes_implicitly(tag, &token.name, open.is_empty()) {
            return start;
        }
        if RAW_TEXT_ELEMENTS.contains(&token.name.as_str()) {
            let needle = format!("</{}", token.name);
            match text[pos..].to_ascii_lowercase().find(&needle) {
                Some(end) => pos += end,
                None => return text.len(),
            }
            open.push(token.name);
            continue;
        }
        if !VOID_ELEMENTS.contains(&token.name.as_str()) {
            open.push(token.name);
        }
    }

    text.len()
}

/// Whether a `next` start tag ends an open `tag` element. `top_level` is set
/// when no other element has been opened inside `tag` since it started.
fn closes_implicitly(tag: &str, next: &str, top_level: bool) -> bool {
    match tag {
        "p" => PARAGRAPH_CLOSERS.contains(&next),
        "li" => top_level && next == "li",
        "dt" | "dd" => top_level && matches!(next, "dt" | "dd"),
        "option" => top_level && matches!(next, "option" | "optgroup"),
        "optgroup" => top_level && next == "optgroup",
        "tr" => top_level && next == "tr",
        "td" | "th" => top_level && matches!(next, "td" | "th" | "tr"),
        "thead" | "tbody" => top_level && matches!(next, "tbody" | "tfoot"),
        "rt" | "rp" => top_level && matches!(next, "rt" | "rp"),
        _ if HEADINGS.contains(&tag) => top_level && HEADINGS.contains(&next),
        _ => false,
    }
}

/// A start or end tag at the head of some markup.
struct TagToken {
    name: String,
    closing: bool,
    len: usize,
}

impl TagToken {
    fn parse(markup: &str) -> Option<Self> {
        let body = markup.strip_prefix('<')?;
        let (closing, body) = match body.strip_prefix('/') {
            Some(body) => (true, body),
            None => (false, body),
        };
        if !body.starts_with(|c: char| c.is_ascii_alphabetic()) {
            return None;
        }

        let name_len = body
            .find(|c: char| c.is_ascii_whitespace() || c == '/' || c == '>')
            .unwrap_or(body.len());
        let name = body[..name_len].to_ascii_lowercase();

        let mut quote = None;
        for (offset, c) in body[name_len..].char_indices() {
            match (quote, c) {
                (Some(open), c) if c == open => quote = None,
                (Some(_), _) => {}
                (None, '"' | '\'') => quote = Some(c),
                (None, '>') => {
                    let len = markup.len() - body.len() + name_len + offset + 1;
                    return Some(Self { name, closing, len });
                }
                (None, _) => {}
            }
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarkerKind {
    Open,
    Close,
}

#[derive(Debug)]
struct Marker {
    kind: MarkerKind,
    id: usize,
    start: usize,
    end: usize,
}

/// Output of the marking pass: the bracketed markup and, indexed by sentinel
/// id, the tag name of each bracketed element.
struct Marked {
    text: String,
    tags: Vec<String>,
}

/// Comment sentinels unique to one document pass.
struct Sentinels {
    prefix: String,
}

impl Sentinels {
    fn new() -> Self {
        let nonce = Uuid::new_v4().simple();
        Self {
            prefix: format!("<!--{SENTINEL_PREFIX}-{nonce}-"),
        }
    }

    fn open(&self, id: usize) -> String {
        format!("{}open-{id}-->", self.prefix)
    }

    fn close(&self, id: usize) -> String {
        format!("{}close-{id}-->", self.prefix)
    }

    fn mark(&self, html: &str, selector: &str) -> Result<Marked, DocumentError> {
        let tags = Rc::new(RefCell::new(Vec::new()));

        let text = rewrite_str(
            html,
            RewriteStrSettings {
                element_content_handlers: vec![element!(selector, {
                    let tags = Rc::clone(&tags);
                    move |el| {
                        if !el.can_have_content() {
                            return Ok(());
                        }
                        let id = {
                            let mut tags = tags.borrow_mut();
                            tags.push(el.tag_name().to_ascii_lowercase());
                            tags.len() - 1
                        };
                        el.prepend(&self.open(id), ContentType::Html);
                        el.append(&self.close(id), ContentType::Html);
                        Ok(())
                    }
                })],
                ..RewriteStrSettings::default()
            },
        )
        .map_err(|err| DocumentError::Rewrite {
            message: err.to_string(),
        })?;

        Ok(Marked {
            text,
            tags: tags.take(),
        })
    }

    fn scan(&self, marked: &str) -> Vec<Marker> {
        marked
            .match_indices(self.prefix.as_str())
            .filter_map(|(start, prefix)| {
                let rest = &marked[start + prefix.len()..];
                let (kind, rest) = if let Some(rest) = rest.strip_prefix("open-") {
                    (MarkerKind::Open, rest)
                } else {
                    (MarkerKind::Close, rest.strip_prefix("close-")?)
                };
                let digits = rest.find("-->")?;
                let id = rest[..digits].parse().ok()?;
                let end = marked.len() - rest.len() + digits + 3;
                Some(Marker {
                    kind,
                    id,
                    start,
                    end,
                })
            })
            .collect()
    }

    fn strip(&self, text: &str) -> String {
        let mut stripped = String::with_capacity(text.len());
        let mut cursor = 0;
        for marker in self.scan(text) {
            stripped.push_str(&text[cursor..marker.start]);
            cursor = marker.end;
        }
        stripped.push_str(&text[cursor..]);
        stripped
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::application::{
        options::RenderOverrides,
        render::{KatexRenderer, MathMode},
    };

    #[derive(Default)]
    struct RecordingRenderer {
        sources: RefCell<Vec<String>>,
    }

    impl MathRenderer for RecordingRenderer {
        fn render(&self, source: &str, mode: MathMode) -> Result<String, RenderError> {
            self.sources.borrow_mut().push(source.to_string());
            Ok(format!("<span class=\"m\">{mode}:{source}</span>"))
        }
    }

    fn defaults() -> RenderOptions {
        RenderOptions::resolve(RenderOverrides::default()).expect("default options")
    }

    #[test]
    fn inline_math_in_paragraph_uses_katex_inline() {
        let engine = KatexRenderer::default();
        let parsed = parse_html("<p>$x^2$</p>", &defaults(), &engine).expect("parse");

        let expected = engine.render("x^2", MathMode::Inline).expect("katex");
        assert_eq!(parsed.html, format!("<p>{expected}</p>"));
        assert_eq!(parsed.match_count, 1);
    }

    #[test]
    fn doubled_delimiters_use_display_mode() {
        let engine = KatexRenderer::default();
        let parsed = parse_html("<p>$$x^2$$</p>", &defaults(), &engine).expect("parse");

        let expected = engine.render("x^2", MathMode::Display).expect("katex");
        assert_eq!(parsed.html, format!("<p>{expected}</p>"));
        assert_eq!(parsed.match_count, 1);
    }

    #[test]
    fn code_inside_paragraph_is_protected() {
        let engine = RecordingRenderer::default();
        let input = "<p><code>$x$</code></p>";
        let parsed = parse_html(input, &defaults(), &engine).expect("parse");

        assert_eq!(parsed.match_count, 0);
        assert_eq!(parsed.html, input);
        assert!(engine.sources.borrow().is_empty());
    }

    #[test]
    fn unselected_elements_are_left_alone() {
        let engine = RecordingRenderer::default();
        let input = "<div>$a$</div><p>$b$</p><span>$c$</span>";
        let parsed = parse_html(input, &defaults(), &engine).expect("parse");

        assert_eq!(
            parsed.html,
            "<div>$a$</div><p><span class=\"m\">inline:b</span></p><span>$c$</span>"
        );
        assert_eq!(parsed.match_count, 1);
    }

    #[test]
    fn markup_outside_selection_is_preserved_byte_for_byte() {
        let engine = RecordingRenderer::default();
        let input = "<!DOCTYPE html>\n<HTML><head><title>$t$</title></head>\n<body class=x>\
                     <p ID=\"a\">  $b$  </p>\n<!-- $c$ --></body></HTML>\n";
        let parsed = parse_html(input, &defaults(), &engine).expect("parse");

        assert_eq!(
            parsed.html,
            "<!DOCTYPE html>\n<HTML><head><title>$t$</title></head>\n<body class=x>\
             <p ID=\"a\">  <span class=\"m\">inline:b</span>  </p>\n<!-- $c$ --></body></HTML>\n"
        );
    }

    #[test]
    fn nested_selected_elements_are_rendered_once() {
        let engine = RecordingRenderer::default();
        let input = "<blockquote><p>$a$</p><ul><li>$b$</li></ul></blockquote>";
        let parsed = parse_html(input, &defaults(), &engine).expect("parse");

        assert_eq!(parsed.match_count, 2);
        assert_eq!(
            parsed.html,
            "<blockquote><p><span class=\"m\">inline:a</span></p>\
             <ul><li><span class=\"m\">inline:b</span></li></ul></blockquote>"
        );
        assert_eq!(engine.sources.borrow().as_slice(), ["a", "b"]);
    }

    #[test]
    fn paragraph_ended_by_the_next_paragraph_is_rendered() {
        let engine = RecordingRenderer::default();
        let parsed = parse_html("<p>$a$<p>$b$</p>", &defaults(), &engine).expect("parse");

        assert_eq!(
            parsed.html,
            "<p><span class=\"m\">inline:a</span><p><span class=\"m\">inline:b</span></p>"
        );
        assert_eq!(parsed.match_count, 2);
    }

    #[test]
    fn paragraph_ended_by_a_list_is_rendered() {
        let engine = RecordingRenderer::default();
        let parsed =
            parse_html("<p>$a$<ul><li>$b$</ul>", &defaults(), &engine).expect("parse");

        assert_eq!(
            parsed.html,
            "<p><span class=\"m\">inline:a</span><ul><li><span class=\"m\">inline:b</span></ul>"
        );
        assert_eq!(parsed.match_count, 2);
    }

    #[test]
    fn paragraph_left_open_at_end_of_input_is_rendered() {
        let engine = RecordingRenderer::default();
        let parsed = parse_html("<body><p>x $a$ y", &defaults(), &engine).expect("parse");

        assert_eq!(
            parsed.html,
            "<body><p>x <span class=\"m\">inline:a</span> y"
        );
        assert_eq!(parsed.match_count, 1);
    }

    #[test]
    fn paragraph_ended_by_its_parent_keeps_the_rest_untouched() {
        let engine = RecordingRenderer::default();
        let parsed = parse_html(
            "<div><p>$a$ <em>b</em></div><span>$c$</span>",
            &defaults(),
            &engine,
        )
        .expect("parse");

        assert_eq!(
            parsed.html,
            "<div><p><span class=\"m\">inline:a</span> <em>b</em></div><span>$c$</span>"
        );
    }

    #[test]
    fn list_items_without_end_tags_are_rendered_separately() {
        let options = RenderOptions::resolve(RenderOverrides {
            selector: Some("li".to_string()),
            ..Default::default()
        })
        .expect("options");
        let engine = RecordingRenderer::default();
        let parsed = parse_html(
            "<ul><li>$a$<li>$b$ <ol><li>$c$</ol></ul>",
            &options,
            &engine,
        )
        .expect("parse");

        assert_eq!(
            parsed.html,
            "<ul><li><span class=\"m\">inline:a</span><li><span class=\"m\">inline:b</span> \
             <ol><li><span class=\"m\">inline:c</span></ol></ul>"
        );
        assert_eq!(parsed.match_count, 3);
    }

    #[test]
    fn implied_end_skips_comments_and_raw_text() {
        assert_eq!(implied_end("a<!-- <div> -->b<div>", "p"), 16);
        assert_eq!(implied_end("a<script>'</div>'</script>b", "p"), 27);
        assert_eq!(implied_end("a<span title=\"x>y\">b</span>", "p"), 27);
        assert_eq!(implied_end("a<span><li>b", "li"), 12);
    }

    #[test]
    fn no_selected_elements_returns_input() {
        let engine = RecordingRenderer::default();
        let input = "<section>$a$</section>";
        let parsed = parse_html(input, &defaults(), &engine).expect("parse");

        assert_eq!(parsed, ParsedHtml {
            html: input.to_string(),
            match_count: 0,
        });
    }

    #[test]
    fn custom_selector_narrows_the_scope() {
        let options = RenderOptions::resolve(RenderOverrides {
            selector: Some("p.math".to_string()),
            ..Default::default()
        })
        .expect("options");
        let engine = RecordingRenderer::default();
        let parsed = parse_html(
            "<p>$a$</p><p class=\"math\">$b$</p>",
            &options,
            &engine,
        )
        .expect("parse");

        assert_eq!(
            parsed.html,
            "<p>$a$</p><p class=\"math\"><span class=\"m\">inline:b</span></p>"
        );
    }

    #[test]
    fn void_elements_matched_by_selector_are_skipped() {
        let options = RenderOptions::resolve(RenderOverrides {
            selector: Some("p, br".to_string()),
            ..Default::default()
        })
        .expect("options");
        let engine = RecordingRenderer::default();
        let parsed = parse_html("<p>$a$<br>$b$</p>", &options, &engine).expect("parse");

        assert_eq!(
            parsed.html,
            "<p><span class=\"m\">inline:a</span><br><span class=\"m\">inline:b</span></p>"
        );
    }

    #[test]
    fn rejected_math_fails_the_document() {
        let err = parse_html(r"<p>$\frac{$</p>", &defaults(), &KatexRenderer::default())
            .expect_err("malformed math");
        assert!(matches!(err, DocumentError::Render(_)));
    }

    #[test]
    fn rendered_document_is_stable_on_second_pass() {
        let engine = KatexRenderer::default();
        let options = defaults();
        let first = parse_html(
            "<h2>Area $\\pi r^2$</h2><p>$$\\int_0^1 x\\,dx$$</p>",
            &options,
            &engine,
        )
        .expect("first pass");
        assert_eq!(first.match_count, 2);

        let second = parse_html(&first.html, &options, &engine).expect("second pass");
        assert_eq!(second.match_count, 0);
        assert_eq!(second.html, first.html);
    }
}
