//! Document assembly: one closed HTML page out of classified fragments.
//!
//! The skeleton is the largest HTML fragment (or an `<html>`/`<body>` span
//! found in the raw input, or a synthesized empty page). External resources
//! are stripped, inline `<style>`/`<script>` content is lifted out, merged
//! with the CSS/JS fragments in source order, repaired when needed and
//! re-injected as one block each. Total over arbitrary input.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::extract::primary_fragment;
use crate::fragment::{ClassifiedFragment, FragmentKind};
use crate::repair::{repair_if_needed, Language};

macro_rules! html_regex {
    ($name:ident, $pattern:expr) => {
        static $name: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new($pattern).expect(concat!(stringify!($name), ": hardcoded regex is valid"))
        });
    };
}

html_regex!(HTML_SPAN, r"(?is)<html\b.*</html\s*>");
html_regex!(BODY_SPAN, r"(?is)<body\b.*</body\s*>");
html_regex!(DOCTYPE, r"(?i)<!doctype[^>]*>");
html_regex!(HTML_OPEN, r"(?i)<html\b[^>]*>");
html_regex!(HTML_CLOSE, r"(?i)</html\s*>");
html_regex!(HEAD_OPEN, r"(?i)<head\b[^>]*>");
html_regex!(HEAD_CLOSE, r"(?i)</head\s*>");
html_regex!(BODY_OPEN, r"(?i)<body\b[^>]*>");
html_regex!(BODY_CLOSE, r"(?i)</body\s*>");
html_regex!(
    LINK_STYLESHEET,
    r#"(?is)<link\b[^>]*\brel\s*=\s*["']?stylesheet\b[^>]*>"#
);
html_regex!(SCRIPT_SRC_SELF_CLOSING, r"(?is)<script\b[^>]*\ssrc\s*=[^>]*/>");
html_regex!(SCRIPT_SRC, r"(?is)<script\b[^>]*\ssrc\s*=[^>]*>.*?</script\s*>");
html_regex!(STYLE_BLOCK, r"(?is)<style\b[^>]*>(.*?)</style\s*>");
html_regex!(SCRIPT_BLOCK, r"(?is)<script\b([^>]*)>(.*?)</script\s*>");
html_regex!(TYPE_ATTR, r#"(?i)\btype\s*=\s*["']?([^"'\s>]+)"#);
html_regex!(SRC_ATTR, r"(?i)\ssrc\s*=");
html_regex!(SCRIPT_CLOSE_IN_JS, r"(?i)</script");

const EMPTY_SKELETON: &str = "<!DOCTYPE html>\n<html>\n<head>\n</head>\n<body>\n</body>\n</html>";

const JS_MIME_TYPES: &[&str] = &[
    "text/javascript",
    "application/javascript",
    "application/x-javascript",
    "text/ecmascript",
    "application/ecmascript",
    "javascript",
];

/// Counters describing one assembly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyStats {
    pub html_fragments: usize,
    pub css_fragments: usize,
    pub js_fragments: usize,
    /// Fragments classified `unknown` and left out.
    pub dropped_fragments: usize,
    /// External `<link rel=stylesheet>` and `<script src>` tags removed.
    pub stripped_resources: usize,
    pub css_repaired: bool,
    pub js_repaired: bool,
    pub bytes: usize,
}

/// A closed, self-contained HTML page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssembledDocument {
    pub html: String,
    pub stats: AssemblyStats,
}

impl AssembledDocument {
    pub fn as_str(&self) -> &str {
        &self.html
    }
}

impl std::fmt::Display for AssembledDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.html)
    }
}

/// Assemble classified fragments into one page.
pub fn assemble(fragments: &[ClassifiedFragment]) -> AssembledDocument {
    assemble_with_source(fragments, "")
}

/// Like [`assemble`], with the raw input available as a skeleton source when
/// no fragment was classified as HTML.
pub fn assemble_with_source(fragments: &[ClassifiedFragment], raw_input: &str) -> AssembledDocument {
    let mut stats = AssemblyStats::default();
    let of_kind = |kind: FragmentKind| -> Vec<&ClassifiedFragment> {
        fragments.iter().filter(|f| f.kind == kind).collect()
    };
    let html = of_kind(FragmentKind::Html);
    let css = of_kind(FragmentKind::Css);
    let js = of_kind(FragmentKind::Javascript);
    stats.html_fragments = html.len();
    stats.css_fragments = css.len();
    stats.js_fragments = js.len();
    stats.dropped_fragments = of_kind(FragmentKind::Unknown).len();

    // 1. skeleton
    let primary = primary_fragment(&html);
    let skeleton = match primary {
        Some(f) => f.raw.content.clone(),
        None => HTML_SPAN
            .find(raw_input)
            .or_else(|| BODY_SPAN.find(raw_input))
            .map_or_else(|| EMPTY_SKELETON.to_string(), |m| m.as_str().to_string()),
    };
    let skeleton = wrap_skeleton(skeleton.trim());

    // 2. external resources
    let (skeleton, stripped) = strip_external(&skeleton);
    stats.stripped_resources = stripped;

    // 3. inline style/script, skeleton first, then the other HTML fragments
    let (doc, mut styles, mut scripts) = lift_inline(&skeleton);
    for extra in html
        .iter()
        .filter(|f| primary.is_some_and(|p| p.raw.source_order != f.raw.source_order))
    {
        let (stripped_extra, _) = strip_external(&extra.raw.content);
        let (_, extra_styles, extra_scripts) = lift_inline(&stripped_extra);
        styles.extend(extra_styles);
        scripts.extend(extra_scripts);
    }

    // 4. closing structure; merged CSS/JS placed below is not rewritten
    let mut doc = normalize(doc);

    // 5. merged CSS
    styles.extend(css.iter().map(|f| f.raw.content.trim().to_string()));
    let merged_css = join_non_empty(&styles);
    if !merged_css.is_empty() {
        let (repaired, _) = repair_if_needed(&merged_css, Language::Css);
        stats.css_repaired = repaired != merged_css;
        doc = inject_style(doc, &repaired);
    }

    // 6. merged JS
    scripts.extend(js.iter().map(|f| f.raw.content.trim().to_string()));
    let merged_js = join_non_empty(&scripts);
    if !merged_js.is_empty() {
        let (repaired, _) = repair_if_needed(&merged_js, Language::Javascript);
        stats.js_repaired = repaired != merged_js;
        let escaped = SCRIPT_CLOSE_IN_JS.replace_all(&repaired, r"<\/script");
        doc = inject_script(doc, &escaped);
    }

    stats.bytes = doc.len();
    crate::obs::emit_document_assembled(&stats);
    AssembledDocument { html: doc, stats }
}

fn join_non_empty(parts: &[String]) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Give a bare fragment an `<html>` root, and head/body when it has neither.
fn wrap_skeleton(skeleton: &str) -> String {
    if HTML_OPEN.is_match(skeleton) {
        skeleton.to_string()
    } else if BODY_OPEN.is_match(skeleton) || HEAD_OPEN.is_match(skeleton) {
        format!("<html>\n{skeleton}\n</html>")
    } else {
        format!("<html>\n<head>\n</head>\n<body>\n{skeleton}\n</body>\n</html>")
    }
}

/// Remove byte spans, taking the whole line when a span sits alone on it.
fn remove_spans(text: &str, spans: &[(usize, usize)]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for &(start, end) in spans {
        let line_start = text[..start].rfind('\n').map_or(0, |i| i + 1);
        let line_end = text[end..].find('\n').map_or(text.len(), |i| end + i + 1);
        let (start, end) = if text[line_start..start].trim().is_empty()
            && text[end..line_end].trim().is_empty()
        {
            (line_start.max(cursor), line_end)
        } else {
            (start, end)
        };
        out.push_str(&text[cursor..start]);
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    out
}

fn spans_of(re: &Regex, text: &str) -> Vec<(usize, usize)> {
    re.find_iter(text).map(|m| (m.start(), m.end())).collect()
}

/// Drop stylesheet links and `src` scripts; returns the count removed.
fn strip_external(html: &str) -> (String, usize) {
    let mut removed = 0;
    let mut doc = html.to_string();
    for re in [&*LINK_STYLESHEET, &*SCRIPT_SRC_SELF_CLOSING, &*SCRIPT_SRC] {
        let spans = spans_of(re, &doc);
        if !spans.is_empty() {
            removed += spans.len();
            doc = remove_spans(&doc, &spans);
        }
    }
    (doc, removed)
}

fn is_mergeable_script(attrs: &str) -> bool {
    if SRC_ATTR.is_match(attrs) {
        return false;
    }
    TYPE_ATTR.captures(attrs).map_or(true, |c| {
        JS_MIME_TYPES.contains(&c[1].to_ascii_lowercase().as_str())
    })
}

/// Lift classic `<script>` and then inline `<style>` bodies out of the
/// document. Style markup inside a script that stays in place is left alone.
fn lift_inline(html: &str) -> (String, Vec<String>, Vec<String>) {
    let mut scripts = Vec::new();
    let mut spans = Vec::new();
    for caps in SCRIPT_BLOCK.captures_iter(html) {
        if !is_mergeable_script(&caps[1]) {
            continue;
        }
        let whole = caps.get(0).map_or((0, 0), |m| (m.start(), m.end()));
        scripts.push(caps[2].trim().to_string());
        spans.push(whole);
    }
    let html = remove_spans(html, &spans);

    let kept_scripts = spans_of(&SCRIPT_BLOCK, &html);
    let mut styles = Vec::new();
    let mut spans = Vec::new();
    for caps in STYLE_BLOCK.captures_iter(&html) {
        let whole = caps.get(0).map_or((0, 0), |m| (m.start(), m.end()));
        if kept_scripts.iter().any(|&(s, e)| whole.0 >= s && whole.0 < e) {
            continue;
        }
        styles.push(caps[1].trim().to_string());
        spans.push(whole);
    }
    let html = remove_spans(&html, &spans);
    (html, styles, scripts)
}

fn inject_style(mut doc: String, css: &str) -> String {
    let block = format!("<style>\n{css}\n</style>\n");
    if let Some(m) = HEAD_CLOSE.find(&doc) {
        doc.insert_str(m.start(), &block);
    } else if let Some(m) = HEAD_OPEN.find(&doc) {
        doc.insert_str(m.end(), &format!("\n{block}"));
    } else if let Some(m) = BODY_OPEN.find(&doc) {
        doc.insert_str(m.start(), &format!("<head>\n{block}</head>\n"));
    } else if let Some(m) = HTML_OPEN.find(&doc) {
        doc.insert_str(m.end(), &format!("\n<head>\n{block}</head>"));
    } else {
        doc.insert_str(0, &block);
    }
    doc
}

fn inject_script(mut doc: String, js: &str) -> String {
    let block = format!("<script>\n{js}\n</script>\n");
    let anchor = BODY_CLOSE
        .find_iter(&doc)
        .last()
        .or_else(|| HTML_CLOSE.find_iter(&doc).last())
        .map(|m| m.start());
    match anchor {
        Some(at) => doc.insert_str(at, &block),
        None => {
            if !doc.ends_with('\n') {
                doc.push('\n');
            }
            doc.push_str(&block);
        }
    }
    doc
}

/// Leading doctype, a `</body>` for every `<body>`, trailing `</html>`.
fn normalize(doc: String) -> String {
    let mut doc = doc.trim().to_string();

    if !DOCTYPE.find(&doc).is_some_and(|m| m.start() == 0) {
        // Only a doctype in the prologue is misplaced; later ones are content.
        let prologue = HTML_OPEN.find(&doc).map_or(doc.len(), |m| m.start());
        let cleaned = DOCTYPE.replace_all(&doc[..prologue], "");
        doc = format!("<!DOCTYPE html>\n{}{}", cleaned.trim_start(), &doc[prologue..]);
    }

    if BODY_OPEN.is_match(&doc) && !BODY_CLOSE.is_match(&doc) {
        match HTML_CLOSE.find_iter(&doc).last() {
            Some(m) => doc.insert_str(m.start(), "</body>\n"),
            None => doc.push_str("\n</body>"),
        }
    }

    match HTML_CLOSE.find_iter(&doc).last() {
        None => doc.push_str("\n</html>"),
        Some(m) => {
            let (start, end) = (m.start(), m.end());
            let trailing = doc[end..].trim().to_string();
            doc.truncate(end);
            if !trailing.is_empty() {
                // Stray text after the root belongs inside the body.
                let at = BODY_CLOSE
                    .find_iter(&doc)
                    .last()
                    .map_or(start, |b| b.start());
                doc.insert_str(at, &format!("{trailing}\n"));
            }
        }
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::RawFragment;

    fn frag(kind: FragmentKind, content: &str, order: usize) -> ClassifiedFragment {
        ClassifiedFragment {
            raw: RawFragment::new(None, content, order),
            kind,
        }
    }

    #[test]
    fn test_complete_page_only_gains_doctype() {
        let page = "<html><body><h1>Hi</h1></body></html>";
        let doc = assemble(&[frag(FragmentKind::Html, page, 0)]);
        assert_eq!(doc.html, format!("<!DOCTYPE html>\n{page}"));
        assert!(!doc.html.contains("<style"));
        assert!(!doc.html.contains("<script"));
    }

    #[test]
    fn test_merges_inline_and_fragment_css_in_order() {
        let page = "<html>\n<head>\n<style>h1 { color: red; }</style>\n</head>\n<body></body>\n</html>";
        let doc = assemble(&[
            frag(FragmentKind::Html, page, 0),
            frag(FragmentKind::Css, "p { margin: 0; }", 1),
        ]);
        assert_eq!(doc.html.matches("<style>").count(), 1);
        let red = doc.html.find("color: red").unwrap();
        let margin = doc.html.find("margin: 0").unwrap();
        assert!(red < margin);
        assert!(doc.html.find("</style>").unwrap() < doc.html.find("</head>").unwrap());
    }

    #[test]
    fn test_merges_scripts_before_body_close() {
        let page = "<body>\n<button id=\"b\">Go</button>\n<script>\nconst a = 1;\n</script>\n</body>";
        let doc = assemble(&[
            frag(FragmentKind::Html, page, 0),
            frag(FragmentKind::Javascript, "console.log(a);", 1),
        ]);
        assert_eq!(doc.html.matches("<script>").count(), 1);
        let merged = doc.html.find("const a = 1;\nconsole.log(a);").unwrap();
        assert!(merged < doc.html.find("</body>").unwrap());
        assert!(doc.html.starts_with("<!DOCTYPE html>\n<html>"));
        assert!(doc.html.ends_with("</html>"));
    }

    #[test]
    fn test_strips_external_resources() {
        let page = "<html><head>\n<link rel=\"stylesheet\" href=\"x.css\">\n<script src=\"https://cdn/x.js\"></script>\n<script src=\"y.js\" />\n</head><body></body></html>";
        let doc = assemble(&[frag(FragmentKind::Html, page, 0)]);
        assert_eq!(doc.stats.stripped_resources, 3);
        assert!(!doc.html.contains("x.css"));
        assert!(!doc.html.contains("cdn"));
        assert!(!doc.html.contains("y.js"));
    }

    #[test]
    fn test_json_and_module_scripts_stay_in_place() {
        let page = "<body>\n<script type=\"application/json\">{\"a\":1}</script>\n<script type=\"module\">import x from './x.js';</script>\n</body>";
        let doc = assemble(&[frag(FragmentKind::Html, page, 0)]);
        assert!(doc.html.contains("<script type=\"application/json\">"));
        assert!(doc.html.contains("<script type=\"module\">"));
        assert!(!doc.html.contains("<script>\n"));
    }

    #[test]
    fn test_synthesizes_skeleton_for_css_and_js_only() {
        let doc = assemble(&[
            frag(FragmentKind::Css, "body { color: red; }", 0),
            frag(FragmentKind::Javascript, "document.title = 'x';", 1),
        ]);
        assert!(doc.html.starts_with("<!DOCTYPE html>"));
        assert!(doc.html.ends_with("</html>"));
        assert_eq!(doc.html.matches("<head>").count(), 1);
        assert_eq!(doc.html.matches("<body>").count(), 1);
        assert!(doc.html.contains("<style>\nbody { color: red; }\n</style>"));
        assert!(doc.html.contains("<script>\ndocument.title = 'x';\n</script>"));
    }

    #[test]
    fn test_uses_raw_input_span_when_no_html_fragment() {
        let raw = "Here you go:\n<html><body><p>raw</p></body></html>\nEnjoy!";
        let doc = assemble_with_source(&[], raw);
        assert!(doc.html.contains("<p>raw</p>"));
        assert!(!doc.html.contains("Enjoy"));
    }

    #[test]
    fn test_wraps_bare_markup() {
        let doc = assemble(&[frag(FragmentKind::Html, "<div>card</div>", 0)]);
        assert!(doc.html.contains("<head>"));
        assert!(doc.html.contains("<body>\n<div>card</div>\n</body>"));
    }

    #[test]
    fn test_repairs_merged_css() {
        let doc = assemble(&[frag(FragmentKind::Css, "body\n  color: red;", 0)]);
        assert!(doc.html.contains("body {\n  color: red;\n}"));
        assert!(doc.stats.css_repaired);
    }

    #[test]
    fn test_escapes_script_close_in_js() {
        let doc = assemble(&[frag(
            FragmentKind::Javascript,
            "const s = '</script>';",
            0,
        )]);
        assert!(doc.html.contains(r"'<\/script>'"));
    }

    #[test]
    fn test_normalizes_missing_closers() {
        let doc = assemble(&[frag(
            FragmentKind::Html,
            "<!doctype html><html><head></head><body><p>x</p>",
            0,
        )]);
        assert!(doc.html.starts_with("<!doctype html>"));
        assert!(doc.html.contains("</body>"));
        assert!(doc.html.ends_with("</html>"));
    }

    #[test]
    fn test_moves_trailing_text_into_body() {
        let doc = assemble(&[frag(
            FragmentKind::Html,
            "<html><body><p>a</p></body></html>\n<p>late</p>",
            0,
        )]);
        assert!(doc.html.ends_with("</html>"));
        assert!(doc.html.find("<p>late</p>").unwrap() < doc.html.find("</body>").unwrap());
    }

    #[test]
    fn test_unknown_fragments_are_dropped() {
        let doc = assemble(&[frag(FragmentKind::Unknown, "SECRET_TEXT", 0)]);
        assert!(!doc.html.contains("SECRET_TEXT"));
        assert_eq!(doc.stats.dropped_fragments, 1);
    }

    #[test]
    fn test_secondary_html_fragment_contributes_inline_blocks() {
        let doc = assemble(&[
            frag(
                FragmentKind::Html,
                "<html><head></head><body><main>long main page</main></body></html>",
                0,
            ),
            frag(FragmentKind::Html, "<style>.x { color: blue; }</style>", 1),
        ]);
        assert!(doc.html.contains(".x { color: blue; }"));
        assert!(doc.html.contains("long main page"));
    }

    #[test]
    fn test_markup_quoted_in_js_is_moved_unchanged() {
        let js = "const tpl = '<!DOCTYPE html><p>child</p>';\nconst css = '<style>p { margin: 0; }</style>';\nconst end = '</body></html>';";
        let doc = assemble(&[
            frag(FragmentKind::Html, "<html><head></head><body><p>x</p></body></html>", 0),
            frag(FragmentKind::Javascript, js, 1),
        ]);
        assert!(doc.html.contains(js));
        assert!(!doc.html.contains("<style>\n"));
        assert!(doc.html.starts_with("<!DOCTYPE html>\n<html>"));
        assert!(doc.html.ends_with("</body></html>"));
    }

    #[test]
    fn test_style_string_in_inline_script_stays_in_script() {
        let page = "<html><head></head><body>\n<script>\nel.innerHTML = '<style>b { color: red; }</style>';\n</script>\n</body></html>";
        let doc = assemble(&[frag(FragmentKind::Html, page, 0)]);
        assert!(!doc.html.contains("<style>\n"));
        assert!(doc
            .html
            .contains("el.innerHTML = '<style>b { color: red; }</style>';"));
        assert_eq!(doc.html.matches("<script>").count(), 1);
    }
}
