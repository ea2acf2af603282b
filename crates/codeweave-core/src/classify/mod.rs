//! Fragment classification.
//!
//! A declared fence tag wins when it names a browser language. Otherwise the
//! content is run through [`CONTENT_RULES`], an ordered list of named
//! predicates; the first that matches decides the kind. Nothing matching
//! means [`FragmentKind::Unknown`], and unknown fragments are left out of
//! assembly.

pub mod target;

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::fragment::{ClassifiedFragment, FragmentKind, RawFragment};

pub use target::detect_execution_target;

static DOCTYPE_OR_HTML: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<!doctype\s+html|<html[\s>]").expect("DOCTYPE_OR_HTML: hardcoded regex is valid")
});

static OPEN_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<([A-Za-z][A-Za-z0-9-]*)(?:\s[^<>]*)?>").expect("OPEN_TAG: hardcoded regex is valid")
});

static CLOSE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"</([A-Za-z][A-Za-z0-9-]*)\s*>").expect("CLOSE_TAG: hardcoded regex is valid")
});

static CSS_PROPERTY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[\s;{])(?:color|background(?:-[a-z]+)?|margin(?:-[a-z]+)?|padding(?:-[a-z]+)?|font-[a-z]+)\s*:")
        .expect("CSS_PROPERTY: hardcoded regex is valid")
});

static CODE_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:def|function|const)\b").expect("CODE_KEYWORD: hardcoded regex is valid")
});

static JS_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bfunction\b\s*\*?\s*[A-Za-z_$]?[\w$]*\s*\(|\b(?:const|let|var)\s+[A-Za-z_$\[{]")
        .expect("JS_DECLARATION: hardcoded regex is valid")
});

static DOM_IDIOM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\baddEventListener\s*\(|\bdocument\.|\bwindow\.")
        .expect("DOM_IDIOM: hardcoded regex is valid")
});

/// A named content predicate and the kind it votes for.
pub struct ContentRule {
    pub name: &'static str,
    pub kind: FragmentKind,
    pub matches: fn(&str) -> bool,
}

/// Content heuristics in priority order.
pub const CONTENT_RULES: &[ContentRule] = &[
    ContentRule {
        name: "html_markup",
        kind: FragmentKind::Html,
        matches: html_markup,
    },
    ContentRule {
        name: "css_rules",
        kind: FragmentKind::Css,
        matches: css_rules,
    },
    ContentRule {
        name: "js_code",
        kind: FragmentKind::Javascript,
        matches: js_code,
    },
];

/// Kind implied by a declared fence tag, if it names a browser language.
pub fn kind_for_tag(tag: &str) -> Option<FragmentKind> {
    match tag.trim().to_ascii_lowercase().as_str() {
        "html" | "htm" => Some(FragmentKind::Html),
        "css" => Some(FragmentKind::Css),
        "javascript" | "js" | "typescript" | "ts" => Some(FragmentKind::Javascript),
        _ => None,
    }
}

/// A doctype, an `<html>` tag, or an element opened and closed by name.
pub fn html_markup(content: &str) -> bool {
    if DOCTYPE_OR_HTML.is_match(content) {
        return true;
    }
    let opened: Vec<String> = OPEN_TAG
        .captures_iter(content)
        .map(|c| c[1].to_ascii_lowercase())
        .collect();
    CLOSE_TAG
        .captures_iter(content)
        .any(|c| opened.contains(&c[1].to_ascii_lowercase()))
}

/// Balanced braces around CSS-looking properties, and no code keywords.
pub fn css_rules(content: &str) -> bool {
    let open = content.matches('{').count();
    let close = content.matches('}').count();
    open > 0
        && open == close
        && CSS_PROPERTY.is_match(content)
        && !CODE_KEYWORD.is_match(content)
}

/// Function or variable declarations, or DOM access.
pub fn js_code(content: &str) -> bool {
    JS_DECLARATION.is_match(content) || DOM_IDIOM.is_match(content)
}

/// True when the content touches the DOM, so it can only run in a page.
pub fn uses_dom(content: &str) -> bool {
    DOM_IDIOM.is_match(content)
}

/// Classify one fragment. Pure: same input, same answer.
pub fn classify(fragment: &RawFragment) -> FragmentKind {
    if fragment.content.trim().is_empty() {
        return FragmentKind::Unknown;
    }
    if let Some(kind) = fragment.tag().as_deref().and_then(kind_for_tag) {
        return kind;
    }
    CONTENT_RULES
        .iter()
        .find(|rule| (rule.matches)(&fragment.content))
        .map_or(FragmentKind::Unknown, |rule| {
            debug!(
                fragment = fragment.source_order,
                rule = rule.name,
                kind = %rule.kind,
                "classified by content"
            );
            rule.kind
        })
}

/// Classify every fragment, keeping source order.
pub fn classify_all(fragments: Vec<RawFragment>) -> Vec<ClassifiedFragment> {
    fragments
        .into_iter()
        .map(|raw| {
            let kind = classify(&raw);
            crate::obs::emit_fragment_classified(raw.source_order, raw.tag().as_deref(), kind);
            ClassifiedFragment { raw, kind }
        })
        .collect()
}
