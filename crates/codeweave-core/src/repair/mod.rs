//! Brace repair for CSS and JavaScript fragments whose generator dropped
//! `{` / `}` delimiters.
//!
//! Both passes are single forward scans over an indexed line array and only
//! ever *add* braces; indentation is the structural signal. Inputs whose
//! shape does not match the selector/header patterns come back unchanged.

mod css;
mod javascript;

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Language a fragment is repaired as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Css,
    Javascript,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Css => "css",
            Language::Javascript => "javascript",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a fragment was (or was not) sent through repair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairDecision {
    /// A selector or header line not followed by an opening brace.
    pub dangling_header: bool,
    /// `{` and `}` counts differ across the whole fragment.
    pub unbalanced: bool,
    /// Non-blank text with no `{` at all.
    pub no_braces: bool,
}

impl RepairDecision {
    pub fn evaluate(text: &str, language: Language) -> Self {
        let lines: Vec<&str> = text.lines().collect();
        let is_header: fn(&str) -> bool = match language {
            Language::Css => css::is_selector_candidate,
            Language::Javascript => javascript::is_bare_header,
        };
        let dangling_header = lines.iter().enumerate().any(|(i, line)| {
            is_header(line.trim())
                && !lines[i + 1..]
                    .iter()
                    .map(|l| l.trim())
                    .find(|l| !l.is_empty())
                    .is_some_and(|next| next.starts_with('{'))
        });
        let opens = text.matches('{').count();
        let closes = text.matches('}').count();
        Self {
            dangling_header,
            unbalanced: opens != closes,
            no_braces: opens == 0 && !text.trim().is_empty(),
        }
    }

    pub fn needs_repair(&self) -> bool {
        self.dangling_header || self.unbalanced || self.no_braces
    }
}

/// Reconstruct missing braces. Idempotent, and a no-op on balanced input
/// without dangling selectors or headers.
pub fn repair(text: &str, language: Language) -> String {
    match language {
        Language::Css => css::repair(text),
        Language::Javascript => javascript::repair(text),
    }
}

/// Repair only when [`RepairDecision`] says the fragment needs it.
pub fn repair_if_needed(text: &str, language: Language) -> (String, RepairDecision) {
    let decision = RepairDecision::evaluate(text, language);
    if !decision.needs_repair() {
        return (text.to_string(), decision);
    }
    let repaired = repair(text, language);
    crate::obs::emit_repair_applied(language, &decision, repaired != text);
    (repaired, decision)
}

// ---------------------------------------------------------------------------
// Shared line machinery
// ---------------------------------------------------------------------------

static LEADING_WS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ \t]*").expect("LEADING_WS: hardcoded regex is valid"));

/// Leading whitespace of a line, verbatim.
pub(crate) fn indent_prefix(line: &str) -> &str {
    LEADING_WS.find(line).map_or("", |m| m.as_str())
}

/// Indentation width, tabs counting as four columns.
pub(crate) fn indent_width(line: &str) -> usize {
    indent_prefix(line)
        .chars()
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

/// One input line split from its terminator.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Line<'a> {
    pub body: &'a str,
    pub ending: &'a str,
}

impl Line<'_> {
    pub fn is_blank(&self) -> bool {
        self.body.trim().is_empty()
    }
}

pub(crate) fn split_lines(text: &str) -> Vec<Line<'_>> {
    text.split_inclusive('\n')
        .map(|raw| {
            if let Some(body) = raw.strip_suffix("\r\n") {
                Line {
                    body,
                    ending: "\r\n",
                }
            } else if let Some(body) = raw.strip_suffix('\n') {
                Line { body, ending: "\n" }
            } else {
                Line {
                    body: raw,
                    ending: "",
                }
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
struct OutLine {
    body: String,
    ending: String,
}

/// Output buffer that supports appending to earlier lines and inserting
/// closers after the last non-blank line.
#[derive(Debug)]
pub(crate) struct Output {
    lines: Vec<OutLine>,
    eol: &'static str,
}

impl Output {
    pub fn for_input(text: &str) -> Self {
        Self {
            lines: Vec::new(),
            eol: if text.contains("\r\n") { "\r\n" } else { "\n" },
        }
    }

    /// Push a line; returns its index.
    pub fn push(&mut self, line: Line<'_>) -> usize {
        self.lines.push(OutLine {
            body: line.body.to_string(),
            ending: line.ending.to_string(),
        });
        self.lines.len() - 1
    }

    pub fn append(&mut self, idx: usize, suffix: &str) {
        if let Some(line) = self.lines.get_mut(idx) {
            let trimmed = line.body.trim_end().len();
            line.body.truncate(trimmed);
            line.body.push_str(suffix);
        }
    }

    /// Insert `<prefix>}` right after the last non-blank line.
    pub fn close(&mut self, prefix: &str) {
        let Some(last) = self.lines.iter().rposition(|l| !l.body.trim().is_empty()) else {
            return;
        };
        let ending = if self.lines[last].ending.is_empty() {
            self.lines[last].ending = self.eol.to_string();
            String::new()
        } else {
            self.eol.to_string()
        };
        self.lines.insert(
            last + 1,
            OutLine {
                body: format!("{prefix}}}"),
                ending,
            },
        );
    }

    pub fn finish(self) -> String {
        self.lines
            .into_iter()
            .flat_map(|l| [l.body, l.ending])
            .collect()
    }
}

/// Finds structural braces in a line, skipping string literals and comments.
/// Block comments and JavaScript template literals carry across lines;
/// JavaScript regex literals are recognised within a line.
#[derive(Debug)]
pub(crate) struct BraceScanner {
    language: Language,
    block_comment: bool,
    template: bool,
}

/// A `/` after one of these (or at line start) opens a regex literal
/// rather than dividing.
const REGEX_PRECEDERS: &str = "(,=:[!&|?{};+-*%<>~^";

fn regex_may_start(prev: Option<char>) -> bool {
    prev.map_or(true, |p| REGEX_PRECEDERS.contains(p))
}

/// Consume a regex literal body up to its closing `/`.
fn skip_regex(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    let mut class = false;
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '[' => class = true,
            ']' => class = false,
            '/' if !class => break,
            _ => {}
        }
    }
}

impl BraceScanner {
    pub fn new(language: Language) -> Self {
        Self {
            language,
            block_comment: false,
            template: false,
        }
    }

    /// True while inside a comment or template literal left open by an
    /// earlier line.
    pub fn in_literal(&self) -> bool {
        self.block_comment || self.template
    }

    /// Structural `{` and `}` in order of appearance.
    pub fn scan(&mut self, line: &str) -> Vec<char> {
        let js = self.language == Language::Javascript;
        let mut braces = Vec::new();
        let mut quote: Option<char> = None;
        // Last significant character outside literals on this line.
        let mut prev: Option<char> = None;
        let mut chars = line.chars().peekable();

        while let Some(c) = chars.next() {
            if self.block_comment {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    self.block_comment = false;
                }
                continue;
            }
            if self.template {
                match c {
                    '\\' => {
                        chars.next();
                    }
                    '`' => self.template = false,
                    _ => {}
                }
                continue;
            }
            if let Some(q) = quote {
                if c == '\\' {
                    chars.next();
                } else if c == q {
                    quote = None;
                }
                continue;
            }
            match c {
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    self.block_comment = true;
                    continue;
                }
                '/' if js && chars.peek() == Some(&'/') => break,
                '/' if js && regex_may_start(prev) => skip_regex(&mut chars),
                '\'' | '"' => quote = Some(c),
                '`' if js => self.template = true,
                '{' | '}' => braces.push(c),
                _ => {}
            }
            if !c.is_whitespace() {
                prev = Some(c);
            }
        }
        braces
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indent_width_counts_tabs() {
        assert_eq!(indent_width("    x"), 4);
        assert_eq!(indent_width("\tx"), 4);
        assert_eq!(indent_width("\t  x"), 6);
        assert_eq!(indent_width("x"), 0);
        assert_eq!(indent_prefix("  \tx"), "  \t");
    }

    #[test]
    fn test_split_lines_keeps_endings() {
        let lines = split_lines("a\r\nb\nc");
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].ending, "\r\n");
        assert_eq!(lines[1].ending, "\n");
        assert_eq!(lines[2].ending, "");
        assert!(split_lines("").is_empty());
    }

    #[test]
    fn test_output_close_after_last_non_blank() {
        let text = "a\n  b\n\n";
        let mut out = Output::for_input(text);
        for line in split_lines(text) {
            out.push(line);
        }
        out.close("");
        assert_eq!(out.finish(), "a\n  b\n}\n\n");
    }

    #[test]
    fn test_output_close_at_unterminated_end() {
        let text = "a\n  b";
        let mut out = Output::for_input(text);
        for line in split_lines(text) {
            out.push(line);
        }
        out.close("  ");
        assert_eq!(out.finish(), "a\n  b\n  }");
    }

    #[test]
    fn test_scanner_skips_strings_and_comments() {
        let mut js = BraceScanner::new(Language::Javascript);
        assert_eq!(js.scan("const s = '{'; // }"), Vec::<char>::new());
        assert_eq!(js.scan("f({ a: \"}\" })"), vec!['{', '}']);
        assert!(js.scan("const t = `").is_empty());
        assert!(js.in_literal());
        assert!(js.scan("{ still template").is_empty());
        assert_eq!(js.scan("`; if (x) {"), vec!['{']);
        assert!(!js.in_literal());

        let mut css = BraceScanner::new(Language::Css);
        assert_eq!(css.scan("a { background: url(//x/{y}) }").len(), 4);
        assert!(css.scan("/* { */").is_empty());
    }

    #[test]
    fn test_scanner_skips_regex_literals() {
        let mut js = BraceScanner::new(Language::Javascript);
        assert!(js.scan(r"const re = /\{/;").is_empty());
        assert!(js.scan(r"s.replace(/[{}]/g, '')").is_empty());
        assert_eq!(js.scan(r"if (/^}/.test(s)) {"), vec!['{']);
        assert_eq!(js.scan("const half = total / 2; run({ a: 1 / 3 })"), vec!['{', '}']);
        assert!(!js.in_literal());
    }

    #[test]
    fn test_decision_signals() {
        let d = RepairDecision::evaluate("body\n  color: red;", Language::Css);
        assert!(d.dangling_header);
        assert!(!d.unbalanced);
        assert!(d.no_braces);
        assert!(d.needs_repair());

        let ok = RepairDecision::evaluate("body {\n  color: red;\n}", Language::Css);
        assert!(!ok.needs_repair());

        let js = RepairDecision::evaluate("function f() {\n  go();\n", Language::Javascript);
        assert!(js.unbalanced);
        assert!(!js.dangling_header);

        let next_line_brace = RepairDecision::evaluate("if (x)\n{\n  y();\n}", Language::Javascript);
        assert!(!next_line_brace.needs_repair());
    }

    #[test]
    fn test_repair_if_needed_passes_clean_input_through() {
        let css = "a {\n  color: red;\n}\n";
        let (out, decision) = repair_if_needed(css, Language::Css);
        assert_eq!(out, css);
        assert!(!decision.needs_repair());
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(repair("", Language::Css), "");
        assert_eq!(repair("", Language::Javascript), "");
        assert!(!RepairDecision::evaluate("", Language::Css).needs_repair());
    }
}
