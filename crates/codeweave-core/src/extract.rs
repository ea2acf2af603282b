//! Block extraction: fenced segments and bare-code fallback.
//!
//! The scan is line based and total: unterminated fences take the rest of
//! the input, and text without any fence yields either one fragment (when it
//! opens like code) or nothing.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::fragment::{Fragment, Message, RawFragment, SourceFile};

/// Input that starts like this is treated as code even without a fence.
static BARE_CODE_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?i:<!doctype\s+html|<html\b)|#!|(?:export\s+)?(?:async\s+)?function\b|class\s+[A-Za-z_$]|import\s|export\s|const\s|let\s|var\s|def\s|from\s+[\w.]+\s+import\b)",
    )
    .expect("BARE_CODE_START: hardcoded regex is valid")
});

/// Opening fence: marker character, marker length, info string.
fn fence_open(line: &str) -> Option<(char, usize, &str)> {
    let trimmed = line.trim_start();
    let marker = trimmed.chars().next()?;
    if marker != '`' && marker != '~' {
        return None;
    }
    let len = trimmed.chars().take_while(|c| *c == marker).count();
    if len < 3 {
        return None;
    }
    let info = &trimmed[len..];
    // ```inline``` on one line is not a block fence.
    if marker == '`' && info.contains('`') {
        return None;
    }
    Some((marker, len, info.trim()))
}

fn is_fence_close(line: &str, marker: char, open_len: usize) -> bool {
    let trimmed = line.trim();
    trimmed.chars().count() >= open_len && trimmed.chars().all(|c| c == marker)
}

/// First token of a fence info string, stripped of `{.lang}` decoration.
fn info_tag(info: &str) -> Option<&str> {
    info.split_whitespace()
        .next()
        .map(|t| t.trim_matches(|c| c == '{' || c == '}' || c == '.'))
        .filter(|t| !t.is_empty())
}

/// Scan `text` for code fragments, in source order.
pub fn extract(text: &str) -> Vec<RawFragment> {
    let mut fragments = Vec::new();
    let mut lines = text.lines();

    while let Some(line) = lines.next() {
        let Some((marker, open_len, info)) = fence_open(line) else {
            continue;
        };
        let mut body: Vec<&str> = Vec::new();
        let mut closed = false;
        for inner in lines.by_ref() {
            if is_fence_close(inner, marker, open_len) {
                closed = true;
                break;
            }
            body.push(inner);
        }
        if !closed {
            debug!(
                fragment = fragments.len(),
                "unterminated fence, taking the rest of the input"
            );
        }
        fragments.push(RawFragment::new(
            info_tag(info),
            body.join("\n"),
            fragments.len(),
        ));
    }

    if fragments.is_empty() {
        let trimmed = text.trim();
        if BARE_CODE_START.is_match(trimmed) {
            debug!("no fences found, input opens like code");
            fragments.push(RawFragment::new(None, trimmed, 0));
        }
    }

    fragments
}

/// The fragment with the most characters; ties go to the earliest one.
pub fn primary_fragment<F: Fragment>(fragments: &[F]) -> Option<&F> {
    fragments.iter().max_by(|a, b| {
        a.char_len()
            .cmp(&b.char_len())
            .then_with(|| b.source_order().cmp(&a.source_order()))
    })
}

/// Fence tag implied by a file name, if the extension is one we know.
pub fn tag_for_path(path: &str) -> Option<&'static str> {
    let ext = path.rsplit_once('.')?.1.to_ascii_lowercase();
    let tag = match ext.as_str() {
        "html" | "htm" => "html",
        "css" => "css",
        "js" | "mjs" | "cjs" | "jsx" => "javascript",
        "ts" | "tsx" => "typescript",
        "py" => "python",
        "sh" | "bash" => "bash",
        _ => return None,
    };
    Some(tag)
}

/// Raw fragments for a multi-file generation result. Blank files are skipped.
pub fn fragments_from_files(files: &[SourceFile]) -> Vec<RawFragment> {
    files
        .iter()
        .filter(|f| !f.code.trim().is_empty())
        .enumerate()
        .map(|(order, f)| RawFragment::new(tag_for_path(&f.path), f.code.clone(), order))
        .collect()
}

/// Where a message's fragments were taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSource {
    Text,
    Files,
}

/// Fragments for a message, falling back to its attached files when the
/// text carries no code or only a snippet shorter than `min_payload_chars`.
pub fn gather_fragments(
    message: &Message,
    min_payload_chars: usize,
) -> (Vec<RawFragment>, PayloadSource) {
    let fragments = extract(&message.text);
    if message.files.is_empty() {
        return (fragments, PayloadSource::Text);
    }

    let primary_len = primary_fragment(&fragments).map_or(0, Fragment::char_len);
    if primary_len < min_payload_chars {
        debug!(
            primary_len,
            files = message.files.len(),
            "message text too short, using attached files"
        );
        return (fragments_from_files(&message.files), PayloadSource::Files);
    }
    (fragments, PayloadSource::Text)
}

/// Render fragments back into fenced markdown, one block per fragment.
pub fn render_fenced(fragments: &[RawFragment]) -> String {
    fragments
        .iter()
        .map(|f| format!("```{}\n{}\n```", f.declared_tag.as_deref().unwrap_or(""), f.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_tagged_fences_in_order() {
        let text = "intro\n```html\n<p>a</p>\n```\nmiddle\n```css\np { color: red; }\n```\n";
        let frags = extract(text);
        assert_eq!(frags.len(), 2);
        assert_eq!(frags[0].declared_tag.as_deref(), Some("html"));
        assert_eq!(frags[0].content, "<p>a</p>");
        assert_eq!(frags[0].source_order, 0);
        assert_eq!(frags[1].declared_tag.as_deref(), Some("css"));
        assert_eq!(frags[1].source_order, 1);
    }

    #[test]
    fn test_untagged_fence_has_no_tag() {
        let frags = extract("```\nlet x = 1;\n```");
        assert_eq!(frags.len(), 1);
        assert_eq!(frags[0].declared_tag, None);
        assert_eq!(frags[0].content, "let x = 1;");
    }

    #[test]
    fn test_unterminated_fence_takes_remainder() {
        let frags = extract("```js\nconsole.log(1);\nconsole.log(2);");
        assert_eq!(frags.len(), 1);
        assert_eq!(frags[0].content, "console.log(1);\nconsole.log(2);");
    }

    #[test]
    fn test_tilde_fence_and_longer_marker() {
        let frags = extract("~~~python\nprint(1)\n~~~\n````md\na\n```\nb\n````");
        assert_eq!(frags.len(), 2);
        assert_eq!(frags[0].content, "print(1)");
        assert_eq!(frags[1].content, "a\n```\nb");
    }

    #[test]
    fn test_brace_decorated_info_string() {
        let frags = extract("``` {.css}\na {}\n```");
        assert_eq!(frags[0].declared_tag.as_deref(), Some("css"));
    }

    #[test]
    fn test_inline_triple_backticks_are_not_fences() {
        assert!(extract("use ```code``` inline please").is_empty());
    }

    #[test]
    fn test_bare_code_fallback() {
        let frags = extract("  <!DOCTYPE html>\n<html></html>\n");
        assert_eq!(frags.len(), 1);
        assert_eq!(frags[0].content, "<!DOCTYPE html>\n<html></html>");

        assert_eq!(extract("def main():\n    pass").len(), 1);
        assert_eq!(extract("function go() {}").len(), 1);
        assert_eq!(extract("#!/bin/bash\necho hi").len(), 1);
    }

    #[test]
    fn test_prose_yields_nothing() {
        assert!(extract("Here is how you would do it, in words.").is_empty());
        assert!(extract("").is_empty());
    }

    #[test]
    fn test_primary_fragment_prefers_longest_then_earliest() {
        let frags = vec![
            RawFragment::new(None, "abc", 0),
            RawFragment::new(None, "abcdef", 1),
            RawFragment::new(None, "ghijkl", 2),
        ];
        assert_eq!(primary_fragment(&frags).unwrap().source_order, 1);
        let none: Vec<RawFragment> = Vec::new();
        assert!(primary_fragment(&none).is_none());
    }

    #[test]
    fn test_tag_for_path() {
        assert_eq!(tag_for_path("index.HTML"), Some("html"));
        assert_eq!(tag_for_path("src/app.tsx"), Some("typescript"));
        assert_eq!(tag_for_path("run.sh"), Some("bash"));
        assert_eq!(tag_for_path("README"), None);
        assert_eq!(tag_for_path("notes.txt"), None);
    }

    #[test]
    fn test_gather_falls_back_to_files_for_short_text() {
        let msg = Message::new("Done! ```js\nx()\n```").with_files(vec![
            SourceFile::new("index.html", "<html><body></body></html>"),
            SourceFile::new("empty.css", "   "),
            SourceFile::new("app.js", "document.title = 'x';"),
        ]);
        let (frags, source) = gather_fragments(&msg, 40);
        assert_eq!(source, PayloadSource::Files);
        assert_eq!(frags.len(), 2);
        assert_eq!(frags[0].declared_tag.as_deref(), Some("html"));
        assert_eq!(frags[1].declared_tag.as_deref(), Some("javascript"));
        assert_eq!(frags[1].source_order, 1);
    }

    #[test]
    fn test_gather_keeps_long_text_fragments() {
        let body = "const value = compute();\nconsole.log(value);\n";
        let msg = Message::new(format!("```js\n{body}```"))
            .with_files(vec![SourceFile::new("other.js", "x()")]);
        let (frags, source) = gather_fragments(&msg, 20);
        assert_eq!(source, PayloadSource::Text);
        assert_eq!(frags.len(), 1);
        assert!(frags[0].content.contains("compute()"));
    }

    #[test]
    fn test_render_fenced() {
        let frags = vec![
            RawFragment::new(Some("css"), "a {}", 0),
            RawFragment::new(None, "x", 1),
        ];
        assert_eq!(render_fenced(&frags), "```css\na {}\n```\n\n```\nx\n```");
    }
}
