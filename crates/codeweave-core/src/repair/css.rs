//! CSS repair: one pending-selector slot, then a balancing pass.

use std::sync::LazyLock;

use regex::Regex;

use super::{indent_prefix, indent_width, split_lines, BraceScanner, Language, Output};

static SELECTOR: LazyLock<Regex> = LazyLock::new(|| {
    let simple = r"(?:[.#]?[A-Za-z_*][\w-]*)(?:[.#][A-Za-z_][\w-]*)*";
    Regex::new(&format!(r"^{simple}(?:\s*[,>+~]\s*{simple}|\s+{simple})*$"))
        .expect("SELECTOR: hardcoded regex is valid")
});

/// Trimmed line that looks like a selector missing its `{`.
pub(super) fn is_selector_candidate(trimmed: &str) -> bool {
    !trimmed.is_empty()
        && !trimmed.contains(['{', '}', ':'])
        && !trimmed.ends_with(',')
        && SELECTOR.is_match(trimmed)
}

fn is_property_candidate(trimmed: &str) -> bool {
    trimmed.contains(':') && !trimmed.contains(['{', '}'])
}

#[derive(Debug)]
struct Pending {
    out_idx: usize,
    indent: usize,
    prefix: String,
    opened: bool,
    /// Explicit braces opened inside an opened selector and not yet closed.
    depth: usize,
}

pub(super) fn repair(text: &str) -> String {
    let mut out = Output::for_input(text);
    let mut scanner = BraceScanner::new(Language::Css);
    let mut pending: Option<Pending> = None;

    for line in split_lines(text) {
        if line.is_blank() {
            out.push(line);
            continue;
        }
        let in_comment = scanner.in_literal();
        let braces = scanner.scan(line.body);
        let trimmed = line.body.trim();
        let indent = indent_width(line.body);

        if in_comment {
            out.push(line);
            continue;
        }

        // An opened selector ends at an explicit `}` on its own level or at
        // the first line that is not indented past it.
        if let Some(p) = pending.as_mut().filter(|p| p.opened) {
            if p.depth > 0 {
                let opens = braces.iter().filter(|&&b| b == '{').count();
                let closes = braces.len() - opens;
                p.depth = (p.depth + opens).saturating_sub(closes);
                out.push(line);
                continue;
            }
            if trimmed.starts_with('}') && indent >= p.indent {
                pending = None;
                out.push(line);
                continue;
            }
            if indent <= p.indent {
                out.close(&p.prefix);
                pending = None;
            }
        }

        if trimmed.starts_with('}') {
            pending = None;
            out.push(line);
            continue;
        }

        if is_selector_candidate(trimmed) {
            match pending.take() {
                Some(p) if p.opened => out.close(&p.prefix),
                Some(p) => out.append(p.out_idx, " {}"),
                None => {}
            }
            let out_idx = out.push(line);
            pending = Some(Pending {
                out_idx,
                indent,
                prefix: indent_prefix(line.body).to_string(),
                opened: false,
                depth: 0,
            });
            continue;
        }

        if is_property_candidate(trimmed) {
            if let Some(p) = pending.as_mut().filter(|p| !p.opened) {
                if indent > p.indent {
                    out.append(p.out_idx, " {");
                    p.opened = true;
                } else {
                    pending = None;
                }
            }
            out.push(line);
            continue;
        }

        if pending.as_ref().is_some_and(|p| !p.opened) {
            pending = None;
        } else if let Some(p) = pending.as_mut() {
            let opens = braces.iter().filter(|&&b| b == '{').count();
            let closes = braces.len() - opens;
            p.depth = opens.saturating_sub(closes);
        }
        out.push(line);
    }

    if scanner.in_literal() {
        return out.finish();
    }
    if let Some(p) = pending.filter(|p| p.opened) {
        out.close(&p.prefix);
    }

    close_unmatched(&out.finish())
}

/// Close explicit `{` that never got a `}`, innermost first.
fn close_unmatched(text: &str) -> String {
    let mut scanner = BraceScanner::new(Language::Css);
    let mut open: Vec<String> = Vec::new();
    let lines = split_lines(text);
    for line in &lines {
        for brace in scanner.scan(line.body) {
            if brace == '{' {
                open.push(indent_prefix(line.body).to_string());
            } else {
                open.pop();
            }
        }
    }
    if open.is_empty() {
        return text.to_string();
    }

    let mut out = Output::for_input(text);
    for line in lines {
        out.push(line);
    }
    while let Some(prefix) = open.pop() {
        out.close(&prefix);
    }
    out.finish()
}
