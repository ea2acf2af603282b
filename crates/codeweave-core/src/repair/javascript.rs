//! JavaScript repair: explicit block stack driven by indentation.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::{indent_prefix, indent_width, split_lines, BraceScanner, Language, Line, Output};

static HEADERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // function NAME(...)
        r"^(?:export\s+(?:default\s+)?)?(?:async\s+)?function\b\s*\*?\s*[\w$]*\s*\(.*\)$",
        // const NAME = function(...)
        r"^(?:export\s+)?(?:const|let|var)\s+[\w$]+\s*=\s*(?:async\s+)?function\b\s*\*?\s*[\w$]*\s*\(.*\)$",
        // if / else if / for / while / switch / catch
        r"^(?:\}\s*)?(?:else\s+)?(?:if|for|while|switch|catch)\s*\(.*\)$",
        // else / try / finally
        r"^(?:\}\s*)?(?:else|try|finally)$",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("HEADERS: hardcoded regex is valid"))
    .collect()
});

/// Trimmed line that opens a block but carries no `{`.
pub(super) fn is_bare_header(trimmed: &str) -> bool {
    !trimmed.contains('{') && HEADERS.iter().any(|re| re.is_match(trimmed))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Opener {
    /// `{` we appended to a header.
    Inserted,
    /// `{` present in the input.
    Explicit,
}

#[derive(Debug)]
struct Block {
    opener: Opener,
    indent: usize,
    prefix: String,
    line: usize,
}

/// Close inserted blocks on top of the stack whose indentation is at least
/// `min`. Explicit blocks are left for their own `}`.
fn close_inserted(stack: &mut Vec<Block>, out: &mut Output, min: usize) {
    while let Some(top) = stack.last() {
        if top.opener != Opener::Inserted || top.indent < min {
            break;
        }
        out.close(&top.prefix);
        stack.pop();
    }
}

fn next_non_blank<'a>(lines: &[Line<'a>], from: usize) -> Option<&'a str> {
    lines[from..]
        .iter()
        .find(|l| !l.is_blank())
        .map(|l| l.body)
}

pub(super) fn repair(text: &str) -> String {
    let lines = split_lines(text);
    let mut out = Output::for_input(text);
    let mut scanner = BraceScanner::new(Language::Javascript);
    let mut stack: Vec<Block> = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        if line.is_blank() {
            out.push(*line);
            continue;
        }
        let in_literal = scanner.in_literal();
        let braces = scanner.scan(line.body);
        if in_literal {
            out.push(*line);
            continue;
        }

        let trimmed = line.body.trim();
        let indent = indent_width(line.body);
        let prefix = indent_prefix(line.body);

        if trimmed.starts_with('}') {
            // Inserted blocks nested deeper than this `}` end before it.
            close_inserted(&mut stack, &mut out, indent + 1);
        } else {
            close_inserted(&mut stack, &mut out, indent);
        }

        let idx = out.push(*line);
        for brace in &braces {
            if *brace == '{' {
                stack.push(Block {
                    opener: Opener::Explicit,
                    indent,
                    prefix: prefix.to_string(),
                    line: i,
                });
            } else {
                stack.pop();
            }
        }

        if braces.contains(&'{') || !is_bare_header(trimmed) {
            continue;
        }
        let opens_body = next_non_blank(&lines, i + 1).is_some_and(|next| {
            let next_trimmed = next.trim();
            indent_width(next) > indent
                && !next_trimmed.starts_with('}')
                && !next_trimmed.starts_with('{')
        });
        if opens_body {
            out.append(idx, " {");
            stack.push(Block {
                opener: Opener::Inserted,
                indent,
                prefix: prefix.to_string(),
                line: i,
            });
        }
    }

    // Closers written now would land inside the unterminated literal.
    if scanner.in_literal() {
        debug!(open = stack.len(), "input ends inside a literal, blocks left open");
        return out.finish();
    }
    while let Some(block) = stack.pop() {
        debug!(
            line = block.line,
            inserted = block.opener == Opener::Inserted,
            "closing block left open at end of input"
        );
        out.close(&block.prefix);
    }
    out.finish()
}
