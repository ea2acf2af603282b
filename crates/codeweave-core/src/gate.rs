//! Executability gate: should a script candidate be handed to the runner?
//!
//! Directory listings and markdown prose show up inside fences all the time
//! and are never runnable. Everything else needs keywords appropriate to its
//! target, except short Python snippets, which get the benefit of the doubt.
//! Programs that read stdin are flagged separately: the runner has no
//! interactive channel, so running them only produces an `EOFError`.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::fragment::ExecutionTarget;

/// Python snippets shorter than this many characters skip the keyword check.
pub const DEFAULT_SHORT_PYTHON_CHARS: usize = 100;

/// Shown instead of running a program that needs interactive input.
pub const INTERACTIVE_INPUT_GUIDANCE: &str = "This program waits for keyboard input, but the runner \
has no interactive terminal. Hard-code the input values, rewrite it as an HTML page with form \
fields, or run it locally.";

static TREE_DRAWING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[├└│┌┐┘┤]|──").expect("TREE_DRAWING: hardcoded regex is valid"));

static BARE_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.-]+/?$").expect("BARE_SEGMENT: hardcoded regex is valid"));

static TREE_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\s|`+-]*(?:[\w.-]+/)*(?:[\w-][\w.-]*\.[A-Za-z0-9]+|[\w.-]+/)$")
        .expect("TREE_ENTRY: hardcoded regex is valid")
});

static CODE_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:def|class|import|function|const|let|var|return|echo|print|console|require|export)\b|\w\s*=\s*\S|\w\(",
    )
    .expect("CODE_KEYWORDS: hardcoded regex is valid")
});

static PYTHON_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)\b(?:def|class|import|from|if|for|while)\b|\bprint\s*\(|^\s*[A-Za-z_][\w.]*(?:\[[^\]]*\])?\s*=[^=\n]*[(\[]",
    )
    .expect("PYTHON_KEYWORDS: hardcoded regex is valid")
});

static NODE_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:function|const|let|var|import|export)\b|\bconsole\.|\brequire\s*\(")
        .expect("NODE_KEYWORDS: hardcoded regex is valid")
});

static BASH_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)\b(?:echo|ls|cd|mkdir|export)\b|^#!|\$")
        .expect("BASH_KEYWORDS: hardcoded regex is valid")
});

static PYTHON_INPUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:raw_)?input\s*\(").expect("PYTHON_INPUT: hardcoded regex is valid")
});

static NODE_INPUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\breadline\b|\bprompt\s*\(|\bprocess\.stdin\b")
        .expect("NODE_INPUT: hardcoded regex is valid")
});

static BASH_INPUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)(?:^|[;&|({]|\bthen\b|\bdo\b|\bwhile\b|\buntil\b)\s*read\b")
        .expect("BASH_INPUT: hardcoded regex is valid")
});

/// Why a candidate was not handed to the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NonExecutableReason {
    Empty,
    DirectoryTree,
    MarkdownProse,
    MissingKeywords(ExecutionTarget),
    /// HTML is previewed, never executed.
    PreviewOnly,
}

impl NonExecutableReason {
    /// User-facing explanation.
    pub fn message(&self) -> String {
        match self {
            NonExecutableReason::Empty => "There is no code to run.".to_string(),
            NonExecutableReason::DirectoryTree => {
                "This looks like a directory listing, not a program, so it was not run.".to_string()
            }
            NonExecutableReason::MarkdownProse => {
                "This looks like documentation rather than code, so it was not run.".to_string()
            }
            NonExecutableReason::MissingKeywords(target) => {
                format!("No runnable {target} code was recognised, so it was not run.")
            }
            NonExecutableReason::PreviewOnly => {
                "HTML is rendered as a preview, not executed.".to_string()
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NonExecutableReason::Empty => "empty",
            NonExecutableReason::DirectoryTree => "directory_tree",
            NonExecutableReason::MarkdownProse => "markdown_prose",
            NonExecutableReason::MissingKeywords(_) => "missing_keywords",
            NonExecutableReason::PreviewOnly => "preview_only",
        }
    }
}

/// Outcome of gating one script candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateVerdict {
    Runnable,
    NotExecutable(NonExecutableReason),
    NeedsInput,
}

impl GateVerdict {
    pub fn is_runnable(&self) -> bool {
        matches!(self, GateVerdict::Runnable)
    }
}

impl std::fmt::Display for GateVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GateVerdict::Runnable => f.write_str("runnable"),
            GateVerdict::NotExecutable(reason) => write!(f, "not_executable:{}", reason.as_str()),
            GateVerdict::NeedsInput => f.write_str("needs_input"),
        }
    }
}

/// Tree-drawing characters, or a bare path segment followed only by file
/// and directory entries.
pub fn looks_like_directory_tree(code: &str) -> bool {
    if TREE_DRAWING.is_match(code) {
        return true;
    }
    let mut lines = code.lines().map(str::trim_end).filter(|l| !l.trim().is_empty());
    let Some(first) = lines.next() else {
        return false;
    };
    if !BARE_SEGMENT.is_match(first.trim()) {
        return false;
    }
    let rest: Vec<&str> = lines.collect();
    !rest.is_empty() && rest.iter().all(|l| TREE_ENTRY.is_match(l))
}

/// Starts with a markdown heading and contains nothing that reads as code.
pub fn looks_like_markdown_prose(code: &str) -> bool {
    let trimmed = code.trim_start();
    trimmed.starts_with('#') && !trimmed.starts_with("#!") && !CODE_KEYWORDS.is_match(trimmed)
}

fn has_target_keywords(code: &str, target: ExecutionTarget) -> bool {
    match target {
        ExecutionTarget::Html => false,
        ExecutionTarget::Python => PYTHON_KEYWORDS.is_match(code),
        ExecutionTarget::Node => NODE_KEYWORDS.is_match(code),
        ExecutionTarget::Bash => BASH_KEYWORDS.is_match(code),
    }
}

/// The reason `code` should not run as `target`, if any.
pub fn rejection(
    code: &str,
    target: ExecutionTarget,
    short_python_chars: usize,
) -> Option<NonExecutableReason> {
    let trimmed = code.trim();
    if target == ExecutionTarget::Html {
        return Some(NonExecutableReason::PreviewOnly);
    }
    if trimmed.is_empty() {
        return Some(NonExecutableReason::Empty);
    }
    if looks_like_directory_tree(trimmed) {
        return Some(NonExecutableReason::DirectoryTree);
    }
    if looks_like_markdown_prose(trimmed) {
        return Some(NonExecutableReason::MarkdownProse);
    }
    if has_target_keywords(trimmed, target) {
        return None;
    }
    if target == ExecutionTarget::Python && trimmed.chars().count() < short_python_chars {
        return None;
    }
    Some(NonExecutableReason::MissingKeywords(target))
}

/// Plausibly runnable source for `target`. Never true for HTML.
pub fn is_executable(code: &str, target: ExecutionTarget) -> bool {
    rejection(code, target, DEFAULT_SHORT_PYTHON_CHARS).is_none()
}

/// Reads stdin in a way the runner cannot satisfy.
pub fn requires_interactive_input(code: &str, target: ExecutionTarget) -> bool {
    match target {
        ExecutionTarget::Html => false,
        ExecutionTarget::Python => PYTHON_INPUT.is_match(code),
        ExecutionTarget::Node => NODE_INPUT.is_match(code),
        ExecutionTarget::Bash => BASH_INPUT.is_match(code),
    }
}

/// Full verdict with the default short-snippet threshold.
pub fn evaluate(code: &str, target: ExecutionTarget) -> GateVerdict {
    evaluate_with(code, target, DEFAULT_SHORT_PYTHON_CHARS)
}

pub fn evaluate_with(code: &str, target: ExecutionTarget, short_python_chars: usize) -> GateVerdict {
    let verdict = if let Some(reason) = rejection(code, target, short_python_chars) {
        GateVerdict::NotExecutable(reason)
    } else if requires_interactive_input(code, target) {
        GateVerdict::NeedsInput
    } else {
        GateVerdict::Runnable
    };
    crate::obs::emit_gate_evaluated(target, &verdict);
    verdict
}
