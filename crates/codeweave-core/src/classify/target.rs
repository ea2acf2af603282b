//! Document-level execution target detection.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::{css_rules, uses_dom};
use crate::extract::{extract, primary_fragment};
use crate::fragment::ExecutionTarget;

static HTML_STRUCTURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<!doctype\s+html|<(?:html|head|body|div|script|style)[\s>/]")
        .expect("HTML_STRUCTURE: hardcoded regex is valid")
});

static NODE_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\bfunction\b[^\n]*\(|\b(?:const|let|var)\s+[\w$\[{][^\n=]*=|\bconsole\.\w+\s*\(|\brequire\s*\(|\bmodule\.exports\b|=>|\bexport\s+(?:default|const|function|class)\b|\bimport\s[^\n]*\bfrom\s+['"]"#,
    )
    .expect("NODE_MARKERS: hardcoded regex is valid")
});

const SHELL_COMMANDS: &[&str] = &[
    "echo", "ls", "cd", "mkdir", "rm", "cp", "mv", "cat", "grep", "export", "sudo", "apt",
    "apt-get", "brew", "npm", "npx", "yarn", "pip", "pip3", "curl", "wget", "chmod", "touch",
    "git", "docker", "source", "set", "pwd", "find", "tar",
];

/// Interpreter named by a shebang line, if the text starts with one.
fn shebang_target(text: &str) -> Option<ExecutionTarget> {
    let first_line = text.lines().next()?.strip_prefix("#!")?;
    let mut words = first_line
        .split_whitespace()
        .map(|w| w.rsplit('/').next().unwrap_or(w));
    let mut interp = words.next()?;
    if interp == "env" {
        interp = words.find(|w| !w.starts_with('-'))?;
    }
    let target = if interp.starts_with("python") {
        ExecutionTarget::Python
    } else if interp.starts_with("node") {
        ExecutionTarget::Node
    } else {
        ExecutionTarget::Bash
    };
    Some(target)
}

/// Target implied by an explicit fence tag.
fn target_for_tag(tag: &str, content: &str) -> Option<ExecutionTarget> {
    match tag {
        "python" | "py" | "python3" => Some(ExecutionTarget::Python),
        "bash" | "sh" | "shell" | "zsh" | "console" => Some(ExecutionTarget::Bash),
        "javascript" | "js" | "node" | "typescript" | "ts" => Some(if uses_dom(content) {
            ExecutionTarget::Html
        } else {
            ExecutionTarget::Node
        }),
        "html" | "htm" | "css" => Some(ExecutionTarget::Html),
        _ => None,
    }
}

/// A line that reads like a shell command: a known command word in first
/// position that is not being assigned to or called like a function.
fn looks_like_shell(text: &str) -> bool {
    text.lines().map(str::trim).any(|line| {
        let line = line.strip_prefix("$ ").unwrap_or(line);
        let mut words = line.split_whitespace();
        let Some(first) = words.next() else {
            return false;
        };
        if !SHELL_COMMANDS.contains(&first) {
            return false;
        }
        words
            .next()
            .map_or(true, |second| !second.starts_with('=') && !second.starts_with('('))
    })
}

/// Decide how a whole input should be run.
///
/// HTML structure anywhere in the text wins, because only a page preview can
/// show markup, style and script together. After that the primary fence's
/// declared tag, a shebang, CSS (previewed as a page), JavaScript (a page
/// when it touches the DOM, Node otherwise) and shell commands are tried in
/// turn. Anything else is assumed to be Python.
pub fn detect_execution_target(text: &str) -> ExecutionTarget {
    if HTML_STRUCTURE.is_match(text) {
        return ExecutionTarget::Html;
    }

    let fragments = extract(text);
    let primary = primary_fragment(&fragments);
    let candidate = primary.map_or(text, |f| f.content.as_str()).trim();

    if let Some(target) = primary
        .and_then(|f| f.tag())
        .and_then(|tag| target_for_tag(&tag, candidate))
    {
        debug!(%target, "execution target from declared tag");
        return target;
    }
    if let Some(target) = shebang_target(candidate) {
        return target;
    }
    if css_rules(candidate) {
        return ExecutionTarget::Html;
    }
    if uses_dom(candidate) {
        return ExecutionTarget::Html;
    }
    if NODE_MARKERS.is_match(candidate) {
        return ExecutionTarget::Node;
    }
    if looks_like_shell(candidate) {
        return ExecutionTarget::Bash;
    }
    ExecutionTarget::Python
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_structure_dominates() {
        let text = "```js\nconst x = 1;\n```\n```html\n<div id=\"app\"></div>\n```";
        assert_eq!(detect_execution_target(text), ExecutionTarget::Html);
        assert_eq!(
            detect_execution_target("<!DOCTYPE html><p>x</p>"),
            ExecutionTarget::Html
        );
    }

    #[test]
    fn test_declared_tags() {
        assert_eq!(
            detect_execution_target("```python\nprint('hi')\n```"),
            ExecutionTarget::Python
        );
        assert_eq!(
            detect_execution_target("```bash\necho hi\n```"),
            ExecutionTarget::Bash
        );
        assert_eq!(
            detect_execution_target("```js\nconsole.log(1)\n```"),
            ExecutionTarget::Node
        );
        assert_eq!(
            detect_execution_target("```js\ndocument.title = 'x';\n```"),
            ExecutionTarget::Html
        );
        assert_eq!(
            detect_execution_target("```css\nbody { color: red; }\n```"),
            ExecutionTarget::Html
        );
    }

    #[test]
    fn test_untagged_content_heuristics() {
        assert_eq!(
            detect_execution_target("```\nbody { color: red; }\n```"),
            ExecutionTarget::Html
        );
        assert_eq!(
            detect_execution_target("```\nconst fs = require('fs');\n```"),
            ExecutionTarget::Node
        );
        assert_eq!(
            detect_execution_target("```\nbtn.addEventListener('click', go);\n```"),
            ExecutionTarget::Html
        );
        assert_eq!(
            detect_execution_target("```\necho hello\nls -la\n```"),
            ExecutionTarget::Bash
        );
    }

    #[test]
    fn test_shebang() {
        assert_eq!(
            detect_execution_target("```\n#!/usr/bin/env python3\nprint(1)\n```"),
            ExecutionTarget::Python
        );
        assert_eq!(
            detect_execution_target("#!/bin/sh\nrm -rf build"),
            ExecutionTarget::Bash
        );
        assert_eq!(
            detect_execution_target("#!/usr/bin/env node\nrun()"),
            ExecutionTarget::Node
        );
    }

    #[test]
    fn test_python_defaults() {
        assert_eq!(
            detect_execution_target("```\ndef main():\n    print('x')\n```"),
            ExecutionTarget::Python
        );
        assert_eq!(
            detect_execution_target("just some words"),
            ExecutionTarget::Python
        );
        assert_eq!(
            detect_execution_target("```\ncat = 3\nprint(cat)\n```"),
            ExecutionTarget::Python
        );
    }

    #[test]
    fn test_shell_detection_ignores_assignments_and_calls() {
        assert!(looks_like_shell("$ npm install"));
        assert!(looks_like_shell("cd build"));
        assert!(!looks_like_shell("ls = []"));
        assert!(!looks_like_shell("find (x)"));
        assert!(!looks_like_shell("print('echo')"));
    }
}
