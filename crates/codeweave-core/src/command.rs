//! Heredoc commands for the external runner, and post-processing of what it
//! sends back.

use serde::{Deserialize, Serialize};

use crate::fragment::ExecutionTarget;
use crate::gate::INTERACTIVE_INPUT_GUIDANCE;

/// Error signature left behind by a program that read from a closed stdin.
pub const EOF_SIGNATURE: &str = "EOFError";

/// A script ready for the runner, plus the pieces it was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptCommand {
    pub target: ExecutionTarget,
    pub interpreter: String,
    pub heredoc_tag: String,
    pub code: String,
    /// `<interpreter> - <<'<TAG>'\n<code>\n<TAG>`
    pub command: String,
}

/// Base heredoc delimiter for a script target.
pub fn heredoc_tag(target: ExecutionTarget) -> Option<&'static str> {
    match target {
        ExecutionTarget::Html => None,
        ExecutionTarget::Python => Some("PY"),
        ExecutionTarget::Node => Some("JS"),
        ExecutionTarget::Bash => Some("SH"),
    }
}

/// A delimiter that no line of `code` can terminate early.
fn unique_tag(base: &str, code: &str) -> String {
    let collides = |tag: &str| code.lines().any(|l| l.trim() == tag);
    if !collides(base) {
        return base.to_string();
    }
    (1..)
        .map(|n| format!("{base}_{n}"))
        .find(|tag| !collides(tag))
        .unwrap_or_else(|| base.to_string())
}

/// Build the runner command for `code`. `None` for HTML, which is previewed.
pub fn build_command(target: ExecutionTarget, code: &str) -> Option<ScriptCommand> {
    let interpreter = target.interpreter()?;
    let base = heredoc_tag(target)?;
    let code = code.trim_end_matches(['\n', '\r']).to_string();
    let tag = unique_tag(base, &code);
    let command = format!("{interpreter} - <<'{tag}'\n{code}\n{tag}");
    Some(ScriptCommand {
        target,
        interpreter: interpreter.to_string(),
        heredoc_tag: tag,
        code,
        command,
    })
}

/// Runner output as shown to the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplainedOutput {
    pub stdout: String,
    pub stderr: String,
    /// True when stderr carried the EOF signature and was replaced.
    pub eof_rewritten: bool,
}

/// Pass stdout/stderr through verbatim, except that an `EOFError` trace is
/// replaced with guidance about interactive input.
pub fn explain_output(stdout: &str, stderr: &str) -> ExplainedOutput {
    if stderr.contains(EOF_SIGNATURE) {
        return ExplainedOutput {
            stdout: stdout.to_string(),
            stderr: format!(
                "The program stopped with {EOF_SIGNATURE} while waiting for input.\n{INTERACTIVE_INPUT_GUIDANCE}"
            ),
            eof_rewritten: true,
        };
    }
    ExplainedOutput {
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
        eof_rewritten: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_command() {
        let cmd = build_command(ExecutionTarget::Python, "print('hi')\n").unwrap();
        assert_eq!(cmd.command, "python3 - <<'PY'\nprint('hi')\nPY");
        assert_eq!(cmd.interpreter, "python3");
        assert_eq!(cmd.heredoc_tag, "PY");
        assert_eq!(cmd.code, "print('hi')");
    }

    #[test]
    fn test_node_and_bash_commands() {
        let node = build_command(ExecutionTarget::Node, "console.log(1)").unwrap();
        assert_eq!(node.command, "node - <<'JS'\nconsole.log(1)\nJS");
        let bash = build_command(ExecutionTarget::Bash, "echo hi").unwrap();
        assert_eq!(bash.command, "bash - <<'SH'\necho hi\nSH");
    }

    #[test]
    fn test_html_has_no_command() {
        assert!(build_command(ExecutionTarget::Html, "<p>x</p>").is_none());
    }

    #[test]
    fn test_tag_collision_gets_suffix() {
        let code = "cat <<'SH'\nnested\nSH\necho SH_1";
        let cmd = build_command(ExecutionTarget::Bash, code).unwrap();
        assert_eq!(cmd.heredoc_tag, "SH_1");
        assert!(cmd.command.ends_with("\nSH_1"));

        let both = "x\nSH\nSH_1";
        assert_eq!(build_command(ExecutionTarget::Bash, both).unwrap().heredoc_tag, "SH_2");
    }

    #[test]
    fn test_explain_output_passes_through() {
        let out = explain_output("ok\n", "warning: x\n");
        assert_eq!(out.stdout, "ok\n");
        assert_eq!(out.stderr, "warning: x\n");
        assert!(!out.eof_rewritten);
    }

    #[test]
    fn test_explain_output_rewrites_eof() {
        let trace = "Traceback (most recent call last):\n  File \"<stdin>\", line 1\nEOFError: EOF when reading a line\n";
        let out = explain_output("?", trace);
        assert!(out.eof_rewritten);
        assert!(!out.stderr.contains("Traceback"));
        assert!(out.stderr.contains("keyboard input"));
        assert_eq!(out.stdout, "?");
    }
}
