//! One entry point for every caller: message in, rendition out.
//!
//! Extract (falling back to attached files) → classify → pick a target.
//! HTML-ish input is assembled into a preview; anything else goes through
//! the executability gate and, when it passes, becomes a runner command.

use serde::{Deserialize, Serialize};

use crate::assemble::{assemble_with_source, AssembledDocument};
use crate::classify::{classify_all, detect_execution_target};
use crate::command::{build_command, ScriptCommand};
use crate::extract::{gather_fragments, primary_fragment, render_fenced, PayloadSource};
use crate::fragment::{ExecutionTarget, Message};
use crate::gate::{self, GateVerdict, NonExecutableReason, INTERACTIVE_INPUT_GUIDANCE};
use crate::obs::{self, PipelineSpan};

/// Tunables for [`process_with`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Message text whose largest fragment is shorter than this falls back
    /// to the attached files.
    pub min_payload_chars: usize,
    /// Python snippets shorter than this skip the keyword check.
    pub short_python_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_payload_chars: 40,
            short_python_chars: gate::DEFAULT_SHORT_PYTHON_CHARS,
        }
    }
}

/// What a message turned into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rendition", rename_all = "snake_case")]
pub enum Rendition {
    /// A page to show in a sandboxed viewer.
    Preview(AssembledDocument),
    /// A script that passed the gate.
    Script(ScriptCommand),
    /// A script candidate the gate refused.
    Rejected {
        target: ExecutionTarget,
        reason: NonExecutableReason,
        message: String,
    },
    /// A script that would block on stdin.
    NeedsInput {
        target: ExecutionTarget,
        message: String,
    },
    /// Nothing that looks like code.
    NoCode,
}

impl Rendition {
    pub fn kind(&self) -> &'static str {
        match self {
            Rendition::Preview(_) => "preview",
            Rendition::Script(_) => "script",
            Rendition::Rejected { .. } => "rejected",
            Rendition::NeedsInput { .. } => "needs_input",
            Rendition::NoCode => "no_code",
        }
    }

    /// Text to show the user instead of running anything, if any.
    pub fn user_message(&self) -> Option<&str> {
        match self {
            Rendition::Rejected { message, .. } | Rendition::NeedsInput { message, .. } => {
                Some(message)
            }
            _ => None,
        }
    }
}

/// Process a message with the default configuration.
pub fn process(message: &Message) -> Rendition {
    process_with(message, &PipelineConfig::default())
}

pub fn process_with(message: &Message, config: &PipelineConfig) -> Rendition {
    let pipeline_id = uuid::Uuid::new_v4().to_string();
    let _span = PipelineSpan::enter(&pipeline_id);

    let (raw, source) = gather_fragments(message, config.min_payload_chars);
    obs::emit_fragments_extracted(raw.len(), source == PayloadSource::Files);

    // Files carry their language in the extension; fence them so target
    // detection sees the same tags.
    let target_text = match source {
        PayloadSource::Text => message.text.clone(),
        PayloadSource::Files => render_fenced(&raw),
    };
    let target = detect_execution_target(&target_text);
    obs::emit_target_detected(target);

    if target == ExecutionTarget::Html {
        let classified = classify_all(raw);
        return Rendition::Preview(assemble_with_source(&classified, &target_text));
    }

    let Some(primary) = primary_fragment(&raw) else {
        return Rendition::NoCode;
    };
    match gate::evaluate_with(&primary.content, target, config.short_python_chars) {
        GateVerdict::Runnable => match build_command(target, &primary.content) {
            Some(command) => Rendition::Script(command),
            None => Rendition::NoCode,
        },
        GateVerdict::NotExecutable(reason) => Rendition::Rejected {
            target,
            reason,
            message: reason.message(),
        },
        GateVerdict::NeedsInput => Rendition::NeedsInput {
            target,
            message: INTERACTIVE_INPUT_GUIDANCE.to_string(),
        },
    }
}
