//! codeweave core library
//!
//! Turns free-form LLM output into either a single sandboxable HTML preview
//! or a gated script command for an external runner. Every stage is a pure,
//! total function over strings; see [`pipeline::process`] for the entry point.

pub mod assemble;
pub mod classify;
pub mod command;
pub mod error;
pub mod extract;
pub mod fragment;
pub mod gate;
pub mod obs;
pub mod pipeline;
pub mod preview;
pub mod repair;
pub mod telemetry;

pub use assemble::{assemble, assemble_with_source, AssembledDocument, AssemblyStats};
pub use classify::{classify, classify_all, detect_execution_target, ContentRule, CONTENT_RULES};
pub use command::{build_command, explain_output, ExplainedOutput, ScriptCommand, EOF_SIGNATURE};
pub use error::{PreviewError, PreviewResult};
pub use extract::{
    extract, fragments_from_files, gather_fragments, primary_fragment, render_fenced,
    tag_for_path, PayloadSource,
};
pub use fragment::{
    ClassifiedFragment, ExecutionTarget, Fragment, FragmentKind, Message, RawFragment, SourceFile,
};
pub use gate::{
    evaluate as evaluate_gate, is_executable, requires_interactive_input, GateVerdict,
    NonExecutableReason, INTERACTIVE_INPUT_GUIDANCE,
};
pub use pipeline::{process, process_with, PipelineConfig, Rendition};
pub use preview::{PreviewHandle, PreviewSlot, IFRAME_SANDBOX};
pub use repair::{repair, repair_if_needed, Language, RepairDecision};

pub use obs::{
    emit_document_assembled, emit_fragment_classified, emit_fragments_extracted,
    emit_gate_evaluated, emit_repair_applied, emit_runner_error, emit_script_finished,
    emit_target_detected, PipelineSpan,
};
pub use telemetry::init_tracing;

/// codeweave version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
