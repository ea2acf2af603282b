//! Structured observability hooks for the reassembly pipeline.
//!
//! This module provides:
//! - A per-call tracing span via the `PipelineSpan` RAII guard
//! - Emission functions for the pipeline's lifecycle events: extraction,
//!   classification, repair, assembly, gating and script completion
//!
//! Lifecycle events go out at `info!`, per-fragment decisions at `debug!`.
//! Filter with `RUST_LOG`; see [`crate::telemetry::init_tracing`].

use tracing::{debug, info};

use crate::assemble::AssemblyStats;
use crate::fragment::{ExecutionTarget, FragmentKind};
use crate::gate::GateVerdict;
use crate::repair::{Language, RepairDecision};

/// RAII guard that enters a pipeline-scoped span for one `process` call.
///
/// # Example
///
/// ```ignore
/// let _span = PipelineSpan::enter("msg-42");
/// // every event below is tagged with pipeline_id = "msg-42"
/// ```
pub struct PipelineSpan {
    _span: tracing::span::EnteredSpan,
}

impl PipelineSpan {
    pub fn enter(pipeline_id: &str) -> Self {
        let span = tracing::info_span!("codeweave.pipeline", pipeline_id = %pipeline_id);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: fragments extracted from a message.
pub fn emit_fragments_extracted(count: usize, from_files: bool) {
    info!(event = "fragments.extracted", count = count, from_files = from_files);
}

pub fn emit_fragment_classified(source_order: usize, declared_tag: Option<&str>, kind: FragmentKind) {
    debug!(
        event = "fragment.classified",
        source_order = source_order,
        declared_tag = declared_tag.unwrap_or("-"),
        kind = %kind,
    );
}

/// Emit event: execution target chosen for the whole input.
pub fn emit_target_detected(target: ExecutionTarget) {
    info!(event = "target.detected", target = %target);
}

/// Emit event: a fragment went through brace repair.
pub fn emit_repair_applied(language: Language, decision: &RepairDecision, changed: bool) {
    info!(
        event = "repair.applied",
        language = %language,
        dangling_header = decision.dangling_header,
        unbalanced = decision.unbalanced,
        no_braces = decision.no_braces,
        changed = changed,
    );
}

/// Emit event: preview document assembled.
pub fn emit_document_assembled(stats: &AssemblyStats) {
    info!(
        event = "document.assembled",
        html_fragments = stats.html_fragments,
        css_fragments = stats.css_fragments,
        js_fragments = stats.js_fragments,
        dropped_fragments = stats.dropped_fragments,
        stripped_resources = stats.stripped_resources,
        css_repaired = stats.css_repaired,
        js_repaired = stats.js_repaired,
        bytes = stats.bytes,
    );
}

/// Emit event: executability gate verdict for a script candidate.
pub fn emit_gate_evaluated(target: ExecutionTarget, verdict: &GateVerdict) {
    info!(
        event = "gate.evaluated",
        target = %target,
        runnable = verdict.is_runnable(),
        verdict = %verdict,
    );
}

/// Emit event: a script run came back from the runner.
pub fn emit_script_finished(
    target: ExecutionTarget,
    exit_code: Option<i32>,
    duration_ms: u64,
    eof_rewritten: bool,
) {
    info!(
        event = "script.finished",
        target = %target,
        exit_code = exit_code,
        duration_ms = duration_ms,
        eof_rewritten = eof_rewritten,
    );
}

/// Emit event: the runner failed (warning level).
pub fn emit_runner_error(target: ExecutionTarget, error: &dyn std::fmt::Display) {
    tracing::warn!(event = "script.runner_error", target = %target, error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_span_create() {
        let _span = PipelineSpan::enter("test-pipeline");
    }
}
