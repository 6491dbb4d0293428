use crate::errors::CleanupError;
use crate::pipeline::{PipelineKind, PipelineResult, RunReport};
use crate::targets::DeletionTarget;
use std::io::{self, Write};

/// Console output for a run. Generic over the sink so tests can capture it.
pub struct Reporter<W> {
    out: W,
}

impl Reporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn pipeline_started(&mut self, kind: PipelineKind) {
        let _ = writeln!(self.out, "\nFetching {}...", kind.label());
    }

    pub fn empty_response(&mut self, kind: PipelineKind) {
        let _ = writeln!(self.out, "Empty {} response received from server.", kind.label());
    }

    pub fn targets_selected(&mut self, kind: PipelineKind, matched: usize, total: usize, filter_text: &str) {
        let _ = writeln!(
            self.out,
            "{} of {} {} match '{}'.",
            matched,
            total,
            kind.label(),
            filter_text
        );
    }

    pub fn target_started(&mut self, target: &DeletionTarget) {
        let _ = writeln!(self.out, "{}", target);
    }

    pub fn attempt_failed(&mut self, target: &DeletionTarget, attempt: u32) {
        let _ = writeln!(
            self.out,
            "Entity {}:{} was not deleted. Attempt {}.",
            target.name, target.entity_id, attempt
        );
    }

    pub fn deleted(&mut self, target: &DeletionTarget, attempt: u32) {
        let _ = writeln!(
            self.out,
            "✓ Entity {}:{} deleted (attempt {}).",
            target.name, target.entity_id, attempt
        );
    }

    pub fn pipeline_aborted(&mut self, kind: PipelineKind, err: &CleanupError) {
        let _ = writeln!(self.out, "\nFetching {} failed: {}", kind.label(), err);
        let _ = writeln!(self.out, "{}", err.diagnostics());
    }

    /// Digest printed at the end of each pipeline, only when something failed.
    pub fn pipeline_digest(&mut self, result: &PipelineResult) {
        if !result.failures.is_empty() {
            let _ = writeln!(self.out, "\nFailed to delete the following {}:", result.kind.label());
            for failure in &result.failures {
                let _ = writeln!(self.out, "{}", failure);
            }
        }
        if !result.skipped.is_empty() {
            let _ = writeln!(self.out, "\nSkipped {} without a usable id:", result.kind.label());
            for skipped in &result.skipped {
                let _ = writeln!(self.out, "{}", skipped);
            }
        }
    }

    fn name_lines(&mut self, heading: &str, targets: &[DeletionTarget]) {
        if targets.is_empty() {
            return;
        }
        let _ = writeln!(self.out, "\n{}:", heading);
        for target in targets {
            let _ = writeln!(self.out, "Name: '{}', Entity ID: '{}'", target.name, target.entity_id);
        }
    }

    pub fn summary(&mut self, report: &RunReport, filter_text: &str) {
        if report.is_clean() {
            let _ = writeln!(
                self.out,
                "Done, removed all entities and endpoints with a manufacturer name matching: {}",
                filter_text
            );
            return;
        }

        let _ = writeln!(self.out, "\nSummary of all failed deletions:");
        for result in report.pipelines() {
            if let Some(err) = &result.aborted {
                let _ = writeln!(self.out, "\n{} not processed: {}", result.kind.title(), err);
            }
            if result.not_run {
                let _ = writeln!(
                    self.out,
                    "\n{} not processed: skipped after the entities listing failed",
                    result.kind.title()
                );
            }
            self.name_lines(&format!("Failed {}", result.kind.title()), &result.failures);
            self.name_lines(&format!("Skipped {}", result.kind.title()), &result.skipped);
        }
    }
}
