use crate::api::{parse_endpoints, parse_entities, RequestId, SmartHomeApi};
use crate::config::Settings;
use crate::errors::{CleanupError, CleanupResult};
use crate::report::Reporter;
use crate::snapshot::SnapshotStore;
use crate::targets::{select_targets, DeletionTarget, Selection};
use crate::verifier::{delete_all, RetryPolicy, Sleeper, TokioSleeper};
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineKind {
    Entities,
    Endpoints,
}

impl PipelineKind {
    pub fn label(&self) -> &'static str {
        match self {
            PipelineKind::Entities => "entities",
            PipelineKind::Endpoints => "endpoints",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            PipelineKind::Entities => "Entities",
            PipelineKind::Endpoints => "Endpoints",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub kind: PipelineKind,
    pub matched: usize,
    pub failures: Vec<DeletionTarget>,
    /// Matched records that carry no usable id; never sent to the API.
    pub skipped: Vec<DeletionTarget>,
    /// Set when the listing call failed and nothing was deleted.
    pub aborted: Option<CleanupError>,
    /// Never started because an earlier pipeline aborted.
    pub not_run: bool,
}

impl PipelineResult {
    pub fn new(kind: PipelineKind) -> Self {
        Self {
            kind,
            matched: 0,
            failures: Vec::new(),
            skipped: Vec::new(),
            aborted: None,
            not_run: false,
        }
    }

    /// Placeholder for a pipeline the run never reached
    pub fn not_run(kind: PipelineKind) -> Self {
        Self {
            not_run: true,
            ..Self::new(kind)
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.skipped.is_empty() && self.aborted.is_none() && !self.not_run
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub entities: PipelineResult,
    pub endpoints: PipelineResult,
}

impl RunReport {
    pub fn pipelines(&self) -> [&PipelineResult; 2] {
        [&self.entities, &self.endpoints]
    }

    /// No failed or skipped deletions and every pipeline ran to completion
    pub fn is_clean(&self) -> bool {
        self.pipelines().iter().all(|p| p.is_clean())
    }

    pub fn any_aborted(&self) -> bool {
        self.pipelines().iter().any(|p| p.aborted.is_some())
    }
}

/// One cleanup run: entities first, then endpoints, one request at a time.
pub struct Cleaner<A, S = TokioSleeper> {
    api: A,
    sleeper: S,
    settings: Settings,
    policy: RetryPolicy,
    snapshots: SnapshotStore,
}

impl<A: SmartHomeApi> Cleaner<A, TokioSleeper> {
    pub fn new(api: A, settings: Settings) -> Self {
        let policy = RetryPolicy::default().with_delay(settings.delay);
        let snapshots = if settings.snapshots {
            SnapshotStore::new(settings.snapshot_dir.clone())
        } else {
            SnapshotStore::disabled()
        };
        Self {
            api,
            sleeper: TokioSleeper,
            settings,
            policy,
            snapshots,
        }
    }
}

impl<A: SmartHomeApi, S: Sleeper> Cleaner<A, S> {
    pub fn with_sleeper<S2: Sleeper>(self, sleeper: S2) -> Cleaner<A, S2> {
        Cleaner {
            api: self.api,
            sleeper,
            settings: self.settings,
            policy: self.policy,
            snapshots: self.snapshots,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub async fn run<W: Write>(&self, reporter: &mut Reporter<W>) -> RunReport {
        let entities = self.run_pipeline(PipelineKind::Entities, reporter).await;
        // Nothing past a failed entities listing reaches the API.
        let endpoints = if entities.aborted.is_some() {
            tracing::warn!("entities listing failed, skipping endpoints");
            PipelineResult::not_run(PipelineKind::Endpoints)
        } else {
            self.run_pipeline(PipelineKind::Endpoints, reporter).await
        };
        let report = RunReport { entities, endpoints };
        reporter.summary(&report, &self.settings.filter_text);
        report
    }

    pub async fn run_pipeline<W: Write>(&self, kind: PipelineKind, reporter: &mut Reporter<W>) -> PipelineResult {
        let mut result = PipelineResult::new(kind);
        reporter.pipeline_started(kind);

        let selection = match self.fetch_targets(kind, reporter).await {
            Ok(selection) => selection,
            Err(err) => {
                tracing::error!(pipeline = kind.label(), error = %err, "listing failed");
                reporter.pipeline_aborted(kind, &err);
                result.aborted = Some(err);
                return result;
            }
        };

        result.matched = selection.matched();
        result.failures = delete_all(&self.api, &selection.targets, &self.policy, &self.sleeper, reporter).await;
        result.skipped = selection.skipped;
        reporter.pipeline_digest(&result);
        result
    }

    async fn fetch_targets<W: Write>(
        &self,
        kind: PipelineKind,
        reporter: &mut Reporter<W>,
    ) -> CleanupResult<Selection> {
        let raw = match kind {
            PipelineKind::Entities => self.api.list_entities().await?,
            PipelineKind::Endpoints => self.api.list_endpoints(&RequestId::new()).await?,
        };
        let Some(raw) = raw else {
            reporter.empty_response(kind);
            return Ok(Selection::default());
        };

        if let Err(err) = self.snapshots.save(kind, &raw) {
            tracing::warn!(error = %err, "could not write snapshot");
        }

        let filter_text = &self.settings.filter_text;
        let (selection, total) = match kind {
            PipelineKind::Entities => {
                let records = parse_entities(&raw)?;
                (select_targets(&records, filter_text), records.len())
            }
            PipelineKind::Endpoints => {
                let records = parse_endpoints(&raw)?;
                (select_targets(&records, filter_text), records.len())
            }
        };
        reporter.targets_selected(kind, selection.matched(), total, filter_text);
        Ok(selection)
    }
}
