//! Raw listing snapshots.
//!
//! Each run overwrites `data.json` (entities) and `graphql.json` (endpoints)
//! with the API response exactly as received. Nothing reads them back; they
//! exist so the operator can inspect what the run saw.

use crate::errors::{CleanupError, CleanupResult};
use crate::pipeline::PipelineKind;
use std::path::{Path, PathBuf};

pub const ENTITIES_FILE: &str = "data.json";
pub const ENDPOINTS_FILE: &str = "graphql.json";

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: Option<PathBuf>,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    pub fn disabled() -> Self {
        Self { dir: None }
    }

    pub fn file_name(kind: PipelineKind) -> &'static str {
        match kind {
            PipelineKind::Entities => ENTITIES_FILE,
            PipelineKind::Endpoints => ENDPOINTS_FILE,
        }
    }

    pub fn path(&self, kind: PipelineKind) -> Option<PathBuf> {
        self.dir.as_deref().map(|d| d.join(Self::file_name(kind)))
    }

    /// Writes the raw response. Returns the path written, or `None` when disabled.
    pub fn save(&self, kind: PipelineKind, raw: &serde_json::Value) -> CleanupResult<Option<PathBuf>> {
        let Some(path) = self.path(kind) else {
            return Ok(None);
        };
        write_json(&path, raw)?;
        tracing::debug!(path = %path.display(), "snapshot written");
        Ok(Some(path))
    }
}

fn write_json(path: &Path, raw: &serde_json::Value) -> CleanupResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| CleanupError::Snapshot(format!("{}: {}", parent.display(), e)))?;
    }
    let content = serde_json::to_string(raw)?;
    std::fs::write(path, content)
        .map_err(|e| CleanupError::Snapshot(format!("{}: {}", path.display(), e)))
}
