// crates/vigil-store/src/memory.rs
//
// In-memory report log. Appends are serialized behind a single write lock,
// which makes the log itself the ordering point for reports.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use vigil_core::{NodeId, Report, ReportId, ReportLog, TargetId, VigilError};

#[derive(Debug, Default)]
struct Inner {
    reports: Vec<Report>,
    by_target: HashMap<TargetId, Vec<ReportId>>,
    by_node: HashMap<NodeId, Vec<ReportId>>,
}

/// Report log held entirely in process memory.
#[derive(Debug, Default)]
pub struct InMemoryReportLog {
    inner: RwLock<Inner>,
}

impl InMemoryReportLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, VigilError> {
        self.inner
            .read()
            .map_err(|_| VigilError::Storage("report log lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, VigilError> {
        self.inner
            .write()
            .map_err(|_| VigilError::Storage("report log lock poisoned".to_string()))
    }
}

impl ReportLog for InMemoryReportLog {
    fn append(&self, report: Report) -> Result<ReportId, VigilError> {
        let mut inner = self.write()?;
        let id = inner.reports.len() as ReportId;
        inner.by_target.entry(report.target_id).or_default().push(id);
        inner.by_node.entry(report.node_id).or_default().push(id);
        inner.reports.push(report);
        Ok(id)
    }

    fn recent(&self, target_id: TargetId, limit: usize) -> Result<Vec<ReportId>, VigilError> {
        let inner = self.read()?;
        let ids = match inner.by_target.get(&target_id) {
            Some(ids) => ids,
            None => return Ok(Vec::new()),
        };
        let start = ids.len().saturating_sub(limit);
        Ok(ids[start..].to_vec())
    }

    fn get(&self, id: ReportId) -> Result<Report, VigilError> {
        let inner = self.read()?;
        usize::try_from(id)
            .ok()
            .and_then(|idx| inner.reports.get(idx))
            .cloned()
            .ok_or_else(|| VigilError::NotFound(format!("report {}", id)))
    }

    fn by_node(&self, node_id: NodeId) -> Result<Vec<ReportId>, VigilError> {
        let inner = self.read()?;
        Ok(inner.by_node.get(&node_id).cloned().unwrap_or_default())
    }

    fn len(&self) -> Result<u64, VigilError> {
        Ok(self.read()?.reports.len() as u64)
    }
}
