use crate::application::ingest::TextRepair;
use crate::domain::error::DomainError;
use crate::domain::ports::content_repository::ContentRepository;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Default, Clone, Serialize)]
pub struct CleanupReport {
    pub scanned: usize,
    pub repaired: usize,
    pub deleted: usize,
}

/// Scans stored items and re-applies text repair: fixable titles are rewritten,
/// unsalvageable ones are deleted together with their dependent rows.
pub struct EncodingCleanupUseCase {
    content_repo: Arc<dyn ContentRepository>,
    repair: TextRepair,
}

impl EncodingCleanupUseCase {
    pub fn new(content_repo: Arc<dyn ContentRepository>, repair: TextRepair) -> Self {
        Self { content_repo, repair }
    }

    pub fn execute(&self, dry_run: bool) -> Result<CleanupReport, DomainError> {
        let mut report = CleanupReport::default();
        for id in self.content_repo.all_ids()? {
            let Some(item) = self.content_repo.get_by_id(id)? else {
                continue;
            };
            report.scanned += 1;

            let Some(title) = (self.repair)(&item.title).filter(|t| !t.is_empty()) else {
                warn!(item_id = id, title = %item.title, dry_run, "Deleting item with unrecoverable title");
                if !dry_run {
                    self.content_repo.delete(id)?;
                }
                report.deleted += 1;
                continue;
            };
            let body = (self.repair)(&item.body).unwrap_or_default();
            if title != item.title || body != item.body {
                if !dry_run {
                    self.content_repo.update_text(id, &title, &body)?;
                }
                report.repaired += 1;
            }
        }
        info!(
            scanned = report.scanned,
            repaired = report.repaired,
            deleted = report.deleted,
            dry_run,
            "Encoding cleanup finished"
        );
        Ok(report)
    }
}
