use std::sync::Arc;

use tokio::sync::watch;

use super::AggregatedReport;

/// Holds the most recent report. Readers see either the previous report or
/// the new one, never a partially built one.
#[derive(Debug)]
pub struct ReportSlot {
    tx: watch::Sender<Option<Arc<AggregatedReport>>>,
}

impl Default for ReportSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportSlot {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    pub fn publish(&self, report: AggregatedReport) -> Arc<AggregatedReport> {
        let report = Arc::new(report);
        self.tx.send_replace(Some(Arc::clone(&report)));
        report
    }

    pub fn latest(&self) -> Option<Arc<AggregatedReport>> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<AggregatedReport>>> {
        self.tx.subscribe()
    }
}
