use crate::error::{Result, ScanError};
use crate::result::{Backreference, CrawlReport, CrawlStatus, VisitResult};
use std::collections::HashSet;
use tokio::sync::Mutex;

/// Collects results from concurrent traversal units.
///
/// Every location is accepted once. After [`finalize`](Self::finalize) any
/// further insert is rejected with [`ScanError::ReportFinalized`].
#[derive(Default)]
pub struct ResultAggregator {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    results: Vec<VisitResult>,
    locations: HashSet<String>,
    backreferences: Vec<Backreference>,
    finalized: bool,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, result: VisitResult) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.finalized {
            return Err(ScanError::ReportFinalized(result.node.location));
        }
        if !state.locations.insert(result.node.location.clone()) {
            return Err(ScanError::DuplicateResult(result.node.location));
        }
        state.results.push(result);
        Ok(())
    }

    pub async fn record_backreference(&self, backreference: Backreference) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.finalized {
            return Err(ScanError::ReportFinalized(backreference.location));
        }
        state.backreferences.push(backreference);
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.results.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Seals the aggregator and hands out the collected report. Only the
    /// first call succeeds.
    pub async fn finalize(&self, status: CrawlStatus) -> Result<CrawlReport> {
        let mut state = self.state.lock().await;
        if state.finalized {
            return Err(ScanError::ReportFinalized("report".to_string()));
        }
        state.finalized = true;
        Ok(CrawlReport {
            status,
            results: std::mem::take(&mut state.results),
            backreferences: std::mem::take(&mut state.backreferences),
        })
    }
}
