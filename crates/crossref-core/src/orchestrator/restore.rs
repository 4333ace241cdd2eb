//! Cooperative restore pass.
//!
//! A [`RestorePass`] is a resumable cursor over the persisted pairs of one or
//! more partitions.  [`Orchestrator::step_restore`] advances it by at most
//! the configured batch size and reports whether it yielded or finished, so
//! hosts can spread a large restore over several frames.

use std::collections::VecDeque;

use tracing::debug;

use crate::graph::{EntityHandle, ObjectRef, PartitionHost};
use crate::models::{PartitionStatus, ReferencePair, ResolutionOutcome};
use crate::orchestrator::status::ReferenceRecord;
use crate::orchestrator::Orchestrator;
use crate::resolver::Resolution;
use crate::store::PartitionStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestoreStep {
    /// The batch budget ran out with pairs left to process.
    Yielded,
    Complete,
}

/// What happened to one pair during restore.
#[derive(Clone, Debug)]
pub struct PairRestoreResult {
    pub pair: ReferencePair,
    /// Write through the variable, or a plain resolve when the value failed.
    pub variable: Resolution,
    pub value: Resolution,
}

impl PairRestoreResult {
    pub fn outcome(&self) -> ResolutionOutcome {
        ResolutionOutcome::combine(self.variable.outcome, self.value.outcome)
    }
}

struct ActivePartition {
    path: String,
    pairs: VecDeque<ReferencePair>,
}

pub struct RestorePass {
    queue: VecDeque<String>,
    current: Option<ActivePartition>,
    respect_suppression: bool,
    results: Vec<PairRestoreResult>,
    yields: usize,
}

impl RestorePass {
    fn new(queue: VecDeque<String>, respect_suppression: bool) -> Self {
        Self {
            queue,
            current: None,
            respect_suppression,
            results: Vec::new(),
            yields: 0,
        }
    }

    /// Honour the persisted warning suppression flag when reporting.
    pub fn respecting_suppression(mut self, respect: bool) -> Self {
        self.respect_suppression = respect;
        self
    }

    pub fn results(&self) -> &[PairRestoreResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<PairRestoreResult> {
        self.results
    }

    /// Number of times the pass has yielded so far.
    pub fn yields(&self) -> usize {
        self.yields
    }

    pub fn is_complete(&self) -> bool {
        self.current.is_none() && self.queue.is_empty()
    }
}

impl<H: PartitionHost, S: PartitionStore> Orchestrator<H, S> {
    /// Start a pass over a single partition.
    pub fn begin_restore(&self, path: &str) -> RestorePass {
        RestorePass::new(VecDeque::from([path.to_string()]), false)
    }

    /// Start a pass over every loaded partition, in host order.
    pub fn begin_restore_all(&self) -> RestorePass {
        let queue = self
            .host
            .loaded_partitions()
            .iter()
            .map(|p| p.path().to_string())
            .collect();
        RestorePass::new(queue, true)
    }

    /// Process at most one batch of pairs.
    pub fn step_restore(&mut self, pass: &mut RestorePass) -> RestoreStep {
        let budget = self.config.batch_size();
        let mut processed = 0;

        loop {
            let Some(active) = pass.current.as_mut() else {
                let Some(path) = pass.queue.pop_front() else {
                    return RestoreStep::Complete;
                };
                pass.current = self.open_partition(path);
                continue;
            };

            if active.pairs.is_empty() {
                let path = active.path.clone();
                pass.current = None;
                self.state_mut(&path).status = PartitionStatus::Restored;
                debug!("Finished restoring cross-partition references for {path}");
                continue;
            }
            if processed >= budget {
                pass.yields += 1;
                return RestoreStep::Yielded;
            }

            let Some(pair) = active.pairs.pop_front() else {
                continue;
            };
            let path = active.path.clone();
            let result = self.restore_pair(&path, pair, pass.respect_suppression);
            pass.results.push(result);
            processed += 1;
        }
    }

    /// Restore one partition to completion.
    pub fn restore(&mut self, path: &str) -> Vec<PairRestoreResult> {
        let mut pass = self.begin_restore(path);
        self.drive(&mut pass);
        pass.into_results()
    }

    /// Restore every loaded partition to completion.
    pub fn restore_all(&mut self) -> Vec<PairRestoreResult> {
        let mut pass = self.begin_restore_all();
        self.drive(&mut pass);
        pass.into_results()
    }

    fn drive(&mut self, pass: &mut RestorePass) {
        while self.step_restore(pass) == RestoreStep::Yielded {}
    }

    /// Load the pairs for `path` and reset its outcome table.  Unloaded
    /// partitions are skipped.
    fn open_partition(&mut self, path: String) -> Option<ActivePartition> {
        if !self.host.is_loaded(&path) {
            debug!("Skipping restore of unloaded partition {path}");
            return None;
        }
        let pairs = self.load_or_empty(&path);
        debug!(
            "Restoring {} cross-partition references for {path}",
            pairs.len()
        );
        self.state_mut(&path).records.clear();
        Some(ActivePartition {
            path,
            pairs: pairs.into(),
        })
    }

    fn restore_pair(
        &mut self,
        path: &str,
        pair: ReferencePair,
        respect_suppression: bool,
    ) -> PairRestoreResult {
        let value = pair.value.resolve(&self.host);
        let variable = match &value.target {
            Some(target) => pair.variable.assign(&self.host, target),
            None => pair.variable.resolve(&self.host),
        };
        let result = PairRestoreResult {
            pair,
            variable,
            value,
        };

        let outcome = result.outcome();
        let source = result.variable.target.as_ref().and_then(ObjectRef::entity);
        if !outcome.is_success() {
            self.report_failure(&result, source.as_ref(), respect_suppression);
        }
        let record = ReferenceRecord::new(&result.pair.variable, outcome, source);
        self.state_mut(path)
            .records
            .insert(result.pair.variable.clone(), record);
        result
    }

    fn report_failure(
        &self,
        result: &PairRestoreResult,
        source: Option<&EntityHandle>,
        respect_suppression: bool,
    ) {
        if respect_suppression && !self.config.unresolved_reference_warnings {
            return;
        }
        let message = if !result.value.is_success() {
            let owner = source.map(|e| format!(", {}", e.name())).unwrap_or_default();
            format!(
                "Could not resolve value for cross-partition reference {}{owner}: {}",
                result.pair.value, result.value.outcome
            )
        } else {
            format!(
                "Could not resolve variable for cross-partition reference {}: {}",
                result.pair.variable, result.variable.outcome
            )
        };
        self.sink.report(self.config.failure_severity, &message, source);
    }
}
