use serde::Serialize;

use super::action::{RequestId, RequestSource};
use super::address::ComponentId;
use super::error::{Issue, Rejection};

/// What happened to one queued request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "rejection", rename_all = "snake_case")]
pub enum Disposition {
    Accepted,
    Rejected(Rejection),
}

impl Disposition {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestOutcome {
    pub id: RequestId,
    pub disposition: Disposition,
}

/// An action that ran to completion, external or chained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FiredAction {
    pub target: ComponentId,
    pub action: String,
    pub source: RequestSource,
}

/// Summary of one update cycle, from the event to Settled.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub results: Vec<RequestOutcome>,
    /// In firing order.
    pub fired: Vec<FiredAction>,
    pub issues: Vec<Issue>,
    pub recomputes: u64,
    /// Propagate/replace passes over all settles of the cycle.
    pub passes: usize,
}

impl CycleReport {
    pub(crate) fn new(cycle: u64) -> Self {
        Self {
            cycle,
            ..Self::default()
        }
    }

    pub fn disposition(&self, id: RequestId) -> Option<&Disposition> {
        self.results
            .iter()
            .find(|outcome| outcome.id == id)
            .map(|outcome| &outcome.disposition)
    }

    /// `target:action` of every fired action, for assertions and logs.
    pub fn fired_names(&self) -> Vec<String> {
        self.fired
            .iter()
            .map(|fired| format!("{}:{}", fired.target, fired.action))
            .collect()
    }
}
