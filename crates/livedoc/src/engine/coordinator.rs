//! Update cycle coordinator.
//!
//! One external event per cycle. A cycle settles the structure (propagate,
//! then replace, until no composite changes), then works through the
//! request queue: each accepted request applies its writes, settles again
//! and enqueues its follow-ups, cascades and condition gates. The cycle ends
//! Settled when the queue is empty.

use std::collections::VecDeque;

use serde::Serialize;

use super::action::{self, ActionRequest, Interaction, RequestId, StateWrite};
use super::address::{ComponentId, StateKey};
use super::builder;
use super::chain;
use super::diagnostics::{ChangeReason, Diagnostics};
use super::error::{EngineError, EvalIssue, Issue, Rejection};
use super::node::ComponentRecord;
use super::replacement::{self, Integration, PlanStatus};
use super::report::{CycleReport, Disposition, FiredAction, RequestOutcome};
use super::snapshot::DocumentSnapshot;
use super::state::{FIXED, HIDE, REPLACEMENTS};
use super::store::Store;
use super::tracker::Tracker;
use super::value::Value;
use crate::components::Registry;
use crate::config::EngineConfig;
use crate::document::ComponentSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Propagating,
    Replacing,
    Chaining,
    Settled,
}

#[derive(Debug)]
enum PendingEvent {
    Action(RequestId, ActionRequest),
    Interaction(RequestId, Interaction),
}

/// Request in the current cycle's work queue; chained ones have no id.
struct WorkItem {
    id: Option<RequestId>,
    request: ActionRequest,
}

impl WorkItem {
    fn chained(request: ActionRequest) -> Self {
        Self { id: None, request }
    }
}

/// A live document.
pub struct Engine {
    store: Store,
    config: EngineConfig,
    phase: Phase,
    queue: VecDeque<PendingEvent>,
    next_request: u64,
    cycles: u64,
}

impl Engine {
    /// Builds the document and runs it to its first Settled state.
    pub fn new(spec: ComponentSpec, config: EngineConfig) -> Result<Self, EngineError> {
        Self::with_registry(spec, config, Registry::builtin())
    }

    pub fn with_registry(
        spec: ComponentSpec,
        config: EngineConfig,
        registry: Registry,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let mut store = Store::new(registry, config.flags);
        let root = builder::instantiate_root(&mut store, spec)?;
        log::debug!("instantiated {root} with {} components", store.arena.len());
        let mut engine = Self {
            store,
            config,
            phase: Phase::Idle,
            queue: VecDeque::new(),
            next_request: 0,
            cycles: 0,
        };
        engine.run_cycle(None)?;
        Ok(engine)
    }

    fn next_id(&mut self) -> RequestId {
        self.next_request += 1;
        RequestId(self.next_request)
    }

    /// Queues a request; it runs on the next `process_pending`.
    pub fn request_action(&mut self, request: ActionRequest) -> RequestId {
        let id = self.next_id();
        self.queue.push_back(PendingEvent::Action(id, request));
        id
    }

    pub fn interact(&mut self, interaction: Interaction) -> RequestId {
        let id = self.next_id();
        self.queue.push_back(PendingEvent::Interaction(id, interaction));
        id
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Drops every queued event that has not started.
    pub fn cancel_pending(&mut self) -> usize {
        let dropped = self.queue.len();
        if dropped > 0 {
            log::debug!("dropped {dropped} pending events");
        }
        self.queue.clear();
        dropped
    }

    /// Runs queued events, one cycle each, in arrival order.
    pub fn process_pending(&mut self) -> Result<Vec<CycleReport>, EngineError> {
        let mut reports = Vec::with_capacity(self.queue.len());
        while let Some(event) = self.queue.pop_front() {
            reports.push(self.run_cycle(Some(event))?);
        }
        Ok(reports)
    }

    /// Queues `request` and runs everything queued; returns the report of
    /// the cycle that ran it.
    pub fn dispatch(&mut self, request: ActionRequest) -> Result<CycleReport, EngineError> {
        self.request_action(request);
        let mut reports = self.process_pending()?;
        Ok(reports.pop().unwrap_or_else(|| CycleReport::new(self.cycles)))
    }

    /// Runs a cycle with no event.
    pub fn settle(&mut self) -> Result<CycleReport, EngineError> {
        self.run_cycle(None)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn cycle(&self) -> u64 {
        self.cycles
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn root(&self) -> Option<&ComponentId> {
        self.store.root.as_ref()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.store.diagnostics
    }

    /// Records every value change while enabled.
    pub fn set_tracing(&mut self, tracing: bool) {
        self.store.diagnostics.tracing = tracing;
    }

    pub fn snapshot(&mut self) -> Result<DocumentSnapshot, EngineError> {
        if self.phase != Phase::Settled {
            return Err(EngineError::NotSettled { phase: self.phase });
        }
        Ok(DocumentSnapshot::capture(&mut self.store))
    }

    /// Absolute id, or a path resolved from the root namespace.
    pub fn resolve(&self, path: &str) -> Option<ComponentId> {
        self.store.lookup(path)
    }

    /// Current value of `state` on the component at `path`.
    pub fn value(&mut self, path: &str, state: &str) -> Option<Value> {
        let id = self.store.lookup(path)?;
        self.store.arena.get(&id)?.state(state)?;
        Some(self.store.read(&StateKey::new(id, state)))
    }

    /// Primary value, as a bare `$path` reference reads it.
    pub fn primary_value(&mut self, path: &str) -> Option<Value> {
        let id = self.store.lookup(path)?;
        Tracker::untracked(&mut self.store, id.clone())
            .primary_value(&id)
            .ok()
    }

    /// Rendered text of the component at `path`.
    pub fn text(&mut self, path: &str) -> Option<String> {
        let id = self.store.lookup(path)?;
        Tracker::untracked(&mut self.store, id.clone()).text_of(&id).ok()
    }

    /// Rendered children of the component at `path`, hidden ones left out.
    pub fn active_children(&mut self, path: &str) -> Vec<ComponentId> {
        let Some(id) = self.store.lookup(path) else {
            return Vec::new();
        };
        Tracker::untracked(&mut self.store, id.clone())
            .visible_children(&id)
            .unwrap_or_default()
    }

    /// Whether the component at `path`, or one of its ancestors, is hidden.
    pub fn is_hidden(&mut self, path: &str) -> Option<bool> {
        let id = self.store.lookup(path)?;
        Some(self.store.read(&StateKey::new(id, HIDE)).truthy())
    }

    pub fn recomputes_last_cycle(&self, path: &str, state: &str) -> u32 {
        match self.store.lookup(path) {
            Some(id) => self.store.diagnostics.recomputes_of(&StateKey::new(id, state)),
            None => 0,
        }
    }

    pub fn why_did_change(&self, path: &str, state: &str) -> Option<ChangeReason> {
        let id = self.store.lookup(path)?;
        self.store
            .diagnostics
            .why_did_change(&self.store.graph, &StateKey::new(id, state))
    }

    fn run_cycle(&mut self, event: Option<PendingEvent>) -> Result<CycleReport, EngineError> {
        self.cycles += 1;
        let cycle = self.cycles;
        self.store.diagnostics.begin_cycle(cycle);
        log::debug!("cycle {cycle}: {event:?}");
        let mut report = CycleReport::new(cycle);
        match self.run_events(event, &mut report) {
            Ok(()) => {
                self.phase = Phase::Settled;
                report.issues = self.store.diagnostics.issues().to_vec();
                report.recomputes = self.store.diagnostics.total_recomputes();
                for issue in &report.issues {
                    log::warn!("cycle {cycle}: {issue}");
                }
                log::debug!(
                    "cycle {cycle} settled: {} fired, {} recomputes, {} passes",
                    report.fired.len(),
                    report.recomputes,
                    report.passes
                );
                Ok(report)
            }
            Err(error) => {
                self.phase = Phase::Idle;
                log::warn!("cycle {cycle} aborted: {error}");
                Err(error)
            }
        }
    }

    fn run_events(
        &mut self,
        event: Option<PendingEvent>,
        report: &mut CycleReport,
    ) -> Result<(), EngineError> {
        self.settle_structure(report)?;
        let mut work = VecDeque::new();
        self.enqueue_gates(&mut work);

        match event {
            None => {}
            Some(PendingEvent::Action(id, request)) => {
                work.push_front(WorkItem {
                    id: Some(id),
                    request,
                });
            }
            Some(PendingEvent::Interaction(id, interaction)) => {
                let disposition = self.interaction_work(&interaction, &mut work);
                report.results.push(RequestOutcome { id, disposition });
            }
        }

        let mut chained = 0;
        while let Some(item) = work.pop_front() {
            if item.id.is_none() {
                chained += 1;
                if chained > self.config.max_chained_actions {
                    return Err(EngineError::ChainLimitExceeded {
                        limit: self.config.max_chained_actions,
                    });
                }
            }
            let disposition = self.run_request(&item.request, &mut work, report)?;
            if let Some(id) = item.id {
                report.results.push(RequestOutcome { id, disposition });
            }
        }
        Ok(())
    }

    fn run_request(
        &mut self,
        request: &ActionRequest,
        work: &mut VecDeque<WorkItem>,
        report: &mut CycleReport,
    ) -> Result<Disposition, EngineError> {
        let dispatched = match action::dispatch(&mut self.store, request) {
            Ok(dispatched) => dispatched,
            Err(rejection) => {
                if let Rejection::UnknownAction(action) = &rejection {
                    self.store.diagnostics.report(Issue::UnknownAction {
                        target: request.target.clone(),
                        action: action.clone(),
                    });
                }
                log::debug!("{}:{} rejected: {rejection}", request.target, request.action);
                return Ok(Disposition::Rejected(rejection));
            }
        };
        if let Err(rejection) = self.apply_writes(dispatched.effect.writes) {
            log::debug!("{}:{} rejected: {rejection}", request.target, request.action);
            return Ok(Disposition::Rejected(rejection));
        }
        log::debug!("fired {}:{}", dispatched.target, dispatched.action);
        report.fired.push(FiredAction {
            target: dispatched.target.clone(),
            action: dispatched.action.to_string(),
            source: request.source,
        });

        self.settle_structure(report)?;
        self.phase = Phase::Chaining;
        let order = self.store.document_order();
        work.extend(dispatched.effect.follow_ups.into_iter().map(WorkItem::chained));
        work.extend(
            chain::cascade_requests(&self.store, &order, &dispatched.target)
                .into_iter()
                .map(WorkItem::chained),
        );
        self.enqueue_gates(work);
        Ok(Disposition::Accepted)
    }

    fn enqueue_gates(&mut self, work: &mut VecDeque<WorkItem>) {
        self.phase = Phase::Chaining;
        let order = self.store.document_order();
        work.extend(
            chain::condition_requests(&mut self.store, &order)
                .into_iter()
                .map(WorkItem::chained),
        );
    }

    fn interaction_work(
        &mut self,
        interaction: &Interaction,
        work: &mut VecDeque<WorkItem>,
    ) -> Disposition {
        if self.store.flags.read_only {
            return Disposition::Rejected(Rejection::ReadOnlyRejected);
        }
        let Some(target) = self.store.lookup(&interaction.target) else {
            return Disposition::Rejected(Rejection::UnresolvedTarget(interaction.target.clone()));
        };
        let order = self.store.document_order();
        work.extend(
            chain::interaction_requests(&self.store, &order, &target, interaction)
                .into_iter()
                .map(WorkItem::chained),
        );
        Disposition::Accepted
    }

    /// Validates the whole batch before storing any of it. Writes into
    /// fixed components are dropped.
    fn apply_writes(&mut self, writes: Vec<StateWrite>) -> Result<(), Rejection> {
        let mut batch = Vec::with_capacity(writes.len());
        for write in writes {
            let source = self.store.link_source(&write.key);
            let writable = self
                .store
                .arena
                .get(&source.component)
                .and_then(|record| record.state(&source.state))
                .map(|state| state.writable);
            let reason = match writable {
                Some(true) => {
                    batch.push((write.key.component, source, write.value));
                    continue;
                }
                Some(false) => "state is not writable",
                None => "no such state",
            };
            return Err(Rejection::InvalidWrite {
                key: write.key.to_string(),
                reason: reason.to_string(),
            });
        }
        for (written, source, value) in batch {
            let fixed = [written, source.component.clone()]
                .into_iter()
                .any(|id| self.store.read(&StateKey::new(id, FIXED)).truthy());
            if fixed {
                log::debug!("dropped write to fixed {source}");
                continue;
            }
            self.store.set_stored(&source, value);
        }
        Ok(())
    }

    fn settle_structure(&mut self, report: &mut CycleReport) -> Result<(), EngineError> {
        let limit = self.config.max_passes_per_cycle;
        for _ in 0..limit {
            report.passes += 1;
            self.phase = Phase::Propagating;
            self.propagate()?;
            self.phase = Phase::Replacing;
            if !self.replace()? {
                return Ok(());
            }
        }
        Err(EngineError::PassLimitExceeded { limit })
    }

    /// Pulls every stale state, in document order.
    fn propagate(&mut self) -> Result<(), EngineError> {
        for id in self.store.document_order() {
            let stale: Vec<StateKey> = match self.store.arena.get(&id) {
                Some(record) => record
                    .states
                    .iter()
                    .filter(|(_, state)| state.stale)
                    .map(|(name, _)| StateKey::new(id.clone(), name))
                    .collect(),
                None => continue,
            };
            for key in stale {
                if let Err(EvalIssue::Circular(chain)) = self.store.get_value(&key) {
                    return Err(EngineError::CircularDependency { chain });
                }
            }
        }
        Ok(())
    }

    /// Integrates every composite's plan; true when any structure changed.
    fn replace(&mut self) -> Result<bool, EngineError> {
        let mut changed = false;
        for id in self.store.document_order() {
            if !self
                .store
                .arena
                .get(&id)
                .is_some_and(ComponentRecord::is_composite)
            {
                continue;
            }
            let key = StateKey::new(id.clone(), REPLACEMENTS);
            if let Err(EvalIssue::Circular(chain)) = self.store.get_value(&key) {
                return Err(EngineError::CircularDependency { chain });
            }
            match replacement::plan_status(&self.store, &id) {
                PlanStatus::Pending => {}
                PlanStatus::Failed(reason) => {
                    self.store
                        .diagnostics
                        .report(Issue::PartialReplacementFailure { composite: id, reason });
                }
                PlanStatus::Ready(plan) => match replacement::integrate(&mut self.store, &id, plan)? {
                    Integration::Unchanged => {}
                    Integration::Applied => changed = true,
                    Integration::Rejected(reason) => {
                        self.store
                            .diagnostics
                            .report(Issue::PartialReplacementFailure { composite: id, reason });
                    }
                },
            }
        }
        Ok(changed)
    }
}
