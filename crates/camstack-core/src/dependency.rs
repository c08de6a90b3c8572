//! Dependency set: the auxiliary processes hanging off one acquisition
//! process, with deterministic start and kill ordering.
//!
//! Ordering rule, applied uniformly to every camera:
//! - start: ascending `start_order`, ties in declaration order; an entry
//!   flagged `kill_upon_create` is stopped immediately before its start.
//! - stop: ascending `kill_order` (smaller dies first), ties in reverse
//!   declaration order.
//!
//! Planning is pure; `start_all` / `stop_all` just execute the plan one
//! step at a time, never concurrently.

use std::cmp::Reverse;
use std::collections::HashSet;
use std::time::Duration;

use crate::error::CamstackError;
use crate::process::{DependentProcess, ProcessDescriptor};
use crate::transport::ControlPlane;

/// One operation on the entry at `index` (declaration order).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanStep {
    Start(usize),
    Stop(usize),
}

/// `host/session` for remote sessions, plain `session` for local ones.
pub(crate) fn session_key(host: Option<&str>, session: &str) -> String {
    match host {
        Some(h) => format!("{h}/{session}"),
        None => session.to_string(),
    }
}

#[derive(Debug, Default)]
pub struct DependencySet {
    processes: Vec<DependentProcess>,
}

impl DependencySet {
    /// Validate that no two entries share a session on the same host.
    pub fn new(processes: Vec<DependentProcess>) -> Result<Self, CamstackError> {
        let mut seen = HashSet::new();
        for p in &processes {
            let key = session_key(p.session().host(), p.session().name());
            if !seen.insert(key.clone()) {
                return Err(CamstackError::DuplicateSession(key));
            }
        }
        Ok(Self { processes })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Bind descriptors to sessions on the hosts they name.
    pub fn assemble(
        descriptors: impl IntoIterator<Item = ProcessDescriptor>,
        plane: &dyn ControlPlane,
        kill_grace: Duration,
    ) -> Result<Self, CamstackError> {
        let processes = descriptors
            .into_iter()
            .map(|d| {
                let runner = plane.runner_for(d.remote_host.as_deref());
                Ok(DependentProcess::new(d, runner)?.with_kill_grace(kill_grace))
            })
            .collect::<Result<Vec<_>, CamstackError>>()?;
        Self::new(processes)
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DependentProcess> {
        self.processes.iter()
    }

    pub fn get(&self, index: usize) -> Option<&DependentProcess> {
        self.processes.get(index)
    }

    /// Session keys of every entry (see [`session_key`]).
    pub(crate) fn session_keys(&self) -> impl Iterator<Item = String> + '_ {
        self.processes
            .iter()
            .map(|p| session_key(p.session().host(), p.session().name()))
    }

    /// Steps executed by [`Self::start_all`].
    pub fn start_plan(&self) -> Vec<PlanStep> {
        let mut order: Vec<usize> = (0..self.processes.len()).collect();
        // Stable sort keeps declaration order among equal start_order.
        order.sort_by_key(|&i| self.processes[i].descriptor().start_order);
        let mut plan = Vec::with_capacity(order.len() * 2);
        for i in order {
            if self.processes[i].descriptor().kill_upon_create {
                plan.push(PlanStep::Stop(i));
            }
            plan.push(PlanStep::Start(i));
        }
        plan
    }

    /// Steps executed by [`Self::stop_all`].
    pub fn stop_plan(&self) -> Vec<PlanStep> {
        let mut order: Vec<usize> = (0..self.processes.len()).collect();
        order.sort_by_key(|&i| (self.processes[i].descriptor().kill_order, Reverse(i)));
        order.into_iter().map(PlanStep::Stop).collect()
    }

    fn execute(&mut self, plan: &[PlanStep]) -> Result<(), CamstackError> {
        for step in plan {
            match *step {
                PlanStep::Start(i) => self.processes[i].start()?,
                PlanStep::Stop(i) => self.processes[i].stop()?,
            }
        }
        Ok(())
    }

    pub fn start_all(&mut self) -> Result<(), CamstackError> {
        let plan = self.start_plan();
        tracing::debug!("dependency start plan: {plan:?}");
        self.execute(&plan)
    }

    /// Safe to repeat: stopping a stopped entry is a no-op.
    pub fn stop_all(&mut self) -> Result<(), CamstackError> {
        let plan = self.stop_plan();
        tracing::debug!("dependency stop plan: {plan:?}");
        self.execute(&plan)
    }

    /// Indices of entries whose session has no live process.
    pub fn not_running(&self) -> Result<Vec<usize>, CamstackError> {
        let mut dead = Vec::new();
        for (i, p) in self.processes.iter().enumerate() {
            if !p.is_running()? {
                dead.push(i);
            }
        }
        Ok(dead)
    }
}
