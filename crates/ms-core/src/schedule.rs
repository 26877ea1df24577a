//! The schedule: machines, jobs and the mutations that keep them in step.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde::ser::SerializeStruct;

use crate::activity::{Activity, ActivityMut};
use crate::error::{Entity, Result, ScheduleError};
use crate::interval::{Interval, Moment, OverlapPolicy, format_moment};
use crate::job::{Job, OperationRef};
use crate::kind::{ActivityKind, ActivityKinds};
use crate::machine::Machine;
use crate::types::{ActivityId, JobId, MachineId, ScheduleId};

/// A set of machine timelines and the jobs whose operations they hold.
///
/// Machines and jobs iterate in the order they were added. All placement
/// goes through the schedule so every operation stays registered with its
/// job.
#[derive(Debug, Clone)]
pub struct Schedule {
    id: ScheduleId,
    horizon: Interval,
    kinds: Arc<ActivityKinds>,
    machine_order: Vec<MachineId>,
    machines: HashMap<MachineId, Machine>,
    job_order: Vec<JobId>,
    jobs: HashMap<JobId, Job>,
}

impl Schedule {
    /// Fails with `InvalidInterval` on a zero-length horizon.
    pub fn new(id: &str, horizon: Interval, kinds: ActivityKinds) -> Result<Self> {
        Ok(Self::with_shared_kinds(
            ScheduleId::new(id)?,
            horizon.ensure_horizon()?,
            Arc::new(kinds),
        ))
    }

    fn with_shared_kinds(id: ScheduleId, horizon: Interval, kinds: Arc<ActivityKinds>) -> Self {
        Self {
            id,
            horizon,
            kinds,
            machine_order: Vec::new(),
            machines: HashMap::new(),
            job_order: Vec::new(),
            jobs: HashMap::new(),
        }
    }

    pub const fn id(&self) -> &ScheduleId {
        &self.id
    }

    pub const fn horizon(&self) -> &Interval {
        &self.horizon
    }

    pub fn kinds(&self) -> &ActivityKinds {
        &self.kinds
    }

    /// Machines in insertion order.
    pub fn machines(&self) -> impl ExactSizeIterator<Item = &Machine> + '_ {
        self.machine_order.iter().map(|id| &self.machines[id])
    }

    /// Jobs in insertion order.
    pub fn jobs(&self) -> impl ExactSizeIterator<Item = &Job> + '_ {
        self.job_order.iter().map(|id| &self.jobs[id])
    }

    pub fn machine(&self, id: &str) -> Option<&Machine> {
        self.machines.get(id)
    }

    pub fn machine_mut(&mut self, id: &str) -> Option<&mut Machine> {
        self.machines.get_mut(id)
    }

    pub fn job(&self, id: &str) -> Option<&Job> {
        self.jobs.get(id)
    }

    pub fn job_mut(&mut self, id: &str) -> Option<&mut Job> {
        self.jobs.get_mut(id)
    }

    pub fn activity(&self, machine: &str, id: &str) -> Option<&Activity> {
        self.machine(machine)?.timeline().get(id)
    }

    pub fn activity_mut(&mut self, machine: &str, id: &str) -> Option<ActivityMut<'_>> {
        self.machines.get_mut(machine)?.timeline_mut().get_mut(id)
    }

    /// Adds a machine whose timeline is idle over the whole horizon.
    pub fn add_machine(&mut self, id: &str) -> Result<&mut Machine> {
        if self.machines.contains_key(id) {
            return Err(ScheduleError::duplicate(Entity::Machine, id));
        }
        let id = MachineId::new(id)?;
        let machine = Machine::new(id.clone(), self.horizon, Arc::clone(&self.kinds));
        self.machine_order.push(id.clone());
        tracing::debug!(schedule = %self.id, machine = %id, "added machine");
        Ok(self.machines.entry(id).or_insert(machine))
    }

    pub fn add_job(&mut self, id: &str) -> Result<&mut Job> {
        if self.jobs.contains_key(id) {
            return Err(ScheduleError::duplicate(Entity::Job, id));
        }
        let id = JobId::new(id)?;
        self.job_order.push(id.clone());
        Ok(self.jobs.entry(id.clone()).or_insert_with(|| Job::new(id)))
    }

    /// Places an operation of `job` on `machine` over `[start, end]` and
    /// registers it with the job.
    ///
    /// Without an explicit `id` the machine's next generated operation ID is
    /// used.
    pub fn add_operation(
        &mut self,
        machine: &str,
        job: &str,
        start: Moment,
        end: Moment,
        id: Option<&str>,
    ) -> Result<ActivityMut<'_>> {
        let mc = self
            .machines
            .get_mut(machine)
            .ok_or_else(|| ScheduleError::unknown(Entity::Machine, machine))?;
        let owner = self
            .jobs
            .get_mut(job)
            .ok_or_else(|| ScheduleError::unknown(Entity::Job, job))?;
        let interval = Interval::new(start, end)?;
        let id = match id {
            Some(id) => ActivityId::new(id)?,
            None => mc.timeline().next_id(ActivityKind::Operation),
        };
        let op_ref = OperationRef::new(mc.id().clone(), id.clone());
        if owner.has_operation(&op_ref) {
            return Err(ScheduleError::duplicate(Entity::Operation, &op_ref));
        }

        let operation = Activity::operation(id, mc.id().clone(), owner.id().clone(), interval);
        let placed = mc.timeline_mut().insert(operation)?;
        owner.add_operation(op_ref)?;
        Ok(placed)
    }

    pub fn add_breakdown(
        &mut self,
        machine: &str,
        start: Moment,
        end: Moment,
    ) -> Result<ActivityMut<'_>> {
        self.place(machine, ActivityKind::Breakdown, start, end)
    }

    pub fn add_setup(&mut self, machine: &str, start: Moment, end: Moment) -> Result<ActivityMut<'_>> {
        self.place(machine, ActivityKind::Setup, start, end)
    }

    fn place(
        &mut self,
        machine: &str,
        kind: ActivityKind,
        start: Moment,
        end: Moment,
    ) -> Result<ActivityMut<'_>> {
        let mc = self
            .machines
            .get_mut(machine)
            .ok_or_else(|| ScheduleError::unknown(Entity::Machine, machine))?;
        let interval = Interval::new(start, end)?;
        let id = mc.timeline().next_id(kind);
        let machine = mc.id().clone();
        let activity = if kind == ActivityKind::Setup {
            Activity::setup(id, machine, interval)
        } else {
            Activity::breakdown(id, machine, interval)
        };
        mc.timeline_mut().insert(activity)
    }

    /// Clears `query` on `machine`; removed operations leave their jobs.
    pub fn remove_in(&mut self, machine: &str, query: &Interval) -> Result<Vec<Activity>> {
        let mc = self
            .machines
            .get_mut(machine)
            .ok_or_else(|| ScheduleError::unknown(Entity::Machine, machine))?;
        let removed = mc.timeline_mut().remove_in(query)?;
        self.unregister(&removed);
        Ok(removed)
    }

    /// Discards everything on `machine` after `moment`; removed operations
    /// leave their jobs.
    pub fn truncate_after(&mut self, machine: &str, moment: Moment) -> Result<Vec<Activity>> {
        let mc = self
            .machines
            .get_mut(machine)
            .ok_or_else(|| ScheduleError::unknown(Entity::Machine, machine))?;
        let removed = mc.timeline_mut().truncate_after(moment)?;
        self.unregister(&removed);
        Ok(removed)
    }

    fn unregister(&mut self, removed: &[Activity]) {
        for ac in removed {
            let (Some(job), Some(machine)) = (ac.job(), ac.machine()) else {
                continue;
            };
            let op_ref = OperationRef::new(machine.clone(), ac.id().clone());
            let result = self
                .jobs
                .get_mut(job)
                .ok_or_else(|| ScheduleError::unknown(Entity::Job, job))
                .and_then(|job| job.remove_operation(&op_ref));
            if let Err(err) = result {
                tracing::warn!(operation = %op_ref, error = %err, "removed operation was not registered");
            }
        }
    }

    /// The activities of a job's operations, in job order.
    pub fn job_operations(&self, job: &str) -> Result<Vec<&Activity>> {
        let job = self
            .job(job)
            .ok_or_else(|| ScheduleError::unknown(Entity::Job, job))?;
        Ok(job
            .operations()
            .filter_map(|op| self.activity(op.machine.as_str(), op.activity.as_str()))
            .collect())
    }

    /// Builds a new schedule over a narrower horizon or fewer machines.
    ///
    /// Omitted bounds keep this schedule's. Every selected machine is rebuilt
    /// from scratch and its non-idle activities are replayed under `policy`:
    /// `Trim` clips them to the new horizon, `Exclude` drops any that stick
    /// out. Activity IDs are kept; idle spans get fresh IDs. All jobs are
    /// copied, holding only the operations that survived.
    pub fn rescope(
        &self,
        new_id: &str,
        machines: Option<&[&str]>,
        start: Option<Moment>,
        end: Option<Moment>,
        policy: OverlapPolicy,
    ) -> Result<Self> {
        if policy == OverlapPolicy::Include {
            return Err(ScheduleError::UnsupportedPolicy(policy.to_string()));
        }
        let horizon = Interval::new(
            start.unwrap_or(self.horizon.start()),
            end.unwrap_or(self.horizon.end()),
        )?
        .ensure_horizon()?;
        if let Some(subset) = machines {
            if let Some(missing) = subset.iter().find(|id| !self.machines.contains_key(**id)) {
                return Err(ScheduleError::unknown(Entity::Machine, missing));
            }
        }
        let selected = self
            .machine_order
            .iter()
            .filter(|id| machines.is_none_or(|subset| subset.contains(&id.as_str())));

        let mut rescoped =
            Self::with_shared_kinds(ScheduleId::new(new_id)?, horizon, Arc::clone(&self.kinds));
        let mut kept = HashSet::new();
        for id in selected {
            let source = &self.machines[id];
            let mut copy = source.clone();
            copy.reset_schedule(horizon);
            for ac in source.non_idle_activities() {
                let Some(span) = fit_activity(ac.interval(), &horizon, policy)? else {
                    continue;
                };
                if span.is_empty() && span.start() != horizon.end() {
                    tracing::warn!(
                        machine = %id,
                        activity = %ac.id(),
                        "skipping zero-duration activity inside the new horizon"
                    );
                    continue;
                }
                copy.timeline_mut().insert(ac.respan(span))?;
                if ac.kind() == ActivityKind::Operation {
                    kept.insert(OperationRef::new(id.clone(), ac.id().clone()));
                }
            }
            rescoped.machine_order.push(id.clone());
            rescoped.machines.insert(id.clone(), copy);
        }
        for id in &self.job_order {
            let job = self.jobs[id].filtered(|op| kept.contains(op));
            rescoped.job_order.push(id.clone());
            rescoped.jobs.insert(id.clone(), job);
        }

        tracing::debug!(
            source = %self.id,
            schedule = %rescoped.id,
            horizon = %horizon,
            policy = %policy,
            machines = rescoped.machine_order.len(),
            operations = kept.len(),
            "rescoped schedule"
        );
        Ok(rescoped)
    }
}

/// Zero-duration spans have no overlap to trim; they stay while their moment
/// is inside the horizon.
fn fit_activity(
    span: &Interval,
    horizon: &Interval,
    policy: OverlapPolicy,
) -> Result<Option<Interval>> {
    if span.is_empty() {
        return Ok(horizon.contains(span.start()).then_some(*span));
    }
    span.fit_to(horizon, policy)
}

impl Serialize for Schedule {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("Schedule", 5)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("horizon", &self.horizon)?;
        state.serialize_field("kinds", self.kinds.as_ref())?;
        state.serialize_field("machines", &self.machines().collect::<Vec<_>>())?;
        state.serialize_field("jobs", &self.jobs().collect::<Vec<_>>())?;
        state.end()
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} .. {}",
            self.id,
            format_moment(&self.horizon.start()),
            format_moment(&self.horizon.end())
        )?;
        for machine in self.machines() {
            write!(f, "\n[{}]\n{}", machine.id(), machine.timeline())?;
        }
        Ok(())
    }
}
