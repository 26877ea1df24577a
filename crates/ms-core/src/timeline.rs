//! Gap-free sequence of activities tiling one machine's horizon.
//!
//! # Invariants
//!
//! After every public call:
//! - Activities, in list order, tile the horizon exactly: the first starts at
//!   `horizon.start`, each ends where the next starts, the last ends at
//!   `horizon.end`.
//! - The ID list and the ID → activity map hold the same IDs.
//! - No two neighbouring activities are both idle.
//! - Live counters match the activities present; cumulative counters never
//!   decrease and are the sole source of generated IDs.
//!
//! # Atomicity
//!
//! `insert`, `remove_in` and `truncate_after` work out every new span before
//! touching any state, then commit with steps that cannot fail. A caller
//! holding `&mut Timeline` therefore never observes a half-applied split or
//! merge, and an `Err` leaves the timeline unchanged. Timelines of different
//! machines share nothing and can be mutated independently.

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use serde::Serialize;
use serde::ser::SerializeStruct;

use crate::activity::{Activity, ActivityMut};
use crate::error::{Entity, Result, ScheduleError};
use crate::interval::{Interval, Moment, format_moment};
use crate::kind::{ActivityKind, ActivityKinds};
use crate::types::{ActivityId, MachineId};

/// Per-kind activity counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct KindCounts([u64; 4]);

impl KindCounts {
    const fn get(&self, kind: ActivityKind) -> u64 {
        self.0[kind.index()]
    }

    const fn bump(&mut self, kind: ActivityKind) {
        self.0[kind.index()] += 1;
    }

    const fn drop_one(&mut self, kind: ActivityKind) {
        self.0[kind.index()] -= 1;
    }
}

/// How the gap left by removed activities is closed.
enum Closure {
    /// Predecessor and successor are idle: drop the successor, stretch the
    /// predecessor over everything.
    MergeBoth(Interval),
    /// Stretch the idle predecessor forward.
    ExtendBefore(Interval),
    /// Stretch the idle successor backward.
    ExtendAfter(Interval),
    /// Neither neighbour is idle: splice in a fresh idle span.
    Fill(Interval),
}

/// How the tail vacated by a truncation is closed.
enum Tail {
    /// The last kept activity is idle: stretch it to the horizon end.
    Extend(Interval),
    /// The last kept activity is busy: splice in a fresh idle span.
    Fill(Interval),
}

/// The activity schedule of one machine.
#[derive(Debug, Clone)]
pub struct Timeline {
    machine: MachineId,
    horizon: Interval,
    kinds: Arc<ActivityKinds>,
    order: Vec<ActivityId>,
    activities: HashMap<ActivityId, Activity>,
    live: KindCounts,
    cumulative: KindCounts,
}

impl Timeline {
    /// Creates a timeline holding a single idle activity over `horizon`.
    ///
    /// `horizon` must have a positive duration; callers check it with
    /// `Interval::ensure_horizon`.
    pub(crate) fn new(machine: MachineId, horizon: Interval, kinds: Arc<ActivityKinds>) -> Self {
        let mut timeline = Self {
            machine,
            horizon,
            kinds,
            order: Vec::new(),
            activities: HashMap::new(),
            live: KindCounts::default(),
            cumulative: KindCounts::default(),
        };
        let id = timeline.mint_idle_id(None);
        timeline.splice_idle(0, id, horizon);
        timeline
    }

    pub const fn machine(&self) -> &MachineId {
        &self.machine
    }

    pub const fn horizon(&self) -> &Interval {
        &self.horizon
    }

    pub fn kinds(&self) -> &ActivityKinds {
        &self.kinds
    }

    pub(crate) fn shared_kinds(&self) -> Arc<ActivityKinds> {
        Arc::clone(&self.kinds)
    }

    /// Number of activities currently on the timeline.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Always `false`: a timeline holds at least its idle filler.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Activities of `kind` currently present.
    pub const fn live_count(&self, kind: ActivityKind) -> u64 {
        self.live.get(kind)
    }

    /// Activities of `kind` ever added, including removed ones.
    pub const fn cumulative_count(&self, kind: ActivityKind) -> u64 {
        self.cumulative.get(kind)
    }

    pub fn get(&self, id: &str) -> Option<&Activity> {
        self.activities.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<ActivityMut<'_>> {
        self.activities.get_mut(id).map(ActivityMut::new)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.activities.contains_key(id)
    }

    /// All activities in time order.
    pub fn activities(&self) -> impl DoubleEndedIterator<Item = &Activity> + '_ {
        self.order.iter().map(|id| &self.activities[id])
    }

    pub fn operations(&self) -> impl Iterator<Item = &Activity> + '_ {
        self.activities()
            .filter(|ac| ac.kind() == ActivityKind::Operation)
    }

    /// Operations, breakdowns and setups in time order.
    pub fn non_idle_activities(&self) -> impl Iterator<Item = &Activity> + '_ {
        self.activities().filter(|ac| !ac.is_idle())
    }

    pub fn idle_activities(&self) -> impl Iterator<Item = &Activity> + '_ {
        self.activities().filter(|ac| ac.is_idle())
    }

    /// The ID the next activity of `kind` would be given.
    ///
    /// Format: `<tag>-<machine>-<cumulative count>`. Numbers already taken by
    /// caller-supplied IDs are skipped.
    pub fn next_id(&self, kind: ActivityKind) -> ActivityId {
        self.free_id_from(kind, None).1
    }

    /// IDs of the activities overlapping `query`, in time order.
    ///
    /// An activity is included once `query.start < activity.end`; the scan
    /// stops at the first included activity with `activity.end >= query.end`.
    pub fn activities_overlapping(&self, query: &Interval) -> Result<Vec<&ActivityId>> {
        let range = self.overlapping_range(query)?;
        Ok(self.order[range].iter().collect())
    }

    /// Whether `query` is covered by exactly one idle activity.
    pub fn is_idle_only(&self, query: &Interval) -> Result<bool> {
        let range = self.overlapping_range(query)?;
        Ok(range.len() == 1 && self.at(range.start).is_idle())
    }

    /// Places `activity` on the timeline, splitting the idle span around it.
    ///
    /// The activity's interval must lie inside a single idle activity. A
    /// zero-duration activity is accepted only when anchored exactly at the
    /// horizon end, where it is appended without touching the idle tiling.
    pub fn insert(&mut self, activity: Activity) -> Result<ActivityMut<'_>> {
        if self.activities.contains_key(activity.id()) {
            return Err(ScheduleError::duplicate(Entity::Activity, activity.id()));
        }
        let span = *activity.interval();

        if span.is_empty() && span.start() == self.horizon.end() {
            if activity.is_idle() {
                return Err(ScheduleError::InvalidInterval {
                    start: span.start(),
                    end: span.end(),
                    reason: "idle activities need a positive duration",
                });
            }
            tracing::warn!(
                machine = %self.machine,
                activity = %activity.id(),
                "activity has zero duration at horizon end"
            );
            let pos = self.order.len();
            return Ok(self.splice_activity(pos, activity));
        }

        self.ensure_within(&span)?;
        if span.is_empty() {
            return Err(ScheduleError::InvalidInterval {
                start: span.start(),
                end: span.end(),
                reason: "zero-duration activities must sit at the horizon end",
            });
        }
        if activity.is_idle() {
            return Err(ScheduleError::InvalidInterval {
                start: span.start(),
                end: span.end(),
                reason: "idle time is maintained by the timeline",
            });
        }

        let range = self.overlapping_range(&span)?;
        if range.len() != 1 || !self.at(range.start).is_idle() {
            return Err(ScheduleError::Occupied {
                machine: self.machine.to_string(),
                interval: span,
            });
        }
        let pos = range.start;
        let covering = *self.at(pos).interval();
        let trailing = (covering.end() > span.end())
            .then(|| Interval::new(span.end(), covering.end()))
            .transpose()?;
        let leading = (covering.start() < span.start())
            .then(|| Interval::new(covering.start(), span.start()))
            .transpose()?;

        // Commit.
        let trailing_id = trailing.map(|_| self.mint_idle_id(Some(activity.id())));
        let leading_id = leading.map(|_| self.mint_idle_id(Some(activity.id())));
        self.detach(pos);
        let mut pos = pos;
        if let (Some(id), Some(span)) = (leading_id, leading) {
            self.splice_idle(pos, id, span);
            pos += 1;
        }
        if let (Some(id), Some(span)) = (trailing_id, trailing) {
            self.splice_idle(pos, id, span);
        }
        tracing::debug!(
            machine = %self.machine,
            activity = %activity.id(),
            interval = %span,
            "inserted activity"
        );
        Ok(self.splice_activity(pos, activity))
    }

    /// Removes every activity overlapping `query` and restores idle coverage.
    ///
    /// The vacated span runs from the end of the preceding activity (or the
    /// horizon start) to the start of the following one (or the horizon end)
    /// and is merged with idle neighbours. Returns the removed activities.
    pub fn remove_in(&mut self, query: &Interval) -> Result<Vec<Activity>> {
        let range = self.overlapping_range(query)?;
        if range.is_empty() {
            // Only a zero-length query at the horizon end overlaps nothing.
            return Ok(self.remove_trailing_instants());
        }

        let before = range.start.checked_sub(1);
        let after = (range.end < self.order.len()).then_some(range.end);
        let gap_start = before.map_or(self.horizon.start(), |i| self.at(i).interval().end());
        let gap_end = after.map_or(self.horizon.end(), |i| self.at(i).interval().start());
        let idle_before = before.filter(|&i| self.at(i).is_idle());
        let idle_after = after.filter(|&i| self.at(i).is_idle());

        let closure = match (idle_before, idle_after) {
            (Some(b), Some(a)) => Closure::MergeBoth(Interval::new(
                self.at(b).interval().start(),
                self.at(a).interval().end(),
            )?),
            (Some(b), None) => {
                Closure::ExtendBefore(Interval::new(self.at(b).interval().start(), gap_end)?)
            }
            (None, Some(a)) => {
                Closure::ExtendAfter(Interval::new(gap_start, self.at(a).interval().end())?)
            }
            (None, None) => Closure::Fill(Interval::new(gap_start, gap_end)?),
        };

        // Commit.
        let first = range.start;
        let removed = self.detach_range(range);
        match closure {
            Closure::MergeBoth(span) => {
                self.detach(first);
                self.respan_at(first - 1, span);
            }
            Closure::ExtendBefore(span) => self.respan_at(first - 1, span),
            Closure::ExtendAfter(span) => self.respan_at(first, span),
            Closure::Fill(span) => {
                let id = self.mint_idle_id(None);
                self.splice_idle(first, id, span);
            }
        }
        tracing::debug!(
            machine = %self.machine,
            query = %query,
            removed = removed.len(),
            "removed activities"
        );
        debug_assert!(self.is_tiled());
        Ok(removed)
    }

    /// ID of the activity covering `moment`.
    ///
    /// On a boundary shared by two activities the later one wins. At the
    /// horizon end, the last activity is returned.
    pub fn activity_at(&self, moment: Moment) -> Result<&ActivityId> {
        let idx = self.index_at(moment)?;
        self.order
            .get(idx)
            .or_else(|| self.order.last())
            .ok_or_else(|| ScheduleError::NoActivityAt {
                machine: self.machine.to_string(),
                moment,
            })
    }

    /// Discards everything after `moment`.
    ///
    /// The activity covering `moment` is clipped to end there (or dropped if
    /// it starts there), later activities are removed, and the vacated tail
    /// becomes idle. No-op when `moment` is at or past the horizon end.
    /// Returns the activities removed entirely.
    pub fn truncate_after(&mut self, moment: Moment) -> Result<Vec<Activity>> {
        if moment >= self.horizon.end() {
            return Ok(Vec::new());
        }
        let idx = self.index_at(moment)?;
        let covering = self.at(idx);
        let (cut, clipped) = if covering.interval().start() == moment {
            (idx, None)
        } else if covering.is_idle() {
            (idx + 1, None)
        } else {
            (
                idx + 1,
                Some(Interval::new(covering.interval().start(), moment)?),
            )
        };

        let tail = match cut.checked_sub(1) {
            Some(last) if self.at(last).is_idle() => Tail::Extend(Interval::new(
                self.at(last).interval().start(),
                self.horizon.end(),
            )?),
            Some(last) => {
                let end = clipped.map_or(self.at(last).interval().end(), |c| c.end());
                Tail::Fill(Interval::new(end, self.horizon.end())?)
            }
            None => Tail::Fill(self.horizon),
        };

        // Commit.
        let removed = self.detach_range(cut..self.order.len());
        if let Some(span) = clipped {
            self.respan_at(idx, span);
        }
        match tail {
            Tail::Extend(span) => self.respan_at(cut - 1, span),
            Tail::Fill(span) => {
                let id = self.mint_idle_id(None);
                self.splice_idle(cut, id, span);
            }
        }
        tracing::debug!(
            machine = %self.machine,
            moment = %format_moment(&moment),
            removed = removed.len(),
            "truncated timeline"
        );
        debug_assert!(self.is_tiled());
        Ok(removed)
    }

    /// Idle spans ending at or after `release_date`.
    pub fn idle_spans_from(&self, release_date: Moment) -> Vec<Interval> {
        if release_date > self.horizon.end() {
            return Vec::new();
        }
        self.idle_activities()
            .map(|ac| *ac.interval())
            .filter(|span| span.end() >= release_date)
            .collect()
    }

    /// The most recent activity of `kind`.
    pub fn last_of_kind(&self, kind: ActivityKind) -> Option<&ActivityId> {
        self.activities()
            .rev()
            .find(|ac| ac.kind() == kind)
            .map(Activity::id)
    }

    /// Span of the most recent activity of `kind`, or a zero-length span at
    /// the horizon start if there is none.
    pub fn last_interval_of_kind(&self, kind: ActivityKind) -> Interval {
        self.activities()
            .rev()
            .find(|ac| ac.kind() == kind)
            .map_or(Interval::instant(self.horizon.start()), |ac| *ac.interval())
    }

    /// Checks the tiling, map and counter invariants.
    pub fn is_tiled(&self) -> bool {
        let mut cursor = self.horizon.start();
        let mut previous_idle = false;
        let mut live = KindCounts::default();
        for id in &self.order {
            let Some(ac) = self.activities.get(id) else {
                return false;
            };
            if ac.interval().start() != cursor || (previous_idle && ac.is_idle()) {
                return false;
            }
            cursor = ac.interval().end();
            previous_idle = ac.is_idle();
            live.bump(ac.kind());
        }
        cursor == self.horizon.end() && self.order.len() == self.activities.len() && live == self.live
    }

    fn ensure_within(&self, query: &Interval) -> Result<()> {
        if self.horizon.covers(query) {
            Ok(())
        } else {
            Err(ScheduleError::OutOfHorizon {
                subject: format!("interval {query}"),
                horizon: self.horizon,
            })
        }
    }

    fn ensure_moment(&self, moment: Moment) -> Result<()> {
        if self.horizon.contains(moment) {
            Ok(())
        } else {
            Err(ScheduleError::OutOfHorizon {
                subject: format!("moment {}", format_moment(&moment)),
                horizon: self.horizon,
            })
        }
    }

    fn at(&self, idx: usize) -> &Activity {
        &self.activities[&self.order[idx]]
    }

    /// Index of the first activity ending after `moment`.
    fn index_at(&self, moment: Moment) -> Result<usize> {
        self.ensure_moment(moment)?;
        Ok(self
            .order
            .partition_point(|id| self.activities[id].interval().end() <= moment))
    }

    fn overlapping_range(&self, query: &Interval) -> Result<Range<usize>> {
        self.ensure_within(query)?;
        let first = self
            .order
            .partition_point(|id| self.activities[id].interval().end() <= query.start());
        let mut last = first;
        while last < self.order.len() {
            let end = self.at(last).interval().end();
            last += 1;
            if end >= query.end() {
                break;
            }
        }
        Ok(first..last)
    }

    /// First free generated ID for `kind`, also avoiding `reserved`.
    fn free_id_from(&self, kind: ActivityKind, reserved: Option<&ActivityId>) -> (u64, ActivityId) {
        let tag = self.kinds.tag(kind);
        let mut n = self.cumulative.get(kind);
        loop {
            let id = ActivityId::generated(tag, &self.machine, n);
            if !self.activities.contains_key(&id) && reserved != Some(&id) {
                return (n, id);
            }
            n += 1;
        }
    }

    /// Generates a fresh idle ID, advancing the cumulative counter past it.
    fn mint_idle_id(&mut self, reserved: Option<&ActivityId>) -> ActivityId {
        let (n, id) = self.free_id_from(ActivityKind::Idle, reserved);
        self.cumulative.0[ActivityKind::Idle.index()] = n + 1;
        id
    }

    fn splice_idle(&mut self, pos: usize, id: ActivityId, span: Interval) {
        self.order.insert(pos, id.clone());
        self.activities.insert(id.clone(), Activity::idle(id, span));
        self.live.bump(ActivityKind::Idle);
    }

    fn splice_activity(&mut self, pos: usize, activity: Activity) -> ActivityMut<'_> {
        let kind = activity.kind();
        let id = activity.id().clone();
        self.order.insert(pos, id.clone());
        self.live.bump(kind);
        self.cumulative.bump(kind);
        ActivityMut::new(self.activities.entry(id).or_insert(activity))
    }

    fn respan_at(&mut self, idx: usize, span: Interval) {
        if let Some(ac) = self.activities.get_mut(&self.order[idx]) {
            ac.set_interval(span);
        }
    }

    fn detach(&mut self, idx: usize) -> Option<Activity> {
        let id = self.order.remove(idx);
        let ac = self.activities.remove(&id)?;
        self.live.drop_one(ac.kind());
        Some(ac)
    }

    fn detach_range(&mut self, range: Range<usize>) -> Vec<Activity> {
        let activities = &mut self.activities;
        let removed: Vec<Activity> = self
            .order
            .drain(range)
            .filter_map(|id| activities.remove(&id))
            .collect();
        for ac in &removed {
            self.live.drop_one(ac.kind());
        }
        removed
    }

    fn remove_trailing_instants(&mut self) -> Vec<Activity> {
        let mut removed = Vec::new();
        while self.order.len() > 1 {
            let last = self.at(self.order.len() - 1);
            if last.is_idle() || !last.interval().is_empty() {
                break;
            }
            if let Some(ac) = self.detach(self.order.len() - 1) {
                removed.push(ac);
            }
        }
        removed.reverse();
        removed
    }
}

impl fmt::Display for Timeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, ac) in self.activities().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{ac}")?;
        }
        Ok(())
    }
}

impl Serialize for Timeline {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("Timeline", 3)?;
        state.serialize_field("machine", &self.machine)?;
        state.serialize_field("horizon", &self.horizon)?;
        state.serialize_field("activities", &self.activities().collect::<Vec<_>>())?;
        state.end()
    }
}
