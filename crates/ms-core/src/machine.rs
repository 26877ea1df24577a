//! A machine: one timeline plus free-form metadata.

use std::sync::Arc;

use chrono::TimeDelta;
use serde::Serialize;

use crate::activity::{Activity, Contents, Scalar};
use crate::interval::{Interval, Moment};
use crate::kind::ActivityKinds;
use crate::timeline::Timeline;
use crate::types::MachineId;

/// A resource whose time is recorded on its own [`Timeline`].
#[derive(Debug, Clone, Serialize)]
pub struct Machine {
    id: MachineId,
    #[serde(skip_serializing_if = "Contents::is_empty")]
    contents: Contents,
    timeline: Timeline,
}

impl Machine {
    pub(crate) fn new(id: MachineId, horizon: Interval, kinds: Arc<ActivityKinds>) -> Self {
        let timeline = Timeline::new(id.clone(), horizon, kinds);
        Self {
            id,
            contents: Contents::new(),
            timeline,
        }
    }

    pub const fn id(&self) -> &MachineId {
        &self.id
    }

    pub const fn contents(&self) -> &Contents {
        &self.contents
    }

    pub fn add_annotation(&mut self, key: impl Into<String>, value: impl Into<Scalar>) {
        self.contents.insert(key.into(), value.into());
    }

    pub const fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub(crate) const fn timeline_mut(&mut self) -> &mut Timeline {
        &mut self.timeline
    }

    /// Replaces the timeline with a single idle span over `horizon`.
    ///
    /// Every activity on the old timeline is discarded.
    pub(crate) fn reset_schedule(&mut self, horizon: Interval) {
        let kinds = self.timeline.shared_kinds();
        self.timeline = Timeline::new(self.id.clone(), horizon, kinds);
    }

    pub fn activities(&self) -> impl DoubleEndedIterator<Item = &Activity> + '_ {
        self.timeline.activities()
    }

    pub fn operations(&self) -> impl Iterator<Item = &Activity> + '_ {
        self.timeline.operations()
    }

    pub fn non_idle_activities(&self) -> impl Iterator<Item = &Activity> + '_ {
        self.timeline.non_idle_activities()
    }

    pub fn idle_activities(&self) -> impl Iterator<Item = &Activity> + '_ {
        self.timeline.idle_activities()
    }

    /// `(start, duration)` of every activity in time order, for drawing
    /// horizontal Gantt bars.
    pub fn bars(&self) -> impl Iterator<Item = (Moment, TimeDelta)> + '_ {
        self.activities().map(|ac| ac.interval().start_duration())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::ActivityKind;
    use crate::testing::span;
    use crate::types::ActivityId;

    fn machine() -> Machine {
        Machine::new(
            MachineId::new("M1").unwrap(),
            span(0, 20),
            Arc::new(ActivityKinds::default()),
        )
    }

    fn place_breakdown(mc: &mut Machine, start: i64, end: i64) {
        let down = Activity::breakdown(
            ActivityId::new(format!("down-{start}")).unwrap(),
            mc.id().clone(),
            span(start, end),
        );
        mc.timeline_mut().insert(down).unwrap();
    }

    #[test]
    fn new_machine_is_idle_over_horizon() {
        let mc = machine();
        assert_eq!(mc.activities().count(), 1);
        assert_eq!(mc.idle_activities().count(), 1);
        assert_eq!(mc.non_idle_activities().count(), 0);
        assert_eq!(*mc.timeline().horizon(), span(0, 20));
    }

    #[test]
    fn reset_schedule_discards_activities() {
        let mut mc = machine();
        place_breakdown(&mut mc, 4, 8);
        assert_eq!(mc.non_idle_activities().count(), 1);

        mc.reset_schedule(span(2, 6));
        assert_eq!(mc.non_idle_activities().count(), 0);
        assert_eq!(*mc.timeline().horizon(), span(2, 6));
        assert_eq!(mc.timeline().cumulative_count(ActivityKind::Breakdown), 0);
        assert!(mc.timeline().is_tiled());
    }

    #[test]
    fn bars_follow_time_order() {
        let mut mc = machine();
        place_breakdown(&mut mc, 4, 8);
        let bars: Vec<(i64, i64)> = mc
            .bars()
            .map(|(start, duration)| (start.timestamp(), duration.num_seconds()))
            .collect();
        assert_eq!(bars, [(0, 4), (4, 4), (8, 12)]);
    }

    #[test]
    fn serializes_contents_and_activities() {
        let mut mc = machine();
        mc.add_annotation("cell", "north");
        let json = serde_json::to_value(&mc).unwrap();
        assert_eq!(json["id"], "M1");
        assert_eq!(json["contents"]["cell"], "north");
        assert_eq!(json["timeline"]["activities"].as_array().unwrap().len(), 1);
    }
}
