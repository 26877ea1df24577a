//! Closed time ranges with validated mutation and intersection math.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Bound, Result, ScheduleError};

/// A point in time on a schedule.
pub type Moment = DateTime<Utc>;

/// Formats a moment as RFC 3339 with second precision (`2020-07-06T08:00:00Z`).
pub fn format_moment(moment: &Moment) -> String {
    moment.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// A time range with `start <= end`.
///
/// Bounds can only be moved through [`Interval::change_start`] and
/// [`Interval::change_end`], each of which checks the new value against the
/// bound that stays put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawInterval")]
pub struct Interval {
    start: Moment,
    end: Moment,
}

#[derive(Deserialize)]
struct RawInterval {
    start: Moment,
    end: Moment,
}

impl TryFrom<RawInterval> for Interval {
    type Error = ScheduleError;

    fn try_from(raw: RawInterval) -> Result<Self> {
        Self::new(raw.start, raw.end)
    }
}

/// How an activity is reconciled with a narrower horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    /// Clip the activity to its intersection with the horizon.
    Trim,
    /// Drop any activity not fully contained in the horizon.
    Exclude,
    /// Keep activities sticking out of the horizon. Not supported: the idle
    /// fill of the result could not be kept consistent.
    Include,
}

impl OverlapPolicy {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Trim => "trim",
            Self::Exclude => "exclude",
            Self::Include => "include",
        }
    }
}

impl fmt::Display for OverlapPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OverlapPolicy {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "trim" => Ok(Self::Trim),
            "exclude" => Ok(Self::Exclude),
            "include" => Ok(Self::Include),
            _ => Err(ScheduleError::UnsupportedPolicy(s.to_string())),
        }
    }
}

impl Interval {
    /// Creates an interval, failing with `InvalidInterval` if `start > end`.
    pub fn new(start: Moment, end: Moment) -> Result<Self> {
        if start > end {
            return Err(ScheduleError::InvalidInterval {
                start,
                end,
                reason: "start after end",
            });
        }
        Ok(Self { start, end })
    }

    /// Checks that the range can serve as a horizon: idle filler over it
    /// needs a positive duration.
    pub(crate) fn ensure_horizon(self) -> Result<Self> {
        if self.is_empty() {
            return Err(ScheduleError::InvalidInterval {
                start: self.start,
                end: self.end,
                reason: "horizon needs a positive duration",
            });
        }
        Ok(self)
    }

    /// A zero-length interval at `moment`.
    pub const fn instant(moment: Moment) -> Self {
        Self {
            start: moment,
            end: moment,
        }
    }

    pub const fn start(&self) -> Moment {
        self.start
    }

    pub const fn end(&self) -> Moment {
        self.end
    }

    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `moment` lies in the range, both ends included.
    pub fn contains(&self, moment: Moment) -> bool {
        self.start <= moment && moment <= self.end
    }

    /// Whether `other` lies entirely inside this interval.
    pub fn covers(&self, other: &Self) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Whether the two ranges do not overlap. Touching endpoints count as
    /// distinct.
    pub fn is_distinct(&self, other: &Self) -> bool {
        self.end <= other.start || other.end <= self.start
    }

    /// The overlapping part of two ranges, `None` if they are distinct.
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        if self.is_distinct(other) {
            return None;
        }
        Some(Self {
            start: self.start.max(other.start),
            end: self.end.min(other.end),
        })
    }

    /// Moves the start, failing with `InvalidRange` if it would pass the end.
    pub fn change_start(&mut self, start: Moment) -> Result<()> {
        if start > self.end {
            return Err(ScheduleError::InvalidRange {
                bound: Bound::Start,
                value: start,
                interval: *self,
            });
        }
        self.start = start;
        Ok(())
    }

    /// Moves the end, failing with `InvalidRange` if it would precede the start.
    pub fn change_end(&mut self, end: Moment) -> Result<()> {
        if end < self.start {
            return Err(ScheduleError::InvalidRange {
                bound: Bound::End,
                value: end,
                interval: *self,
            });
        }
        self.end = end;
        Ok(())
    }

    /// `(start, duration)`, the shape a horizontal Gantt bar is drawn from.
    pub fn start_duration(&self) -> (Moment, TimeDelta) {
        (self.start, self.duration())
    }

    /// The smallest interval covering every span, `None` if there are none.
    pub fn enclosing<I>(spans: I) -> Option<Self>
    where
        I: IntoIterator<Item = Self>,
    {
        spans.into_iter().reduce(|acc, span| Self {
            start: acc.start.min(span.start),
            end: acc.end.max(span.end),
        })
    }

    /// Reconciles this interval with `horizon` under `policy`.
    ///
    /// `Ok(None)` means the interval has no place in the horizon.
    pub fn fit_to(&self, horizon: &Self, policy: OverlapPolicy) -> Result<Option<Self>> {
        match policy {
            OverlapPolicy::Trim => Ok(self.intersect(horizon)),
            OverlapPolicy::Exclude => Ok(horizon.covers(self).then_some(*self)),
            OverlapPolicy::Include => Err(ScheduleError::UnsupportedPolicy(
                policy.as_str().to_string(),
            )),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}]",
            format_moment(&self.start),
            format_moment(&self.end)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{at, span};

    #[test]
    fn new_rejects_inverted_bounds() {
        let err = Interval::new(at(5), at(2)).unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidInterval { .. }));
        assert!(Interval::new(at(2), at(2)).is_ok());
    }

    #[test]
    fn horizon_needs_positive_duration() {
        assert_eq!(span(2, 5).ensure_horizon().unwrap(), span(2, 5));
        assert!(matches!(
            span(5, 5).ensure_horizon(),
            Err(ScheduleError::InvalidInterval { .. })
        ));
    }

    #[test]
    fn duration_and_contains() {
        let i = span(2, 10);
        assert_eq!(i.duration(), TimeDelta::seconds(8));
        assert!(i.contains(at(2)));
        assert!(i.contains(at(10)));
        assert!(!i.contains(at(11)));
        assert!(!i.contains(at(1)));
    }

    #[test]
    fn touching_ranges_are_distinct() {
        assert!(span(2, 5).is_distinct(&span(5, 8)));
        assert!(span(5, 8).is_distinct(&span(2, 5)));
        assert!(!span(2, 6).is_distinct(&span(5, 8)));
        assert!(span(0, 1).is_distinct(&span(3, 4)));
    }

    #[test]
    fn intersect_returns_overlap_or_none() {
        assert_eq!(span(2, 10).intersect(&span(9, 11)), Some(span(9, 10)));
        assert_eq!(span(2, 10).intersect(&span(4, 6)), Some(span(4, 6)));
        assert_eq!(span(2, 10).intersect(&span(10, 12)), None);
        assert_eq!(span(2, 10).intersect(&span(11, 12)), None);
    }

    #[test]
    fn change_bounds_validates_against_other_bound() {
        let mut i = span(2, 5);
        i.change_start(at(4)).unwrap();
        assert_eq!(i, span(4, 5));
        i.change_end(at(6)).unwrap();
        assert_eq!(i, span(4, 6));

        let err = i.change_start(at(7)).unwrap_err();
        assert!(matches!(
            err,
            ScheduleError::InvalidRange {
                bound: Bound::Start,
                ..
            }
        ));
        let err = i.change_end(at(1)).unwrap_err();
        assert!(matches!(
            err,
            ScheduleError::InvalidRange {
                bound: Bound::End,
                ..
            }
        ));
        assert_eq!(i, span(4, 6));

        // Collapsing to zero length is allowed.
        i.change_end(at(4)).unwrap();
        assert!(i.is_empty());
    }

    #[test]
    fn enclosing_spans_all_inputs() {
        let spans = [span(4, 8), span(1, 3), span(6, 12)];
        assert_eq!(Interval::enclosing(spans), Some(span(1, 12)));
        assert_eq!(Interval::enclosing(Vec::new()), None);
    }

    #[test]
    fn fit_to_applies_policy() {
        let horizon = span(2, 6);
        assert_eq!(
            span(1, 3).fit_to(&horizon, OverlapPolicy::Trim).unwrap(),
            Some(span(2, 3))
        );
        assert_eq!(
            span(1, 3).fit_to(&horizon, OverlapPolicy::Exclude).unwrap(),
            None
        );
        assert_eq!(
            span(3, 4).fit_to(&horizon, OverlapPolicy::Exclude).unwrap(),
            Some(span(3, 4))
        );
        assert_eq!(
            span(7, 9).fit_to(&horizon, OverlapPolicy::Trim).unwrap(),
            None
        );
        assert!(matches!(
            span(3, 4).fit_to(&horizon, OverlapPolicy::Include),
            Err(ScheduleError::UnsupportedPolicy(p)) if p == "include"
        ));
    }

    #[test]
    fn overlap_policy_parses() {
        assert_eq!("trim".parse::<OverlapPolicy>().unwrap(), OverlapPolicy::Trim);
        assert_eq!(
            "exclude".parse::<OverlapPolicy>().unwrap(),
            OverlapPolicy::Exclude
        );
        assert!(matches!(
            "stretch".parse::<OverlapPolicy>(),
            Err(ScheduleError::UnsupportedPolicy(_))
        ));
    }

    #[test]
    fn serde_rejects_inverted_interval() {
        let json = serde_json::to_string(&span(1, 3)).unwrap();
        assert_eq!(
            json,
            r#"{"start":"1970-01-01T00:00:01Z","end":"1970-01-01T00:00:03Z"}"#
        );
        let parsed: Interval = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, span(1, 3));

        let inverted = r#"{"start":"1970-01-01T00:00:05Z","end":"1970-01-01T00:00:03Z"}"#;
        assert!(serde_json::from_str::<Interval>(inverted).is_err());
    }

    #[test]
    fn display_uses_rfc3339_seconds() {
        assert_eq!(
            span(0, 90).to_string(),
            "[1970-01-01T00:00:00Z, 1970-01-01T00:01:30Z]"
        );
    }
}
