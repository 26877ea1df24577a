//! Activity kinds and the display vocabulary that names them.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ScheduleError;

/// The four states an instant of a machine's horizon can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActivityKind {
    Idle,
    Operation,
    Breakdown,
    Setup,
}

impl ActivityKind {
    pub const ALL: [Self; 4] = [Self::Idle, Self::Operation, Self::Breakdown, Self::Setup];

    /// Canonical role name, also the vocabulary key.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Operation => "operation",
            Self::Breakdown => "breakdown",
            Self::Setup => "setup",
        }
    }

    pub(crate) const fn index(self) -> usize {
        match self {
            Self::Idle => 0,
            Self::Operation => 1,
            Self::Breakdown => 2,
            Self::Setup => 3,
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ActivityKind {
    type Err = UnknownActivityKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(Self::Idle),
            "operation" => Ok(Self::Operation),
            "breakdown" => Ok(Self::Breakdown),
            "setup" => Ok(Self::Setup),
            _ => Err(UnknownActivityKind(s.to_string())),
        }
    }
}

impl Serialize for ActivityKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ActivityKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error type for unknown activity kind strings.
#[derive(Debug, Clone)]
pub struct UnknownActivityKind(String);

impl fmt::Display for UnknownActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown activity kind: {}", self.0)
    }
}

impl std::error::Error for UnknownActivityKind {}

/// Maps each activity role to the display tag used in IDs and charts.
///
/// Read from a flat string map such as
/// `{"idle": "Idle", "operation": "Op", "breakdown": "Down"}`. The `idle` key
/// is mandatory; a missing optional role is tagged with its own name. The
/// `_comment` key is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct ActivityKinds {
    tags: [String; 4],
}

impl Default for ActivityKinds {
    fn default() -> Self {
        Self {
            tags: ActivityKind::ALL.map(|kind| kind.as_str().to_string()),
        }
    }
}

impl ActivityKinds {
    /// Builds a vocabulary from `(role, tag)` pairs.
    pub fn from_map(map: BTreeMap<String, String>) -> Result<Self, ScheduleError> {
        if !map.contains_key(ActivityKind::Idle.as_str()) {
            return Err(ScheduleError::MissingIdleKind);
        }
        let mut kinds = Self::default();
        for (key, tag) in map {
            if key == "_comment" {
                continue;
            }
            match key.parse::<ActivityKind>() {
                Ok(kind) => kinds.tags[kind.index()] = tag,
                Err(_) => tracing::debug!(key = %key, "ignoring unknown activity kind"),
            }
        }
        Ok(kinds)
    }

    /// Display tag for `kind`.
    pub fn tag(&self, kind: ActivityKind) -> &str {
        &self.tags[kind.index()]
    }

    /// Reverse lookup of a display tag.
    pub fn kind_of(&self, tag: &str) -> Option<ActivityKind> {
        ActivityKind::ALL
            .into_iter()
            .find(|kind| self.tags[kind.index()] == tag)
    }

    pub fn is_idle(&self, tag: &str) -> bool {
        self.kind_of(tag) == Some(ActivityKind::Idle)
    }
}

impl TryFrom<BTreeMap<String, String>> for ActivityKinds {
    type Error = ScheduleError;

    fn try_from(map: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        Self::from_map(map)
    }
}

impl From<ActivityKinds> for BTreeMap<String, String> {
    fn from(kinds: ActivityKinds) -> Self {
        ActivityKind::ALL
            .into_iter()
            .map(|kind| (kind.as_str().to_string(), kinds.tag(kind).to_string()))
            .collect()
    }
}
