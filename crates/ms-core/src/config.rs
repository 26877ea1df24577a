//! Schedule configuration loading.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml};
use serde::{Deserialize, Serialize};

use crate::error::{Bound, Result, ScheduleError};
use crate::interval::{Interval, Moment};
use crate::kind::ActivityKinds;
use crate::schedule::Schedule;

/// Settings for building an empty schedule.
///
/// ```toml
/// name = "week-28"
///
/// [horizon]
/// start = "2020-07-06T00:00:00Z"
///
/// [kinds]
/// _comment = "display tags"
/// idle = "Idle"
/// operation = "Op"
/// breakdown = "Brkdwn"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub name: String,
    #[serde(default)]
    pub horizon: HorizonConfig,
    /// Kept out of the serialized defaults so a supplied `[kinds]` table is
    /// validated on its own and must name `idle`.
    #[serde(default, skip_serializing)]
    pub kinds: ActivityKinds,
}

/// Horizon bounds; omitted ones are derived from the activities to import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HorizonConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<Moment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<Moment>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            name: "schedule".to_string(),
            horizon: HorizonConfig::default(),
            kinds: ActivityKinds::default(),
        }
    }
}

impl ScheduleConfig {
    /// Loads configuration from default locations.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Loads configuration, optionally from a specific `.toml` or `.json`
    /// file.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            let is_json = path.extension().is_some_and(|ext| ext == "json");
            figment = if is_json {
                figment.merge(Json::file(path))
            } else {
                figment.merge(Toml::file(path))
            };
        }

        // Load from environment variables (MS_*, MS_HORIZON__START, ...)
        figment = figment.merge(Env::prefixed("MS_").split("__"));

        let config: Self = figment.extract()?;
        tracing::debug!(name = %config.name, "loaded schedule config");
        Ok(config)
    }

    /// Builds an empty schedule over the resolved horizon.
    pub fn build<I>(&self, spans: I) -> Result<Schedule>
    where
        I: IntoIterator<Item = Interval>,
    {
        let horizon = self.horizon.resolve(spans)?;
        Schedule::new(&self.name, horizon, self.kinds.clone())
    }
}

impl HorizonConfig {
    /// Fills omitted bounds from the earliest start and latest end of
    /// `spans`. The result must have a positive duration.
    pub fn resolve<I>(&self, spans: I) -> Result<Interval>
    where
        I: IntoIterator<Item = Interval>,
    {
        let derived = match (self.start, self.end) {
            (Some(_), Some(_)) => None,
            _ => Interval::enclosing(spans),
        };
        let start = self
            .start
            .or_else(|| derived.map(|span| span.start()))
            .ok_or(ScheduleError::UnboundedHorizon(Bound::Start))?;
        let end = self
            .end
            .or_else(|| derived.map(|span| span.end()))
            .ok_or(ScheduleError::UnboundedHorizon(Bound::End))?;
        Interval::new(start, end)?.ensure_horizon()
    }
}

/// Returns the platform-specific config directory for ms.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("ms"))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::kind::ActivityKind;
    use crate::testing::{at, span};

    #[test]
    fn test_dirs_config_path_ends_with_ms() {
        if let Some(path) = dirs_config_path() {
            assert_eq!(path.file_name().unwrap(), "ms");
        }
    }

    #[test]
    fn test_default_config_uses_role_names() {
        let config = ScheduleConfig::default();
        assert_eq!(config.name, "schedule");
        assert_eq!(config.horizon, HorizonConfig::default());
        assert_eq!(config.kinds.tag(ActivityKind::Breakdown), "breakdown");
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schedule.toml");
        fs::write(
            &path,
            r#"
name = "week-28"

[horizon]
start = "2020-07-06T00:00:00Z"
end = "2020-07-11T00:00:00Z"

[kinds]
_comment = "display tags"
idle = "Idle"
breakdown = "Brkdwn"
"#,
        )
        .unwrap();

        let config = ScheduleConfig::load_from(Some(&path)).unwrap();
        assert_eq!(config.name, "week-28");
        assert_eq!(config.kinds.tag(ActivityKind::Idle), "Idle");
        assert_eq!(config.kinds.tag(ActivityKind::Breakdown), "Brkdwn");
        let horizon = config.horizon.resolve(Vec::new()).unwrap();
        assert_eq!(horizon.duration().num_days(), 5);
    }

    #[test]
    fn test_load_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schedule.json");
        fs::write(
            &path,
            r#"{"name": "json-week", "kinds": {"idle": "I", "operation": "O", "setup": "S"}}"#,
        )
        .unwrap();

        let config = ScheduleConfig::load_from(Some(&path)).unwrap();
        assert_eq!(config.name, "json-week");
        assert_eq!(config.kinds.tag(ActivityKind::Operation), "O");
        assert_eq!(config.kinds.tag(ActivityKind::Setup), "S");
    }

    #[test]
    fn test_load_from_rejects_bad_horizon() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schedule.toml");
        fs::write(&path, "name = \"x\"\n[horizon]\nstart = \"monday\"\n").unwrap();

        let err = ScheduleConfig::load_from(Some(&path)).unwrap_err();
        assert!(matches!(err, ScheduleError::Config(_)));
    }

    #[test]
    fn test_load_from_requires_idle_kind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schedule.toml");
        fs::write(&path, "name = \"x\"\n[kinds]\noperation = \"Op\"\n").unwrap();

        let err = ScheduleConfig::load_from(Some(&path)).unwrap_err();
        assert!(matches!(err, ScheduleError::Config(_)));
        assert!(err.to_string().contains("idle"), "{err}");
    }

    #[test]
    fn test_load_from_without_kinds_uses_role_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schedule.toml");
        fs::write(&path, "name = \"plain\"\n").unwrap();

        let config = ScheduleConfig::load_from(Some(&path)).unwrap();
        assert_eq!(config.kinds, ActivityKinds::default());
    }

    #[test]
    fn test_resolve_derives_missing_bounds() {
        let partial = HorizonConfig {
            start: Some(at(0)),
            end: None,
        };
        let spans = [span(4, 8), span(1, 3), span(6, 12)];
        assert_eq!(partial.resolve(spans).unwrap(), span(0, 12));
        assert_eq!(HorizonConfig::default().resolve(spans).unwrap(), span(1, 12));
    }

    #[test]
    fn test_resolve_needs_bounds_or_spans() {
        let err = HorizonConfig::default().resolve(Vec::new()).unwrap_err();
        assert!(matches!(err, ScheduleError::UnboundedHorizon(Bound::Start)));

        let inverted = HorizonConfig {
            start: Some(at(20)),
            end: None,
        };
        let err = inverted.resolve([span(1, 3)]).unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidInterval { .. }));

        let flat = HorizonConfig {
            start: Some(at(3)),
            end: None,
        };
        let err = flat.resolve([span(1, 3)]).unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidInterval { .. }));
    }

    #[test]
    fn test_build_creates_empty_schedule() {
        let config = ScheduleConfig {
            name: "week-28".to_string(),
            horizon: HorizonConfig {
                start: Some(at(0)),
                end: Some(at(20)),
            },
            kinds: ActivityKinds::default(),
        };
        let schedule = config.build(Vec::new()).unwrap();
        assert_eq!(schedule.id().as_str(), "week-28");
        assert_eq!(*schedule.horizon(), span(0, 20));
        assert_eq!(schedule.machines().len(), 0);
    }
}
