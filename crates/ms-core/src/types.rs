//! Validated identifier newtypes.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for identifiers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },
}

/// Declares a non-empty string ID newtype usable as a `&str`-keyed map key.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $label:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Fails with [`ValidationError::Empty`] on an empty string.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.is_empty() {
                    Err(ValidationError::Empty { field: $label })
                } else {
                    Ok(Self(id))
                }
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = ValidationError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        // Lets `HashMap<$name, _>` be queried with a plain `&str`.
        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// A validated schedule identifier.
    ScheduleId, "schedule ID"
);

define_string_id!(
    /// A validated machine identifier.
    ///
    /// Machine IDs are unique within one schedule and appear inside every
    /// activity ID generated on that machine's timeline.
    MachineId, "machine ID"
);

define_string_id!(
    /// A validated job identifier.
    JobId, "job ID"
);

define_string_id!(
    /// A validated activity identifier.
    ///
    /// Unique within one timeline. Generated IDs have the form
    /// `<tag>-<machine>-<n>`; callers may also supply their own.
    ActivityId, "activity ID"
);

impl ActivityId {
    /// Timeline-generated ID. Never empty: the machine ID is always present.
    pub(crate) fn generated(tag: &str, machine: &MachineId, n: u64) -> Self {
        Self(format!("{tag}-{machine}-{n}"))
    }
}
