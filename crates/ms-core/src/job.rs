//! Jobs and the operation references they hold.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::activity::{Contents, Scalar};
use crate::error::{Entity, Result, ScheduleError};
use crate::types::{ActivityId, JobId, MachineId};

/// Locates one operation: the machine whose timeline holds it and its ID
/// there.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationRef {
    pub machine: MachineId,
    pub activity: ActivityId,
}

impl OperationRef {
    pub const fn new(machine: MachineId, activity: ActivityId) -> Self {
        Self { machine, activity }
    }
}

impl fmt::Display for OperationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.activity, self.machine)
    }
}

/// A unit of work made of operations spread over machines.
///
/// The job does not own its operations; it lists where to find them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    id: JobId,
    operations: Vec<OperationRef>,
    #[serde(skip_serializing_if = "Contents::is_empty")]
    contents: Contents,
}

impl Job {
    pub fn new(id: JobId) -> Self {
        Self {
            id,
            operations: Vec::new(),
            contents: Contents::new(),
        }
    }

    pub const fn id(&self) -> &JobId {
        &self.id
    }

    pub const fn contents(&self) -> &Contents {
        &self.contents
    }

    pub fn add_annotation(&mut self, key: impl Into<String>, value: impl Into<Scalar>) {
        self.contents.insert(key.into(), value.into());
    }

    /// Operation references in the order they were added.
    pub fn operations(&self) -> impl ExactSizeIterator<Item = &OperationRef> + '_ {
        self.operations.iter()
    }

    pub fn has_operation(&self, op: &OperationRef) -> bool {
        self.operations.contains(op)
    }

    pub(crate) fn add_operation(&mut self, op: OperationRef) -> Result<()> {
        if self.has_operation(&op) {
            return Err(ScheduleError::duplicate(Entity::Operation, &op));
        }
        self.operations.push(op);
        Ok(())
    }

    pub(crate) fn remove_operation(&mut self, op: &OperationRef) -> Result<()> {
        let Some(pos) = self.operations.iter().position(|o| o == op) else {
            return Err(ScheduleError::unknown(Entity::Operation, op));
        };
        self.operations.remove(pos);
        Ok(())
    }

    /// Copy with the same ID and contents and only the references `keep`
    /// accepts.
    pub(crate) fn filtered(&self, keep: impl Fn(&OperationRef) -> bool) -> Self {
        Self {
            id: self.id.clone(),
            operations: self.operations.iter().filter(|op| keep(op)).cloned().collect(),
            contents: self.contents.clone(),
        }
    }
}
