use crate::config::SpawnStrategy;
use crate::error::spawn::SpawnError;

use common::ErrorLocation;

use std::panic::Location;
use std::path::PathBuf;

use serde::Serialize;

/// Description of a worker that completed its handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerInfo {
    pub pid: u32,
    pub strategy: SpawnStrategy,
    /// Worker host program, for exec'd workers.
    pub program: Option<PathBuf>,
    /// Registered target name; `None` for local constructors.
    pub target: Option<String>,
}

/// Builder for creating validated WorkerInfo instances.
#[derive(Debug, Default)]
pub struct WorkerInfoBuilder {
    pid: Option<u32>,
    strategy: Option<SpawnStrategy>,
    program: Option<PathBuf>,
    target: Option<String>,
}

impl WorkerInfoBuilder {
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    pub fn with_strategy(mut self, strategy: SpawnStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = Some(program.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Build the WorkerInfo with validation.
    #[track_caller]
    pub fn build(self) -> Result<WorkerInfo, SpawnError> {
        let pid = self.pid.ok_or_else(|| SpawnError::Validation {
            message: String::from("PID is required"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        if pid == 0 {
            return Err(SpawnError::Validation {
                message: String::from("PID must be non-zero"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let strategy = self.strategy.ok_or_else(|| SpawnError::Validation {
            message: String::from("Spawn strategy is required"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        if strategy == SpawnStrategy::Exec && self.program.is_none() {
            return Err(SpawnError::Validation {
                message: String::from("Exec'd workers must record their program"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        if let Some(target) = &self.target
            && target.is_empty()
        {
            return Err(SpawnError::Validation {
                message: String::from("Target name cannot be empty"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        Ok(WorkerInfo {
            pid,
            strategy,
            program: self.program,
            target: self.target,
        })
    }
}
