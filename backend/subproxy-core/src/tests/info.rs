use crate::config::SpawnStrategy;
use crate::error::spawn::SpawnError;
use crate::lifecycle::info::WorkerInfoBuilder;

use std::path::PathBuf;

/// **VALUE**: Verifies that a complete exec description builds.
#[test]
fn given_all_fields_when_building_then_worker_info_created() {
    // GIVEN / WHEN: A full builder
    let info = WorkerInfoBuilder::default()
        .with_pid(4242)
        .with_strategy(SpawnStrategy::Exec)
        .with_program("/usr/bin/subproxy-host")
        .with_target("runner")
        .build()
        .expect("valid info");

    // THEN: Fields copied
    assert_eq!(info.pid, 4242);
    assert_eq!(info.strategy, SpawnStrategy::Exec);
    assert_eq!(info.program, Some(PathBuf::from("/usr/bin/subproxy-host")));
    assert_eq!(info.target.as_deref(), Some("runner"));
}

/// **VALUE**: Verifies that a forked worker of a local constructor needs neither program nor
/// target name.
#[test]
fn given_fork_without_program_when_building_then_accepted() {
    let info = WorkerInfoBuilder::default()
        .with_pid(7)
        .with_strategy(SpawnStrategy::Fork)
        .build()
        .expect("valid info");

    assert!(info.program.is_none());
    assert!(info.target.is_none());
}

/// **VALUE**: Verifies each validation rule of the builder.
///
/// **WHY THIS MATTERS**: `WorkerInfo` is what callers use to find and signal the worker; a
/// zero PID would make `kill(0, ...)` hit the whole process group.
///
/// **BUG THIS CATCHES**: Would catch a removed PID check or a missing required field.
#[test]
fn given_incomplete_builders_when_building_then_validation_errors() {
    let cases = [
        WorkerInfoBuilder::default().with_strategy(SpawnStrategy::Fork),
        WorkerInfoBuilder::default()
            .with_pid(0)
            .with_strategy(SpawnStrategy::Fork),
        WorkerInfoBuilder::default().with_pid(1),
        WorkerInfoBuilder::default()
            .with_pid(1)
            .with_strategy(SpawnStrategy::Exec),
        WorkerInfoBuilder::default()
            .with_pid(1)
            .with_strategy(SpawnStrategy::Fork)
            .with_target(""),
    ];

    for builder in cases {
        let err = builder.build().expect_err("should be invalid");
        assert!(matches!(err, SpawnError::Validation { .. }), "got {err:?}");
        assert!(err.to_string().starts_with("Validation Error:"));
    }
}
