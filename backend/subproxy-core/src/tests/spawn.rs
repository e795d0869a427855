use crate::WORKER_FLAG;
use crate::lifecycle::process::is_running;
use crate::lifecycle::spawn::build_worker_command;
use crate::worker::is_worker_invocation;

use std::path::Path;

/// **VALUE**: Verifies that the exec command runs the given program with the worker flag.
///
/// **WHY THIS MATTERS**: A worker host only switches into worker mode when it sees the flag;
/// without it the host would run its normal `main` and never answer the handshake.
///
/// **BUG THIS CATCHES**: Would catch the flag being dropped or the program being replaced.
#[test]
fn given_program_when_build_worker_command_called_then_passes_worker_flag() {
    // GIVEN: A worker host path
    let program = Path::new("/opt/app/worker-host");

    // WHEN: Building the command
    let cmd = build_worker_command(program);

    // THEN: Program and single flag argument
    assert_eq!(cmd.get_program(), program.as_os_str());
    let args: Vec<_> = cmd.get_args().collect();
    assert_eq!(args, vec![WORKER_FLAG]);
}

/// **VALUE**: Verifies worker-mode detection ignores the program name itself.
#[test]
fn given_argument_lists_when_checked_then_only_flag_selects_worker_mode() {
    assert!(is_worker_invocation(["host", WORKER_FLAG]));
    assert!(!is_worker_invocation(["host"]));
    assert!(!is_worker_invocation([WORKER_FLAG]));
    assert!(!is_worker_invocation(["host", "--subproxy-workers"]));
}

/// **VALUE**: Verifies that the liveness check sees the current process and not a bogus PID.
#[test]
fn given_pids_when_checking_liveness_then_current_process_is_running() {
    assert!(is_running(std::process::id()));
    assert!(!is_running(u32::MAX - 1));
}
