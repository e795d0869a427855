use crate::channel::DEFAULT_MAX_FRAME_BYTES;
use crate::config::{ProxyConfig, SpawnStrategy, TerminationSignal};
use crate::error::config::ConfigError;
use crate::{ENV_MAX_FRAME_BYTES, ENV_STRATEGIES, ENV_TERMINATION_SIGNAL, ENV_WORKER_PROGRAM};

use std::collections::HashMap;
use std::env::VarError;
use std::io::Write;
use std::path::PathBuf;

use serial_test::serial;
use tempfile::NamedTempFile;

fn lookup_from(
    vars: &[(&str, &str)],
) -> impl Fn(&str) -> Result<String, VarError> + use<> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned().ok_or(VarError::NotPresent)
}

/// **VALUE**: Verifies the defaults: exec first, fork as fallback, SIGTERM, 64 MiB frames.
///
/// **WHY THIS MATTERS**: Most callers never configure anything; the default order decides
/// whether workers start clean or inherit the parent's memory.
///
/// **BUG THIS CATCHES**: Would catch the strategy order being flipped or a default changing.
#[test]
fn given_no_configuration_when_default_then_exec_then_fork() {
    // WHEN: Using defaults
    let config = ProxyConfig::default();

    // THEN: Documented defaults
    assert_eq!(config.strategies, vec![SpawnStrategy::Exec, SpawnStrategy::Fork]);
    assert_eq!(config.termination_signal, TerminationSignal::Term);
    assert_eq!(config.max_frame_bytes, DEFAULT_MAX_FRAME_BYTES);
    assert!(config.worker_program.is_none());
    assert!(config.validate().is_ok());
}

/// **VALUE**: Verifies that a TOML file with only some keys loads with defaults for the rest.
///
/// **BUG THIS CATCHES**: Would catch a missing `#[serde(default)]` making every key mandatory.
#[test]
fn given_partial_toml_when_loaded_then_missing_fields_use_defaults() {
    // GIVEN: A config file with only strategies and signal
    let mut file = NamedTempFile::new().expect("temp file");
    writeln!(file, "strategies = [\"fork\"]\ntermination_signal = \"kill\"").expect("write");

    // WHEN: Loading
    let config = ProxyConfig::load(file.path()).expect("load");

    // THEN: Given values applied, others defaulted
    assert_eq!(config.strategies, vec![SpawnStrategy::Fork]);
    assert_eq!(config.termination_signal, TerminationSignal::Kill);
    assert_eq!(config.max_frame_bytes, DEFAULT_MAX_FRAME_BYTES);
}

/// **VALUE**: Verifies that unreadable and unparsable files produce distinct errors.
#[test]
fn given_bad_files_when_loaded_then_read_and_parse_errors() {
    // GIVEN: A missing path and a malformed file
    let missing = PathBuf::from("/definitely/not/here/subproxy.toml");
    let mut malformed = NamedTempFile::new().expect("temp file");
    writeln!(malformed, "strategies = [fork").expect("write");

    // WHEN: Loading both
    let read_err = ProxyConfig::load(&missing).expect_err("should fail");
    let parse_err = ProxyConfig::load(malformed.path()).expect_err("should fail");

    // THEN: Read vs parse
    assert!(matches!(read_err, ConfigError::ReadError { .. }), "got {read_err:?}");
    assert!(matches!(parse_err, ConfigError::ParseError { .. }), "got {parse_err:?}");
}

/// **VALUE**: Verifies that validation rejects configurations that could never spawn.
///
/// **WHY THIS MATTERS**: An empty strategy list would make every spawn fail with an empty
/// "all strategies failed" message; a duplicated one retries a known failure.
///
/// **BUG THIS CATCHES**: Would catch validation being skipped on load.
#[test]
fn given_invalid_values_when_validated_then_rejected() {
    let cases = [
        ProxyConfig::default().with_strategies(vec![]),
        ProxyConfig::default().with_strategies(vec![SpawnStrategy::Fork, SpawnStrategy::Fork]),
        ProxyConfig::default().with_max_frame_bytes(0),
        ProxyConfig::default().with_worker_program(""),
    ];

    for config in cases {
        let err = config.validate().expect_err("should be invalid");
        assert!(matches!(err, ConfigError::ValidationError { .. }), "got {err:?}");
    }
}

/// **VALUE**: Verifies that every `SUBPROXY_*` variable is applied.
#[test]
fn given_env_values_when_applied_then_override_defaults() {
    // GIVEN: All four variables
    let lookup = lookup_from(&[
        (ENV_STRATEGIES, "fork, exec"),
        (ENV_WORKER_PROGRAM, "/usr/local/bin/worker-host"),
        (ENV_TERMINATION_SIGNAL, "SIGKILL"),
        (ENV_MAX_FRAME_BYTES, "4096"),
    ]);

    // WHEN: Applying
    let config = ProxyConfig::default().apply_env(lookup).expect("apply");

    // THEN: All overridden
    assert_eq!(config.strategies, vec![SpawnStrategy::Fork, SpawnStrategy::Exec]);
    assert_eq!(
        config.worker_program,
        Some(PathBuf::from("/usr/local/bin/worker-host"))
    );
    assert_eq!(config.termination_signal, TerminationSignal::Kill);
    assert_eq!(config.max_frame_bytes, 4096);
}

/// **VALUE**: Verifies that bad environment values name the offending variable.
#[test]
fn given_bad_env_values_when_applied_then_env_error_names_variable() {
    let cases = [
        (ENV_STRATEGIES, "exec,teleport"),
        (ENV_TERMINATION_SIGNAL, "SIGHUP"),
        (ENV_MAX_FRAME_BYTES, "lots"),
    ];

    for (variable, value) in cases {
        let err = ProxyConfig::default()
            .apply_env(lookup_from(&[(variable, value)]))
            .expect_err("should fail");

        match err {
            ConfigError::EnvError { variable: named, .. } => assert_eq!(named, variable),
            other => panic!("expected EnvError for {variable}, got {other:?}"),
        }
    }
}

/// **VALUE**: Verifies `from_env` against the real process environment.
///
/// **WHY THIS MATTERS**: Host programs configure proxies through the environment; the real
/// lookup must be wired, not only the injectable one.
///
/// **BUG THIS CATCHES**: Would catch `from_env` ignoring the process environment.
#[test]
#[serial]
fn given_process_env_when_from_env_then_strategies_read() {
    // GIVEN: SUBPROXY_STRATEGIES in the environment
    // SAFETY: serialized with the other environment tests.
    unsafe {
        std::env::set_var(ENV_STRATEGIES, "fork");
    }

    // WHEN: Loading from the environment
    let config = ProxyConfig::from_env();

    // SAFETY: serialized with the other environment tests.
    unsafe {
        std::env::remove_var(ENV_STRATEGIES);
    }

    // THEN: Fork only
    assert_eq!(config.expect("from_env").strategies, vec![SpawnStrategy::Fork]);
}

#[test]
fn given_strategy_names_when_parsed_then_case_insensitive() {
    assert_eq!("EXEC".parse::<SpawnStrategy>(), Ok(SpawnStrategy::Exec));
    assert_eq!(" fork ".parse::<SpawnStrategy>(), Ok(SpawnStrategy::Fork));
    assert!("spawn".parse::<SpawnStrategy>().is_err());
    assert_eq!("term".parse::<TerminationSignal>(), Ok(TerminationSignal::Term));
}
