//! Fatal and startup-failure paths end the process, so each runs in a child
//! process: this test binary re-executes itself with an environment variable
//! selecting the child test.

use {
    levelroll::{fatal, Level, LevelLogger, LoggerConfig, FATAL_EXIT_CODE, STARTUP_FAILURE_EXIT_CODE},
    std::{
        env, fs,
        path::Path,
        process::{Command, ExitStatus, Stdio},
    },
    tempfile::TempDir,
};

const FATAL_CHILD: &str = "LEVELROLL_FATAL_CHILD_LOG";
const STARTUP_CHILD: &str = "LEVELROLL_STARTUP_CHILD_LOG";

fn run_child(test: &str, var: &str, path: &Path) -> ExitStatus {
    Command::new(env::current_exe().unwrap())
        .args([test, "--exact", "--nocapture", "--test-threads=1"])
        .env(var, path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .unwrap()
}

#[test]
fn fatal_child() {
    let Some(path) = env::var_os(FATAL_CHILD) else {
        return;
    };
    let logger = LevelLogger::new(LoggerConfig::new(Level::Error).path(path)).unwrap();
    fatal!(logger, "fatal marker {}", 42);
}

#[test]
fn startup_child() {
    let Some(path) = env::var_os(STARTUP_CHILD) else {
        return;
    };
    let _logger = LevelLogger::start(LoggerConfig::new(Level::Info).path(path));
}

#[test]
fn fatal_flushes_then_exits() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fatal.log");

    let status = run_child("fatal_child", FATAL_CHILD, &path);
    assert_eq!(status.code(), Some(FATAL_EXIT_CODE));

    let contents = fs::read_to_string(&path).unwrap();
    assert!(contents.starts_with("FATAL: "), "{contents}");
    assert!(contents.contains("fatal marker 42"));
}

#[test]
fn unusable_log_path_ends_startup() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "not a directory").unwrap();

    let status = run_child("startup_child", STARTUP_CHILD, &blocker.join("app.log"));
    assert_eq!(status.code(), Some(STARTUP_FAILURE_EXIT_CODE));
}
