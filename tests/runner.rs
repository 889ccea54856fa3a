//! Timing scenarios for `FileTriggerRunner` against a real filesystem.
//!
//! Every test runs the runner on its own thread inside a fresh temp directory and records
//! triggers through a channel. "Expect one" waits generously for the trigger; "expect quiet"
//! asserts nothing else arrives for several debounce windows.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use filetrigger::trigger::DEFAULT_DEBOUNCE;
use filetrigger::{
    BoxError, FileTriggerRunner, RunnerError, RunnerState, StopHandle, Trigger, TriggerKind,
};

const WAIT: Duration = Duration::from_secs(3);
const QUIET: Duration = Duration::from_millis(500);

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Running {
    stop: StopHandle,
    triggers: Receiver<Trigger>,
    thread: JoinHandle<Result<(), RunnerError>>,
}

impl Running {
    fn spawn(target: &Path, recursive: bool) -> Self {
        let (tx, triggers) = crossbeam_channel::unbounded();
        let mut runner = FileTriggerRunner::new(target, recursive, move |trigger| {
            let _ = tx.send(trigger.clone());
            Ok(())
        });
        let stop = runner.stop_handle();
        let thread = thread::spawn(move || runner.start());
        let running = Self {
            stop,
            triggers,
            thread,
        };

        // The initial run happens after the watch is registered, so events from here on count.
        let initial = running.expect_one("initial run");
        assert_eq!(initial.kind, TriggerKind::Initial);
        running
    }

    fn expect_one(&self, what: &str) -> Trigger {
        match self.triggers.recv_timeout(WAIT) {
            Ok(trigger) => trigger,
            Err(err) => panic!("expected a trigger after {what}, got {err:?}"),
        }
    }

    fn expect_quiet(&self, what: &str) {
        match self.triggers.recv_timeout(QUIET) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(trigger) => panic!("unexpected trigger after {what}: {trigger:?}"),
            Err(RecvTimeoutError::Disconnected) => panic!("runner exited during {what}"),
        }
    }

    fn stop_and_join(self) -> Result<(), RunnerError> {
        self.stop.stop();
        let result = self.thread.join().expect("runner thread panicked");
        assert_ne!(self.stop.state(), RunnerState::Running);
        result
    }
}

fn file_name(trigger: &Trigger) -> &str {
    trigger
        .path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap()
}

// ---------------------------------------------------------------------------
// Directory targets
// ---------------------------------------------------------------------------

/// Create, burst, then hidden files and directories on a non-recursive directory watch.
#[test]
fn test_directory_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    let running = Running::spawn(root, false);

    fs::write(root.join("a.foo"), [0u8]).unwrap();
    let trigger = running.expect_one("creating a.foo");
    assert_eq!(file_name(&trigger), "a.foo");
    assert!(trigger.path.is_absolute());
    running.expect_quiet("creating a.foo");

    fs::write(root.join("b.foo"), [100u8]).unwrap();
    thread::sleep(Duration::from_millis(50));
    fs::write(root.join("a.foo"), [100u8]).unwrap();
    let trigger = running.expect_one("creating b.foo and modifying a.foo");
    assert_eq!(file_name(&trigger), "b.foo", "first accepted event opens the window");
    running.expect_quiet("the coalesced burst");

    fs::write(root.join(".hidden"), [0u8]).unwrap();
    running.expect_quiet("creating a hidden file");

    fs::create_dir_all(root.join(".b")).unwrap();
    running.expect_quiet("creating a hidden directory");

    running.stop_and_join().unwrap();
}

#[test]
fn test_recursive_watch_ignores_hidden_entries_in_subdirectories() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("a")).unwrap();
    fs::create_dir_all(root.join(".git")).unwrap();

    let running = Running::spawn(root, true);

    fs::write(root.join("a").join(".foo"), [0u8]).unwrap();
    running.expect_quiet("creating a hidden file in a subdirectory");

    fs::write(root.join(".git").join("config"), [0u8]).unwrap();
    running.expect_quiet("writing inside a hidden directory");

    fs::write(root.join("a").join("visible.foo"), [0u8]).unwrap();
    let trigger = running.expect_one("creating a visible file in a subdirectory");
    assert_eq!(file_name(&trigger), "visible.foo");

    running.stop_and_join().unwrap();
}

#[test]
fn test_directory_target_spelled_with_parent_component() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("sub")).unwrap();

    let running = Running::spawn(&dir.path().join("sub").join(".."), false);

    fs::write(dir.path().join("a.txt"), "x").unwrap();
    let trigger = running.expect_one("creating a file in a root spelled with ..");
    assert_eq!(file_name(&trigger), "a.txt");
    assert!(
        !trigger.path.components().any(|c| c == std::path::Component::ParentDir),
        "trigger path should be normalized: {}",
        trigger.path.display()
    );

    running.stop_and_join().unwrap();
}

#[test]
fn test_rapid_writes_trigger_once() {
    let dir = tempfile::tempdir().unwrap();
    let running = Running::spawn(dir.path(), false);

    for i in 0..10u8 {
        fs::write(dir.path().join("data.txt"), [i]).unwrap();
    }

    running.expect_one("ten rapid writes");
    running.expect_quiet("ten rapid writes");
    running.stop_and_join().unwrap();
}

#[test]
fn test_recursive_watch_sees_nested_files() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("src/deep")).unwrap();
    let running = Running::spawn(dir.path(), true);

    fs::write(dir.path().join("src/deep/mod.rs"), "x").unwrap();

    let trigger = running.expect_one("writing a nested file");
    assert_eq!(file_name(&trigger), "mod.rs");
    running.stop_and_join().unwrap();
}

#[test]
fn test_hidden_event_in_same_burst_does_not_prevent_trigger() {
    let dir = tempfile::tempdir().unwrap();
    let running = Running::spawn(dir.path(), false);

    fs::write(dir.path().join(".swap"), "x").unwrap();
    fs::write(dir.path().join("visible.txt"), "x").unwrap();
    fs::write(dir.path().join(".swap"), "y").unwrap();

    let trigger = running.expect_one("a mixed burst");
    assert_eq!(file_name(&trigger), "visible.txt");
    running.expect_quiet("a mixed burst");
    running.stop_and_join().unwrap();
}

// ---------------------------------------------------------------------------
// File targets
// ---------------------------------------------------------------------------

#[test]
fn test_file_target_survives_rename_and_recreate() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("foo.txt");
    fs::write(&target, "HELLO").unwrap();

    let running = Running::spawn(&target, false);

    fs::rename(&target, dir.path().join("foo.txt.old")).unwrap();
    fs::write(&target, "HELLO").unwrap();
    let trigger = running.expect_one("rename away and recreate");
    assert_eq!(file_name(&trigger), "foo.txt");
    running.expect_quiet("rename away and recreate");

    fs::write(&target, "HELLO again").unwrap();
    let trigger = running.expect_one("rewriting the recreated file");
    assert_eq!(file_name(&trigger), "foo.txt");

    running.stop_and_join().unwrap();
}

#[test]
fn test_file_target_spelled_with_parent_component() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("sub")).unwrap();
    fs::write(dir.path().join("foo.txt"), "HELLO").unwrap();

    let target = dir.path().join("sub").join("..").join("foo.txt");
    let running = Running::spawn(&target, false);

    fs::write(dir.path().join("foo.txt"), "changed").unwrap();
    let trigger = running.expect_one("rewriting a target spelled with ..");
    assert_eq!(file_name(&trigger), "foo.txt");

    running.stop_and_join().unwrap();
}

#[test]
fn test_file_target_ignores_siblings() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("foo.txt");
    fs::write(&target, "HELLO").unwrap();

    let running = Running::spawn(&target, false);

    fs::write(dir.path().join("bar.txt"), "x").unwrap();
    fs::write(dir.path().join("foo.txt.bak"), "x").unwrap();
    running.expect_quiet("writing sibling files");

    fs::write(&target, "changed").unwrap();
    running.expect_one("writing the target");
    running.stop_and_join().unwrap();
}

#[test]
fn test_file_target_sees_atomic_replace() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("config.toml");
    fs::write(&target, "a = 1").unwrap();

    let running = Running::spawn(&target, false);

    filetrigger::write_file_atomic(&target, b"a = 2", 0o644).unwrap();
    let trigger = running.expect_one("an atomic replace");
    assert_eq!(file_name(&trigger), "config.toml");
    running.expect_quiet("an atomic replace");
    assert_eq!(fs::read_to_string(&target).unwrap(), "a = 2");

    running.stop_and_join().unwrap();
}

#[test]
fn test_file_target_watch_root_is_parent() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("foo.txt");
    fs::write(&target, "HELLO").unwrap();

    let seen = Arc::new(std::sync::Mutex::new(None));
    let seen_in_action = Arc::clone(&seen);
    let mut runner = FileTriggerRunner::new(&target, false, move |trigger| {
        *seen_in_action.lock().unwrap() = Some(trigger.clone());
        Err("done".into())
    });

    let err = runner.start().unwrap_err();
    assert_eq!(err.to_string(), "done");
    let root = runner.watch_root().unwrap().to_path_buf();
    assert_eq!(canonical(&root), canonical(dir.path()));

    let initial = seen.lock().unwrap().clone().unwrap();
    assert_eq!(initial.kind, TriggerKind::Initial);
    assert_eq!(initial.path, root);
}

// ---------------------------------------------------------------------------
// Lifecycle and errors
// ---------------------------------------------------------------------------

#[test]
fn test_stop_while_waiting_returns_ok_promptly() {
    let dir = tempfile::tempdir().unwrap();
    let running = Running::spawn(dir.path(), false);

    let started = Instant::now();
    let stop = running.stop.clone();
    running.stop_and_join().unwrap();

    assert!(
        started.elapsed() < DEFAULT_DEBOUNCE * 3,
        "stop took {:?}",
        started.elapsed()
    );
    assert_eq!(stop.state(), RunnerState::Stopped);
    stop.stop(); // after termination: no-op
}

#[test]
fn test_repeated_stop_is_harmless() {
    let dir = tempfile::tempdir().unwrap();
    let running = Running::spawn(dir.path(), false);
    running.stop.stop();
    running.stop.stop();
    running.stop.stop();
    running.stop_and_join().unwrap();
}

#[test]
fn test_initial_action_error_is_returned() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let mut runner = FileTriggerRunner::new(dir.path(), false, move |_| -> Result<(), BoxError> {
        counter.fetch_add(1, Ordering::SeqCst);
        Err("expected error".into())
    });

    let err = runner.start().unwrap_err();
    assert!(matches!(err, RunnerError::Action(_)));
    assert_eq!(err.to_string(), "expected error");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(runner.state(), RunnerState::Failed);
}

#[test]
fn test_action_error_on_change_ends_run() {
    let dir = tempfile::tempdir().unwrap();
    let (started_tx, started) = crossbeam_channel::bounded(1);
    let mut runner = FileTriggerRunner::new(dir.path(), false, move |trigger| match trigger.kind {
        TriggerKind::Initial => {
            let _ = started_tx.send(());
            Ok(())
        }
        _ => Err(format!("failed on {}", trigger.kind).into()),
    });
    let stop = runner.stop_handle();
    let thread = thread::spawn(move || runner.start());

    started.recv_timeout(WAIT).expect("initial run");
    fs::write(dir.path().join("x.txt"), "x").unwrap();

    let err = thread.join().unwrap().unwrap_err();
    assert!(err.to_string().starts_with("failed on "), "got {err}");
    assert_eq!(stop.state(), RunnerState::Failed);
}

#[test]
fn test_missing_target_is_stat_error() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let mut runner = FileTriggerRunner::new(dir.path().join("nope"), false, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let err = runner.start().unwrap_err();
    assert!(matches!(err, RunnerError::PathStat { .. }), "got {err:?}");
    assert_eq!(calls.load(Ordering::SeqCst), 0, "action must not run");
    assert_eq!(runner.state(), RunnerState::Failed);
}

#[test]
fn test_second_start_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut runner = FileTriggerRunner::new(dir.path().join("nope"), false, |_| Ok(()));

    assert!(runner.start().is_err());
    assert!(matches!(runner.start(), Err(RunnerError::AlreadyStarted)));
}
