use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tempfile::tempdir;

use spoolq::supervisor::pidfile;

fn spawn_worker(root: &Path, graceful: bool) -> Child {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_spoolq"));
    cmd.args(["start", "-D", "-m", "default", "-s", "1"])
        .arg("--root")
        .arg(root)
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    if graceful {
        cmd.arg("--graceful");
    }
    cmd.spawn().unwrap()
}

fn wait_for_pidfile(run_dir: &Path) -> PathBuf {
    for _ in 0..250 {
        if let Some(path) = pidfile::list_pidfiles(run_dir).unwrap().into_iter().next() {
            // The pid file lands before the signal listeners are installed;
            // give the loop a beat to park in its idle sleep
            thread::sleep(Duration::from_millis(500));
            return path;
        }
        thread::sleep(Duration::from_millis(20));
    }
    panic!("worker never wrote a pid file under {}", run_dir.display());
}

#[test]
fn test_graceful_sigint_finishes_cycle_and_exits_zero() {
    let root = tempdir().unwrap();
    let mut child = spawn_worker(root.path(), true);

    let run_dir = root.path().join("default").join("run");
    let pid_path = wait_for_pidfile(&run_dir);
    assert_eq!(pidfile::read_pidfile(&pid_path).unwrap(), child.id());

    let instance = pidfile::instance_of(&pid_path).unwrap().to_string();
    let processing = root
        .path()
        .join("default")
        .join("processing")
        .join(&instance);
    assert!(processing.is_dir());

    signal::kill(Pid::from_raw(child.id() as i32), Signal::SIGINT).unwrap();

    let status = child.wait().unwrap();
    assert_eq!(status.code(), Some(0));
    // Clean exit released the processing directory; deleting the pid file
    // is stop's job, not the worker's
    assert!(!processing.exists());
    assert!(pid_path.exists());
}

#[test]
fn test_default_sigint_exits_one_without_cleanup() {
    let root = tempdir().unwrap();
    let mut child = spawn_worker(root.path(), false);

    let run_dir = root.path().join("default").join("run");
    let pid_path = wait_for_pidfile(&run_dir);

    let instance = pidfile::instance_of(&pid_path).unwrap().to_string();
    let processing = root
        .path()
        .join("default")
        .join("processing")
        .join(&instance);
    assert!(processing.is_dir());

    signal::kill(Pid::from_raw(child.id() as i32), Signal::SIGINT).unwrap();

    let status = child.wait().unwrap();
    assert_eq!(status.code(), Some(1));
    // Hard exit leaves the crash evidence in place
    assert!(processing.is_dir());
    assert!(pid_path.exists());
}
