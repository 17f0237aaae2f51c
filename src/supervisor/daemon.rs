use std::env;
use std::fs::{File, OpenOptions};
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};

use nix::sys::stat::{umask, Mode};
use nix::unistd::{chdir, dup2, fork, setsid, ForkResult};

use crate::config::DaemonConfig;
use crate::error::{Result, SpoolError};

/// Detach from the controlling terminal and become a daemon.
///
/// Classic double fork: the first child calls `setsid` to leave the
/// session, and the second fork guarantees the survivor can never
/// re-acquire a controlling terminal. The parent of each fork exits with
/// status 0. Afterwards stdin reads from /dev/null and stdout/stderr append
/// to the configured log files.
///
/// Must run before any async runtime is built; forking a process with live
/// runtime threads is not sound.
pub fn daemonize(config: &DaemonConfig) -> Result<()> {
    // Resolve log paths before the working directory changes under us.
    let stdout_log = absolutize(&config.stdout_log)?;
    let stderr_log = absolutize(&config.stderr_log)?;

    // SAFETY: still single-threaded; the runtime comes up after this
    // function returns in the surviving child.
    match unsafe { fork() }.map_err(|e| SpoolError::Daemonize(format!("fork #1 failed: {}", e)))? {
        ForkResult::Parent { .. } => std::process::exit(0),
        ForkResult::Child => {}
    }

    setsid().map_err(|e| SpoolError::Daemonize(format!("setsid failed: {}", e)))?;
    chdir(config.working_dir.as_path())
        .map_err(|e| SpoolError::Daemonize(format!("chdir failed: {}", e)))?;
    umask(Mode::empty());

    // SAFETY: see above.
    match unsafe { fork() }.map_err(|e| SpoolError::Daemonize(format!("fork #2 failed: {}", e)))? {
        ForkResult::Parent { .. } => std::process::exit(0),
        ForkResult::Child => {}
    }

    redirect_stdio(&stdout_log, &stderr_log)
}

/// Resolve a path against the current working directory.
pub(crate) fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = env::current_dir().map_err(|e| SpoolError::io(path, e))?;
    Ok(cwd.join(path))
}

fn redirect_stdio(stdout_log: &Path, stderr_log: &Path) -> Result<()> {
    let devnull = File::open("/dev/null")
        .map_err(|e| SpoolError::Daemonize(format!("open /dev/null: {}", e)))?;
    let out = open_log(stdout_log)?;
    let err = open_log(stderr_log)?;

    dup_onto(devnull.as_raw_fd(), 0)?;
    dup_onto(out.as_raw_fd(), 1)?;
    dup_onto(err.as_raw_fd(), 2)?;
    Ok(())
}

fn open_log(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| SpoolError::Daemonize(format!("open {}: {}", path.display(), e)))
}

fn dup_onto(src: i32, dst: i32) -> Result<()> {
    dup2(src, dst).map_err(|e| SpoolError::Daemonize(format!("dup2 onto fd {}: {}", dst, e)))?;
    Ok(())
}
