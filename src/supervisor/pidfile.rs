use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::sys::signal;
use nix::unistd::Pid;

use crate::error::{Result, SpoolError};

const PID_EXT: &str = "pid";

/// Write `<dir>/<instance>.pid` containing `pid`.
///
/// Goes through a temp name and a rename, so a reader never sees a
/// half-written file.
pub fn write_pidfile(dir: &Path, instance: &str, pid: u32) -> Result<PathBuf> {
    fs::create_dir_all(dir).map_err(|e| SpoolError::io(dir, e))?;
    let path = dir.join(format!("{}.{}", instance, PID_EXT));
    let tmp = dir.join(format!(".{}.{}.tmp", instance, PID_EXT));
    fs::write(&tmp, pid.to_string()).map_err(|e| SpoolError::io(&tmp, e))?;
    fs::rename(&tmp, &path).map_err(|e| SpoolError::io(&path, e))?;
    tracing::debug!(path = %path.display(), pid, "wrote pid file");
    Ok(path)
}

/// Read the pid recorded in a pid file.
///
/// A pid is a positive i32; anything else in the file is malformed. Values
/// outside that range would wrap negative in `kill` and address a process
/// group instead of a process.
pub fn read_pidfile(path: &Path) -> Result<u32> {
    let raw = fs::read_to_string(path).map_err(|e| SpoolError::io(path, e))?;
    let pid: i32 = raw
        .trim()
        .parse()
        .map_err(|_| SpoolError::MalformedPidFile(path.to_path_buf()))?;
    if pid <= 0 {
        return Err(SpoolError::MalformedPidFile(path.to_path_buf()));
    }
    Ok(pid as u32)
}

/// Delete a pid file, tolerating one that is already gone.
pub fn remove_pidfile(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SpoolError::io(path, e)),
    }
}

/// Pid files under `dir`, sorted by name. A missing directory means no
/// tracked workers, not an error.
pub fn list_pidfiles(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(SpoolError::io(dir, e)),
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().map(|ext| ext == PID_EXT).unwrap_or(false))
        .collect();
    files.sort();
    Ok(files)
}

/// Instance name encoded in a pid file path: `host-123.pid` -> `host-123`.
pub fn instance_of(path: &Path) -> Option<&str> {
    path.file_stem().and_then(|stem| stem.to_str())
}

/// Exact liveness probe: signal 0 checks for process existence without
/// touching the process. EPERM still means the pid exists, so it counts as
/// alive. A value that does not fit the kernel's pid type cannot name a
/// process at all.
pub fn pid_alive(pid: u32) -> bool {
    let pid = match i32::try_from(pid) {
        Ok(pid) if pid > 0 => pid,
        _ => return false,
    };
    match signal::kill(Pid::from_raw(pid), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}
