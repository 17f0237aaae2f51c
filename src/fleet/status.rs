use serde::Serialize;

/// Health of one worker instance as inferred from on-disk state.
///
/// A processing directory with a pid file naming a live process is running.
/// Every other combination is some flavor of crash, observable because
/// cleanup only happens on a clean exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceHealth {
    Running,
    CrashedNoProcess,
    CrashedNoPidfile,
}

impl std::fmt::Display for InstanceHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceHealth::Running => write!(f, "running"),
            InstanceHealth::CrashedNoProcess => write!(f, "crashed - no process"),
            InstanceHealth::CrashedNoPidfile => write!(f, "crashed - no pidfile"),
        }
    }
}

/// One `status` row: a worker instance's processing directory.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceStatus {
    pub queue: String,
    pub instance: String,
    /// Jobs currently sitting in the processing directory.
    pub jobs: usize,
    /// Age in seconds of the oldest such job, 0 when empty.
    pub max_age_secs: u64,
    pub health: InstanceHealth,
}

/// A pid file with no matching processing directory.
#[derive(Debug, Clone, Serialize)]
pub struct OrphanedPidFile {
    pub queue: String,
    pub instance: String,
    /// `None` when the file does not parse as a pid.
    pub pid: Option<u32>,
}

/// Everything `status` reports for a set of queues.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FleetStatus {
    pub instances: Vec<InstanceStatus>,
    pub orphaned: Vec<OrphanedPidFile>,
}
