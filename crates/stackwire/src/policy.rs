//! sizing and runtime defaults applied to every job
use serde::{Deserialize, Serialize};

/// Policy constants for batch jobs
///
/// These are not derived from job documents. A deployment may override them through the
/// manifest's `policy` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JobPolicy {
    pub max_concurrent_runs: u32,
    /// minutes
    pub timeout: u32,
    pub worker_count: u32,
    pub worker_type: String,
    pub runtime_version: String,
}

impl JobPolicy {
    pub const MAX_CONCURRENT_RUNS: u32 = 15;
    pub const TIMEOUT_MINUTES: u32 = 60;
    pub const WORKER_COUNT: u32 = 5;
    pub const WORKER_TYPE: &'static str = "G.1X";
    pub const RUNTIME_VERSION: &'static str = "4.0";
}

impl Default for JobPolicy {
    fn default() -> Self {
        Self {
            max_concurrent_runs: Self::MAX_CONCURRENT_RUNS,
            timeout: Self::TIMEOUT_MINUTES,
            worker_count: Self::WORKER_COUNT,
            worker_type: Self::WORKER_TYPE.to_owned(),
            runtime_version: Self::RUNTIME_VERSION.to_owned(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let policy = JobPolicy::default();
        assert_eq!(policy.max_concurrent_runs, 15);
        assert_eq!(policy.timeout, 60);
        assert_eq!(policy.worker_count, 5);
        assert_eq!(policy.worker_type, "G.1X");
        assert_eq!(policy.runtime_version, "4.0");
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let policy: JobPolicy = serde_yaml::from_str("workerCount: 10\nworkerType: G.2X\n").unwrap();
        assert_eq!(policy.worker_count, 10);
        assert_eq!(policy.worker_type, "G.2X");
        assert_eq!(policy.timeout, 60);
        assert_eq!(policy.max_concurrent_runs, 15);
    }
}
