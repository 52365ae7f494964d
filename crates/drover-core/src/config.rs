use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming the registry root directory.
pub const STATE_DIR_ENV: &str = "DROVER_DIR";

/// Shared cadence for liveness polls (fast-failure, kill grace, restart).
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

const DEFAULT_CHECK_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_KILL_GRACE_MS: u64 = 5_000;
const DEFAULT_RESTART_TIMEOUT_MS: u64 = 30_000;

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse::<u64>().ok())
}

/// Tunables resolved once per invocation.
#[derive(Debug, Clone, Copy)]
pub struct Settings {
    /// Window the launcher watches for an immediate non-zero exit.
    pub check_timeout: Duration,
    /// Grace between SIGTERM and SIGKILL when tearing down a process tree.
    pub kill_grace: Duration,
    /// Bound on waiting for a killed job to go inactive before relaunch.
    pub restart_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            check_timeout: Duration::from_millis(DEFAULT_CHECK_TIMEOUT_MS),
            kill_grace: Duration::from_millis(DEFAULT_KILL_GRACE_MS),
            restart_timeout: Duration::from_millis(DEFAULT_RESTART_TIMEOUT_MS),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            check_timeout: Duration::from_millis(
                env_u64("DROVER_CHECK_TIMEOUT_MS")
                    .map(|v| v.clamp(100, 60_000))
                    .unwrap_or(DEFAULT_CHECK_TIMEOUT_MS),
            ),
            kill_grace: Duration::from_millis(
                env_u64("DROVER_KILL_GRACE_MS")
                    .map(|v| v.clamp(100, 60_000))
                    .unwrap_or(DEFAULT_KILL_GRACE_MS),
            ),
            restart_timeout: Duration::from_millis(
                env_u64("DROVER_RESTART_TIMEOUT_MS")
                    .map(|v| v.clamp(1_000, 600_000))
                    .unwrap_or(DEFAULT_RESTART_TIMEOUT_MS),
            ),
        }
    }
}

/// Registry root. Lives in ephemeral storage by default; jobs are not
/// expected to survive a reboot.
pub fn state_dir() -> PathBuf {
    match std::env::var(STATE_DIR_ENV) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v),
        _ => std::env::temp_dir().join("drover"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let s = Settings::default();
        assert_eq!(s.check_timeout, Duration::from_secs(2));
        assert_eq!(s.kill_grace, Duration::from_secs(5));
        assert_eq!(s.restart_timeout, Duration::from_secs(30));
        assert!(POLL_INTERVAL < s.check_timeout);
    }
}
