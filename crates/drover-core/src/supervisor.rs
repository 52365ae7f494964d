use std::process::Stdio;

use crate::config::{POLL_INTERVAL, STATE_DIR_ENV, Settings};
use crate::error::{DroverError, Result};
use crate::job::Job;
use crate::ps;
use crate::registry::Registry;
use crate::status::JobStatus;

/// Subcommand the launcher re-execs itself with. The hosting binary must
/// route it to [`Supervisor::supervise`].
pub const SHEPHERD_COMMAND: &str = "shepherd";

/// What the caller learned about a launch before returning.
#[derive(Debug)]
pub enum LaunchOutcome {
    /// The job is detached and, as far as the launcher can tell, running.
    Detached(Job),
    /// The job exited non-zero within the check window.
    FailedFast {
        job: Job,
        code: i32,
        stderr: String,
    },
}

/// Drives job lifecycles against one registry. Launching splits into two
/// processes: the caller returns once the shepherd is off, and the
/// shepherd owns the child until exit. The record directory is the only
/// channel between them.
pub struct Supervisor {
    registry: Registry,
    settings: Settings,
}

impl Supervisor {
    pub fn new(registry: Registry, settings: Settings) -> Self {
        Self { registry, settings }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Create a record and hand it to a detached shepherd. With `check`
    /// set, watch the record briefly and report an immediate non-zero
    /// exit instead of pretending the launch went fine.
    pub async fn launch(
        &self,
        command: &str,
        name: Option<&str>,
        check: bool,
    ) -> Result<LaunchOutcome> {
        let job = self.registry.create(command, name).await?;
        tracing::info!(id = job.id(), %command, "launching job");
        self.spawn_shepherd(&job)?;

        if check {
            if let Some((code, stderr)) = self.watch_for_fast_failure(&job).await {
                return Ok(LaunchOutcome::FailedFast { job, code, stderr });
            }
        }
        Ok(LaunchOutcome::Detached(job))
    }

    // Re-exec this binary in a new session with stdio detached. The
    // shepherd finds the record through the state-dir variable and its id
    // argument; nothing else is shared with the launcher.
    fn spawn_shepherd(&self, job: &Job) -> Result<()> {
        let exe = std::env::current_exe()
            .map_err(|e| DroverError::Launch(format!("cannot locate own binary: {e}")))?;

        let mut cmd = tokio::process::Command::new(exe);
        cmd.arg(SHEPHERD_COMMAND)
            .arg(job.id().to_string())
            .env(STATE_DIR_ENV, self.registry.root())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        #[cfg(unix)]
        {
            unsafe {
                cmd.pre_exec(|| {
                    if libc::setsid() == -1 {
                        return Err(std::io::Error::last_os_error());
                    }
                    Ok(())
                });
            }
        }

        // The child is deliberately not awaited; the runtime reaps it in
        // the background if it outlives this invocation's interest.
        cmd.spawn()
            .map(drop)
            .map_err(|e| DroverError::Launch(e.to_string()))
    }

    async fn watch_for_fast_failure(&self, job: &Job) -> Option<(i32, String)> {
        let deadline = tokio::time::Instant::now() + self.settings.check_timeout;
        loop {
            if let Some(code) = job.rc().await {
                if code == 0 {
                    return None;
                }
                let stderr = tokio::fs::read_to_string(job.stderr_path())
                    .await
                    .unwrap_or_default();
                return Some((code, stderr));
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Shepherd body: open the sinks, run the command under the user's
    /// shell, bind the pid, wait, record the exit code. Blocks for the
    /// job's whole lifetime, so only the detached process calls this.
    pub async fn supervise(&self, job_id: u64) -> Result<i32> {
        let job = self
            .registry
            .get(job_id)
            .await
            .ok_or_else(|| DroverError::NotFound(job_id.to_string()))?;
        let command = job.command().await?;

        let stdout = std::fs::File::create(job.stdout_path())
            .map_err(|e| DroverError::storage("create", job.stdout_path(), e))?;
        let stderr = std::fs::File::create(job.stderr_path())
            .map_err(|e| DroverError::storage("create", job.stderr_path(), e))?;

        let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());
        tracing::debug!(%shell, "running command under shell");

        let mut cmd = tokio::process::Command::new(&shell);
        cmd.arg("-c")
            .arg(&command)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                // Leave the record unbound; the sink keeps the evidence.
                let _ = tokio::fs::write(
                    job.stderr_path(),
                    format!("failed to spawn {shell}: {e}\n"),
                )
                .await;
                return Err(DroverError::Launch(format!("spawn {shell}: {e}")));
            }
        };

        let Some(pid) = child.id() else {
            return Err(DroverError::Launch("spawned process has no pid".into()));
        };
        job.bind_pid(pid).await?;
        tracing::info!(id = job.id(), pid, "job started");

        let status = child
            .wait()
            .await
            .map_err(|e| DroverError::Launch(format!("wait for pid {pid}: {e}")))?;
        let code = exit_code_of(status);
        job.finalize(code).await?;
        tracing::info!(id = job.id(), code, "job exited");
        Ok(code)
    }

    /// Terminate the process trees of every active job in `jobs`; inactive
    /// ones are silently skipped. Returns how many jobs were acted on. One
    /// stubborn record does not stop the sweep.
    pub async fn kill(&self, jobs: &[Job]) -> Result<usize> {
        let mut killed = 0;
        for job in jobs {
            if !job.status().await.is_active() {
                continue;
            }
            match self.kill_tree(job).await {
                Ok(true) => killed += 1,
                Ok(false) => {}
                Err(err) => tracing::warn!(id = job.id(), %err, "failed to kill job"),
            }
        }
        Ok(killed)
    }

    async fn kill_tree(&self, job: &Job) -> Result<bool> {
        let Some(pid) = job.pid().await else {
            return Ok(false);
        };
        if !job.owns_pid(pid).await {
            tracing::warn!(id = job.id(), pid, "pid recycled by another process, skipping");
            return Ok(false);
        }

        // Snapshot the tree before signaling; children die with their
        // parent and would drop out of a scan done mid-teardown.
        let mut targets = ps::descendants(pid);
        targets.push(pid);
        tracing::info!(id = job.id(), pid, tree = targets.len(), "killing job");

        for &target in &targets {
            let _ = ps::terminate(target);
            // A stopped process only sees the SIGTERM once continued.
            let _ = ps::resume(target);
        }

        let deadline = tokio::time::Instant::now() + self.settings.kill_grace;
        loop {
            targets.retain(|&t| ps::exists(t) && !ps::is_defunct(t));
            if targets.is_empty() {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }

        for &target in &targets {
            let _ = ps::kill_hard(target);
        }
        tracing::info!(id = job.id(), survivors = targets.len(), "escalated to SIGKILL");
        Ok(true)
    }

    /// Deliver an arbitrary signal to an active job's process.
    pub async fn signal(&self, job: &Job, signum: i32) -> Result<()> {
        let status = job.status().await;
        if !status.is_active() {
            return Err(DroverError::ProcessControl(format!(
                "cannot signal job {}: it is {status}",
                job.id()
            )));
        }
        let pid = self.control_pid(job).await?;
        ps::send_signal(pid, signum).map_err(|e| {
            DroverError::ProcessControl(format!("signal {signum} to pid {pid}: {e}"))
        })
    }

    /// Suspend a job. Valid only while it is exactly running.
    pub async fn pause(&self, job: &Job) -> Result<()> {
        let status = job.status().await;
        if status != JobStatus::Running {
            return Err(DroverError::ProcessControl(format!(
                "cannot pause job {}: it is {status}",
                job.id()
            )));
        }
        let pid = self.control_pid(job).await?;
        ps::suspend(pid)
            .map_err(|e| DroverError::ProcessControl(format!("suspend pid {pid}: {e}")))?;
        tracing::info!(id = job.id(), pid, "paused job");
        Ok(())
    }

    /// Continue a suspended job. Resuming anything that is not currently
    /// stopped is an error, not a no-op.
    pub async fn resume(&self, job: &Job) -> Result<()> {
        let status = job.status().await;
        if status != JobStatus::Paused {
            return Err(DroverError::ProcessControl(format!(
                "cannot resume job {}: it is {status}",
                job.id()
            )));
        }
        let pid = self.control_pid(job).await?;
        ps::resume(pid)
            .map_err(|e| DroverError::ProcessControl(format!("resume pid {pid}: {e}")))?;
        tracing::info!(id = job.id(), pid, "resumed job");
        Ok(())
    }

    async fn control_pid(&self, job: &Job) -> Result<u32> {
        let Some(pid) = job.pid().await else {
            return Err(DroverError::ProcessControl(format!(
                "job {} has no process bound",
                job.id()
            )));
        };
        if !job.owns_pid(pid).await {
            return Err(DroverError::ProcessControl(format!(
                "pid {pid} of job {} now belongs to an unrelated process",
                job.id()
            )));
        }
        Ok(pid)
    }

    /// Remove one record, as long as it holds no live process. Unbound
    /// leftovers from failed launches go the same way as finished jobs.
    pub async fn clean_one(&self, job: &Job) -> Result<bool> {
        let status = job.status().await;
        if status.is_active() {
            return Err(DroverError::ProcessControl(format!(
                "cannot clean job {}: it is {status}",
                job.id()
            )));
        }
        self.registry.delete(job).await
    }

    /// Sweep finished records: success always, failures only on request.
    /// A second sweep with nothing new removes zero.
    pub async fn clean_all(&self, include_failed: bool) -> Result<usize> {
        let mut removed = 0;
        for job in self.registry.list().await? {
            let reap = match job.status().await {
                JobStatus::Success => true,
                JobStatus::Failed => include_failed,
                _ => false,
            };
            if reap && self.registry.delete(&job).await? {
                tracing::debug!(id = job.id(), "cleaned job record");
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Kill if needed, wait (bounded) for the record to go inactive, drop
    /// it, and launch the same command and name under a fresh id.
    pub async fn restart(&self, job: Job) -> Result<LaunchOutcome> {
        let command = job.command().await?;
        let name = job.name().await;

        if job.status().await.is_active() {
            self.kill(std::slice::from_ref(&job)).await?;
        }

        let deadline = tokio::time::Instant::now() + self.settings.restart_timeout;
        while job.status().await.is_active() {
            if tokio::time::Instant::now() >= deadline {
                return Err(DroverError::RestartTimeout {
                    id: job.id(),
                    waited_ms: self.settings.restart_timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }

        self.registry.delete(&job).await?;
        self.launch(&command, name.as_deref(), false).await
    }
}

#[cfg(unix)]
fn exit_code_of(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    // A signal-terminated job records the negated signal number, keeping
    // "non-zero means failed" true for both exit paths.
    status
        .code()
        .or_else(|| status.signal().map(|s| -s))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code_of(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}
