use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::io::AsyncWriteExt;

use crate::error::{DroverError, Result};
use crate::ps;
use crate::status::JobStatus;

const CMD_FILE: &str = "cmd";
const NAME_FILE: &str = "name";
const PID_FILE: &str = "pid";
const RC_FILE: &str = "rc";
const STDOUT_FILE: &str = "stdout.log";
const STDERR_FILE: &str = "stderr.log";

// Process start times come from tick counters with second granularity, so
// give the recycling check some slack before distrusting a pid.
const PID_REUSE_SLACK: Duration = Duration::from_secs(2);

/// Handle to one job record on disk. Holds no state beyond the location;
/// every accessor reads the backing files fresh.
#[derive(Debug, Clone)]
pub struct Job {
    id: u64,
    dir: PathBuf,
}

impl Job {
    pub(crate) fn new(id: u64, dir: PathBuf) -> Self {
        Self { id, dir }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn stdout_path(&self) -> PathBuf {
        self.dir.join(STDOUT_FILE)
    }

    pub fn stderr_path(&self) -> PathBuf {
        self.dir.join(STDERR_FILE)
    }

    pub async fn command(&self) -> Result<String> {
        let path = self.dir.join(CMD_FILE);
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| DroverError::storage("read", &path, e))?;
        Ok(raw.trim_end().to_string())
    }

    pub async fn name(&self) -> Option<String> {
        read_marker(&self.dir, NAME_FILE).await
    }

    pub async fn pid(&self) -> Option<u32> {
        read_marker(&self.dir, PID_FILE).await?.parse().ok()
    }

    pub async fn rc(&self) -> Option<i32> {
        read_marker(&self.dir, RC_FILE).await?.parse().ok()
    }

    /// Attach the spawned process to this record. A one-time write; the
    /// pid is never rebound.
    pub async fn bind_pid(&self, pid: u32) -> Result<()> {
        if self.pid().await.is_some() {
            return Err(DroverError::Launch(format!(
                "job {} already has a process bound",
                self.id
            )));
        }
        write_marker(&self.dir, PID_FILE, &pid.to_string()).await
    }

    /// Record the exit code, exactly once, strictly after the pid bind. A
    /// record never turns terminal without having held a real process.
    pub async fn finalize(&self, code: i32) -> Result<()> {
        if self.pid().await.is_none() {
            return Err(DroverError::Launch(format!(
                "job {} has no process bound",
                self.id
            )));
        }
        if self.rc().await.is_some() {
            return Err(DroverError::Launch(format!(
                "job {} already finalized",
                self.id
            )));
        }
        write_marker(&self.dir, RC_FILE, &code.to_string()).await
    }

    /// Current status, derived from the markers and the process table.
    ///
    /// A bound record without an exit code reports as running even when the
    /// process table no longer knows the pid: the exit marker written by the
    /// owning shepherd is the only authority on terminal state, so the gap
    /// between exit and marker flush must not read as a failure.
    pub async fn status(&self) -> JobStatus {
        if let Some(rc) = self.rc().await {
            return if rc == 0 {
                JobStatus::Success
            } else {
                JobStatus::Failed
            };
        }
        let Some(pid) = self.pid().await else {
            return JobStatus::Unbound;
        };
        if ps::is_stopped(pid) && self.owns_pid(pid).await {
            JobStatus::Paused
        } else {
            JobStatus::Running
        }
    }

    /// A process that started after this record bound its pid is an
    /// unrelated tenant of a recycled number. Unknowns count as ours.
    pub(crate) async fn owns_pid(&self, pid: u32) -> bool {
        let Some(bound_at) = self.bound_at_raw().await else {
            return true;
        };
        let Some(proc_start) = ps::started_at(pid) else {
            return true;
        };
        proc_start <= bound_at + PID_REUSE_SLACK
    }

    async fn bound_at_raw(&self) -> Option<std::time::SystemTime> {
        let meta = tokio::fs::metadata(self.dir.join(PID_FILE)).await.ok()?;
        meta.created().or_else(|_| meta.modified()).ok()
    }

    /// When the process was attached, from the pid marker's timestamp.
    pub async fn started_at(&self) -> Option<DateTime<Local>> {
        Some(DateTime::from(self.bound_at_raw().await?))
    }

    /// When the record turned terminal. The exit marker is the last thing
    /// renamed into the directory, so the directory mtime is the exit time.
    pub async fn ended_at(&self) -> Option<DateTime<Local>> {
        self.rc().await?;
        let meta = tokio::fs::metadata(&self.dir).await.ok()?;
        Some(DateTime::from(meta.modified().ok()?))
    }

    pub async fn runtime(&self) -> Option<chrono::Duration> {
        let start = self.started_at().await?;
        let end = self.ended_at().await.unwrap_or_else(Local::now);
        Some(end.signed_duration_since(start))
    }

    pub async fn snapshot(&self) -> Result<JobSnapshot> {
        Ok(JobSnapshot {
            id: self.id,
            name: self.name().await,
            command: self.command().await?,
            status: self.status().await,
            pid: self.pid().await,
            return_code: self.rc().await,
            started_at: self.started_at().await,
            runtime_secs: self.runtime().await.map(|d| d.num_seconds()),
        })
    }

    pub(crate) async fn write_command(&self, command: &str) -> Result<()> {
        write_marker(&self.dir, CMD_FILE, command).await
    }

    pub(crate) async fn write_name(&self, name: &str) -> Result<()> {
        write_marker(&self.dir, NAME_FILE, name).await
    }
}

/// Point-in-time view of a record, for tables and JSON output.
#[derive(Debug, Clone, serde::Serialize)]
pub struct JobSnapshot {
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub command: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Local>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_secs: Option<i64>,
}

async fn read_marker(dir: &Path, file: &str) -> Option<String> {
    let raw = tokio::fs::read_to_string(dir.join(file)).await.ok()?;
    let v = raw.trim().to_string();
    (!v.is_empty()).then_some(v)
}

// Write-then-rename so readers never observe a partial value.
async fn write_marker(dir: &Path, file: &str, value: &str) -> Result<()> {
    let path = dir.join(file);
    let tmp = dir.join(format!("{file}.tmp"));
    let mut f = tokio::fs::File::create(&tmp)
        .await
        .map_err(|e| DroverError::storage("create", &tmp, e))?;
    f.write_all(value.as_bytes())
        .await
        .map_err(|e| DroverError::storage("write", &tmp, e))?;
    f.flush().await.ok();
    tokio::fs::rename(&tmp, &path)
        .await
        .map_err(|e| DroverError::storage("persist", &path, e))?;
    Ok(())
}
