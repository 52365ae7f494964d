//! Read-only view over the OS process table, plus the signal plumbing the
//! supervisor drives it with. Everything here is best effort: a pid can
//! vanish between any two calls, so absence is an answer, not an error.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::SystemTime;
#[cfg(target_os = "linux")]
use std::time::{Duration, UNIX_EPOCH};

#[cfg(unix)]
pub fn exists(pid: u32) -> bool {
    // Signal 0 probes without delivering anything. EPERM still proves the
    // pid is taken.
    let rc = unsafe { libc::kill(pid as i32, 0) };
    rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
pub fn exists(_pid: u32) -> bool {
    false
}

/// Fields pulled from `/proc/<pid>/stat`, split after the comm field so
/// parentheses in process names cannot shift columns.
#[cfg(target_os = "linux")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StatLine {
    state: char,
    ppid: u32,
    start_ticks: u64,
}

#[cfg(target_os = "linux")]
fn parse_stat_line(s: &str) -> Option<StatLine> {
    let end = s.rfind(')')?;
    let rest = s.get((end + 2)..)?;
    let parts: Vec<&str> = rest.split_whitespace().collect();
    let state = parts.first()?.chars().next()?;
    let ppid = parts.get(1)?.parse().ok()?;
    let start_ticks = parts.get(19)?.parse().ok()?;
    Some(StatLine {
        state,
        ppid,
        start_ticks,
    })
}

#[cfg(target_os = "linux")]
fn proc_stat(pid: u32) -> Option<StatLine> {
    let s = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    parse_stat_line(&s)
}

#[cfg(target_os = "linux")]
pub fn is_stopped(pid: u32) -> bool {
    proc_stat(pid).is_some_and(|st| st.state == 'T')
}

#[cfg(not(target_os = "linux"))]
pub fn is_stopped(_pid: u32) -> bool {
    false
}

#[cfg(target_os = "linux")]
pub fn is_defunct(pid: u32) -> bool {
    proc_stat(pid).is_some_and(|st| matches!(st.state, 'Z' | 'X'))
}

#[cfg(not(target_os = "linux"))]
pub fn is_defunct(_pid: u32) -> bool {
    false
}

#[cfg(unix)]
pub fn send_signal(pid: u32, signum: i32) -> std::io::Result<()> {
    let rc = unsafe { libc::kill(pid as i32, signum) };
    if rc == -1 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn send_signal(_pid: u32, _signum: i32) -> std::io::Result<()> {
    Err(std::io::Error::from(std::io::ErrorKind::Unsupported))
}

#[cfg(unix)]
pub fn terminate(pid: u32) -> std::io::Result<()> {
    send_signal(pid, libc::SIGTERM)
}

#[cfg(not(unix))]
pub fn terminate(pid: u32) -> std::io::Result<()> {
    send_signal(pid, 0)
}

#[cfg(unix)]
pub fn kill_hard(pid: u32) -> std::io::Result<()> {
    send_signal(pid, libc::SIGKILL)
}

#[cfg(not(unix))]
pub fn kill_hard(pid: u32) -> std::io::Result<()> {
    send_signal(pid, 0)
}

#[cfg(unix)]
pub fn suspend(pid: u32) -> std::io::Result<()> {
    send_signal(pid, libc::SIGSTOP)
}

#[cfg(not(unix))]
pub fn suspend(pid: u32) -> std::io::Result<()> {
    send_signal(pid, 0)
}

#[cfg(unix)]
pub fn resume(pid: u32) -> std::io::Result<()> {
    send_signal(pid, libc::SIGCONT)
}

#[cfg(not(unix))]
pub fn resume(pid: u32) -> std::io::Result<()> {
    send_signal(pid, 0)
}

/// Transitive children of `pid`, from a single scan of the process table.
/// The result is a snapshot; members may be gone by the time it is used.
#[cfg(target_os = "linux")]
pub fn descendants(pid: u32) -> Vec<u32> {
    use std::collections::{HashMap, VecDeque};

    let Ok(entries) = std::fs::read_dir("/proc") else {
        return Vec::new();
    };

    let mut children: HashMap<u32, Vec<u32>> = HashMap::new();
    for entry in entries.flatten() {
        let Some(child) = entry
            .file_name()
            .to_str()
            .and_then(|s| s.parse::<u32>().ok())
        else {
            continue;
        };
        let Some(stat) = proc_stat(child) else {
            continue;
        };
        children.entry(stat.ppid).or_default().push(child);
    }

    let mut out = Vec::new();
    let mut queue = VecDeque::from([pid]);
    while let Some(next) = queue.pop_front() {
        if let Some(kids) = children.get(&next) {
            for &kid in kids {
                out.push(kid);
                queue.push_back(kid);
            }
        }
    }
    out
}

#[cfg(not(target_os = "linux"))]
pub fn descendants(_pid: u32) -> Vec<u32> {
    Vec::new()
}

#[cfg(target_os = "linux")]
fn ticks_per_sec() -> u64 {
    use std::sync::OnceLock;

    static TICKS: OnceLock<u64> = OnceLock::new();
    *TICKS.get_or_init(|| unsafe {
        let v = libc::sysconf(libc::_SC_CLK_TCK);
        if v <= 0 { 100 } else { v as u64 }
    })
}

#[cfg(target_os = "linux")]
fn boot_time_secs() -> Option<u64> {
    use std::sync::OnceLock;

    static BTIME: OnceLock<Option<u64>> = OnceLock::new();
    *BTIME.get_or_init(|| {
        let s = std::fs::read_to_string("/proc/stat").ok()?;
        s.lines()
            .find_map(|l| l.strip_prefix("btime "))
            .and_then(|v| v.trim().parse().ok())
    })
}

/// Wall-clock start of the process, reconstructed from the boot time and
/// the start tick counter. Lets callers notice a recycled pid.
#[cfg(target_os = "linux")]
pub fn started_at(pid: u32) -> Option<SystemTime> {
    let ticks = proc_stat(pid)?.start_ticks;
    let boot = boot_time_secs()?;
    let offset = Duration::from_secs_f64(ticks as f64 / ticks_per_sec() as f64);
    Some(UNIX_EPOCH + Duration::from_secs(boot) + offset)
}

#[cfg(not(target_os = "linux"))]
pub fn started_at(_pid: u32) -> Option<SystemTime> {
    None
}

#[cfg(target_os = "linux")]
pub fn ppid(pid: u32) -> Option<u32> {
    Some(proc_stat(pid)?.ppid)
}

#[cfg(not(target_os = "linux"))]
pub fn ppid(_pid: u32) -> Option<u32> {
    None
}

#[cfg(target_os = "linux")]
pub fn cwd(pid: u32) -> Option<PathBuf> {
    std::fs::read_link(format!("/proc/{pid}/cwd")).ok()
}

#[cfg(not(target_os = "linux"))]
pub fn cwd(_pid: u32) -> Option<PathBuf> {
    None
}

/// Environment of a live process. Requires the same uid (or root), so this
/// is display-only data.
#[cfg(target_os = "linux")]
pub fn environ(pid: u32) -> Option<BTreeMap<String, String>> {
    let raw = std::fs::read(format!("/proc/{pid}/environ")).ok()?;
    let mut out = BTreeMap::new();
    for chunk in raw.split(|&b| b == 0) {
        if chunk.is_empty() {
            continue;
        }
        let text = String::from_utf8_lossy(chunk);
        if let Some((key, value)) = text.split_once('=') {
            out.insert(key.to_string(), value.to_string());
        }
    }
    Some(out)
}

#[cfg(not(target_os = "linux"))]
pub fn environ(_pid: u32) -> Option<BTreeMap<String, String>> {
    None
}

#[cfg(target_os = "linux")]
pub fn username(pid: u32) -> Option<String> {
    let status = std::fs::read_to_string(format!("/proc/{pid}/status")).ok()?;
    let uid = status
        .lines()
        .find_map(|l| l.strip_prefix("Uid:"))?
        .split_whitespace()
        .next()?
        .parse::<u32>()
        .ok()?;
    username_for_uid(uid)
}

#[cfg(not(target_os = "linux"))]
pub fn username(_pid: u32) -> Option<String> {
    None
}

#[cfg(target_os = "linux")]
fn username_for_uid(uid: u32) -> Option<String> {
    let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
    let mut buf = vec![0u8; 1024];
    let mut out: *mut libc::passwd = std::ptr::null_mut();
    let rc = unsafe {
        libc::getpwuid_r(uid, &mut pwd, buf.as_mut_ptr().cast(), buf.len(), &mut out)
    };
    if rc != 0 || out.is_null() {
        return None;
    }
    let name = unsafe { std::ffi::CStr::from_ptr(pwd.pw_name) };
    name.to_str().ok().map(str::to_string)
}
