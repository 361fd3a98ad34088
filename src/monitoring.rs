//! Process and runtime statistics for the synthetic `runtime` document.
//!
//! Memory figures and uptime come from `sysinfo`. Thread states and file
//! descriptor usage are read from `/proc/self` and are only available on Linux.

use crate::core::{ReporterError, Result};
use std::time::Instant;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Snapshot of the reporting process, taken once per poll tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeStats {
    /// Resident set size of the process
    pub resident_memory_bytes: u64,
    /// Virtual memory size of the process
    pub virtual_memory_bytes: u64,
    /// Used/total ratio per memory pool (`system`, `swap`)
    pub memory_pool_usages: Vec<(String, f64)>,
    /// Threads in the process
    pub thread_count: usize,
    /// Share of threads per scheduler state
    pub thread_states: Vec<(String, f64)>,
    /// Open descriptors divided by the soft limit
    pub fd_usage: Option<f64>,
    /// Seconds since the process started
    pub uptime_secs: u64,
}

/// Collects [`RuntimeStats`] for the current process.
pub struct RuntimeStatsCollector {
    system: System,
    pid: Pid,
    created: Instant,
}

impl RuntimeStatsCollector {
    /// Create a collector bound to the current process
    pub fn new() -> Result<Self> {
        let pid = sysinfo::get_current_pid()
            .map_err(|e| ReporterError::registry(format!("Cannot determine own pid: {}", e)))?;
        Ok(Self {
            system: System::new(),
            pid,
            created: Instant::now(),
        })
    }

    /// Refresh and return the current statistics
    pub fn collect(&mut self) -> Result<RuntimeStats> {
        self.system.refresh_memory();
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            true,
            ProcessRefreshKind::new().with_memory(),
        );

        let mut stats = RuntimeStats {
            memory_pool_usages: vec![
                ("system".to_string(), ratio(self.system.used_memory(), self.system.total_memory())),
                ("swap".to_string(), ratio(self.system.used_swap(), self.system.total_swap())),
            ],
            uptime_secs: self.created.elapsed().as_secs(),
            ..RuntimeStats::default()
        };

        match self.system.process(self.pid) {
            Some(process) => {
                stats.resident_memory_bytes = process.memory();
                stats.virtual_memory_bytes = process.virtual_memory();
                stats.uptime_secs = process.run_time();
            },
            None => {
                return Err(ReporterError::registry(format!(
                    "Process {} not visible to sysinfo",
                    self.pid
                )))
            },
        }

        let states = thread_states();
        let total: usize = states.iter().map(|(_, count)| count).sum();
        stats.thread_count = total;
        stats.thread_states = states
            .into_iter()
            .map(|(state, count)| (state.to_string(), count as f64 / total as f64))
            .collect();
        stats.fd_usage = fd_usage();

        Ok(stats)
    }
}

fn ratio(used: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        used as f64 / total as f64
    }
}

/// Map a `/proc/<pid>/task/<tid>/stat` state letter to a state name.
fn state_name(code: char) -> &'static str {
    match code {
        'R' => "running",
        'S' => "sleeping",
        'D' => "disk_sleep",
        'T' => "stopped",
        't' => "tracing_stop",
        'Z' => "zombie",
        'X' | 'x' => "dead",
        'I' => "idle",
        _ => "other",
    }
}

/// State letter of a task's stat line; the command name may contain spaces and parentheses.
fn parse_stat_state(stat: &str) -> Option<char> {
    let (_, rest) = stat.rsplit_once(')')?;
    rest.trim_start().chars().next()
}

/// Soft limit from a `/proc/<pid>/limits` table.
fn parse_open_files_limit(limits: &str) -> Option<u64> {
    limits
        .lines()
        .find_map(|line| line.strip_prefix("Max open files"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|soft| soft.parse().ok())
}

/// Threads per state, in first-seen order.
#[cfg(target_os = "linux")]
fn thread_states() -> Vec<(&'static str, usize)> {
    let mut counts: Vec<(&'static str, usize)> = Vec::new();
    let Ok(tasks) = std::fs::read_dir("/proc/self/task") else {
        return counts;
    };
    for task in tasks.flatten() {
        let Ok(stat) = std::fs::read_to_string(task.path().join("stat")) else {
            continue;
        };
        let Some(code) = parse_stat_state(&stat) else {
            continue;
        };
        let name = state_name(code);
        match counts.iter_mut().find(|(state, _)| *state == name) {
            Some((_, count)) => *count += 1,
            None => counts.push((name, 1)),
        }
    }
    counts
}

#[cfg(not(target_os = "linux"))]
fn thread_states() -> Vec<(&'static str, usize)> {
    Vec::new()
}

#[cfg(target_os = "linux")]
fn fd_usage() -> Option<f64> {
    let open = std::fs::read_dir("/proc/self/fd").ok()?.count();
    let limit = parse_open_files_limit(&std::fs::read_to_string("/proc/self/limits").ok()?)?;
    (limit > 0).then(|| open as f64 / limit as f64)
}

#[cfg(not(target_os = "linux"))]
fn fd_usage() -> Option<f64> {
    None
}
