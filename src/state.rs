//! The job status machine (spec.md §4.2).
//!
//! Persisted as append-only `state\tunix_seconds\n` lines in a job's `state`
//! file; the last line is always the current status. Grounded on
//! `agent-exec::schema::JobStatus`, extended from four variants to the
//! seven spec.md names and switched from a JSON enum to the single-letter
//! codes the on-disk format uses.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    UserHold,
    Hold,
    Queued,
    Running,
    Success,
    Error,
    Cancel,
}

impl JobStatus {
    pub fn code(self) -> &'static str {
        match self {
            JobStatus::UserHold => "U",
            JobStatus::Hold => "H",
            JobStatus::Queued => "Q",
            JobStatus::Running => "R",
            JobStatus::Success => "S",
            JobStatus::Error => "E",
            JobStatus::Cancel => "C",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "U" => Some(JobStatus::UserHold),
            "H" => Some(JobStatus::Hold),
            "Q" => Some(JobStatus::Queued),
            "R" => Some(JobStatus::Running),
            "S" => Some(JobStatus::Success),
            "E" => Some(JobStatus::Error),
            "C" => Some(JobStatus::Cancel),
            _ => None,
        }
    }

    /// `SUCCESS`, `ERROR`, and `CANCEL` are absorbing: no further
    /// transitions are appended after a terminal entry.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Error | JobStatus::Cancel)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One line of a job's append-only status history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusEntry {
    pub state: JobStatus,
    pub at: u64,
}

impl StatusEntry {
    pub fn now(state: JobStatus) -> Self {
        StatusEntry {
            state,
            at: now_unix(),
        }
    }

    pub fn to_line(self) -> String {
        format!("{}\t{}\n", self.state.code(), self.at)
    }

    pub fn parse_line(line: &str) -> Option<Self> {
        let mut parts = line.trim_end().splitn(2, '\t');
        let state = JobStatus::from_code(parts.next()?)?;
        let at = parts.next()?.parse().ok()?;
        Some(StatusEntry { state, at })
    }
}

pub fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_line_format() {
        let entry = StatusEntry {
            state: JobStatus::Running,
            at: 12345,
        };
        let line = entry.to_line();
        assert_eq!(line, "R\t12345\n");
        assert_eq!(StatusEntry::parse_line(&line), Some(entry));
    }

    #[test]
    fn terminal_states() {
        assert!(JobStatus::Success.is_terminal());
        assert!(JobStatus::Error.is_terminal());
        assert!(JobStatus::Cancel.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(!JobStatus::UserHold.is_terminal());
        assert!(!JobStatus::Hold.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
    }

    #[test]
    fn unknown_code_fails_to_parse() {
        assert!(JobStatus::from_code("X").is_none());
        assert!(StatusEntry::parse_line("X\t1\n").is_none());
    }
}
