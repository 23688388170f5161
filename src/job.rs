//! Job identity and settings (spec.md §3).
//!
//! `Settings` is a thin typed wrapper over the `key -> value` map persisted
//! in a job's `settings` file, the same "typed accessors over a persisted
//! map" shape as `agent-exec::schema::JobMeta`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Monotonically assigned job identifier. Unique for the lifetime of a
/// store; never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(JobId(s.parse()?))
    }
}

/// Setting keys recognized by the core. Unknown keys are ignored when
/// parsing `#SBS` directives or CLI overrides.
pub const KNOWN_SETTINGS: &[&str] = &[
    "name", "mem", "mail", "procs", "afterok", "stdout", "stderr", "wd",
];

/// Mapping from setting name to string value, persisted one `key\tvalue`
/// line per entry in a job's `settings` file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings(BTreeMap<String, String>);

impl Settings {
    pub fn new() -> Self {
        Settings(BTreeMap::new())
    }

    /// Set `key` to `value` if `key` is recognized; unknown keys are
    /// silently dropped (spec.md §3: "Unknown keys are ignored").
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        if KNOWN_SETTINGS.contains(&key) {
            self.0.insert(key.to_string(), value.into());
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `procs`: positive integer, default 1. A declared `0` is coerced to 1
    /// rather than rejected (spec.md §8 leaves this as an implementation
    /// choice; see DESIGN.md).
    pub fn procs(&self) -> u32 {
        match self.get("procs").and_then(|v| v.parse::<u32>().ok()) {
            Some(0) | None => 1,
            Some(n) => n,
        }
    }

    /// `mem`: suffix `M` (megabytes) or `G` (gigabytes, ×1000 MB); no
    /// suffix is raw MB; absent is unconstrained (`None`).
    pub fn mem_mb(&self) -> Option<u64> {
        let raw = self.get("mem")?;
        parse_mem_mb(raw)
    }

    /// `afterok`: colon-separated predecessor job ids.
    pub fn afterok(&self) -> Vec<JobId> {
        match self.get("afterok") {
            Some(raw) => raw
                .split(':')
                .filter(|s| !s.is_empty())
                .filter_map(|s| s.parse::<u64>().ok())
                .map(JobId)
                .collect(),
            None => Vec::new(),
        }
    }

    /// `name`: sanitized to `[A-Za-z0-9_.-]`, other characters replaced
    /// with `_`.
    pub fn name(&self) -> Option<String> {
        self.get("name").map(|raw| sanitize_name(raw))
    }

    pub fn mail(&self) -> Option<&str> {
        self.get("mail")
    }

    pub fn stdout(&self) -> Option<&str> {
        self.get("stdout")
    }

    pub fn stderr(&self) -> Option<&str> {
        self.get("stderr")
    }

    pub fn wd(&self) -> Option<&str> {
        self.get("wd")
    }
}

fn parse_mem_mb(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if let Some(digits) = raw.strip_suffix('G').or_else(|| raw.strip_suffix('g')) {
        digits.trim().parse::<u64>().ok().map(|g| g * 1000)
    } else if let Some(digits) = raw.strip_suffix('M').or_else(|| raw.strip_suffix('m')) {
        digits.trim().parse::<u64>().ok()
    } else {
        raw.parse::<u64>().ok()
    }
}

fn sanitize_name(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Result of parsing `#SBS -<key> <value>` directives out of a script body.
///
/// `hold` is tracked separately from `settings` because it controls the
/// initial status transition (spec.md §4.2: submit → `U` vs submit → `H`)
/// rather than being a persisted setting.
#[derive(Debug, Clone, Default)]
pub struct Directives {
    pub settings: Settings,
    pub hold: bool,
}

/// Parse `#SBS -<key> <value>` directive lines anywhere in `script`.
///
/// Per spec.md §9 (open question, resolved): directives are scanned through
/// the whole script body, not only a header/prologue block. This is
/// intentionally preserved rather than restricted, per the spec's
/// instruction not to silently change behavior.
pub fn parse_directives(script: &str) -> Directives {
    let mut directives = Directives::default();
    for line in script.lines() {
        let line = line.trim_start();
        let Some(rest) = line.strip_prefix("#SBS") else {
            continue;
        };
        let rest = rest.trim_start();
        let Some(rest) = rest.strip_prefix('-') else {
            continue;
        };
        let mut parts = rest.splitn(2, char::is_whitespace);
        let key = parts.next().unwrap_or("").trim();
        let value = parts.next().unwrap_or("").trim();
        if key.is_empty() {
            continue;
        }
        if key == "hold" {
            directives.hold = true;
            continue;
        }
        directives.settings.set(key, value);
    }
    directives
}

/// Prepend `#!/bin/sh` when the script does not already declare an
/// interpreter (spec.md §3).
pub fn with_shebang(script: &str) -> String {
    if script.starts_with("#!") {
        script.to_string()
    } else {
        format!("#!/bin/sh\n{script}")
    }
}
