//! Content hashing, line-set diffs, and migration timestamps.

use std::cell::Cell;
use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use sha2::{Digest, Sha256};

use crate::error::{CoreError, CoreResult};

/// Format of a migration timestamp: `YYYYMMDDHHmmss`.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Length of a migration timestamp.
pub const TIMESTAMP_LEN: usize = 14;

/// Short, stable digest of a migration body for display and change detection.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(16);
    digest
}

/// Order-insensitive line diff between a local and a remote body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimpleDiff {
    /// Lines present locally but not remotely.
    pub additions: Vec<String>,
    /// Lines present remotely but not locally.
    pub removals: Vec<String>,
}

impl SimpleDiff {
    /// Whether both sides carry the same set of lines.
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }
}

/// Diff two bodies as sets of trimmed, non-blank lines.
///
/// Output lines keep the order in which they first appear in their source.
pub fn compute_simple_diff(local: &str, remote: &str) -> SimpleDiff {
    let local_lines = line_set(local);
    let remote_lines = line_set(remote);

    let mut additions = ordered_difference(local, &remote_lines);
    let mut removals = ordered_difference(remote, &local_lines);
    dedup_in_place(&mut additions);
    dedup_in_place(&mut removals);

    SimpleDiff {
        additions,
        removals,
    }
}

fn line_set(text: &str) -> BTreeSet<&str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

fn ordered_difference(text: &str, other: &BTreeSet<&str>) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !other.contains(line))
        .map(str::to_string)
        .collect()
}

fn dedup_in_place(lines: &mut Vec<String>) {
    let mut seen = BTreeSet::new();
    lines.retain(|line| seen.insert(line.clone()));
}

/// Source of the current time.
pub trait Clock {
    /// Current UTC time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a given instant until advanced.
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Cell<DateTime<Utc>>,
}

impl FixedClock {
    /// Freeze the clock at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Cell::new(now),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}

/// Current UTC time as a 14-digit migration timestamp.
///
/// Two calls within the same second return the same value.
pub fn generate_migration_timestamp(clock: &dyn Clock) -> String {
    format_timestamp(clock.now().naive_utc())
}

/// Format a time as a migration timestamp.
pub fn format_timestamp(time: NaiveDateTime) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a 14-digit migration timestamp.
pub fn parse_timestamp(timestamp: &str) -> CoreResult<NaiveDateTime> {
    if !is_timestamp(timestamp) {
        return Err(CoreError::invalid_migration(format!(
            "expected a 14-digit timestamp, got '{}'",
            timestamp
        )));
    }
    NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT).map_err(|e| {
        CoreError::invalid_migration(format!("invalid timestamp '{}': {}", timestamp, e))
    })
}

/// Whether `s` is exactly 14 ASCII digits.
pub fn is_timestamp(s: &str) -> bool {
    s.len() == TIMESTAMP_LEN && s.bytes().all(|b| b.is_ascii_digit())
}
