//! Rebuilding governed state from a JSON-lines commit log.
//!
//! Each non-blank line is one commit in wire form. The kernel's clock is
//! pinned to each commit's own `timestamp_ms` before submission, so a
//! replay reproduces the decisions made when the log was written.

use std::fs;
use std::sync::Arc;

use civic_authority::InMemoryGrantStore;
use civic_gate::{GovernanceKernel, SubmissionOutcome};
use civic_types::{Clock, GovernancePolicy, ManualClock};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{CliError, CliResult};

/// One commit read from a log, with its 1-based line number.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub line: usize,
    pub raw: Value,
}

impl LogRecord {
    fn timestamp_ms(&self) -> Option<i64> {
        self.raw.get("timestamp_ms").and_then(Value::as_i64)
    }
}

/// Parse a JSON-lines log. Blank lines and `#` comments are skipped.
pub fn parse_log(path: &str, contents: &str) -> CliResult<Vec<LogRecord>> {
    let mut records = Vec::new();
    for (idx, line) in contents.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let raw = serde_json::from_str(trimmed).map_err(|source| CliError::LogLine {
            path: path.to_string(),
            line: idx + 1,
            source,
        })?;
        records.push(LogRecord { line: idx + 1, raw });
    }
    Ok(records)
}

pub fn read_log(path: &str) -> CliResult<Vec<LogRecord>> {
    let contents = fs::read_to_string(path)?;
    parse_log(path, &contents)
}

/// Replay options
#[derive(Debug, Clone, Default)]
pub struct ReplayOptions {
    /// Root custodian to seed before the first commit
    pub genesis: Option<String>,
    /// Stop before the first commit stamped after this instant
    pub until_ms: Option<i64>,
}

/// A kernel rebuilt from a log, plus what happened to each line.
pub struct Replay {
    pub kernel: GovernanceKernel,
    pub clock: Arc<ManualClock>,
    pub steps: Vec<(usize, SubmissionOutcome)>,
}

impl Replay {
    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }
}

pub fn replay(
    records: &[LogRecord],
    policy: &GovernancePolicy,
    options: &ReplayOptions,
) -> CliResult<Replay> {
    let start = records.iter().find_map(LogRecord::timestamp_ms).unwrap_or(0);
    let clock = Arc::new(ManualClock::new(start));
    let mut kernel = GovernanceKernel::new(
        Arc::new(InMemoryGrantStore::new()),
        clock.clone(),
        policy,
    );

    if let Some(custodian) = &options.genesis {
        kernel.seed_genesis(custodian)?;
    }

    let mut steps = Vec::with_capacity(records.len());
    for record in records {
        if let Some(ts) = record.timestamp_ms() {
            if options.until_ms.is_some_and(|until| ts > until) {
                debug!(line = record.line, timestamp_ms = ts, "Replay horizon reached");
                break;
            }
            // Out-of-order stamps never move the clock backwards.
            if ts > clock.now_ms() {
                clock.set(ts);
            }
        }
        let outcome = kernel.submit_raw(&record.raw)?;
        steps.push((record.line, outcome));
    }

    if let Some(until) = options.until_ms {
        clock.set(until);
    }

    info!(
        commits = steps.len(),
        objects = kernel.objects().len(),
        ledger = kernel.ledger().len(),
        "Replay complete"
    );
    Ok(Replay {
        kernel,
        clock,
        steps,
    })
}
