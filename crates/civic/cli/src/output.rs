//! Output formatting utilities

use civic_authority::{AuthorizationCheck, Resolution};
use civic_gate::{SubmissionOutcome, SubmissionStatus};
use civic_transition::{get_next_states, TransitionEngine};
use civic_types::ObjectState;
use colored::*;
use serde::Serialize;
use tabled::{Table, Tabled};

use crate::error::CliResult;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed table format
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a vector of items in the specified format
pub fn print_output<T: Serialize + Tabled>(data: Vec<T>, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Table => {
            if data.is_empty() {
                println!("{}", "No results".dimmed());
            } else {
                println!("{}", Table::new(data));
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
    }
    Ok(())
}

/// Print a single item as JSON
pub fn print_single<T: Serialize>(data: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(data)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

/// Table row for a replayed commit
#[derive(Debug, Serialize, Tabled)]
pub struct OutcomeRow {
    /// Log line
    pub line: usize,
    pub commit: String,
    #[tabled(rename = "type")]
    #[serde(rename = "type")]
    pub commit_type: String,
    pub status: String,
    /// Reason code, or the new object state
    pub result: String,
    pub chain: String,
}

impl OutcomeRow {
    pub fn new(line: usize, outcome: &SubmissionOutcome) -> Self {
        let status = match outcome.status {
            SubmissionStatus::Applied => "applied",
            SubmissionStatus::Rejected if outcome.constitutional_violation => "VIOLATION",
            SubmissionStatus::Rejected => "rejected",
            SubmissionStatus::Duplicate => "duplicate",
        };
        let result = match (&outcome.reason, outcome.new_state) {
            (Some(reason), _) => reason.code.to_string(),
            (None, Some(state)) => format!("-> {state}"),
            (None, None) => String::new(),
        };
        Self {
            line,
            commit: outcome
                .commit_id
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "?".to_string()),
            commit_type: outcome.commit_type.clone(),
            status: status.to_string(),
            result,
            chain: join(&outcome.chain),
        }
    }
}

/// Table row for an authority resolution
#[derive(Debug, Serialize, Tabled)]
pub struct ResolutionRow {
    pub authority: String,
    pub valid: bool,
    pub capabilities: String,
    pub scopes: String,
    pub expires_at_ms: String,
    pub chain: String,
    pub reason: String,
}

impl From<&Resolution> for ResolutionRow {
    fn from(r: &Resolution) -> Self {
        Self {
            authority: r.authority_ref.clone(),
            valid: r.valid,
            capabilities: join(&r.capabilities),
            scopes: join(&r.scopes),
            expires_at_ms: r
                .expires_at_ms
                .map(|ms| ms.to_string())
                .unwrap_or_else(|| "never".to_string()),
            chain: join(&r.chain),
            reason: r.reason.as_ref().map(ToString::to_string).unwrap_or_default(),
        }
    }
}

/// Table row for a capability check
#[derive(Debug, Serialize, Tabled)]
pub struct CheckRow {
    pub authority: String,
    pub required: String,
    pub scope: String,
    pub authorized: bool,
    pub matched: String,
    pub reason: String,
}

impl From<&AuthorizationCheck> for CheckRow {
    fn from(c: &AuthorizationCheck) -> Self {
        Self {
            authority: c.authority_ref.clone(),
            required: c.required.clone(),
            scope: c.scope.clone().unwrap_or_else(|| "-".to_string()),
            authorized: c.authorized,
            matched: c
                .matched_capability
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
            reason: c.reason.as_ref().map(ToString::to_string).unwrap_or_default(),
        }
    }
}

/// Table row for a lifecycle edge
#[derive(Debug, Serialize, Tabled)]
pub struct EdgeRow {
    pub from: String,
    pub to: String,
    pub signature: bool,
    pub evidence: bool,
    /// Needs no capability
    pub exempt: bool,
}

pub fn edge_rows(from: ObjectState) -> Vec<EdgeRow> {
    get_next_states(from)
        .iter()
        .map(|&to| EdgeRow {
            from: from.to_string(),
            to: to.to_string(),
            signature: to.requires_signature(),
            evidence: to.requires_evidence(),
            exempt: TransitionEngine::is_exempt_edge(from, to),
        })
        .collect()
}

fn join<T: ToString>(items: impl IntoIterator<Item = T>) -> String {
    items
        .into_iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
