use civic_authority::AuthorityError;
use civic_types::CommitId;
use thiserror::Error;

/// Errors from the governance kernel.
///
/// A rejected commit is not an error; it is a
/// [`SubmissionOutcome`](crate::SubmissionOutcome) with a reason code.
#[derive(Error, Debug)]
pub enum GateError {
    #[error("authority error: {0}")]
    Authority(#[from] AuthorityError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Errors specific to the commit ledger.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("duplicate commit ID: {0}")]
    DuplicateEntry(CommitId),

    #[error("commit not found in ledger: {0}")]
    NotFound(CommitId),
}
