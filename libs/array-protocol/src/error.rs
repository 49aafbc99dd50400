use thiserror::Error;

/// Error taxonomy shared by every crate that talks to the array.
///
/// Kinds mirror spec §7 exactly: callers downstream (task-flow,
/// volume-orchestrator) match on these variants to decide whether to revert,
/// retry, or surface the error as-is.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArrayError {
    /// Credentials rejected, or the relogin loop gave up. Fatal to the
    /// current call.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// Transport error surfaced after the single relogin-retry.
    #[error("network error: {0}")]
    Network(String),

    /// Response body did not parse as the expected JSON shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// Non-zero array result not present in the benign-code table.
    #[error("server error {code} during {op}")]
    Server { code: i64, op: String },

    /// Intent validation failed before any array request was sent.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Caller asked for a specific object and the array does not have one.
    #[error("not found: {0}")]
    NotFound(String),

    /// A benign "already exists" observed where the caller did not expect
    /// it. Retained mostly so tests can assert on this path; production
    /// code usually converts this straight to success.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Poller budget exceeded.
    #[error("timed out waiting for {0}")]
    Timeout(String),

    /// Precondition violated (snapshot present on delete, clone target
    /// smaller than source, expand size not increasing, both hypermetro
    /// and replication requested, ...).
    #[error("precondition failed: {0}")]
    Precondition(String),
}

impl ArrayError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ArrayError::NotFound(_))
    }
}
