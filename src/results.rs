//! Result codes carried on operation completions.
//!
//! Every completion object carries one of these codes; callers branch on the
//! code rather than relying on errors for business-level failures.

use serde::{Deserialize, Serialize};

/// Outcome of a write or delete operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationResult {
    Success,
    PrepareTimeout,
    CommitTimeout,
    ForwardTimeout,
    WrongExpectedVersion,
    StreamDeleted,
    InvalidTransaction,
    AccessDenied,
    /// Synthesised by the client for unhandled or unexpected responses.
    Error,
}

/// Outcome of a stream-range read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadStreamResult {
    Success,
    NoStream,
    StreamDeleted,
    NotModified,
    Error,
    AccessDenied,
}

/// Outcome of a global-log read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadAllResult {
    Success,
    NotModified,
    Error,
    AccessDenied,
}

/// Reason carried on a server-side subscription drop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionDropReason {
    Unsubscribed = 0,
    AccessDenied = 1,
}

impl std::fmt::Display for SubscriptionDropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Unsubscribed => "unsubscribed",
            Self::AccessDenied => "access denied",
        })
    }
}

/// Optimistic-concurrency expectation attached to a write or delete.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Disable the concurrency check.
    Any,
    /// The stream must not exist yet.
    NoStream,
    /// The stream's current version must equal this event number.
    Exact(i64),
}

impl ExpectedVersion {
    /// Sentinel encoding used on the wire.
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        match self {
            Self::Any => -2,
            Self::NoStream => -1,
            Self::Exact(number) => number,
        }
    }
}
