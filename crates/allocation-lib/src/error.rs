//! Error types for a collection cycle

use std::time::Duration;
use thiserror::Error;

/// Boxed error returned by a cluster source listing call
pub type SourceError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that abort a collection cycle
///
/// Every variant fails the whole cycle; no partial snapshot is produced.
#[derive(Debug, Error)]
pub enum CollectError {
    /// The configured label selector could not be parsed
    #[error("invalid label selector {selector:?}: {reason}")]
    Selector { selector: String, reason: String },

    /// Listing nodes failed
    #[error("failed to list nodes")]
    ListNodes(#[source] SourceError),

    /// Listing the pods of one node failed
    #[error("failed to list pods on node {node}")]
    ListPods {
        node: String,
        #[source]
        source: SourceError,
    },

    /// A capacity, request or limit quantity could not be interpreted
    #[error("invalid {resource} quantity {value:?} on {object}")]
    Quantity {
        object: String,
        resource: String,
        value: String,
        #[source]
        source: QuantityError,
    },

    /// Summing counters for a node, a group or the cluster left the i64 range
    #[error("allocation counters overflow while summing {scope}")]
    Overflow { scope: String },

    /// The cycle did not finish within its deadline
    #[error("collection cycle timed out after {0:?}")]
    Timeout(Duration),
}

impl CollectError {
    /// Returns true if the error came from talking to the cluster API
    pub fn is_listing_failure(&self) -> bool {
        matches!(self, CollectError::ListNodes(_) | CollectError::ListPods { .. })
    }

    pub(crate) fn overflow(scope: impl Into<String>) -> Self {
        CollectError::Overflow {
            scope: scope.into(),
        }
    }
}

/// Errors produced while parsing a Kubernetes resource quantity
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("empty quantity")]
    Empty,

    #[error("malformed number {0:?}")]
    InvalidNumber(String),

    #[error("unknown suffix {0:?}")]
    UnknownSuffix(String),

    #[error("negative quantities are not supported")]
    Negative,

    #[error("quantity out of range")]
    Overflow,
}
