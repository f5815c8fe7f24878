//! Traits for the recorder's collaborators: filter, notification, publishing, and time.

use crate::{CheckEvent, Document};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Predicate deciding which check events a recording session keeps.
///
/// Implementations are built once from an expression and must be pure: evaluation never
/// panics and never has side effects.
pub trait CheckFilter: Send + Sync {
    /// Whether the event passes the filter.
    fn matches(&self, event: &CheckEvent) -> bool;

    /// The expression text the filter was built from (empty when it matches everything).
    fn expression(&self) -> &str;
}

/// Fire-and-forget notification hook called on the ingestion hot path.
///
/// Contract: `notify` must not block and must not fail; delivery is best-effort.
pub trait Notifier: Send + Sync {
    fn notify(&self, target: &str, line: String);
}

/// Destination that actually delivers a notification line to an observer.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, target: &str, line: &str) -> Result<(), NotifyError>;
}

/// Remote paste/storage service that accepts rendered documents.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish the documents under a title; returns a reference (usually a URL).
    async fn publish(&self, title: &str, documents: &[Document]) -> Result<String, PublishError>;
}

/// Wall-clock source; swapped for a fixed clock in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    #[error("unexpected token {token:?} at position {position}")]
    UnexpectedToken { token: String, position: usize },
    #[error("unbalanced parentheses")]
    UnbalancedParens,
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("expression nested deeper than {0} levels")]
    TooDeep(usize),
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("observer {0} is gone")]
    ObserverGone(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("publish error: {0}")]
    Other(String),
    #[error("paste service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("paste service response had no reference")]
    MissingReference,
}

#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("publish: {0}")]
    Publish(#[from] PublishError),
}
