//! Paste-service client used to publish rendered verbose reports.

mod gist;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use gist::GistPublisher;
pub use verbose_types::{Document, PublishError, Publisher};

#[cfg(any(test, feature = "test-util"))]
pub use mock::{MockPublisher, Publication};
