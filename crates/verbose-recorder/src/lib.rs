//! Verbose check recording: a session counts every check it is offered, keeps the ones its
//! filter matches (up to a cap), and renders them into a Markdown report plus a CSV export
//! for publishing.

mod clock;
mod config;
mod notify;
mod render;
mod session;

#[cfg(any(test, feature = "test-util"))]
pub use clock::ManualClock;
pub use clock::{format_duration, SystemClock};
pub use config::{RecorderConfig, DEFAULT_MAX_RETAINED};
pub use notify::{ChannelNotifier, TracingSink};
pub use render::{
    render, RenderedReport, ReportMeta, RAW_DATA_DOCUMENT, REPORT_TITLE, SUMMARY_DOCUMENT,
};
pub use session::{NotifyTarget, PublishOutcome, RecorderSession, SessionSnapshot};
pub use verbose_types::{CheckEvent, RecorderError, Tristate};
