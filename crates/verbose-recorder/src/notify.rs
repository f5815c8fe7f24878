//! Notification dispatch: an unbounded queue drained by one background task, so a slow or
//! failing observer never stalls ingestion.

use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use verbose_types::{NotificationSink, Notifier, NotifyError};

/// Notifier that queues lines for a background worker which hands them to a sink.
#[derive(Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<(String, String)>,
}

impl ChannelNotifier {
    /// Create the notifier and spawn its worker on `runtime`.
    /// The worker exits once every clone of the notifier has been dropped.
    pub fn new(sink: Arc<dyn NotificationSink>, runtime: &Handle) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<(String, String)>();
        runtime.spawn(async move {
            while let Some((observer, line)) = rx.recv().await {
                if let Err(e) = sink.deliver(&observer, &line).await {
                    tracing::warn!(observer = %observer, error = %e, "verbose notification dropped");
                }
            }
        });
        Self { tx }
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, target: &str, line: String) {
        if self.tx.send((target.to_string(), line)).is_err() {
            tracing::debug!(observer = %target, "notification worker gone");
        }
    }
}

/// Sink that writes each line to the log under the observer's name.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait::async_trait]
impl NotificationSink for TracingSink {
    async fn deliver(&self, target: &str, line: &str) -> Result<(), NotifyError> {
        tracing::info!(observer = %target, "{}", line);
        Ok(())
    }
}
