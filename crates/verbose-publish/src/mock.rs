//! Mock publisher for tests: keeps published documents in memory, no network.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use verbose_types::{Document, PublishError, Publisher};

/// One call to [`MockPublisher::publish`].
#[derive(Debug, Clone)]
pub struct Publication {
    pub title: String,
    pub documents: Vec<Document>,
}

/// Publisher that records what it was given and returns `mock://paste/<n>` references.
pub struct MockPublisher {
    published: Mutex<Vec<Publication>>,
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl MockPublisher {
    pub fn new() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    /// Make subsequent publishes fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Successful publications so far.
    pub fn published(&self) -> Vec<Publication> {
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// All publish attempts, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Publisher for MockPublisher {
    async fn publish(&self, title: &str, documents: &[Document]) -> Result<String, PublishError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(PublishError::Status {
                status: 503,
                body: "mock paste service unavailable".to_string(),
            });
        }
        let mut guard = self.published.lock().unwrap_or_else(|e| e.into_inner());
        guard.push(Publication {
            title: title.to_string(),
            documents: documents.to_vec(),
        });
        Ok(format!("mock://paste/{}", guard.len()))
    }
}
