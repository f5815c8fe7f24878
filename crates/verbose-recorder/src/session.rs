//! Recording session: counters, bounded retention, and the one-shot publish.

use crate::config::RecorderConfig;
use crate::render::{render, RenderedReport, ReportMeta, REPORT_TITLE};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use verbose_filter::ExpressionFilter;
use verbose_types::{CheckEvent, CheckFilter, Clock, Notifier, Publisher, RecorderError};

/// Observer that receives one line per matching check.
#[derive(Clone)]
pub struct NotifyTarget {
    pub observer: String,
    pub notifier: Arc<dyn Notifier>,
}

/// `matched` lives next to the buffer so both move together under one lock.
#[derive(Default)]
struct Retained {
    matched: u64,
    events: Vec<CheckEvent>,
    /// Entries already cleared by successful publishes.
    published: u64,
}

/// Consistent copy of a session's state, taken under the retention lock.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub started_at: DateTime<Utc>,
    pub requested_by: String,
    pub filter: String,
    pub seen: u64,
    pub matched: u64,
    pub max_retained: usize,
    pub previously_published: u64,
    pub events: Vec<CheckEvent>,
}

impl SessionSnapshot {
    /// More checks matched than the snapshot holds.
    pub fn is_truncated(&self) -> bool {
        self.matched > self.events.len() as u64
    }
}

/// Result of a successful [`RecorderSession::render_and_publish`].
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    pub reference: String,
    pub seen: u64,
    pub matched: u64,
    pub retained: usize,
}

/// One verbose recording run. Share it behind an `Arc`; `ingest` takes `&self`.
pub struct RecorderSession {
    config: RecorderConfig,
    requested_by: String,
    filter: Arc<dyn CheckFilter>,
    notify: Option<NotifyTarget>,
    clock: Arc<dyn Clock>,
    started_at: DateTime<Utc>,
    seen: AtomicU64,
    retained: Mutex<Retained>,
    publish_lock: tokio::sync::Mutex<()>,
}

impl RecorderSession {
    pub fn new(
        config: RecorderConfig,
        requested_by: impl Into<String>,
        filter: Arc<dyn CheckFilter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let started_at = clock.now();
        let initial = config.max_retained.min(config.max_retained / 10 + 16);
        Self {
            config,
            requested_by: requested_by.into(),
            filter,
            notify: None,
            clock,
            started_at,
            seen: AtomicU64::new(0),
            retained: Mutex::new(Retained {
                events: Vec::with_capacity(initial),
                ..Retained::default()
            }),
            publish_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Session whose filter is parsed from `expression` (malformed expressions match nothing).
    pub fn with_expression(
        config: RecorderConfig,
        requested_by: impl Into<String>,
        expression: &str,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let filter = Arc::new(ExpressionFilter::parse(expression));
        Self::new(config, requested_by, filter, clock)
    }

    pub fn with_notify(mut self, target: NotifyTarget) -> Self {
        self.notify = Some(target);
        self
    }

    fn lock_retained(&self) -> MutexGuard<'_, Retained> {
        // a panicking holder cannot leave Retained half-updated, so poisoning is ignored
        self.retained.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Offer one check to the session. Never blocks on I/O and never fails.
    pub fn ingest(&self, event: CheckEvent) {
        self.seen.fetch_add(1, Ordering::SeqCst);
        if !self.filter.matches(&event) {
            return;
        }
        let line = self.notify.as_ref().map(|_| event.notification_line());
        {
            let mut guard = self.lock_retained();
            guard.matched += 1;
            if guard.events.len() < self.config.max_retained {
                guard.events.push(event);
            }
        }
        if let (Some(target), Some(line)) = (&self.notify, line) {
            target.notifier.notify(&target.observer, line);
        }
    }

    pub fn seen(&self) -> u64 {
        self.seen.load(Ordering::SeqCst)
    }

    pub fn matched(&self) -> u64 {
        self.lock_retained().matched
    }

    pub fn retained_len(&self) -> usize {
        self.lock_retained().events.len()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn requested_by(&self) -> &str {
        &self.requested_by
    }

    pub fn filter_expression(&self) -> &str {
        self.filter.expression()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let guard = self.lock_retained();
        let matched = guard.matched;
        let events = guard.events.clone();
        let previously_published = guard.published;
        drop(guard);
        // seen is bumped before matched for every event, so reading it afterwards keeps
        // matched <= seen in the snapshot
        let seen = self.seen();
        SessionSnapshot {
            started_at: self.started_at,
            requested_by: self.requested_by.clone(),
            filter: self.filter.expression().to_string(),
            seen,
            matched,
            max_retained: self.config.max_retained,
            previously_published,
            events,
        }
    }

    /// Render the current snapshot without publishing or clearing anything.
    pub fn render(&self) -> RenderedReport {
        self.render_snapshot(&self.snapshot())
    }

    fn render_snapshot(&self, snapshot: &SessionSnapshot) -> RenderedReport {
        let meta = ReportMeta {
            tool_name: &self.config.tool_name,
            tool_version: &self.config.tool_version,
            ended_at: self.clock.now(),
        };
        render(snapshot, &meta)
    }

    /// Render both documents, publish them, and clear the published entries from the buffer.
    ///
    /// The buffer is cleared only once the publisher succeeds; on failure the session is
    /// untouched and the call can be retried.
    pub async fn render_and_publish(
        &self,
        publisher: &dyn Publisher,
    ) -> Result<PublishOutcome, RecorderError> {
        let _serial = self.publish_lock.lock().await;
        let snapshot = self.snapshot();
        let report = self.render_snapshot(&snapshot);

        let reference = match publisher.publish(REPORT_TITLE, &report.documents()).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(
                    user = %self.requested_by,
                    retained = snapshot.events.len(),
                    error = %e,
                    "verbose upload failed, keeping retained checks"
                );
                return Err(e.into());
            }
        };

        {
            // only the published prefix goes; checks that arrived during the upload stay
            let mut guard = self.lock_retained();
            let published = snapshot.events.len().min(guard.events.len());
            guard.events.drain(..published);
            guard.events.shrink_to_fit();
            guard.published += published as u64;
        }
        tracing::info!(
            user = %self.requested_by,
            seen = snapshot.seen,
            matched = snapshot.matched,
            retained = snapshot.events.len(),
            reference = %reference,
            "verbose output published"
        );
        Ok(PublishOutcome {
            reference,
            seen: snapshot.seen,
            matched: snapshot.matched,
            retained: snapshot.events.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::render::{RAW_DATA_DOCUMENT, SUMMARY_DOCUMENT};
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;
    use verbose_publish::MockPublisher;
    use verbose_types::{Document, PublishError, Tristate};

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
        ))
    }

    fn session(expression: &str, max_retained: usize) -> RecorderSession {
        RecorderSession::with_expression(
            RecorderConfig::default().with_max_retained(max_retained),
            "admin",
            expression,
            clock(),
        )
    }

    struct CountingNotifier {
        lines: Mutex<Vec<(String, String)>>,
    }

    impl Notifier for CountingNotifier {
        fn notify(&self, target: &str, line: String) {
            self.lines.lock().unwrap().push((target.to_string(), line));
        }
    }

    /// Publisher that holds each upload until the test releases it.
    #[derive(Default)]
    struct GatedPublisher {
        started: Notify,
        release: Notify,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Publisher for GatedPublisher {
        async fn publish(&self, _title: &str, _documents: &[Document]) -> Result<String, PublishError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.started.notify_one();
            self.release.notified().await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("gated://{n}"))
        }
    }

    #[test]
    fn counts_seen_and_matched_separately() {
        let s = session("perm.a", 100);
        s.ingest(CheckEvent::new("u1", "perm.a.x", Tristate::True));
        s.ingest(CheckEvent::new("u1", "perm.b", Tristate::True));
        s.ingest(CheckEvent::new("u2", "perm.a", Tristate::False));
        assert_eq!(s.seen(), 3);
        assert_eq!(s.matched(), 2);
        assert_eq!(s.retained_len(), 2);
    }

    #[test]
    fn empty_filter_matches_every_check() {
        let s = session("", 100);
        for i in 0..20 {
            s.ingest(CheckEvent::new(format!("u{i}"), "x", Tristate::Undefined));
        }
        assert_eq!(s.seen(), 20);
        assert_eq!(s.matched(), s.seen());
    }

    #[test]
    fn malformed_filter_matches_nothing() {
        let s = session("a & (", 100);
        s.ingest(CheckEvent::new("a", "a", Tristate::True));
        assert_eq!(s.seen(), 1);
        assert_eq!(s.matched(), 0);
    }

    #[test]
    fn retention_stops_at_cap_but_matched_keeps_counting() {
        let s = session("", 2);
        for i in 0..5 {
            s.ingest(CheckEvent::new(format!("u{i}"), "perm", Tristate::True));
        }
        let snap = s.snapshot();
        assert_eq!(snap.matched, 5);
        assert_eq!(snap.events.len(), 2);
        assert_eq!(snap.events[0].subject, "u0");
        assert_eq!(snap.events[1].subject, "u1");
        assert!(snap.is_truncated());
        assert!(s
            .render()
            .markdown
            .contains("Result set exceeded max size of 2. The output below was truncated to 2 entries."));
    }

    #[test]
    fn notifies_only_matching_checks() {
        let notifier = Arc::new(CountingNotifier {
            lines: Mutex::new(Vec::new()),
        });
        let s = session("perm.a", 100).with_notify(NotifyTarget {
            observer: "admin".to_string(),
            notifier: notifier.clone(),
        });
        s.ingest(CheckEvent::new("u1", "perm.a", Tristate::True));
        s.ingest(CheckEvent::new("u1", "perm.b", Tristate::True));
        let lines = notifier.lines.lock().unwrap().clone();
        assert_eq!(
            lines,
            vec![(
                "admin".to_string(),
                "&au1&7 -- &aperm.a&7 -- &2true".to_string()
            )]
        );
    }

    #[test]
    fn concurrent_ingest_keeps_counts_exact() {
        let s = Arc::new(session("even", 1_500));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let s = Arc::clone(&s);
                std::thread::spawn(move || {
                    for i in 0..500 {
                        let perm = if i % 2 == 0 { "even.node" } else { "odd.node" };
                        s.ingest(CheckEvent::new(format!("t{t}"), perm, Tristate::True));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let snap = s.snapshot();
        assert_eq!(snap.seen, 4_000);
        assert_eq!(snap.matched, 2_000);
        assert_eq!(snap.events.len(), 1_500);
        assert!(snap.events.iter().all(|e| e.permission == "even.node"));
    }

    #[tokio::test]
    async fn end_to_end_render_and_publish() {
        let clock = clock();
        let s = RecorderSession::with_expression(RecorderConfig::default(), "admin", "", clock.clone());
        s.ingest(CheckEvent::new("u1", "perm.a", Tristate::True));
        s.ingest(CheckEvent::new("u2", "perm.b", Tristate::False));
        s.ingest(CheckEvent::new("u1", "perm.a", Tristate::Undefined));
        clock.advance(chrono::Duration::seconds(180));

        let publisher = MockPublisher::new();
        let outcome = s.render_and_publish(&publisher).await.unwrap();
        assert_eq!(outcome.reference, "mock://paste/1");
        assert_eq!((outcome.seen, outcome.matched, outcome.retained), (3, 3, 3));
        assert_eq!(s.retained_len(), 0);

        let published = publisher.published();
        assert_eq!(published[0].title, REPORT_TITLE);
        let docs = &published[0].documents;
        assert_eq!(docs[0].name, SUMMARY_DOCUMENT);
        assert!(docs[0].content.contains("| Duration | 3 minutes |"));
        assert!(docs[0].content.contains("| Count | **3** / 3 |"));
        assert_eq!(docs[1].name, RAW_DATA_DOCUMENT);
        assert_eq!(
            docs[1].content,
            "Subject,Permission,Result\nu1,perm.a,true\nu2,perm.b,false\nu1,perm.a,undefined"
        );
    }

    #[tokio::test]
    async fn failed_publish_keeps_retained_for_retry() {
        let s = session("", 100);
        s.ingest(CheckEvent::new("u1", "perm.a", Tristate::True));
        let publisher = MockPublisher::new();
        publisher.set_failing(true);

        let err = s.render_and_publish(&publisher).await.unwrap_err();
        assert!(matches!(err, RecorderError::Publish(_)));
        assert_eq!(s.retained_len(), 1);

        publisher.set_failing(false);
        let outcome = s.render_and_publish(&publisher).await.unwrap();
        assert_eq!(outcome.retained, 1);
        assert_eq!(s.retained_len(), 0);
    }

    #[tokio::test]
    async fn second_publish_reports_empty_set_with_earlier_upload_note() {
        let s = session("", 100);
        s.ingest(CheckEvent::new("u1", "perm.a", Tristate::True));
        s.ingest(CheckEvent::new("u2", "perm.a", Tristate::True));
        let publisher = MockPublisher::new();
        s.render_and_publish(&publisher).await.unwrap();

        let outcome = s.render_and_publish(&publisher).await.unwrap();
        assert_eq!(outcome.retained, 0);
        assert_eq!(outcome.matched, 2);
        let docs = &publisher.published()[1].documents;
        assert!(docs[0].content.contains("| Count | **2** / 2 |"));
        assert!(docs[0].content.contains("**WARN:**"));
        assert!(docs[0].content.contains("2 entries were already published"));
        assert_eq!(docs[1].content, "Subject,Permission,Result");
    }

    #[tokio::test]
    async fn checks_arriving_during_upload_are_kept() {
        let s = Arc::new(session("", 100));
        for i in 0..3 {
            s.ingest(CheckEvent::new(format!("u{i}"), "perm.a", Tristate::True));
        }
        let publisher = Arc::new(GatedPublisher::default());

        let upload = {
            let s = Arc::clone(&s);
            let publisher = Arc::clone(&publisher);
            tokio::spawn(async move { s.render_and_publish(&*publisher).await })
        };
        publisher.started.notified().await;
        s.ingest(CheckEvent::new("late1", "perm.b", Tristate::False));
        s.ingest(CheckEvent::new("late2", "perm.b", Tristate::Undefined));
        publisher.release.notify_one();

        let outcome = upload.await.unwrap().unwrap();
        assert_eq!(outcome.retained, 3);
        assert_eq!(s.retained_len(), 2);
        let snap = s.snapshot();
        assert_eq!(snap.events[0].subject, "late1");
        assert_eq!(snap.events[1].subject, "late2");
        assert_eq!(snap.previously_published, 3);
        assert_eq!(snap.matched, 5);
    }

    #[tokio::test]
    async fn concurrent_publishes_run_one_at_a_time() {
        let s = Arc::new(session("", 100));
        for i in 0..3 {
            s.ingest(CheckEvent::new(format!("u{i}"), "perm.a", Tristate::True));
        }
        let publisher = Arc::new(GatedPublisher::default());

        let uploads: Vec<_> = (0..2)
            .map(|_| {
                let s = Arc::clone(&s);
                let publisher = Arc::clone(&publisher);
                tokio::spawn(async move { s.render_and_publish(&*publisher).await })
            })
            .collect();

        publisher.started.notified().await;
        tokio::task::yield_now().await;
        assert_eq!(publisher.in_flight.load(Ordering::SeqCst), 1);
        publisher.release.notify_one();
        publisher.started.notified().await;
        publisher.release.notify_one();

        let mut retained = Vec::new();
        for upload in uploads {
            retained.push(upload.await.unwrap().unwrap().retained);
        }
        retained.sort_unstable();
        assert_eq!(retained, vec![0, 3]);
        assert_eq!(publisher.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(s.retained_len(), 0);
    }
}
