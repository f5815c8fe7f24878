//! Report rendering: Markdown summary and CSV raw data from one session snapshot.

use crate::clock::format_duration;
use crate::session::SessionSnapshot;
use chrono::{DateTime, Utc};
use std::borrow::Cow;
use verbose_types::Document;

pub const REPORT_TITLE: &str = "Verbose Checking Output";
pub const SUMMARY_DOCUMENT: &str = "verbose.md";
pub const RAW_DATA_DOCUMENT: &str = "raw-data.csv";
pub const CSV_HEADER: &str = "Subject,Permission,Result";

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S %Z";

/// Render-time values that are not part of the session itself.
#[derive(Debug, Clone)]
pub struct ReportMeta<'a> {
    pub tool_name: &'a str,
    pub tool_version: &'a str,
    pub ended_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedReport {
    pub markdown: String,
    pub csv: String,
}

impl RenderedReport {
    /// Summary first, raw data second.
    pub fn documents(&self) -> Vec<Document> {
        vec![
            Document::new(SUMMARY_DOCUMENT, self.markdown.clone()),
            Document::new(RAW_DATA_DOCUMENT, self.csv.clone()),
        ]
    }
}

fn escape_commas(field: &str) -> Cow<'_, str> {
    // quotes inside a field are passed through unescaped
    if field.contains(',') {
        Cow::Owned(format!("\"{}\"", field))
    } else {
        Cow::Borrowed(field)
    }
}

pub fn render(snapshot: &SessionSnapshot, meta: &ReportMeta<'_>) -> RenderedReport {
    let elapsed = (meta.ended_at - snapshot.started_at).num_seconds().max(0) as u64;
    let filter = if snapshot.filter.is_empty() {
        "any".to_string()
    } else {
        format!("`{}`", snapshot.filter)
    };

    let mut md: Vec<String> = vec![
        format!("## {}", REPORT_TITLE),
        format!(
            "#### This file was automatically generated by {} {}",
            meta.tool_name, meta.tool_version
        ),
        String::new(),
        "### Metadata".to_string(),
        "| Key | Value |".to_string(),
        "|-----|-------|".to_string(),
        format!("| Start Time | {} |", snapshot.started_at.format(DATE_FORMAT)),
        format!("| End Time | {} |", meta.ended_at.format(DATE_FORMAT)),
        format!("| Duration | {} |", format_duration(elapsed)),
        format!("| Count | **{}** / {} |", snapshot.matched, snapshot.seen),
        format!("| User | {} |", snapshot.requested_by),
        format!("| Filter | {} |", filter),
        String::new(),
    ];

    if snapshot.is_truncated() {
        md.push(format!(
            "**WARN:** Result set exceeded max size of {cap}. The output below was truncated to {cap} entries.",
            cap = snapshot.max_retained
        ));
        md.push(String::new());
    }
    if snapshot.previously_published > 0 {
        md.push(format!(
            "**NOTE:** {} entries were already published by an earlier upload and are not repeated below.",
            snapshot.previously_published
        ));
        md.push(String::new());
    }

    md.extend([
        "### Output".to_string(),
        "Format: `<subject>` `<permission>` `<outcome>`".to_string(),
        String::new(),
        "___".to_string(),
        String::new(),
    ]);

    let mut csv: Vec<String> = Vec::with_capacity(snapshot.events.len() + 1);
    csv.push(CSV_HEADER.to_string());

    for ev in &snapshot.events {
        md.push(format!(
            "`{}` - {} - **{}**  ",
            ev.subject, ev.permission, ev.outcome
        ));
        csv.push(format!(
            "{},{},{}",
            escape_commas(&ev.subject),
            escape_commas(&ev.permission),
            ev.outcome.as_str()
        ));
    }

    RenderedReport {
        markdown: md.join("\n"),
        csv: csv.join("\n"),
    }
}
