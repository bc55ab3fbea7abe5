//! Attachment scanning.
//!
//! Classifies top-level attachments, looks inside ZIP attachments, and
//! aggregates the matches into a report. Archive downloads run concurrently
//! but the report keeps the issue's attachment order.

pub mod archive;
pub mod classify;

use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::atlassian::{AtlassianClient, Attachment, Credential};
pub use archive::{inspect, list_zip_entries, ArchiveInspection};
pub use classify::{classify, matching_names};

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub target_extension: String,
    pub zip_concurrency: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ZipStatus {
    NotApplicable,
    Failed,
    Succeeded,
}

/// One attachment as reported back to the caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentReport {
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
    pub content: String,
    pub zip_status: ZipStatus,
    pub zip_contents: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip_error: Option<String>,
}

impl AttachmentReport {
    pub fn new(attachment: Attachment, inspection: ArchiveInspection) -> Self {
        let (zip_status, zip_contents, zip_error) = match inspection {
            ArchiveInspection::NotApplicable => (ZipStatus::NotApplicable, None, None),
            ArchiveInspection::Failed(reason) => (ZipStatus::Failed, None, Some(reason)),
            ArchiveInspection::Succeeded(entries) => (ZipStatus::Succeeded, Some(entries), None),
        };

        Self {
            filename: attachment.filename,
            mime_type: attachment.mime_type,
            size: attachment.size,
            content: attachment.content_url,
            zip_status,
            zip_contents,
            zip_error,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScanReport {
    pub attachments: Vec<AttachmentReport>,
    /// Top-level matches first, then matches inside archives, in attachment order.
    pub matches: Vec<String>,
}

impl ScanReport {
    pub fn has_matches(&self) -> bool {
        !self.matches.is_empty()
    }

    pub fn failed_archives(&self) -> usize {
        self.attachments
            .iter()
            .filter(|a| a.zip_status == ZipStatus::Failed)
            .count()
    }
}

/// Inspect every attachment and aggregate the matches.
pub async fn scan_attachments(
    client: &AtlassianClient,
    attachments: Vec<Attachment>,
    credential: &Credential,
    options: &ScanOptions,
) -> ScanReport {
    let inspected: Vec<(Attachment, ArchiveInspection)> = stream::iter(attachments)
        .map(|attachment| async move {
            let inspection = archive::inspect(client, &attachment, credential).await;
            (attachment, inspection)
        })
        .buffered(options.zip_concurrency.max(1))
        .collect()
        .await;

    let report = build_report(inspected, &options.target_extension);
    tracing::info!(
        "Scan found {} {} file(s) across {} attachment(s), {} archive(s) failed",
        report.matches.len(),
        options.target_extension,
        report.attachments.len(),
        report.failed_archives()
    );
    report
}

/// Aggregate inspected attachments into a report.
pub fn build_report(inspected: Vec<(Attachment, ArchiveInspection)>, target_extension: &str) -> ScanReport {
    let top_level: Vec<Attachment> = inspected.iter().map(|(a, _)| a.clone()).collect();
    let mut matches = classify(&top_level, target_extension);

    for (_, inspection) in &inspected {
        if let ArchiveInspection::Succeeded(entries) = inspection {
            matches.extend(matching_names(entries.iter().map(String::as_str), target_extension));
        }
    }

    let attachments = inspected
        .into_iter()
        .map(|(attachment, inspection)| AttachmentReport::new(attachment, inspection))
        .collect();

    ScanReport { attachments, matches }
}
