//! ZIP attachment inspection.

use std::io::Cursor;

use zip::result::ZipError;
use zip::ZipArchive;

use crate::atlassian::{AtlassianClient, Attachment, Credential};

/// Outcome of looking inside one attachment.
#[derive(Debug, Clone, PartialEq)]
pub enum ArchiveInspection {
    /// Not a ZIP attachment; nothing was downloaded.
    NotApplicable,
    /// Download or unpack failed.
    Failed(String),
    /// Entry names in archive order, possibly empty.
    Succeeded(Vec<String>),
}

/// List entry names of a ZIP archive without decompressing anything.
pub fn list_zip_entries(bytes: &[u8]) -> Result<Vec<String>, ZipError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let mut names = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index)?;
        names.push(entry.name().to_string());
    }
    Ok(names)
}

/// Download a ZIP attachment and list its entries. Failures are reported, not propagated.
pub async fn inspect(
    client: &AtlassianClient,
    attachment: &Attachment,
    credential: &Credential,
) -> ArchiveInspection {
    if !attachment.is_zip() {
        return ArchiveInspection::NotApplicable;
    }

    let bytes = match client.download(&attachment.content_url, credential).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Failed to download ZIP {}: {}", attachment.filename, e);
            return ArchiveInspection::Failed(format!("download failed: {}", e));
        }
    };

    match list_zip_entries(&bytes) {
        Ok(entries) => {
            tracing::info!(
                "Extracted {} entries from ZIP {}",
                entries.len(),
                attachment.filename
            );
            ArchiveInspection::Succeeded(entries)
        }
        Err(e) => {
            tracing::warn!("Failed to read ZIP {}: {}", attachment.filename, e);
            ArchiveInspection::Failed(format!("invalid ZIP archive: {}", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use crate::config::RelayConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    fn build_zip(entries: &[&str]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for name in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, options).unwrap();
            } else {
                writer.start_file(*name, options).unwrap();
                writer.write_all(b"ElfFile\0").unwrap();
            }
        }
        writer.finish().unwrap().into_inner()
    }

    fn zip_attachment(url: String) -> Attachment {
        Attachment {
            filename: "b.zip".into(),
            mime_type: "application/zip".into(),
            size: 100,
            content_url: url,
        }
    }

    #[test]
    fn test_list_zip_entries_in_order() {
        let bytes = build_zip(&["logs/", "logs/c.evtx", "readme.txt"]);
        let names = list_zip_entries(&bytes).unwrap();
        assert_eq!(names, vec!["logs/", "logs/c.evtx", "readme.txt"]);
    }

    #[test]
    fn test_list_zip_entries_empty_archive() {
        let bytes = build_zip(&[]);
        assert_eq!(list_zip_entries(&bytes).unwrap(), Vec::<String>::new());
    }

    #[test]
    fn test_list_zip_entries_rejects_garbage() {
        assert!(list_zip_entries(b"definitely not a zip").is_err());
        assert!(list_zip_entries(&[]).is_err());
    }

    #[tokio::test]
    async fn test_inspect_non_zip_is_not_applicable() {
        let client = AtlassianClient::new(&RelayConfig::default()).unwrap();
        let attachment = Attachment {
            filename: "a.evtx".into(),
            mime_type: "application/octet-stream".into(),
            size: 1,
            content_url: "http://127.0.0.1:9/never-fetched".into(),
        };

        let result = inspect(&client, &attachment, &Credential::Bearer("t".into())).await;
        assert_eq!(result, ArchiveInspection::NotApplicable);
    }

    #[tokio::test]
    async fn test_inspect_downloads_and_lists() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/content/b.zip"))
            .respond_with(
                ResponseTemplate::new(200).set_body_bytes(build_zip(&["logs/c.evtx", "readme.txt"])),
            )
            .mount(&server)
            .await;

        let client = AtlassianClient::new(&RelayConfig::default()).unwrap();
        let attachment = zip_attachment(format!("{}/content/b.zip", server.uri()));

        let result = inspect(&client, &attachment, &Credential::Bearer("t".into())).await;
        assert_eq!(
            result,
            ArchiveInspection::Succeeded(vec!["logs/c.evtx".into(), "readme.txt".into()])
        );
    }

    #[tokio::test]
    async fn test_inspect_reports_corrupt_archive() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/content/b.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PK-not-really".to_vec()))
            .mount(&server)
            .await;

        let client = AtlassianClient::new(&RelayConfig::default()).unwrap();
        let attachment = zip_attachment(format!("{}/content/b.zip", server.uri()));

        match inspect(&client, &attachment, &Credential::Bearer("t".into())).await {
            ArchiveInspection::Failed(reason) => assert!(reason.starts_with("invalid ZIP archive")),
            other => panic!("Expected Failed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_inspect_reports_download_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/content/b.zip"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let client = AtlassianClient::new(&RelayConfig::default()).unwrap();
        let attachment = zip_attachment(format!("{}/content/b.zip", server.uri()));

        match inspect(&client, &attachment, &Credential::Bearer("t".into())).await {
            ArchiveInspection::Failed(reason) => assert!(reason.starts_with("download failed")),
            other => panic!("Expected Failed, got {:?}", other),
        }
    }
}
