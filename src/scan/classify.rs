//! Filename classification by extension.

use crate::atlassian::Attachment;

/// Attachment filenames ending in `target_extension`, case-insensitively, in input order.
pub fn classify(attachments: &[Attachment], target_extension: &str) -> Vec<String> {
    matching_names(attachments.iter().map(|a| a.filename.as_str()), target_extension)
}

/// Names ending in `target_extension`, case-insensitively, in input order.
pub fn matching_names<'a, I>(names: I, target_extension: &str) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let suffix = target_extension.to_lowercase();
    names
        .into_iter()
        .filter(|name| name.to_lowercase().ends_with(&suffix))
        .map(String::from)
        .collect()
}
