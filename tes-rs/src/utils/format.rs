//! Formatting utilities

use humansize::{DECIMAL, format_size};
use tes_plugin::{FormId, RecordFlags};

/// Format file size in human-readable format
pub fn format_bytes(bytes: u64) -> String {
    format_size(bytes, DECIMAL)
}

/// Format a raw form id the way editors show it
pub fn format_form_id(id: FormId) -> String {
    format!("{:08X}", id.raw())
}

/// Names of the file-header flags that are set
pub fn format_header_flags(flags: RecordFlags) -> String {
    let names: Vec<&str> = [
        (RecordFlags::MASTER, "master"),
        (RecordFlags::LOCALIZED, "localized"),
        (RecordFlags::LIGHT, "light"),
    ]
    .into_iter()
    .filter(|(flag, _)| flags.contains(*flag))
    .map(|(_, name)| name)
    .collect();
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}
