use chrono::{DateTime, Utc};

/// Namespace that soft-deleted files are renamed into, awaiting garbage collection.
pub const DELETED_PREFIX: &str = "/hidden/deleted/";

/// The name a file is renamed to when deleted at `at`:
/// prefix, `<secs>.<micros>`, then the original name.
pub fn deleted_name(name: &str, at: DateTime<Utc>) -> String {
    format!("{DELETED_PREFIX}{}.{:06}{name}", at.timestamp(), at.timestamp_subsec_micros())
}

pub fn is_deleted(name: &str) -> bool {
    name.starts_with(DELETED_PREFIX)
}
