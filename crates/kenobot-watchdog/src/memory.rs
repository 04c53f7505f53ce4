//! Process memory introspection.

/// Resident set size of the current process, in bytes.
///
/// Reads `/proc/self/statm`; returns `None` on platforms without procfs.
#[must_use]
pub fn rss_bytes() -> Option<u64> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let resident_pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    let page_size = 4096;
    Some(resident_pages * page_size)
}
