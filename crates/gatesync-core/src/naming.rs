//! Partition naming convention
//!
//! Managed partitions are named `"<prefix> - Chunk <ordinal>"`. The ordinal
//! is a monotonically increasing integer assigned at creation time. It is
//! the stable ordering key for defragmentation (not the creation timestamp)
//! and is never reused, even after earlier ordinals are freed.

/// Format the name for the partition with the given ordinal
pub fn chunk_name(prefix: &str, ordinal: u32) -> String {
    format!("{prefix} - Chunk {ordinal}")
}

/// Whether a partition name belongs to the managed set (prefix match)
pub fn is_managed(prefix: &str, name: &str) -> bool {
    name.starts_with(prefix)
}

/// Parse the ordinal out of a strictly scheme-conforming partition name.
///
/// Returns `None` for names that merely share the prefix; those partitions
/// are left alone by defragmentation and reported as non-empty.
pub fn parse_ordinal(prefix: &str, name: &str) -> Option<u32> {
    name.strip_prefix(prefix)?
        .strip_prefix(" - Chunk ")?
        .parse()
        .ok()
}

/// The next unused ordinal given a set of existing partition names.
///
/// Max existing ordinal + 1; starts at 1 when no conforming name exists.
/// Freed ordinals are never reused.
pub fn next_ordinal<'a>(prefix: &str, names: impl IntoIterator<Item = &'a str>) -> u32 {
    names
        .into_iter()
        .filter_map(|name| parse_ordinal(prefix, name))
        .max()
        .map_or(1, |max| max + 1)
}
