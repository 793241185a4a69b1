//! URL path normalization.
//!
//! # Responsibilities
//! - Collapse `.` and `..` segments of a slash-separated path
//! - Keep the result rooted (always starts with `/`)
//!
//! # Design Decisions
//! - Total function: malformed input yields best-effort output
//! - A `..` that has nothing left to consume is dropped, so a path never
//!   climbs above the root
//! - Idempotent: normalizing a normalized path returns it unchanged

/// Normalize `.` and `..` segments of a path.
///
/// ```text
/// /a/b/../c    → /a/c
/// /a/../../b   → /b
/// a/./b        → /a/b
/// ```
pub fn normalize(path: &str) -> String {
    let mut segments: Vec<Option<&str>> = path.split('/').map(Some).collect();
    // The empty segment in front of a leading slash is the root.
    let floor = usize::from(path.starts_with('/'));

    for i in 0..segments.len() {
        match segments[i] {
            Some(".") => segments[i] = None,
            Some("..") => {
                segments[i] = None;
                if let Some(j) = (floor..i).rev().find(|&j| segments[j].is_some()) {
                    segments[j] = None;
                }
            }
            _ => {}
        }
    }

    let joined = segments.into_iter().flatten().collect::<Vec<_>>().join("/");
    if joined.starts_with('/') {
        joined
    } else {
        format!("/{}", joined)
    }
}
